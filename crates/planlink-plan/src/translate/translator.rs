//! Core plan walker
//!
//! Recursively descends the serialized plan tree and composes the target
//! expression bottom-up: the base relation sits at the deepest `input` and
//! each enclosing node is a transformation applied afterward. Validation
//! is fail-fast throughout — any parameter the walker does not explicitly
//! consume (or verify inert) is an error, never silently dropped. That
//! turns "silently produced a wrong answer" into "refused to translate".

use planlink_expr::{AggExpr, Reduction, SortKey, TableExpr};
use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("No target type mapping for source type '{source_type}' (column '{column}')")]
    UnmappedType { column: String, source_type: String },

    #[error("Unexpected plan shape: {0}")]
    UnexpectedShape(String),

    #[error("Unhandled operation: {0}")]
    UnhandledOperation(String),

    #[error("Plan document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Split a plan node into its operation tag and parameter object.
/// A node must be an object with exactly one key.
pub(crate) fn split_node(node: &Value) -> Result<(&str, &Map<String, Value>), TranslateError> {
    let obj = node.as_object().ok_or_else(|| {
        TranslateError::UnexpectedShape(format!("plan node is not an object: {}", node))
    })?;

    if obj.len() != 1 {
        return Err(TranslateError::UnexpectedShape(format!(
            "plan node has {} top-level keys ({:?}), expected exactly one",
            obj.len(),
            obj.keys().collect::<Vec<_>>()
        )));
    }

    let (tag, params) = obj.iter().next().expect("length checked above");
    let params = params.as_object().ok_or_else(|| {
        TranslateError::UnexpectedShape(format!(
            "parameters of plan node '{}' are not an object",
            tag
        ))
    })?;

    Ok((tag, params))
}

/// Allow-list check: every provided parameter key must be recognized.
fn expect_keys(
    tag: &str,
    params: &Map<String, Value>,
    allowed: &[&str],
) -> Result<(), TranslateError> {
    let unknown: Vec<&str> = params
        .keys()
        .map(String::as_str)
        .filter(|key| !allowed.contains(key))
        .collect();

    if !unknown.is_empty() {
        return Err(TranslateError::UnexpectedShape(format!(
            "plan node '{}' has unrecognized parameters {:?}",
            tag, unknown
        )));
    }
    Ok(())
}

fn require<'a>(
    tag: &str,
    params: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a Value, TranslateError> {
    params.get(key).ok_or_else(|| {
        TranslateError::UnexpectedShape(format!(
            "plan node '{}' is missing required parameter '{}'",
            tag, key
        ))
    })
}

/// True for values that carry no effective setting: null, false, an empty
/// list, or a list of falsy values (the source engine encodes per-key sort
/// flags as lists).
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Array(items) => items.iter().all(is_falsy),
        _ => false,
    }
}

/// Translator for serialized dataframe plans → target table expressions
#[derive(Debug, Default)]
pub struct PlanTranslator;

impl PlanTranslator {
    pub fn new() -> Self {
        Self
    }

    /// Walk the plan tree rooted at `root`, composing onto `base` (the
    /// unbound table produced by the schema mapper). Ownership of `base`
    /// threads down the recursion to the base-relation marker and the
    /// composed expression is handed back up.
    pub fn translate(&self, root: &Value, base: TableExpr) -> Result<TableExpr, TranslateError> {
        self.translate_node(root, base)
    }

    fn translate_node(&self, node: &Value, base: TableExpr) -> Result<TableExpr, TranslateError> {
        let (tag, params) = split_node(node)?;
        tracing::debug!(op = tag, "translating plan node");

        // No `input` parameter marks the base relation
        let Some(input) = params.get("input") else {
            self.validate_base(tag, params)?;
            return Ok(base);
        };

        let input_expr = self.translate_node(input, base)?;

        match tag {
            "Slice" => self.translate_slice(params, input_expr),
            "Sort" => self.translate_sort(params, input_expr),
            "MapFunction" => self.translate_map_function(params, input_expr),
            "Select" => self.translate_select(params, input_expr),
            other => Err(TranslateError::UnhandledOperation(format!(
                "plan operation '{}'",
                other
            ))),
        }
    }

    /// The base-relation marker is normally a scan node. Its companion
    /// fields are inert (the schema mapper already consumed the schema),
    /// except pushed-down projection/selection, which would change results.
    fn validate_base(&self, tag: &str, params: &Map<String, Value>) -> Result<(), TranslateError> {
        if tag != "DataFrameScan" {
            tracing::debug!(op = tag, "treating inputless node as base relation");
            return Ok(());
        }

        expect_keys(
            tag,
            params,
            &["df", "schema", "output_schema", "projection", "selection"],
        )?;

        for pushed in ["projection", "selection"] {
            if let Some(value) = params.get(pushed) {
                if !value.is_null() {
                    return Err(TranslateError::UnhandledOperation(format!(
                        "pushed-down {} on the scan node",
                        pushed
                    )));
                }
            }
        }
        Ok(())
    }

    /// Slice { input, offset, len } → row limit
    fn translate_slice(
        &self,
        params: &Map<String, Value>,
        input: TableExpr,
    ) -> Result<TableExpr, TranslateError> {
        expect_keys("Slice", params, &["input", "offset", "len"])?;

        let offset = require("Slice", params, "offset")?
            .as_i64()
            .ok_or_else(|| {
                TranslateError::UnexpectedShape("Slice 'offset' is not an integer".to_string())
            })?;
        let len = require("Slice", params, "len")?.as_u64().ok_or_else(|| {
            TranslateError::UnexpectedShape(
                "Slice 'len' is not a non-negative integer".to_string(),
            )
        })?;

        // Negative offsets count from the end of the frame; the target
        // limit operator has no equivalent
        if offset < 0 {
            return Err(TranslateError::UnhandledOperation(format!(
                "Slice with negative offset {}",
                offset
            )));
        }

        Ok(input.limit(len, offset as u64))
    }

    /// Sort { input, by_column, slice, sort_options } → ascending stable order
    fn translate_sort(
        &self,
        params: &Map<String, Value>,
        input: TableExpr,
    ) -> Result<TableExpr, TranslateError> {
        expect_keys("Sort", params, &["input", "by_column", "slice", "sort_options"])?;

        if let Some(slice) = params.get("slice") {
            if !is_falsy(slice) {
                return Err(TranslateError::UnhandledOperation(
                    "Sort with an embedded slice".to_string(),
                ));
            }
        }

        self.validate_sort_options(require("Sort", params, "sort_options")?)?;

        let by_column = require("Sort", params, "by_column")?
            .as_array()
            .ok_or_else(|| {
                TranslateError::UnexpectedShape("Sort 'by_column' is not a list".to_string())
            })?;
        if by_column.is_empty() {
            return Err(TranslateError::UnexpectedShape(
                "Sort has an empty 'by_column' list".to_string(),
            ));
        }

        let keys = by_column
            .iter()
            .map(|entry| {
                let (tag, column) = match entry.as_object() {
                    Some(obj) if obj.len() == 1 => {
                        let (tag, value) = obj.iter().next().expect("length checked above");
                        (tag.as_str(), value)
                    }
                    _ => {
                        return Err(TranslateError::UnexpectedShape(format!(
                            "Sort key is not a single-key expression: {}",
                            entry
                        )))
                    }
                };
                if tag != "Column" {
                    return Err(TranslateError::UnexpectedShape(format!(
                        "Sort key is not a plain column reference: '{}'",
                        tag
                    )));
                }
                let name = column.as_str().ok_or_else(|| {
                    TranslateError::UnexpectedShape(format!(
                        "Sort column reference is not a string: {}",
                        column
                    ))
                })?;
                Ok(SortKey::asc(name))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(input.order_by(keys))
    }

    /// Only the default sort variant translates: ascending, nulls first,
    /// unlimited. Any enabled option would change row order or content, so
    /// a true value fails rather than silently sorting ascending. The
    /// `multithreaded` flag is an execution detail and is ignored.
    fn validate_sort_options(&self, options: &Value) -> Result<(), TranslateError> {
        let options = options.as_object().ok_or_else(|| {
            TranslateError::UnexpectedShape("Sort 'sort_options' is not an object".to_string())
        })?;

        expect_keys(
            "Sort.sort_options",
            options,
            &["descending", "nulls_last", "multithreaded", "maintain_order", "limit"],
        )?;

        for flag in ["descending", "nulls_last", "maintain_order", "limit"] {
            if let Some(value) = options.get(flag) {
                if !is_falsy(value) {
                    return Err(TranslateError::UnhandledOperation(format!(
                        "Sort with '{}' set to {}",
                        flag, value
                    )));
                }
            }
        }

        if let Some(value) = options.get("multithreaded") {
            tracing::debug!(%value, "ignoring 'multithreaded' sort flag");
        }
        Ok(())
    }

    /// MapFunction { input, function: { Stats: kind } } → per-column
    /// reduction producing one row, output columns renamed back to their
    /// source names (stripping the reduction-name wrapping the aggregate
    /// primitive introduces).
    fn translate_map_function(
        &self,
        params: &Map<String, Value>,
        input: TableExpr,
    ) -> Result<TableExpr, TranslateError> {
        expect_keys("MapFunction", params, &["input", "function"])?;

        let function = require("MapFunction", params, "function")?;
        let obj = match function.as_object() {
            Some(obj) if obj.len() == 1 => obj,
            _ => {
                return Err(TranslateError::UnexpectedShape(format!(
                    "MapFunction 'function' is not a single-key object: {}",
                    function
                )))
            }
        };
        let (kind, value) = obj.iter().next().expect("length checked above");

        if kind != "Stats" {
            return Err(TranslateError::UnhandledOperation(format!(
                "MapFunction '{}'",
                kind
            )));
        }

        let stat = value.as_str().ok_or_else(|| {
            TranslateError::UnexpectedShape(format!("Stats kind is not a string: {}", value))
        })?;
        let reduction = match stat {
            "Max" => Reduction::Max,
            "Min" => Reduction::Min,
            "Mean" => Reduction::Mean,
            other => {
                return Err(TranslateError::UnhandledOperation(format!(
                    "Stats reduction '{}'",
                    other
                )))
            }
        };

        let schema = input.schema();
        let aggs: Vec<AggExpr> = schema
            .fields
            .iter()
            .map(|field| AggExpr::new(reduction, field.name.clone()))
            .collect();
        let mapping: Vec<(String, String)> = aggs
            .iter()
            .map(|agg| (agg.name.clone(), agg.column.clone()))
            .collect();

        Ok(input.aggregate(aggs).rename(mapping))
    }

    /// Select { input, expr, options }: only the count-over-wildcard shape
    /// is recognized, and even that stays unhandled — the target count
    /// aggregate yields a scalar while the source produces a single-row
    /// table, and reconciling the two is out of scope.
    fn translate_select(
        &self,
        params: &Map<String, Value>,
        _input: TableExpr,
    ) -> Result<TableExpr, TranslateError> {
        expect_keys("Select", params, &["input", "expr", "options"])?;

        let options = require("Select", params, "options")?
            .as_object()
            .ok_or_else(|| {
                TranslateError::UnexpectedShape("Select 'options' is not an object".to_string())
            })?;
        for (key, value) in options {
            if !value.is_boolean() {
                return Err(TranslateError::UnexpectedShape(format!(
                    "Select option '{}' is not a boolean: {}",
                    key, value
                )));
            }
        }

        let exprs = require("Select", params, "expr")?.as_array().ok_or_else(|| {
            TranslateError::UnexpectedShape("Select 'expr' is not a list".to_string())
        })?;
        if exprs.len() != 1 {
            return Err(TranslateError::UnexpectedShape(format!(
                "Select has {} expressions, expected exactly one",
                exprs.len()
            )));
        }

        let tag = match exprs[0].as_object() {
            Some(obj) if obj.len() == 1 => obj.keys().next().expect("length checked above"),
            _ => {
                return Err(TranslateError::UnexpectedShape(format!(
                    "Select expression is not a single-key object: {}",
                    exprs[0]
                )))
            }
        };

        if tag == "Len" {
            return Err(TranslateError::UnhandledOperation(
                "Select count-over-wildcard: the target count aggregate yields a scalar, \
                 not a single-row table"
                    .to_string(),
            ));
        }

        Err(TranslateError::UnexpectedShape(format!(
            "Select expression '{}'",
            tag
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::map_schema;
    use crate::SourceSchema;
    use planlink_expr::DataType;
    use serde_json::json;

    fn source_schema() -> SourceSchema {
        SourceSchema::from_pairs([("ints", "Int64"), ("floats", "Float64")])
    }

    fn base() -> TableExpr {
        map_schema(&source_schema(), "t").unwrap()
    }

    fn scan() -> Value {
        json!({
            "DataFrameScan": {
                "df": {"columns": []},
                "schema": {"fields": {"ints": "Int64", "floats": "Float64"}},
                "output_schema": null,
                "projection": null,
                "selection": null
            }
        })
    }

    #[test]
    fn test_scan_returns_base_unmodified() {
        let expr = PlanTranslator::new().translate(&scan(), base()).unwrap();
        assert_eq!(expr, base());
    }

    #[test]
    fn test_slice_becomes_limit() {
        let node = json!({"Slice": {"input": scan(), "offset": 1, "len": 2}});
        let expr = PlanTranslator::new().translate(&node, base()).unwrap();
        assert_eq!(expr, base().limit(2, 1));
    }

    #[test]
    fn test_sort_becomes_ascending_order_by() {
        let node = json!({
            "Sort": {
                "input": scan(),
                "by_column": [{"Column": "ints"}],
                "slice": null,
                "sort_options": {
                    "descending": [false],
                    "nulls_last": [false],
                    "multithreaded": true,
                    "maintain_order": false,
                    "limit": null
                }
            }
        });
        let expr = PlanTranslator::new().translate(&node, base()).unwrap();
        assert_eq!(expr, base().order_by(vec![SortKey::asc("ints")]));
    }

    #[test]
    fn test_stats_max_wraps_and_renames_every_column() {
        let node = json!({"MapFunction": {"input": scan(), "function": {"Stats": "Max"}}});
        let expr = PlanTranslator::new().translate(&node, base()).unwrap();

        let schema = expr.schema();
        assert_eq!(schema.names(), vec!["ints", "floats"]);
        assert_eq!(schema.fields[0].data_type, DataType::Int64);
    }

    #[test]
    fn test_unmapped_type_fails_before_walking() {
        let schema = SourceSchema::from_pairs([("cats", "Categorical")]);
        let err = map_schema(&schema, "t").unwrap_err();
        assert!(matches!(
            err,
            TranslateError::UnmappedType { ref source_type, .. } if source_type == "Categorical"
        ));
    }

    #[test]
    fn test_unknown_operation_names_the_tag() {
        let node = json!({"Join": {"input": scan(), "how": "inner"}});
        let err = PlanTranslator::new().translate(&node, base()).unwrap_err();
        match err {
            TranslateError::UnhandledOperation(msg) => assert!(msg.contains("Join")),
            other => panic!("expected UnhandledOperation, got {:?}", other),
        }
    }

    #[test]
    fn test_multi_key_node_is_unexpected_shape() {
        let node = json!({"Slice": {"input": scan(), "offset": 0, "len": 1}, "Sort": {}});
        let err = PlanTranslator::new().translate(&node, base()).unwrap_err();
        assert!(matches!(err, TranslateError::UnexpectedShape(_)));
    }
}
