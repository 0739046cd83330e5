//! In-memory vector backend for planlink expressions
//!
//! Resolves unbound tables by name against registered in-memory data and
//! executes the expression operator set (limit, order-by, aggregate,
//! rename). Used to verify translated plans end to end without an
//! external engine; any SQL backend implementing the same operator set is
//! interchangeable with it.

use planlink_expr::{AggExpr, Backend, QueryResult, Reduction, Schema, SortKey, TableExpr};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Table '{0}' is not registered with this backend")]
    TableNotFound(String),

    #[error("Table '{name}': registered columns {actual:?} do not match expected {expected:?}")]
    SchemaMismatch {
        name: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("Expected {expected} values, got {actual}")]
    Arity { expected: usize, actual: usize },

    #[error("Column '{0}' length differs from the first column")]
    RaggedColumn(String),

    #[error("Column '{0}' not found")]
    UnknownColumn(String),
}

/// Concrete table data: a schema plus row-major values
#[derive(Debug, Clone)]
pub struct DataTable {
    schema: Schema,
    rows: Vec<Vec<Value>>,
}

impl DataTable {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    /// Build from column-major vectors, in schema order
    pub fn from_columns(schema: Schema, columns: Vec<Vec<Value>>) -> Result<Self, ExecutionError> {
        if columns.len() != schema.len() {
            return Err(ExecutionError::Arity {
                expected: schema.len(),
                actual: columns.len(),
            });
        }
        let row_count = columns.first().map(Vec::len).unwrap_or(0);
        for (field, column) in schema.fields.iter().zip(&columns) {
            if column.len() != row_count {
                return Err(ExecutionError::RaggedColumn(field.name.clone()));
            }
        }

        let rows = (0..row_count)
            .map(|i| columns.iter().map(|col| col[i].clone()).collect())
            .collect();
        Ok(Self { schema, rows })
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), ExecutionError> {
        if row.len() != self.schema.len() {
            return Err(ExecutionError::Arity {
                expected: self.schema.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// In-memory backend: a registry of named tables
#[derive(Debug, Default)]
pub struct MemBackend {
    tables: HashMap<String, DataTable>,
}

impl MemBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register concrete data under `name`. The name must match the one
    /// the unbound table expression was bound to, or execution fails with
    /// `TableNotFound`.
    pub fn register(&mut self, name: impl Into<String>, table: DataTable) {
        self.tables.insert(name.into(), table);
    }

    fn eval(&self, expr: &TableExpr) -> Result<(Schema, Vec<Vec<Value>>), ExecutionError> {
        match expr {
            TableExpr::Table { name, schema } => {
                let table = self
                    .tables
                    .get(name)
                    .ok_or_else(|| ExecutionError::TableNotFound(name.clone()))?;

                let expected = schema.names();
                let actual = table.schema.names();
                if expected != actual {
                    return Err(ExecutionError::SchemaMismatch {
                        name: name.clone(),
                        expected,
                        actual,
                    });
                }
                Ok((table.schema.clone(), table.rows.clone()))
            }

            TableExpr::Limit { input, n, offset } => {
                let (schema, rows) = self.eval(input)?;
                let rows = rows
                    .into_iter()
                    .skip(*offset as usize)
                    .take(*n as usize)
                    .collect();
                Ok((schema, rows))
            }

            TableExpr::OrderBy { input, keys } => {
                let (schema, mut rows) = self.eval(input)?;
                let indices = key_indices(&schema, keys)?;
                // sort_by is stable, so equal keys keep their input order
                rows.sort_by(|a, b| {
                    for (idx, key) in &indices {
                        let ord = cmp_values(&a[*idx], &b[*idx]);
                        let ord = if key.descending { ord.reverse() } else { ord };
                        if ord != Ordering::Equal {
                            return ord;
                        }
                    }
                    Ordering::Equal
                });
                Ok((schema, rows))
            }

            TableExpr::Aggregate { input, aggs } => {
                let (schema, rows) = self.eval(input)?;
                let row = aggs
                    .iter()
                    .map(|agg| reduce_column(&schema, &rows, agg))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((expr.schema(), vec![row]))
            }

            TableExpr::Rename { input, mapping } => {
                let (mut schema, rows) = self.eval(input)?;
                for field in &mut schema.fields {
                    if let Some((_, to)) = mapping.iter().find(|(from, _)| *from == field.name) {
                        field.name = to.clone();
                    }
                }
                Ok((schema, rows))
            }
        }
    }
}

impl Backend for MemBackend {
    type Error = ExecutionError;

    fn execute(&self, expr: &TableExpr) -> Result<QueryResult, ExecutionError> {
        let (schema, rows) = self.eval(expr)?;
        let row_count = rows.len();
        Ok(QueryResult {
            columns: schema.names(),
            rows,
            row_count,
        })
    }
}

fn key_indices<'a>(
    schema: &Schema,
    keys: &'a [SortKey],
) -> Result<Vec<(usize, &'a SortKey)>, ExecutionError> {
    keys.iter()
        .map(|key| {
            schema
                .fields
                .iter()
                .position(|f| f.name == key.column)
                .map(|idx| (idx, key))
                .ok_or_else(|| ExecutionError::UnknownColumn(key.column.clone()))
        })
        .collect()
}

fn reduce_column(
    schema: &Schema,
    rows: &[Vec<Value>],
    agg: &AggExpr,
) -> Result<Value, ExecutionError> {
    let idx = schema
        .fields
        .iter()
        .position(|f| f.name == agg.column)
        .ok_or_else(|| ExecutionError::UnknownColumn(agg.column.clone()))?;
    let values = rows.iter().map(|row| &row[idx]);

    let value = match agg.reduction {
        Reduction::Max => values
            .filter(|v| !v.is_null())
            .max_by(|a, b| cmp_values(a, b))
            .cloned()
            .unwrap_or(Value::Null),
        Reduction::Min => values
            .filter(|v| !v.is_null())
            .min_by(|a, b| cmp_values(a, b))
            .cloned()
            .unwrap_or(Value::Null),
        Reduction::Mean => {
            let mut sum = 0.0;
            let mut count = 0u64;
            for value in values {
                match value {
                    Value::Number(n) => {
                        sum += n.as_f64().unwrap_or(0.0);
                        count += 1;
                    }
                    // Booleans average as 0/1, matching the source engine
                    Value::Bool(b) => {
                        sum += if *b { 1.0 } else { 0.0 };
                        count += 1;
                    }
                    // Nulls are skipped; non-numeric columns mean to null
                    _ => {}
                }
            }
            if count == 0 {
                Value::Null
            } else {
                serde_json::json!(sum / count as f64)
            }
        }
    };
    Ok(value)
}

/// Total order over scalar JSON values: null first, then booleans,
/// numbers, strings; mixed types order by that rank.
fn cmp_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
