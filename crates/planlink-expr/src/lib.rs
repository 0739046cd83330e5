//! Planlink target expressions
//!
//! Backend-agnostic relational expression tree produced by the plan
//! translator. A `TableExpr` is an immutable value: every builder method
//! consumes its receiver and returns a new expression, so no mutable
//! expression state is ever shared. Execution is delegated to anything
//! implementing [`Backend`].

use serde::{Deserialize, Serialize};
use std::fmt;

mod types;
pub use types::*;

/// Per-column reduction kinds supported by [`TableExpr::aggregate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reduction {
    Max,
    Min,
    Mean,
}

impl Reduction {
    pub fn name(&self) -> &'static str {
        match self {
            Reduction::Max => "max",
            Reduction::Min => "min",
            Reduction::Mean => "mean",
        }
    }

    /// Output type of the reduction applied to a column of `input` type.
    /// Mean always widens to float64; max/min preserve the input type.
    pub fn output_type(&self, input: DataType) -> DataType {
        match self {
            Reduction::Max | Reduction::Min => input,
            Reduction::Mean => DataType::Float64,
        }
    }
}

/// One ordering key for [`TableExpr::order_by`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub column: String,
    pub descending: bool,
}

impl SortKey {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }
}

/// One named reduction over one column, as passed to
/// [`TableExpr::aggregate`]. `name` is the output column name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggExpr {
    pub reduction: Reduction,
    pub column: String,
    pub name: String,
}

impl AggExpr {
    pub fn new(reduction: Reduction, column: impl Into<String>) -> Self {
        let column = column.into();
        let name = format!("{}_{}", column, reduction.name());
        Self {
            reduction,
            column,
            name,
        }
    }
}

/// Backend-agnostic table expression
///
/// `Table` is an unbound placeholder: schema and name only, zero rows. A
/// backend later resolves the name against concrete data it holds. The
/// remaining variants compose an input expression with one relational
/// operator each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TableExpr {
    Table {
        name: String,
        schema: Schema,
    },
    Limit {
        input: Box<TableExpr>,
        n: u64,
        offset: u64,
    },
    OrderBy {
        input: Box<TableExpr>,
        keys: Vec<SortKey>,
    },
    Aggregate {
        input: Box<TableExpr>,
        aggs: Vec<AggExpr>,
    },
    Rename {
        input: Box<TableExpr>,
        /// (current name, new name) pairs
        mapping: Vec<(String, String)>,
    },
}

impl TableExpr {
    /// Unbound table placeholder bound to `name`
    pub fn table(name: impl Into<String>, schema: Schema) -> Self {
        TableExpr::Table {
            name: name.into(),
            schema,
        }
    }

    /// Keep `n` rows starting at `offset`
    pub fn limit(self, n: u64, offset: u64) -> Self {
        TableExpr::Limit {
            input: Box::new(self),
            n,
            offset,
        }
    }

    /// Stable multi-key ordering
    pub fn order_by(self, keys: Vec<SortKey>) -> Self {
        TableExpr::OrderBy {
            input: Box::new(self),
            keys,
        }
    }

    /// Reduce to a single row; output columns are the agg names
    pub fn aggregate(self, aggs: Vec<AggExpr>) -> Self {
        TableExpr::Aggregate {
            input: Box::new(self),
            aggs,
        }
    }

    /// Rename columns; pairs are (current name, new name)
    pub fn rename(self, mapping: Vec<(String, String)>) -> Self {
        TableExpr::Rename {
            input: Box::new(self),
            mapping,
        }
    }

    /// Output schema of this expression
    pub fn schema(&self) -> Schema {
        match self {
            TableExpr::Table { schema, .. } => schema.clone(),
            TableExpr::Limit { input, .. } | TableExpr::OrderBy { input, .. } => input.schema(),
            TableExpr::Aggregate { input, aggs } => {
                let input_schema = input.schema();
                let fields = aggs
                    .iter()
                    .map(|agg| {
                        let input_type = input_schema
                            .find_field(&agg.column)
                            .map(|f| f.data_type)
                            .unwrap_or(DataType::Unknown);
                        Field::new(agg.name.clone(), agg.reduction.output_type(input_type))
                    })
                    .collect();
                Schema::new(fields)
            }
            TableExpr::Rename { input, mapping } => {
                let mut schema = input.schema();
                for field in &mut schema.fields {
                    if let Some((_, to)) = mapping.iter().find(|(from, _)| *from == field.name) {
                        field.name = to.clone();
                    }
                }
                schema
            }
        }
    }

    /// Name of the base table at the bottom of the expression
    pub fn base_table_name(&self) -> &str {
        match self {
            TableExpr::Table { name, .. } => name,
            TableExpr::Limit { input, .. }
            | TableExpr::OrderBy { input, .. }
            | TableExpr::Aggregate { input, .. }
            | TableExpr::Rename { input, .. } => input.base_table_name(),
        }
    }
}

impl fmt::Display for TableExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableExpr::Table { name, .. } => write!(f, "{}", name),
            TableExpr::Limit { input, n, offset } => {
                write!(f, "{}.limit({}, offset={})", input, n, offset)
            }
            TableExpr::OrderBy { input, keys } => {
                let keys: Vec<String> = keys
                    .iter()
                    .map(|k| {
                        format!(
                            "{} {}",
                            k.column,
                            if k.descending { "desc" } else { "asc" }
                        )
                    })
                    .collect();
                write!(f, "{}.order_by([{}])", input, keys.join(", "))
            }
            TableExpr::Aggregate { input, aggs } => {
                let aggs: Vec<String> = aggs
                    .iter()
                    .map(|a| format!("{}={}({})", a.name, a.reduction.name(), a.column))
                    .collect();
                write!(f, "{}.aggregate([{}])", input, aggs.join(", "))
            }
            TableExpr::Rename { input, mapping } => {
                let pairs: Vec<String> = mapping
                    .iter()
                    .map(|(from, to)| format!("{} => {}", from, to))
                    .collect();
                write!(f, "{}.rename({{{}}})", input, pairs.join(", "))
            }
        }
    }
}

/// Materialized result of executing a [`TableExpr`] on a backend
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
    pub row_count: usize,
}

impl QueryResult {
    /// Rows as ordered column-name → value records
    pub fn records(&self) -> Vec<Vec<(String, serde_json::Value)>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }
}

/// Execution seam: anything that can resolve unbound tables by name and
/// run the expression operator set.
pub trait Backend {
    type Error;

    fn execute(&self, expr: &TableExpr) -> Result<QueryResult, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> Schema {
        Schema::new(vec![
            Field::new("ints", DataType::Int64),
            Field::new("floats", DataType::Float64),
        ])
    }

    #[test]
    fn test_limit_preserves_schema() {
        let expr = TableExpr::table("t", sample_schema()).limit(2, 0);
        assert_eq!(expr.schema(), sample_schema());
        assert_eq!(expr.base_table_name(), "t");
    }

    #[test]
    fn test_aggregate_schema_wraps_names() {
        let expr = TableExpr::table("t", sample_schema()).aggregate(vec![
            AggExpr::new(Reduction::Max, "ints"),
            AggExpr::new(Reduction::Mean, "floats"),
        ]);
        let schema = expr.schema();
        assert_eq!(schema.names(), vec!["ints_max", "floats_mean"]);
        assert_eq!(schema.fields[0].data_type, DataType::Int64);
        assert_eq!(schema.fields[1].data_type, DataType::Float64);
    }

    #[test]
    fn test_mean_widens_integers() {
        let expr = TableExpr::table("t", sample_schema())
            .aggregate(vec![AggExpr::new(Reduction::Mean, "ints")]);
        assert_eq!(expr.schema().fields[0].data_type, DataType::Float64);
    }

    #[test]
    fn test_rename_strips_wrapping() {
        let expr = TableExpr::table("t", sample_schema())
            .aggregate(vec![AggExpr::new(Reduction::Max, "ints")])
            .rename(vec![("ints_max".to_string(), "ints".to_string())]);
        assert_eq!(expr.schema().names(), vec!["ints"]);
    }

    #[test]
    fn test_display_is_readable() {
        let expr = TableExpr::table("t", sample_schema())
            .order_by(vec![SortKey::asc("ints")])
            .limit(2, 0);
        assert_eq!(expr.to_string(), "t.order_by([ints asc]).limit(2, offset=0)");
    }
}
