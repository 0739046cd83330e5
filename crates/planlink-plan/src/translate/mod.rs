//! Plan translation module
//!
//! Maps the source schema into target types and walks the serialized plan
//! tree, composing a `planlink_expr::TableExpr` bottom-up.

mod schema;
mod translator;

pub use schema::{map_schema, map_source_type};
pub use translator::{PlanTranslator, TranslateError};

pub(crate) use translator::split_node;
