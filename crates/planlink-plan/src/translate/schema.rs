//! Schema mapper: source type tags → target table expression
//!
//! Pure mapping, no side effects. An unknown type tag is a configuration
//! gap and surfaces here, before any plan walking begins.

use planlink_expr::{DataType, Field, Schema, TableExpr};

use super::translator::TranslateError;
use crate::SourceSchema;

/// Fixed translation table from source-engine type tags to target types.
/// `None` means the tag has no registered target equivalent.
pub fn map_source_type(tag: &str) -> Option<DataType> {
    let data_type = match tag {
        "Boolean" => DataType::Boolean,
        "Int8" => DataType::Int8,
        "Int16" => DataType::Int16,
        "Int32" => DataType::Int32,
        "Int64" => DataType::Int64,
        "UInt8" => DataType::UInt8,
        "UInt16" => DataType::UInt16,
        "UInt32" => DataType::UInt32,
        "UInt64" => DataType::UInt64,
        "Float32" => DataType::Float32,
        "Float64" => DataType::Float64,
        // The source engine renamed Utf8 to String; accept both
        "String" | "Utf8" => DataType::String,
        "Date" => DataType::Date,
        "Datetime" => DataType::Timestamp,
        _ => return None,
    };
    Some(data_type)
}

/// Build the unbound base table for `schema`, bound to `table_name`.
/// Column order and names mirror the source schema exactly.
pub fn map_schema(schema: &SourceSchema, table_name: &str) -> Result<TableExpr, TranslateError> {
    let fields = schema
        .fields
        .iter()
        .map(|field| {
            let data_type =
                map_source_type(&field.dtype).ok_or_else(|| TranslateError::UnmappedType {
                    column: field.name.clone(),
                    source_type: field.dtype.clone(),
                })?;
            Ok(Field::new(field.name.clone(), data_type))
        })
        .collect::<Result<Vec<_>, TranslateError>>()?;

    Ok(TableExpr::table(table_name, Schema::new(fields)))
}
