//! Planlink plan model and translator
//!
//! Consumes the serialized logical plan of a lazy-evaluation dataframe
//! engine (a versioned, externally-owned JSON tree) and translates it into
//! a backend-agnostic `planlink_expr::TableExpr`. The plan format carries
//! no formal shape guarantees, so every assumption about it is verified
//! and violations fail loudly instead of mis-translating.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use planlink_expr::TableExpr;

mod compat;
pub mod translate;

pub use compat::{check_source_version, version_in_range, MAX_SOURCE_VERSION, MIN_SOURCE_VERSION};
pub use translate::TranslateError;

/// One column of the source schema: name plus the source engine's type tag
/// (e.g. "Int64", "Utf8"), still untranslated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceField {
    pub name: String,
    pub dtype: String,
}

/// Ordered source-engine schema, as read out of the serialized plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSchema {
    pub fields: Vec<SourceField>,
}

impl SourceSchema {
    pub fn new(fields: Vec<SourceField>) -> Self {
        Self { fields }
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            fields: pairs
                .into_iter()
                .map(|(name, dtype)| SourceField {
                    name: name.to_string(),
                    dtype: dtype.to_string(),
                })
                .collect(),
        }
    }
}

/// A serialized lazy query: the plan tree plus the base-relation schema.
///
/// Created fresh per translation call; nothing is cached across calls.
#[derive(Debug, Clone)]
pub struct PlanSource {
    root: Value,
    schema: SourceSchema,
    source_version: Option<String>,
}

impl PlanSource {
    pub fn new(root: Value, schema: SourceSchema) -> Self {
        Self {
            root,
            schema,
            source_version: None,
        }
    }

    /// Parse a serialized plan document and pull the base-relation schema
    /// out of its innermost scan node.
    pub fn from_json(json: &str) -> Result<Self, TranslateError> {
        let root: Value = serde_json::from_str(json)?;
        let schema = extract_scan_schema(&root)?;
        Ok(Self {
            root,
            schema,
            source_version: None,
        })
    }

    /// Record the source library version that produced this plan, feeding
    /// the compatibility guard when the plan is translated.
    pub fn with_source_version(mut self, version: impl Into<String>) -> Self {
        self.source_version = Some(version.into());
        self
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn schema(&self) -> &SourceSchema {
        &self.schema
    }

    pub fn source_version(&self) -> Option<&str> {
        self.source_version.as_deref()
    }

    /// SHA-256 over the canonical JSON of the plan tree, for provenance
    /// logging. Advisory only; translation never caches by it.
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_string(&self.root).expect("plan value should always serialize");
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Translate a serialized lazy query into a target expression whose base
/// table is bound to `table_name`.
///
/// `table_name` is the canonical binding name: the caller must later
/// register concrete data under the same name with whatever backend
/// executes the returned expression.
pub fn translate(source: &PlanSource, table_name: &str) -> Result<TableExpr, TranslateError> {
    if let Some(version) = source.source_version() {
        compat::check_source_version(version);
    }

    tracing::debug!(
        table = table_name,
        fingerprint = %source.fingerprint(),
        "translating plan"
    );

    let base = translate::map_schema(source.schema(), table_name)?;
    let translator = translate::PlanTranslator::new();
    translator.translate(source.root(), base)
}

/// Descend the `input` chain until the scan node and read its schema.
fn extract_scan_schema(root: &Value) -> Result<SourceSchema, TranslateError> {
    let mut node = root;
    loop {
        let (tag, params) = translate::split_node(node)?;
        if tag == "DataFrameScan" {
            let schema = params.get("schema").ok_or_else(|| {
                TranslateError::UnexpectedShape("DataFrameScan node carries no schema".to_string())
            })?;
            return parse_scan_schema(schema);
        }
        node = params.get("input").ok_or_else(|| {
            TranslateError::UnexpectedShape(format!(
                "base plan node '{}' carries no schema",
                tag
            ))
        })?;
    }
}

fn parse_scan_schema(value: &Value) -> Result<SourceSchema, TranslateError> {
    let mut map = value.as_object().ok_or_else(|| {
        TranslateError::UnexpectedShape("scan schema is not an object".to_string())
    })?;

    // Source versions differ on nesting: {"fields": {...}}, {"inner": {...}},
    // or the name -> dtype map directly.
    for wrapper in ["fields", "inner"] {
        if let Some(inner) = map.get(wrapper).and_then(Value::as_object) {
            map = inner;
            break;
        }
    }

    let fields = map
        .iter()
        .map(|(name, dtype)| {
            // Parameterized types (e.g. Datetime with a time unit) encode as
            // a single-key object; the key is the type tag.
            let tag = match dtype {
                Value::String(s) => s.clone(),
                Value::Object(obj) if obj.len() == 1 => {
                    obj.keys().next().map(String::clone).unwrap_or_default()
                }
                other => {
                    return Err(TranslateError::UnexpectedShape(format!(
                        "schema column '{}' has unrecognized type encoding: {}",
                        name, other
                    )))
                }
            };
            Ok(SourceField {
                name: name.clone(),
                dtype: tag,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SourceSchema { fields })
}
