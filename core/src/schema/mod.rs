//! Field schema model: loading, validation and item-schema derivation.
//!
//! A schema is loaded exactly once, before any document is processed. Every
//! check that can fail happens here, so the engine only ever sees closed
//! enums and non-empty guidance text.

mod document;
mod item;

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::extraction::ExtractionConfig;
use document::{collect_structure_errors, RawDocument, RawField};

pub use item::ItemSchema;

/// Errors raised while loading a schema. Fatal: no document is processed.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The raw text is not JSON.
    #[error("Schema is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The document does not have the expected shape.
    #[error("Schema structure is invalid:\n  - {}", .0.join("\n  - "))]
    Structure(Vec<String>),

    /// The same field name appears more than once.
    #[error("Duplicate field name '{0}'")]
    DuplicateField(String),

    /// A field name is empty or whitespace.
    #[error("Field names must not be empty")]
    EmptyName,

    /// A `type` outside the known set.
    #[error("Field '{field}' has unknown type '{value}'")]
    UnknownType {
        /// Offending field.
        field: String,
        /// The rejected type string.
        value: String,
    },

    /// A `method` other than `extract` or `generate`.
    #[error("Field '{field}' has unknown method '{value}'")]
    UnknownMethod {
        /// Offending field.
        field: String,
        /// The rejected method string.
        value: String,
    },

    /// A field without guidance text.
    #[error("Field '{0}' has an empty description")]
    EmptyDescription(String),

    /// An `itemSchema` constraint on an `extract` field.
    #[error("Field '{0}' declares an itemSchema but does not use the generate method")]
    ItemSchemaOnExtract(String),

    /// The schema file could not be read.
    #[error("Could not read schema file: {0}")]
    Io(#[from] std::io::Error),
}

/// Target type of a field's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Free text.
    String,
    /// Locale-tolerant number.
    Number,
    /// Calendar date, normalized to `DD/MM/YYYY`.
    Date,
    /// Yes/no value.
    Boolean,
}

impl FieldType {
    /// Wire name of the type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Date => "date",
            Self::Boolean => "boolean",
        }
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(Self::String),
            "number" => Ok(Self::Number),
            "date" => Ok(Self::Date),
            "boolean" => Ok(Self::Boolean),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the resolver should obtain a field's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldMethod {
    /// Pull exactly one scalar value from the document.
    Extract,
    /// Synthesize a JSON array of records describing repeated content.
    Generate,
}

impl FieldMethod {
    /// Wire name of the method.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Extract => "extract",
            Self::Generate => "generate",
        }
    }
}

impl FromStr for FieldMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "extract" => Ok(Self::Extract),
            "generate" => Ok(Self::Generate),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for FieldMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One validated field of a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    name: String,
    field_type: FieldType,
    method: FieldMethod,
    description: String,
    required: bool,
    item_schema: Option<ItemSchema>,
}

impl FieldSpec {
    /// Unique field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared value type.
    #[must_use]
    pub const fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Resolution method.
    #[must_use]
    pub const fn method(&self) -> FieldMethod {
        self.method
    }

    /// Guidance text forwarded to the resolver.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether an empty value counts as a failure.
    #[must_use]
    pub const fn required(&self) -> bool {
        self.required
    }

    /// Record shape for `generate` fields; `None` for `extract` fields.
    #[must_use]
    pub const fn item_schema(&self) -> Option<&ItemSchema> {
        self.item_schema.as_ref()
    }

    fn from_raw(name: String, raw: RawField) -> Result<Self, SchemaError> {
        if name.trim().is_empty() {
            return Err(SchemaError::EmptyName);
        }
        let field_type = raw.field_type.parse().map_err(|value| SchemaError::UnknownType {
            field: name.clone(),
            value,
        })?;
        let method = raw.method.parse().map_err(|value| SchemaError::UnknownMethod {
            field: name.clone(),
            value,
        })?;
        if raw.description.trim().is_empty() {
            return Err(SchemaError::EmptyDescription(name));
        }

        let item_schema = match (method, raw.item_schema) {
            (FieldMethod::Extract, None) => None,
            (FieldMethod::Extract, Some(_)) => return Err(SchemaError::ItemSchemaOnExtract(name)),
            (FieldMethod::Generate, Some(explicit)) if explicit.0.is_empty() => Some(ItemSchema::Opaque),
            (FieldMethod::Generate, Some(explicit)) => {
                let mut seen = HashSet::new();
                let mut entries = Vec::with_capacity(explicit.0.len());
                for (key, value) in explicit.0 {
                    if !seen.insert(key.clone()) {
                        return Err(SchemaError::DuplicateField(format!("{name}.{key}")));
                    }
                    let item_type = value
                        .parse()
                        .map_err(|value| SchemaError::UnknownType { field: name.clone(), value })?;
                    entries.push((key, Some(item_type)));
                }
                Some(ItemSchema::Declared(entries))
            }
            (FieldMethod::Generate, None) => Some(ItemSchema::derive(&raw.description)),
        };

        Ok(Self {
            name,
            field_type,
            method,
            description: raw.description,
            required: raw.required,
            item_schema,
        })
    }
}

/// A validated, ordered field schema plus its document-level settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    name: Option<String>,
    description: Option<String>,
    scenario: Option<String>,
    config: ExtractionConfig,
    fields: Vec<FieldSpec>,
}

impl Schema {
    /// Reads and validates a schema document from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let raw = std::fs::read_to_string(path)?;
        load_schema(&raw)
    }

    /// Fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the schema declares no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// `fieldSchema.name`, if the document set one.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Document-level description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Informational scenario tag; never interpreted.
    #[must_use]
    pub fn scenario(&self) -> Option<&str> {
        self.scenario.as_deref()
    }

    /// The `config` block of the schema document.
    #[must_use]
    pub const fn config(&self) -> &ExtractionConfig {
        &self.config
    }
}

/// Parses and validates a raw schema document.
///
/// Structural problems are all reported at once; the first semantic problem
/// (duplicate name, unknown type or method, empty description) aborts the load.
///
/// # Examples
///
/// ```
/// use docfield_core::schema::{load_schema, FieldMethod};
///
/// let schema = load_schema(r#"{
///     "config": {"returnDetails": true},
///     "fieldSchema": {"fields": {
///         "ElectricityConsumption": {
///             "type": "number", "method": "extract",
///             "description": "Total electricity consumed in kWh"
///         }
///     }}
/// }"#).unwrap();
///
/// assert_eq!(schema.len(), 1);
/// assert_eq!(schema.fields()[0].method(), FieldMethod::Extract);
/// assert!(schema.config().return_details);
/// ```
pub fn load_schema(raw: &str) -> Result<Schema, SchemaError> {
    let value: Value = serde_json::from_str(raw)?;
    let violations = collect_structure_errors(&value);
    if !violations.is_empty() {
        return Err(SchemaError::Structure(violations));
    }

    // Re-read from text: duplicate keys are collapsed in a `Value` map.
    let document: RawDocument = serde_json::from_str(raw)?;

    let mut seen = HashSet::new();
    let mut fields = Vec::with_capacity(document.field_schema.fields.0.len());
    for (name, raw_field) in document.field_schema.fields.0 {
        if !seen.insert(name.clone()) {
            return Err(SchemaError::DuplicateField(name));
        }
        fields.push(FieldSpec::from_raw(name, raw_field)?);
    }

    tracing::debug!(fields = fields.len(), "Schema loaded");

    Ok(Schema {
        name: document.field_schema.name,
        description: document.description,
        scenario: document.scenario,
        config: ExtractionConfig {
            return_details: document.config.return_details,
        },
        fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn utility_bill() -> Value {
        json!({
            "description": "Utility bill analyzer",
            "scenario": "document",
            "config": {"returnDetails": true},
            "fieldSchema": {"fields": {
                "BillingPeriod": {
                    "type": "string", "method": "extract",
                    "description": "The billing period covered by the bill"
                },
                "ElectricityConsumption": {
                    "type": "number", "method": "extract",
                    "description": "Total electricity consumption in kWh"
                },
                "MultipleBillingPeriods": {
                    "type": "string", "method": "generate",
                    "description": "Every billing period on the bill as a JSON array: [{\"period\": \"DD/MM/YYYY\", \"consumption\": number}]"
                }
            }}
        })
    }

    fn load(value: &Value) -> Result<Schema, SchemaError> {
        load_schema(&value.to_string())
    }

    #[test]
    fn test_load_preserves_declaration_order() {
        let raw = r#"{"fieldSchema": {"fields": {
            "Zeta": {"type": "string", "method": "extract", "description": "z"},
            "Alpha": {"type": "number", "method": "extract", "description": "a"}
        }}}"#;
        let schema = load_schema(raw).unwrap();
        let names: Vec<&str> = schema.fields().iter().map(FieldSpec::name).collect();
        assert_eq!(names, vec!["Zeta", "Alpha"]);
        assert!(!schema.config().return_details);
    }

    #[test]
    fn test_load_utility_bill() {
        let schema = load(&utility_bill()).unwrap();
        assert_eq!(schema.len(), 3);
        assert_eq!(schema.scenario(), Some("document"));
        assert!(schema.field("BillingPeriod").unwrap().item_schema().is_none());

        let generated = schema.field("MultipleBillingPeriods").unwrap();
        assert_eq!(generated.method(), FieldMethod::Generate);
        let items = generated.item_schema().unwrap();
        assert_eq!(items.type_of("period"), Some(FieldType::Date));
        assert_eq!(items.type_of("consumption"), Some(FieldType::Number));
    }

    #[test]
    fn test_load_is_idempotent() {
        let raw = utility_bill().to_string();
        assert_eq!(load_schema(&raw).unwrap(), load_schema(&raw).unwrap());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let raw = r#"{"fieldSchema": {"fields": {
            "A": {"type": "string", "method": "extract", "description": "first"},
            "A": {"type": "string", "method": "extract", "description": "second"}
        }}}"#;
        assert!(matches!(load_schema(raw), Err(SchemaError::DuplicateField(name)) if name == "A"));
    }

    #[test]
    fn test_unknown_type_and_method_rejected() {
        let mut doc = utility_bill();
        doc["fieldSchema"]["fields"]["BillingPeriod"]["type"] = json!("currency");
        assert!(matches!(load(&doc), Err(SchemaError::UnknownType { value, .. }) if value == "currency"));

        let mut doc = utility_bill();
        doc["fieldSchema"]["fields"]["BillingPeriod"]["method"] = json!("classify");
        assert!(matches!(load(&doc), Err(SchemaError::UnknownMethod { value, .. }) if value == "classify"));
    }

    #[test]
    fn test_empty_description_and_name_rejected() {
        let mut doc = utility_bill();
        doc["fieldSchema"]["fields"]["BillingPeriod"]["description"] = json!("  ");
        assert!(matches!(load(&doc), Err(SchemaError::EmptyDescription(name)) if name == "BillingPeriod"));

        let raw = r#"{"fieldSchema": {"fields": {
            " ": {"type": "string", "method": "extract", "description": "blank"}
        }}}"#;
        assert!(matches!(load_schema(raw), Err(SchemaError::EmptyName)));
    }

    #[test]
    fn test_structure_errors_are_collected() {
        let doc = json!({"config": {"returnDetails": 1}, "fieldSchema": {}});
        let Err(SchemaError::Structure(errors)) = load(&doc) else {
            panic!("expected structure error");
        };
        assert!(errors.len() >= 2);
        assert!(errors.iter().any(|e| e.contains("returnDetails")));
        assert!(errors.iter().any(|e| e.contains("fields")));
    }

    #[test]
    fn test_not_json_rejected() {
        assert!(matches!(load_schema("{fields:"), Err(SchemaError::Json(_))));
    }

    #[test]
    fn test_explicit_item_schema_wins() {
        let mut doc = utility_bill();
        doc["fieldSchema"]["fields"]["MultipleBillingPeriods"]["itemSchema"] =
            json!({"start": "date", "end": "date", "kwh": "number"});
        let schema = load(&doc).unwrap();
        let items = schema.field("MultipleBillingPeriods").unwrap().item_schema().unwrap();
        assert_eq!(items.keys().collect::<Vec<_>>(), vec!["start", "end", "kwh"]);
        assert_eq!(items.type_of("period"), None);
    }

    #[test]
    fn test_explicit_item_schema_duplicate_keys_rejected() {
        let raw = r#"{"fieldSchema": {"fields": {
            "Periods": {"type": "string", "method": "generate", "description": "periods",
                "itemSchema": {"period": "date", "kwh": "number", "period": "string"}}
        }}}"#;
        assert!(matches!(
            load_schema(raw),
            Err(SchemaError::DuplicateField(name)) if name == "Periods.period"
        ));
    }

    #[test]
    fn test_item_schema_on_extract_rejected() {
        let mut doc = utility_bill();
        doc["fieldSchema"]["fields"]["BillingPeriod"]["itemSchema"] = json!({"a": "string"});
        assert!(matches!(load(&doc), Err(SchemaError::ItemSchemaOnExtract(_))));

        let mut doc = utility_bill();
        doc["fieldSchema"]["fields"]["MultipleBillingPeriods"]["itemSchema"] = json!({"a": "money"});
        assert!(matches!(load(&doc), Err(SchemaError::UnknownType { .. })));
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("multi_period_request.json");
        std::fs::write(&path, utility_bill().to_string()).unwrap();
        assert_eq!(Schema::from_path(&path).unwrap().len(), 3);
        assert!(matches!(
            Schema::from_path(dir.path().join("missing.json")),
            Err(SchemaError::Io(_))
        ));
    }
}
