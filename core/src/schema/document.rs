//! Wire shape of the schema document and its structural validation.

use std::fmt;
use std::marker::PhantomData;
use std::sync::LazyLock;

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::{json, Value};

/// JSON Schema every schema document must satisfy before typed validation.
///
/// Enumerated values (`type`, `method`) and non-empty descriptions are checked
/// by the typed pass so they surface as dedicated [`super::SchemaError`]s.
static DOCUMENT_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "type": "object",
        "required": ["fieldSchema"],
        "properties": {
            "description": {"type": "string"},
            "scenario": {"type": "string"},
            "config": {
                "type": "object",
                "properties": {"returnDetails": {"type": "boolean"}}
            },
            "fieldSchema": {
                "type": "object",
                "required": ["fields"],
                "properties": {
                    "name": {"type": "string"},
                    "description": {"type": "string"},
                    "fields": {
                        "type": "object",
                        "additionalProperties": {
                            "type": "object",
                            "required": ["type", "method", "description"],
                            "properties": {
                                "type": {"type": "string"},
                                "method": {"type": "string"},
                                "description": {"type": "string"},
                                "required": {"type": "boolean"},
                                "itemSchema": {
                                    "type": "object",
                                    "additionalProperties": {"type": "string"}
                                }
                            }
                        }
                    }
                }
            }
        }
    })
});

/// Collects every structural violation in `instance`, each prefixed with its
/// instance path.
pub(crate) fn collect_structure_errors(instance: &Value) -> Vec<String> {
    match jsonschema::Validator::new(&DOCUMENT_SCHEMA) {
        Ok(validator) => validator
            .iter_errors(instance)
            .map(|error| format!("At path '{}': {}", error.instance_path, error))
            .collect(),
        Err(e) => vec![format!("Schema compilation error: {e}")],
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawDocument {
    pub description: Option<String>,
    pub scenario: Option<String>,
    #[serde(default)]
    pub config: RawConfig,
    pub field_schema: RawFieldSchema,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawConfig {
    #[serde(default)]
    pub return_details: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawFieldSchema {
    pub name: Option<String>,
    pub fields: Ordered<RawField>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawField {
    #[serde(rename = "type")]
    pub field_type: String,
    pub method: String,
    pub description: String,
    #[serde(default)]
    pub required: bool,
    pub item_schema: Option<Ordered<String>>,
}

/// A JSON object read as a sequence, keeping declaration order and
/// duplicate keys so the typed pass can reject them.
#[derive(Debug)]
pub(crate) struct Ordered<T>(pub Vec<(String, T)>);

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Ordered<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for OrderedVisitor<T> {
            type Value = Ordered<T>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, T>()? {
                    entries.push((key, value));
                }
                Ok(Ordered(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }
}
