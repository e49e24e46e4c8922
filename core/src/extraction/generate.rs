//! Expansion of `generate` output into validated records.
//!
//! Generated text is model-authored and structurally unreliable. The
//! expansion is permissive about extra structure (surrounding prose, unknown
//! keys) and strict about declared structure, and it confines damage to the
//! smallest unit: a bad element is dropped, the rest of the array survives.

use serde_json::{Map, Value};

use super::error::{GenerationError, ItemError};
use super::result::{FieldValue, ItemRecord};
use crate::coerce::{coerce_json, keep_json_scalar};
use crate::scan::balanced_spans;
use crate::schema::{FieldType, ItemSchema};

/// Surviving records plus the elements that were dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Expansion {
    /// [`FieldValue::Records`] for declared item-schemas, [`FieldValue::Raw`] for opaque ones.
    pub value: FieldValue,
    /// One entry per dropped element, in array order.
    pub item_errors: Vec<ItemError>,
}

impl Expansion {
    /// Validated records; empty for opaque expansions.
    #[must_use]
    pub fn records(&self) -> &[ItemRecord] {
        self.value.as_records().unwrap_or_default()
    }
}

/// Decodes `raw` as a JSON array and validates each element against `item_schema`.
///
/// # Examples
///
/// ```
/// use docfield_core::extraction::expand;
/// use docfield_core::schema::{FieldType, ItemSchema};
///
/// let items = ItemSchema::Declared(vec![
///     ("period".into(), Some(FieldType::Date)),
///     ("consumption".into(), Some(FieldType::Number)),
/// ]);
/// let raw = r#"Here are the results: [{"period":"2023-01-01","consumption":"150.5"}]"#;
///
/// let expansion = expand(raw, &items).unwrap();
/// let record = &expansion.records()[0];
/// assert_eq!(record.get("period").unwrap().to_string(), "01/01/2023");
/// assert_eq!(record.get("consumption").unwrap().as_number(), Some(150.5));
/// ```
pub fn expand(raw: &str, item_schema: &ItemSchema) -> Result<Expansion, GenerationError> {
    let elements = parse_array(raw)?;

    let entries = match item_schema {
        ItemSchema::Opaque => {
            if elements.is_empty() {
                return Err(GenerationError::Empty { dropped: Vec::new() });
            }
            return Ok(Expansion {
                value: FieldValue::Raw(elements),
                item_errors: Vec::new(),
            });
        }
        ItemSchema::Declared(entries) => entries,
    };

    let mut records = Vec::with_capacity(elements.len());
    let mut item_errors = Vec::new();
    for (index, element) in elements.into_iter().enumerate() {
        let Value::Object(object) = element else {
            item_errors.push(ItemError::new(index, "element is not an object"));
            continue;
        };
        match validate_record(&object, entries) {
            Ok(record) => records.push(record),
            Err(reason) => item_errors.push(ItemError::new(index, reason)),
        }
    }

    if records.is_empty() {
        return Err(GenerationError::Empty { dropped: item_errors });
    }

    Ok(Expansion {
        value: FieldValue::Records(records),
        item_errors,
    })
}

/// Parses `raw` as a JSON array, falling back once to the first balanced
/// `[...]` span when the text carries prose around the array.
fn parse_array(raw: &str) -> Result<Vec<Value>, GenerationError> {
    let direct_error = match serde_json::from_str::<Value>(raw.trim()) {
        Ok(Value::Array(elements)) => return Ok(elements),
        Ok(other) => format!("expected an array, found {}", json_kind(&other)),
        Err(e) => e.to_string(),
    };

    let Some(span) = balanced_spans(raw, b'[', b']').next() else {
        return Err(GenerationError::Malformed(direct_error));
    };
    tracing::debug!(span_len = span.len(), "Recovering bracketed array from generated text");

    match serde_json::from_str::<Value>(span) {
        Ok(Value::Array(elements)) => Ok(elements),
        Ok(other) => Err(GenerationError::Malformed(format!(
            "expected an array, found {}",
            json_kind(&other)
        ))),
        Err(e) => Err(GenerationError::Malformed(e.to_string())),
    }
}

fn validate_record(
    object: &Map<String, Value>,
    entries: &[(String, Option<FieldType>)],
) -> Result<ItemRecord, String> {
    let mut values = Vec::with_capacity(entries.len());
    for (key, field_type) in entries {
        let value = match object.get(key) {
            None | Some(Value::Null) => return Err(format!("missing key '{key}'")),
            Some(value) => value,
        };
        let typed = match field_type {
            Some(field_type) => coerce_json(value, *field_type),
            None => keep_json_scalar(value),
        }
        .map_err(|e| format!("key '{key}': {e}"))?;
        values.push((key.clone(), typed));
    }
    Ok(ItemRecord::new(values))
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
