//! Analyzer definitions built from a field schema.

use docfield_core::schema::Schema;
use serde_json::{json, Map, Value};

/// Field-schema name used when the schema document does not carry one.
pub const DEFAULT_FIELD_SCHEMA_NAME: &str = "UtilityBillSchema";

/// Builds the create-analyzer request body for `schema`.
///
/// Fields keep their declaration order. Item-schemas are not sent: the
/// service only sees the natural-language description of `generate` fields.
#[must_use]
pub fn analyzer_definition(schema: &Schema) -> Value {
    let fields: Map<String, Value> = schema
        .fields()
        .iter()
        .map(|field| {
            (
                field.name().to_string(),
                json!({
                    "type": field.field_type(),
                    "method": field.method(),
                    "description": field.description(),
                }),
            )
        })
        .collect();

    json!({
        "description": schema.description().unwrap_or_default(),
        "scenario": schema.scenario().unwrap_or("document"),
        "config": { "returnDetails": schema.config().return_details },
        "fieldSchema": {
            "name": schema.name().unwrap_or(DEFAULT_FIELD_SCHEMA_NAME),
            "fields": fields,
        },
    })
}
