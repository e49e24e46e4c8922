//! Per-field results and assembly of the document-level result.

use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};

use super::config::ExtractionConfig;
use super::error::{FailureReason, FieldError, ItemError};
use super::metrics::RunMetrics;
use super::orchestrator::FieldPhase;
use crate::coerce::TypedValue;
use crate::resolver::{Evidence, ResolverError};
use crate::schema::Schema;

/// One generated record, keys in item-schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemRecord(Vec<(String, TypedValue)>);

impl ItemRecord {
    pub(crate) const fn new(entries: Vec<(String, TypedValue)>) -> Self {
        Self(entries)
    }

    /// Value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&TypedValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Entries in item-schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypedValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl Serialize for ItemRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// A successfully produced field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Coerced value of an `extract` field.
    Scalar(TypedValue),
    /// Validated records of a `generate` field.
    Records(Vec<ItemRecord>),
    /// Decoded array of a `generate` field with an opaque item-schema.
    Raw(Vec<serde_json::Value>),
}

impl FieldValue {
    /// The scalar, if this is one.
    #[must_use]
    pub const fn as_scalar(&self) -> Option<&TypedValue> {
        match self {
            Self::Scalar(v) => Some(v),
            _ => None,
        }
    }

    /// The records, if this is a validated record list.
    #[must_use]
    pub fn as_records(&self) -> Option<&[ItemRecord]> {
        match self {
            Self::Records(records) => Some(records),
            _ => None,
        }
    }
}

/// Terminal status of one field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldStatus {
    /// Value produced.
    Ok,
    /// No value; the reason says why.
    Failed(FailureReason),
}

/// Outcome of one field for one document. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldResult {
    name: String,
    status: FieldStatus,
    value: Option<FieldValue>,
    raw: Option<String>,
    details: Option<Evidence>,
    attempts: u32,
    item_errors: Vec<ItemError>,
}

impl FieldResult {
    pub(crate) fn ok(
        name: &str,
        value: FieldValue,
        raw: String,
        details: Option<Evidence>,
        attempts: u32,
        item_errors: Vec<ItemError>,
    ) -> Self {
        Self {
            name: name.to_string(),
            status: FieldStatus::Ok,
            value: Some(value),
            raw: Some(raw),
            details,
            attempts,
            item_errors,
        }
    }

    pub(crate) fn failed(
        name: &str,
        reason: FailureReason,
        raw: Option<String>,
        details: Option<Evidence>,
        attempts: u32,
    ) -> Self {
        Self {
            name: name.to_string(),
            status: FieldStatus::Failed(reason),
            value: None,
            raw,
            details,
            attempts,
            item_errors: Vec::new(),
        }
    }

    /// Field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Terminal status.
    #[must_use]
    pub const fn status(&self) -> &FieldStatus {
        &self.status
    }

    /// Whether the field produced a value.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self.status, FieldStatus::Ok)
    }

    /// Failure reason, if failed.
    #[must_use]
    pub const fn failure(&self) -> Option<&FailureReason> {
        match &self.status {
            FieldStatus::Ok => None,
            FieldStatus::Failed(reason) => Some(reason),
        }
    }

    /// Terminal phase of the field's state machine.
    #[must_use]
    pub const fn phase(&self) -> FieldPhase {
        match &self.status {
            FieldStatus::Ok => FieldPhase::CoercedOk,
            FieldStatus::Failed(FailureReason::Resolver(_)) => FieldPhase::ResolverFailed,
            FieldStatus::Failed(_) => FieldPhase::CoercionFailed,
        }
    }

    /// Produced value.
    #[must_use]
    pub const fn value(&self) -> Option<&FieldValue> {
        self.value.as_ref()
    }

    /// Original resolver text, kept for diagnostics.
    #[must_use]
    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    /// Resolver evidence; only kept when `returnDetails` is enabled.
    #[must_use]
    pub const fn details(&self) -> Option<&Evidence> {
        self.details.as_ref()
    }

    /// Resolver calls made for this field.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Generated elements dropped during validation.
    #[must_use]
    pub fn item_errors(&self) -> &[ItemError] {
        &self.item_errors
    }
}

impl Serialize for FieldResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("FieldResult", 6)?;
        match &self.status {
            FieldStatus::Ok => state.serialize_field("status", "ok")?,
            FieldStatus::Failed(reason) => {
                state.serialize_field("status", "failed")?;
                state.serialize_field("reason", &reason.to_string())?;
            }
        }
        state.serialize_field("value", &self.value)?;
        if let Some(raw) = &self.raw {
            state.serialize_field("raw", raw)?;
        }
        if let Some(details) = &self.details {
            state.serialize_field("details", details)?;
        }
        if !self.item_errors.is_empty() {
            state.serialize_field("itemErrors", &self.item_errors)?;
        }
        state.end()
    }
}

/// Result of one run: one entry per schema field, in schema order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    document_id: String,
    #[serde(serialize_with = "serialize_fields")]
    fields: Vec<FieldResult>,
    errors: Vec<FieldError>,
    #[serde(skip)]
    metrics: RunMetrics,
}

fn serialize_fields<S: Serializer>(fields: &[FieldResult], serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(fields.len()))?;
    for field in fields {
        map.serialize_entry(&field.name, field)?;
    }
    map.end()
}

impl ExtractionResult {
    /// Id of the processed document.
    #[must_use]
    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    /// Field results in schema order.
    #[must_use]
    pub fn fields(&self) -> &[FieldResult] {
        &self.fields
    }

    /// Field result by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldResult> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Field-level failures in schema order.
    #[must_use]
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Whether every field succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    /// Run metrics.
    #[must_use]
    pub const fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }
}

/// Collects field results in any order and emits them in schema order.
#[derive(Debug)]
pub struct ResultBuilder<'s> {
    document_id: String,
    schema: &'s Schema,
    slots: Vec<Option<FieldResult>>,
}

impl<'s> ResultBuilder<'s> {
    /// Starts a result for `document_id` with one empty slot per field.
    #[must_use]
    pub fn new(document_id: &str, schema: &'s Schema) -> Self {
        Self {
            document_id: document_id.to_string(),
            schema,
            slots: vec![None; schema.len()],
        }
    }

    /// Stores the result of the field at schema position `index`.
    pub fn record(&mut self, index: usize, result: FieldResult) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = Some(result);
        }
    }

    /// Number of slots already filled.
    #[must_use]
    pub fn recorded(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Finalizes the result.
    ///
    /// Unfilled slots become `Failed(Timeout)`. Evidence is stripped unless
    /// `config.return_details` is set. Field counts in `metrics` are
    /// overwritten from the final slots.
    #[must_use]
    pub fn finish(self, config: &ExtractionConfig, mut metrics: RunMetrics) -> ExtractionResult {
        let fields: Vec<FieldResult> = self
            .schema
            .fields()
            .iter()
            .zip(self.slots)
            .map(|(spec, slot)| {
                let mut result = slot.unwrap_or_else(|| {
                    FieldResult::failed(spec.name(), ResolverError::Timeout.into(), None, None, 0)
                });
                if !config.return_details {
                    result.details = None;
                }
                result
            })
            .collect();

        let errors: Vec<FieldError> = fields
            .iter()
            .filter_map(|f| {
                f.failure().map(|reason| FieldError {
                    field: f.name.clone(),
                    reason: reason.clone(),
                })
            })
            .collect();

        metrics.fields_failed = errors.len();
        metrics.fields_ok = fields.len() - errors.len();

        ExtractionResult {
            document_id: self.document_id,
            fields,
            errors,
            metrics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::load_schema;
    use serde_json::json;

    fn schema() -> Schema {
        load_schema(
            r#"{"fieldSchema": {"fields": {
                "BillingPeriod": {"type": "string", "method": "extract", "description": "period"},
                "ElectricityConsumption": {"type": "number", "method": "extract", "description": "kWh"}
            }}}"#,
        )
        .unwrap()
    }

    fn evidence() -> Evidence {
        Evidence {
            confidence: Some(0.93),
            source_ref: Some("page 1".to_string()),
        }
    }

    #[test]
    fn test_finish_orders_and_fills_missing_slots() {
        let schema = schema();
        let mut builder = ResultBuilder::new("bill-1", &schema);
        builder.record(
            1,
            FieldResult::ok(
                "ElectricityConsumption",
                FieldValue::Scalar(TypedValue::Number(150.5)),
                "150.5".to_string(),
                None,
                1,
                Vec::new(),
            ),
        );
        assert_eq!(builder.recorded(), 1);

        let result = builder.finish(&ExtractionConfig::default(), RunMetrics::default());
        let names: Vec<&str> = result.fields().iter().map(FieldResult::name).collect();
        assert_eq!(names, vec!["BillingPeriod", "ElectricityConsumption"]);
        assert_eq!(
            result.field("BillingPeriod").unwrap().failure(),
            Some(&FailureReason::Resolver(ResolverError::Timeout))
        );
        assert_eq!(result.errors().len(), 1);
        assert_eq!(result.metrics().fields_ok, 1);
        assert_eq!(result.metrics().fields_failed, 1);
    }

    #[test]
    fn test_details_follow_return_details() {
        let schema = schema();
        let build = |return_details: bool| {
            let mut builder = ResultBuilder::new("bill-1", &schema);
            builder.record(
                0,
                FieldResult::ok(
                    "BillingPeriod",
                    FieldValue::Scalar(TypedValue::String("Jan 2023".to_string())),
                    "Jan 2023".to_string(),
                    Some(evidence()),
                    1,
                    Vec::new(),
                ),
            );
            builder.finish(
                &ExtractionConfig::default().with_return_details(return_details),
                RunMetrics::default(),
            )
        };

        assert_eq!(build(true).fields()[0].details(), Some(&evidence()));
        assert_eq!(build(false).fields()[0].details(), None);
    }

    #[test]
    fn test_wire_shape() {
        let schema = schema();
        let mut builder = ResultBuilder::new("bill-1", &schema);
        builder.record(
            0,
            FieldResult::ok(
                "BillingPeriod",
                FieldValue::Scalar(TypedValue::String("Jan 2023".to_string())),
                " Jan 2023".to_string(),
                Some(evidence()),
                1,
                Vec::new(),
            ),
        );
        let result = builder.finish(
            &ExtractionConfig::default().with_return_details(true),
            RunMetrics::default(),
        );

        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "documentId": "bill-1",
                "fields": {
                    "BillingPeriod": {
                        "status": "ok",
                        "value": "Jan 2023",
                        "raw": " Jan 2023",
                        "details": {"confidence": 0.93, "sourceRef": "page 1"}
                    },
                    "ElectricityConsumption": {
                        "status": "failed",
                        "reason": "resolution did not finish before the deadline",
                        "value": null
                    }
                },
                "errors": [{
                    "field": "ElectricityConsumption",
                    "reason": "resolution did not finish before the deadline"
                }]
            })
        );
    }

    #[test]
    fn test_record_serializes_in_schema_order() {
        let record = ItemRecord::new(vec![
            ("period".to_string(), TypedValue::String("01/01/2023".to_string())),
            ("consumption".to_string(), TypedValue::Number(150.5)),
        ]);
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"period":"01/01/2023","consumption":150.5}"#
        );
    }
}
