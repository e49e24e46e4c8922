//! [`FieldResolver`] backed by a Content Understanding analyzer.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use docfield_core::document::{Document, DocumentSource};
use docfield_core::resolver::{Evidence, FieldResolver, RawFieldOutput, ResolveRequest, ResolverError};
use docfield_core::schema::Schema;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, OnceCell};

use crate::analyzer::analyzer_definition;
use crate::client::ContentUnderstandingClient;
use crate::error::AzureError;
use crate::settings::Settings;

type AnalysisCell = Arc<OnceCell<Arc<Value>>>;

/// Resolves fields by analyzing each document once and reading the
/// requested field out of the analysis result.
///
/// The service extracts all fields of a document in one analysis, so
/// concurrent requests for fields of the same document share a single
/// analysis. Analyses are keyed by document source, not id, and dropped when
/// the engine releases the document. Failed analyses are not cached: a
/// retried field analyzes again.
#[derive(Debug)]
pub struct AnalyzerResolver {
    client: ContentUnderstandingClient,
    analyzer_id: String,
    analyses: Mutex<HashMap<DocumentSource, AnalysisCell>>,
}

impl AnalyzerResolver {
    /// Resolver using an existing analyzer.
    #[must_use]
    pub fn new(client: ContentUnderstandingClient, analyzer_id: impl Into<String>) -> Self {
        Self {
            client,
            analyzer_id: analyzer_id.into(),
            analyses: Mutex::new(HashMap::new()),
        }
    }

    /// Builds a client from `settings` and targets `settings.analyzer_id`.
    pub fn from_settings(settings: &Settings) -> Result<Self, AzureError> {
        Ok(Self::new(ContentUnderstandingClient::new(settings)?, settings.analyzer_id.clone()))
    }

    /// Recreates the analyzer from `schema`, then returns a resolver using it.
    pub async fn provision(settings: &Settings, schema: &Schema) -> Result<Self, AzureError> {
        let resolver = Self::from_settings(settings)?;
        let ready = resolver
            .client
            .recreate_analyzer(&resolver.analyzer_id, &analyzer_definition(schema))
            .await?;
        let status = ready
            .get("status")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unknown");
        tracing::info!(analyzer = %resolver.analyzer_id, status, "Analyzer provisioned");
        Ok(resolver)
    }

    /// Analyzer id in use.
    #[must_use]
    pub fn analyzer_id(&self) -> &str {
        &self.analyzer_id
    }

    async fn analysis(&self, document: &Document) -> Result<Arc<Value>, ResolverError> {
        let cell = {
            let mut analyses = self.analyses.lock().await;
            analyses.entry(document.source().clone()).or_default().clone()
        };

        cell.get_or_try_init(|| async {
            tracing::info!(document = document.id(), analyzer = %self.analyzer_id, "Analyzing document");
            self.client
                .analyze(&self.analyzer_id, document.source())
                .await
                .map(Arc::new)
                .map_err(ResolverError::from)
        })
        .await
        .cloned()
    }

    /// Number of analyses currently held.
    pub async fn cached(&self) -> usize {
        self.analyses.lock().await.len()
    }
}

#[async_trait]
impl FieldResolver for AnalyzerResolver {
    async fn resolve(
        &self,
        document: &Document,
        request: &ResolveRequest<'_>,
    ) -> Result<RawFieldOutput, ResolverError> {
        let analysis = self.analysis(document).await?;
        field_output_from_analysis(&analysis, request.field)
    }

    async fn release(&self, document: &Document) {
        if self.analyses.lock().await.remove(document.source()).is_some() {
            tracing::debug!(document = document.id(), "Dropped cached analysis");
        }
    }
}

/// Reads `field` out of an analysis result as raw text plus evidence.
///
/// Scalars render as plain text (`valueString`, `valueNumber`, `valueDate`,
/// `valueBoolean`); `valueArray` renders as a JSON array whose `valueObject`
/// elements are flattened to plain objects.
pub fn field_output_from_analysis(analysis: &Value, field: &str) -> Result<RawFieldOutput, ResolverError> {
    let fields = analysis
        .pointer("/result/contents/0/fields")
        .and_then(Value::as_object)
        .ok_or_else(|| ResolverError::Permanent("analysis result has no extracted fields".to_string()))?;

    let entry = fields
        .get(field)
        .ok_or_else(|| ResolverError::Permanent(format!("field '{field}' not found in analysis result")))?;

    let text = match plain_value(entry) {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => {
            return Err(ResolverError::Permanent(format!("field '{field}' has no value")));
        }
        Some(other) => other.to_string(),
    };

    let confidence = entry.get("confidence").and_then(Value::as_f64);
    let source_ref = entry.get("source").and_then(Value::as_str).map(str::to_string);
    let output = RawFieldOutput::text(text);
    Ok(if confidence.is_some() || source_ref.is_some() {
        output.with_evidence(Evidence { confidence, source_ref })
    } else {
        output
    })
}

/// Strips the service's typed wrapper (`{"type": .., "valueX": ..}`) off a field value.
fn plain_value(entry: &Value) -> Option<Value> {
    const SCALARS: [&str; 6] = [
        "valueString",
        "valueNumber",
        "valueInteger",
        "valueDate",
        "valueTime",
        "valueBoolean",
    ];

    if let Some(value) = SCALARS.iter().find_map(|key| entry.get(*key)) {
        return Some(value.clone());
    }
    if let Some(items) = entry.get("valueArray").and_then(Value::as_array) {
        return Some(Value::Array(items.iter().filter_map(plain_value).collect()));
    }
    if let Some(object) = entry.get("valueObject").and_then(Value::as_object) {
        let flattened: Map<String, Value> = object
            .iter()
            .map(|(key, value)| (key.clone(), plain_value(value).unwrap_or(Value::Null)))
            .collect();
        return Some(Value::Object(flattened));
    }
    entry.get("content").cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn analysis() -> Value {
        json!({
            "status": "Succeeded",
            "result": {"contents": [{
                "markdown": "...",
                "fields": {
                    "BillingPeriod": {
                        "type": "string",
                        "valueString": "01/01/2023 - 31/01/2023",
                        "confidence": 0.91,
                        "source": "D(1,0.5,0.6,2.1,0.6,2.1,0.8,0.5,0.8)"
                    },
                    "ElectricityConsumption": {"type": "number", "valueNumber": 295.7},
                    "BillingData": {
                        "type": "array",
                        "valueArray": [
                            {"type": "object", "valueObject": {
                                "BillingPeriod": {"type": "string", "valueString": "01/01/2023"},
                                "ElectricityConsumption": {"type": "number", "valueNumber": 150.5}
                            }},
                            {"type": "object", "valueObject": {
                                "BillingPeriod": {"type": "string", "valueString": "01/02/2023"},
                                "ElectricityConsumption": {"type": "number", "valueNumber": 145.2}
                            }}
                        ]
                    },
                    "Empty": {"type": "string"}
                }
            }]}
        })
    }

    #[test]
    fn test_scalar_with_evidence() {
        let output = field_output_from_analysis(&analysis(), "BillingPeriod").unwrap();
        assert_eq!(output.text, "01/01/2023 - 31/01/2023");
        let evidence = output.evidence.unwrap();
        assert_eq!(evidence.confidence, Some(0.91));
        assert!(evidence.source_ref.unwrap().starts_with("D(1,"));
    }

    #[test]
    fn test_number_renders_as_text() {
        let output = field_output_from_analysis(&analysis(), "ElectricityConsumption").unwrap();
        assert_eq!(output.text, "295.7");
        assert!(output.evidence.is_none());
    }

    #[test]
    fn test_array_of_objects_flattens() {
        let output = field_output_from_analysis(&analysis(), "BillingData").unwrap();
        let decoded: Value = serde_json::from_str(&output.text).unwrap();
        assert_eq!(
            decoded,
            json!([
                {"BillingPeriod": "01/01/2023", "ElectricityConsumption": 150.5},
                {"BillingPeriod": "01/02/2023", "ElectricityConsumption": 145.2}
            ])
        );
    }

    #[test]
    fn test_missing_values_are_permanent() {
        for field in ["Empty", "Absent"] {
            assert!(matches!(
                field_output_from_analysis(&analysis(), field),
                Err(ResolverError::Permanent(_))
            ));
        }
        assert!(matches!(
            field_output_from_analysis(&json!({"status": "Succeeded"}), "BillingPeriod"),
            Err(ResolverError::Permanent(_))
        ));
    }
}
