//! Orchestration of per-field resolution, retries, deadlines and aggregation.

use std::fmt;
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::time::Instant;

use super::config::{EngineConfig, ExtractionConfig};
use super::error::FailureReason;
use super::generate::expand;
use super::metrics::RunMetrics;
use super::result::{ExtractionResult, FieldResult, FieldValue, ResultBuilder};
use crate::coerce::{coerce, CoercionError, TypedValue};
use crate::document::Document;
use crate::resolver::{FieldResolver, RawFieldOutput, ResolverAdapter};
use crate::schema::{FieldMethod, FieldSpec, ItemSchema, Schema};

/// States a field moves through during one run.
///
/// `Pending -> Resolving -> {CoercedOk | CoercionFailed | ResolverFailed}`.
/// Generation failures count as `CoercionFailed`: the resolver answered but
/// its text could not be turned into a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPhase {
    /// Not started.
    Pending,
    /// Waiting on the resolver (including backoff between retries).
    Resolving,
    /// Value produced.
    CoercedOk,
    /// Resolver answered, value unusable.
    CoercionFailed,
    /// Resolver failed terminally, or the deadline expired.
    ResolverFailed,
}

impl fmt::Display for FieldPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Resolving => "resolving",
            Self::CoercedOk => "coerced_ok",
            Self::CoercionFailed => "coercion_failed",
            Self::ResolverFailed => "resolver_failed",
        };
        f.write_str(name)
    }
}

/// Engine resolving every field of a schema against one document.
///
/// Fields are independent: they are resolved concurrently, a failure in one
/// never affects another, and the result always carries one entry per field.
#[derive(Debug, Clone)]
pub struct ExtractionEngine {
    resolver: ResolverAdapter,
    config: EngineConfig,
}

impl ExtractionEngine {
    /// Creates an engine with the default configuration.
    #[must_use]
    pub fn new(resolver: Arc<dyn FieldResolver>) -> Self {
        Self::with_config(resolver, EngineConfig::default())
    }

    /// Creates an engine with the given configuration.
    #[must_use]
    pub fn with_config(resolver: Arc<dyn FieldResolver>, config: EngineConfig) -> Self {
        Self {
            resolver: ResolverAdapter::new(resolver),
            config,
        }
    }

    /// Sets the number of retries on transient failures (fluent builder pattern).
    #[must_use]
    pub const fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Current configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Extracts every schema field from `document`.
    ///
    /// Honors [`EngineConfig::deadline`] when set. Never fails: field-level
    /// problems are reported inside the returned result.
    pub async fn run(
        &self,
        document: &Document,
        schema: &Schema,
        config: &ExtractionConfig,
    ) -> ExtractionResult {
        let deadline = self.config.deadline.map(|budget| Instant::now() + budget);
        self.run_inner(document, schema, config, deadline).await
    }

    /// Like [`Self::run`], with an explicit deadline.
    ///
    /// Fields still resolving when `deadline` passes are cancelled and recorded
    /// as `Failed(Timeout)`; fields that already finished are kept.
    pub async fn run_until(
        &self,
        document: &Document,
        schema: &Schema,
        config: &ExtractionConfig,
        deadline: Instant,
    ) -> ExtractionResult {
        self.run_inner(document, schema, config, Some(deadline)).await
    }

    async fn run_inner(
        &self,
        document: &Document,
        schema: &Schema,
        config: &ExtractionConfig,
        deadline: Option<Instant>,
    ) -> ExtractionResult {
        let start = Instant::now();
        tracing::info!(document = document.id(), fields = schema.len(), "Extraction started");

        let mut builder = ResultBuilder::new(document.id(), schema);
        let mut metrics = RunMetrics::default();

        let mut pending: FuturesUnordered<_> = schema
            .fields()
            .iter()
            .enumerate()
            .map(|(index, spec)| async move { (index, self.resolve_field(document, spec).await) })
            .collect();

        loop {
            let next = match deadline {
                Some(at) => {
                    if let Ok(next) = tokio::time::timeout_at(at, pending.next()).await {
                        next
                    } else {
                        tracing::warn!(
                            document = document.id(),
                            unfinished = pending.len(),
                            "Deadline expired, cancelling unfinished fields"
                        );
                        break;
                    }
                }
                None => pending.next().await,
            };
            let Some((index, result)) = next else {
                break;
            };
            metrics.total_attempts += result.attempts() as usize;
            metrics.retries += result.attempts().saturating_sub(1) as usize;
            builder.record(index, result);
        }
        // Dropping the remaining futures cancels their in-flight resolutions.
        drop(pending);
        self.resolver.release(document).await;

        metrics.wall_time = start.elapsed();
        let result = builder.finish(config, metrics);

        tracing::info!(
            document = result.document_id(),
            ok = result.metrics().fields_ok,
            failed = result.metrics().fields_failed,
            elapsed_ms = u64::try_from(result.metrics().wall_time.as_millis()).unwrap_or(u64::MAX),
            "Extraction finished"
        );
        result
    }

    async fn resolve_field(&self, document: &Document, spec: &FieldSpec) -> FieldResult {
        let field = spec.name();
        tracing::debug!(field, phase = %FieldPhase::Pending);

        let mut attempts: u32 = 0;
        let outcome = loop {
            attempts += 1;
            tracing::debug!(field, attempt = attempts, phase = %FieldPhase::Resolving);

            match self.resolver.resolve(document, spec).await {
                Ok(output) => break Ok(output),
                Err(error) if error.is_transient() && attempts <= self.config.max_retries => {
                    let delay = self.config.backoff(attempts - 1);
                    tracing::warn!(
                        field,
                        attempt = attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        %error,
                        "Transient resolver failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => break Err(error),
            }
        };

        let result = match outcome {
            Ok(output) => interpret(spec, output, attempts),
            Err(error) => FieldResult::failed(field, error.into(), None, None, attempts),
        };

        match result.failure() {
            None => tracing::debug!(field, phase = %result.phase()),
            Some(reason) => tracing::warn!(field, phase = %result.phase(), %reason, "Field failed"),
        }
        result
    }
}

/// Turns raw resolver output into a field result according to the field's method.
fn interpret(spec: &FieldSpec, output: RawFieldOutput, attempts: u32) -> FieldResult {
    let RawFieldOutput { text, evidence } = output;

    let outcome = match spec.method() {
        FieldMethod::Extract => coerce_scalar(spec, &text)
            .map(|value| (FieldValue::Scalar(value), Vec::new()))
            .map_err(FailureReason::from),
        FieldMethod::Generate => {
            let expanded = match spec.item_schema() {
                Some(item_schema) => expand(&text, item_schema),
                None => expand(&text, &ItemSchema::Opaque),
            };
            expanded
                .map(|expansion| (expansion.value, expansion.item_errors))
                .map_err(FailureReason::from)
        }
    };

    match outcome {
        Ok((value, item_errors)) => {
            if !item_errors.is_empty() {
                tracing::warn!(
                    field = spec.name(),
                    dropped = item_errors.len(),
                    "Dropped generated elements that failed validation"
                );
            }
            FieldResult::ok(spec.name(), value, text, evidence, attempts, item_errors)
        }
        Err(reason) => FieldResult::failed(spec.name(), reason, Some(text), evidence, attempts),
    }
}

fn coerce_scalar(spec: &FieldSpec, text: &str) -> Result<TypedValue, CoercionError> {
    let value = coerce(text, spec.field_type())?;
    if spec.required() && value.as_str().is_some_and(str::is_empty) {
        return Err(CoercionError::Empty);
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentSource;
    use crate::resolver::{Evidence, InMemoryResolver, ResolverError, Step};
    use crate::schema::load_schema;
    use std::time::Duration;

    fn schema(return_details: bool) -> Schema {
        load_schema(&format!(
            r#"{{
                "config": {{"returnDetails": {return_details}}},
                "fieldSchema": {{"fields": {{
                    "AccountNumber": {{"type": "string", "method": "extract", "description": "Account number", "required": true}},
                    "BillingPeriod": {{"type": "string", "method": "extract", "description": "Billing period"}},
                    "ElectricityConsumption": {{"type": "number", "method": "extract", "description": "kWh consumed"}},
                    "MultipleBillingPeriods": {{"type": "string", "method": "generate",
                        "description": "All periods as [{{\"period\": \"DD/MM/YYYY\", \"consumption\": number}}]"}}
                }}}}
            }}"#
        ))
        .unwrap()
    }

    fn bill() -> Document {
        Document::new("HKE1", DocumentSource::Url("https://example.com/HKE1.png".to_string()))
    }

    fn engine(resolver: InMemoryResolver) -> ExtractionEngine {
        ExtractionEngine::with_config(
            Arc::new(resolver),
            EngineConfig::default().with_base_backoff(Duration::from_millis(10)),
        )
    }

    fn full_resolver() -> InMemoryResolver {
        InMemoryResolver::new()
            .respond("AccountNumber", "1234-5678")
            .script(None, "BillingPeriod", [Step::scored(" 01/01/2023 - 31/01/2023 ", 0.91)])
            .respond("ElectricityConsumption", "1,234.5 kWh")
            .respond(
                "MultipleBillingPeriods",
                r#"[{"period":"01/01/2023","consumption":150.5},{"period":"2023-02-01","consumption":"145.2"}]"#,
            )
    }

    #[tokio::test]
    async fn test_run_all_fields_ok() {
        let schema = schema(false);
        let result = engine(full_resolver()).run(&bill(), &schema, schema.config()).await;

        assert!(result.is_complete());
        assert_eq!(result.document_id(), "HKE1");
        assert_eq!(
            result.field("ElectricityConsumption").unwrap().value(),
            Some(&FieldValue::Scalar(TypedValue::Number(1234.5)))
        );
        assert_eq!(
            result.field("BillingPeriod").unwrap().value().unwrap().as_scalar().unwrap().as_str(),
            Some("01/01/2023 - 31/01/2023")
        );
        let records = result.field("MultipleBillingPeriods").unwrap().value().unwrap().as_records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get("period").unwrap().to_string(), "01/02/2023");
        assert_eq!(result.field("BillingPeriod").unwrap().details(), None);
        assert_eq!(result.metrics().total_attempts, 4);
    }

    #[tokio::test]
    async fn test_run_keeps_details_when_enabled() {
        let schema = schema(true);
        let result = engine(full_resolver()).run(&bill(), &schema, schema.config()).await;
        assert_eq!(
            result.field("BillingPeriod").unwrap().details(),
            Some(&Evidence { confidence: Some(0.91), source_ref: None })
        );
    }

    #[tokio::test]
    async fn test_permanent_failure_is_isolated() {
        let schema = schema(false);
        let resolver = full_resolver().fail("BillingPeriod", ResolverError::Permanent("unreadable".into()));
        let shared = Arc::new(resolver);
        let engine = ExtractionEngine::new(shared.clone());

        let result = engine.run(&bill(), &schema, schema.config()).await;

        let failed = result.field("BillingPeriod").unwrap();
        assert_eq!(failed.phase(), FieldPhase::ResolverFailed);
        assert_eq!(shared.calls("BillingPeriod").await, 1);
        assert!(result.field("ElectricityConsumption").unwrap().is_ok());
        assert_eq!(result.errors().len(), 1);
        assert_eq!(result.errors()[0].field, "BillingPeriod");
        assert_eq!(result.fields().len(), schema.len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let schema = schema(false);
        let resolver = full_resolver().script(
            None,
            "ElectricityConsumption",
            [
                Step::error(ResolverError::Transient("429".into())),
                Step::error(ResolverError::Transient("429".into())),
                Step::text("150.5"),
            ],
        );
        let shared = Arc::new(resolver);
        let engine = ExtractionEngine::with_config(shared.clone(), EngineConfig::default());

        let result = engine.run(&bill(), &schema, schema.config()).await;

        let field = result.field("ElectricityConsumption").unwrap();
        assert!(field.is_ok());
        assert_eq!(field.attempts(), 3);
        assert_eq!(result.metrics().retries, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_bounded() {
        let schema = schema(false);
        let resolver =
            full_resolver().fail("ElectricityConsumption", ResolverError::Transient("timeout".into()));
        let shared = Arc::new(resolver);
        let engine = ExtractionEngine::new(shared.clone());

        let result = engine.run(&bill(), &schema, schema.config()).await;

        assert_eq!(shared.calls("ElectricityConsumption").await, 3);
        assert!(matches!(
            result.field("ElectricityConsumption").unwrap().failure(),
            Some(FailureReason::Resolver(ResolverError::Transient(_)))
        ));
    }

    #[tokio::test]
    async fn test_coercion_and_generation_failures() {
        let schema = schema(false);
        let resolver = full_resolver()
            .respond("AccountNumber", "   ")
            .respond("ElectricityConsumption", "n/a")
            .respond("MultipleBillingPeriods", "I could not find any periods.");

        let result = engine(resolver).run(&bill(), &schema, schema.config()).await;

        let account = result.field("AccountNumber").unwrap();
        assert_eq!(account.failure(), Some(&FailureReason::Coercion(CoercionError::Empty)));
        let consumption = result.field("ElectricityConsumption").unwrap();
        assert_eq!(consumption.phase(), FieldPhase::CoercionFailed);
        assert_eq!(consumption.raw(), Some("n/a"));
        assert!(matches!(
            result.field("MultipleBillingPeriods").unwrap().failure(),
            Some(FailureReason::Generation(_))
        ));
        assert!(result.field("BillingPeriod").unwrap().is_ok());
        assert_eq!(result.errors().len(), 3);
    }

    #[tokio::test]
    async fn test_generated_item_errors_are_kept() {
        let schema = schema(false);
        let resolver = full_resolver().respond(
            "MultipleBillingPeriods",
            r#"[{"period":"01/01/2023"},{"period":"01/02/2023","consumption":145.2}]"#,
        );
        let result = engine(resolver).run(&bill(), &schema, schema.config()).await;

        let field = result.field("MultipleBillingPeriods").unwrap();
        assert!(field.is_ok());
        assert_eq!(field.value().unwrap().as_records().unwrap().len(), 1);
        assert_eq!(field.item_errors().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_keeps_finished_fields() {
        let schema = schema(false);
        let resolver = full_resolver().script(
            None,
            "ElectricityConsumption",
            [Step::text("150.5").after(Duration::from_secs(60))],
        );
        let engine = engine(resolver);

        let deadline = Instant::now() + Duration::from_secs(5);
        let result = engine.run_until(&bill(), &schema, schema.config(), deadline).await;

        assert!(result.field("BillingPeriod").unwrap().is_ok());
        assert_eq!(
            result.field("ElectricityConsumption").unwrap().failure(),
            Some(&FailureReason::Resolver(ResolverError::Timeout))
        );
        assert_eq!(result.fields().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_configured_deadline() {
        let schema = schema(false);
        let resolver = full_resolver().script(
            None,
            "MultipleBillingPeriods",
            [Step::text("[]").after(Duration::from_secs(10))],
        );
        let engine = ExtractionEngine::with_config(
            Arc::new(resolver),
            EngineConfig::default().with_deadline(Duration::from_secs(1)),
        );

        let result = engine.run(&bill(), &schema, schema.config()).await;
        assert_eq!(
            result.field("MultipleBillingPeriods").unwrap().phase(),
            FieldPhase::ResolverFailed
        );
        assert_eq!(result.metrics().fields_ok, 3);
    }

    #[derive(Default)]
    struct Releasing {
        released: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl FieldResolver for Releasing {
        async fn resolve(
            &self,
            _document: &Document,
            request: &crate::resolver::ResolveRequest<'_>,
        ) -> Result<RawFieldOutput, ResolverError> {
            if request.field == "MultipleBillingPeriods" {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            Ok(RawFieldOutput::text("1"))
        }

        async fn release(&self, document: &Document) {
            self.released.lock().unwrap().push(document.id().to_string());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolver_released_after_run() {
        let schema = schema(false);
        let resolver = Arc::new(Releasing::default());
        let engine = ExtractionEngine::with_config(
            resolver.clone(),
            EngineConfig::default().with_deadline(Duration::from_secs(1)),
        );

        engine.run(&bill(), &schema, schema.config()).await;
        assert_eq!(*resolver.released.lock().unwrap(), ["HKE1"]);

        engine.run(&bill(), &schema, schema.config()).await;
        assert_eq!(resolver.released.lock().unwrap().len(), 2);
    }
}
