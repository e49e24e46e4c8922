//! Scripted in-memory resolver.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{Evidence, FieldResolver, RawFieldOutput, ResolveRequest, ResolverError};
use crate::document::Document;

/// One scripted answer, optionally delayed.
#[derive(Debug, Clone)]
pub struct Step {
    outcome: Result<RawFieldOutput, ResolverError>,
    latency: Duration,
}

impl Step {
    /// Answers with `text`.
    pub fn text(text: impl Into<String>) -> Self {
        Self::output(RawFieldOutput::text(text))
    }

    /// Answers with `text` and a confidence score.
    pub fn scored(text: impl Into<String>, confidence: f64) -> Self {
        Self::output(RawFieldOutput::text(text).with_evidence(Evidence {
            confidence: Some(confidence),
            source_ref: None,
        }))
    }

    /// Answers with a full output.
    #[must_use]
    pub const fn output(output: RawFieldOutput) -> Self {
        Self {
            outcome: Ok(output),
            latency: Duration::ZERO,
        }
    }

    /// Fails with `error`.
    #[must_use]
    pub const fn error(error: ResolverError) -> Self {
        Self {
            outcome: Err(error),
            latency: Duration::ZERO,
        }
    }

    /// Delays the answer by `latency`.
    #[must_use]
    pub const fn after(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

type ScriptKey = (Option<String>, String);

/// A [`FieldResolver`] that replays scripted answers.
///
/// Each (document, field) pair owns a queue of [`Step`]s. Calls pop the queue
/// front; the last step repeats forever. Scripts registered without a
/// document id apply to every document lacking a more specific script.
#[derive(Debug, Default)]
pub struct InMemoryResolver {
    scripts: Mutex<HashMap<ScriptKey, VecDeque<Step>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl InMemoryResolver {
    /// Creates a resolver with no scripts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers `field` with `text` for every document.
    #[must_use]
    pub fn respond(self, field: &str, text: impl Into<String>) -> Self {
        self.script(None, field, [Step::text(text)])
    }

    /// Fails `field` with `error` for every document.
    #[must_use]
    pub fn fail(self, field: &str, error: ResolverError) -> Self {
        self.script(None, field, [Step::error(error)])
    }

    /// Registers a sequence of answers for `field`, optionally limited to one
    /// document id.
    #[must_use]
    pub fn script(
        mut self,
        document: Option<&str>,
        field: &str,
        steps: impl IntoIterator<Item = Step>,
    ) -> Self {
        self.scripts
            .get_mut()
            .insert((document.map(str::to_string), field.to_string()), steps.into_iter().collect());
        self
    }

    /// Number of resolve calls received for `field` across all documents.
    pub async fn calls(&self, field: &str) -> usize {
        self.calls.lock().await.get(field).copied().unwrap_or(0)
    }

    async fn next_step(&self, document: &str, field: &str) -> Option<Step> {
        let mut scripts = self.scripts.lock().await;
        let specific = (Some(document.to_string()), field.to_string());
        let key = if scripts.contains_key(&specific) {
            specific
        } else {
            (None, field.to_string())
        };
        let queue = scripts.get_mut(&key)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl FieldResolver for InMemoryResolver {
    async fn resolve(
        &self,
        document: &Document,
        request: &ResolveRequest<'_>,
    ) -> Result<RawFieldOutput, ResolverError> {
        *self.calls.lock().await.entry(request.field.to_string()).or_default() += 1;

        let step = self.next_step(document.id(), request.field).await.ok_or_else(|| {
            ResolverError::Permanent(format!("no scripted output for field '{}'", request.field))
        })?;

        if !step.latency.is_zero() {
            tokio::time::sleep(step.latency).await;
        }
        step.outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldMethod, FieldType};
    use crate::resolver::ResolveHint;
    use crate::document::DocumentSource;

    fn request(field: &str) -> ResolveRequest<'_> {
        ResolveRequest {
            field,
            hint: ResolveHint {
                field_type: FieldType::String,
                method: FieldMethod::Extract,
                description: "test",
                item_schema: None,
            },
        }
    }

    fn doc(id: &str) -> Document {
        Document::new(id, DocumentSource::Bytes(Vec::new()))
    }

    #[tokio::test]
    async fn test_last_step_repeats() {
        let resolver = InMemoryResolver::new().script(
            None,
            "A",
            [Step::error(ResolverError::Transient("busy".into())), Step::text("ok")],
        );
        let d = doc("bill");

        assert!(resolver.resolve(&d, &request("A")).await.is_err());
        assert_eq!(resolver.resolve(&d, &request("A")).await.unwrap().text, "ok");
        assert_eq!(resolver.resolve(&d, &request("A")).await.unwrap().text, "ok");
        assert_eq!(resolver.calls("A").await, 3);
    }

    #[tokio::test]
    async fn test_document_specific_script_wins() {
        let resolver = InMemoryResolver::new()
            .respond("A", "generic")
            .script(Some("special"), "A", [Step::text("specific")]);

        assert_eq!(resolver.resolve(&doc("special"), &request("A")).await.unwrap().text, "specific");
        assert_eq!(resolver.resolve(&doc("other"), &request("A")).await.unwrap().text, "generic");
    }

    #[tokio::test]
    async fn test_unscripted_field_is_permanent() {
        let resolver = InMemoryResolver::new();
        let err = resolver.resolve(&doc("bill"), &request("Missing")).await.unwrap_err();
        assert!(matches!(err, ResolverError::Permanent(_)));
    }
}
