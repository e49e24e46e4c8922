//! Boundary to the external capability that actually reads documents.
//!
//! The engine never recognizes content itself. For every field it hands the
//! document and a [`ResolveHint`] built from the field spec to a
//! [`FieldResolver`] and gets raw text back. How the resolver works (pattern
//! rules, model inference, a manual review queue) is none of the engine's
//! business.

mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::document::Document;
use crate::schema::{FieldMethod, FieldSpec, FieldType, ItemSchema};

pub use memory::{InMemoryResolver, Step};

/// Classified failure of a single resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolverError {
    /// Timeouts, rate limits and similar; eligible for retry.
    #[error("transient resolver failure: {0}")]
    Transient(String),

    /// Unreadable document, rejected schema and similar; never retried.
    #[error("permanent resolver failure: {0}")]
    Permanent(String),

    /// The run deadline expired before the field resolved.
    #[error("resolution did not finish before the deadline")]
    Timeout,
}

impl ResolverError {
    /// Whether the engine may try again.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Auxiliary evidence a resolver may attach to its output.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    /// Resolver confidence in `[0, 1]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Page or span reference into the source document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<String>,
}

/// Uninterpreted resolver output for one field.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFieldOutput {
    /// Raw text as produced by the resolver.
    pub text: String,
    /// Optional evidence.
    pub evidence: Option<Evidence>,
}

impl RawFieldOutput {
    /// Output without evidence.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            evidence: None,
        }
    }

    /// Attaches evidence.
    #[must_use]
    pub fn with_evidence(mut self, evidence: Evidence) -> Self {
        self.evidence = Some(evidence);
        self
    }
}

/// Guidance forwarded verbatim from the field spec.
#[derive(Debug, Clone, Copy)]
pub struct ResolveHint<'a> {
    /// Expected value type.
    pub field_type: FieldType,
    /// Extract one scalar or generate a record array.
    pub method: FieldMethod,
    /// Natural-language contract for the field.
    pub description: &'a str,
    /// Record shape for generate fields.
    pub item_schema: Option<&'a ItemSchema>,
}

/// One resolution request.
#[derive(Debug, Clone, Copy)]
pub struct ResolveRequest<'a> {
    /// Field name as declared in the schema.
    pub field: &'a str,
    /// Guidance for the resolver.
    pub hint: ResolveHint<'a>,
}

impl<'a> ResolveRequest<'a> {
    /// Builds the request for `spec`.
    #[must_use]
    pub fn for_field(spec: &'a FieldSpec) -> Self {
        Self {
            field: spec.name(),
            hint: ResolveHint {
                field_type: spec.field_type(),
                method: spec.method(),
                description: spec.description(),
                item_schema: spec.item_schema(),
            },
        }
    }
}

/// External capability that reads one field out of a document.
#[async_trait]
pub trait FieldResolver: Send + Sync {
    /// Resolves one field. Implementations must be safe to call concurrently
    /// for different fields of the same document.
    async fn resolve(
        &self,
        document: &Document,
        request: &ResolveRequest<'_>,
    ) -> Result<RawFieldOutput, ResolverError>;

    /// Called once the engine has finished with `document`, deadline or not.
    /// Resolvers holding per-document state drop it here.
    async fn release(&self, _document: &Document) {}
}

/// Thin pass-through used by the engine: builds the hint, forwards the call,
/// never looks at the text.
#[derive(Clone)]
pub struct ResolverAdapter {
    inner: Arc<dyn FieldResolver>,
}

impl ResolverAdapter {
    /// Wraps a resolver.
    #[must_use]
    pub fn new(inner: Arc<dyn FieldResolver>) -> Self {
        Self { inner }
    }

    /// Issues one resolution request for `field`.
    pub async fn resolve(
        &self,
        document: &Document,
        field: &FieldSpec,
    ) -> Result<RawFieldOutput, ResolverError> {
        let request = ResolveRequest::for_field(field);
        tracing::trace!(
            document = document.id(),
            field = request.field,
            method = %request.hint.method,
            "Resolving field"
        );
        self.inner.resolve(document, &request).await
    }

    /// Tells the resolver the run over `document` is over.
    pub async fn release(&self, document: &Document) {
        self.inner.release(document).await;
    }
}

impl std::fmt::Debug for ResolverAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverAdapter").finish_non_exhaustive()
    }
}
