//! Error types for field- and element-level extraction failures.

use serde::Serialize;
use thiserror::Error;

use crate::coerce::CoercionError;
use crate::resolver::ResolverError;

/// A generated array element that was dropped, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemError {
    /// Position of the element in the generated array (0-based).
    pub index: usize,
    /// Why the element was dropped.
    pub reason: String,
}

impl ItemError {
    pub(crate) fn new(index: usize, reason: impl Into<String>) -> Self {
        Self {
            index,
            reason: reason.into(),
        }
    }
}

/// Errors that fail a whole `generate` field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// No JSON array could be recovered from the resolver text.
    #[error("generated output is not a JSON array: {0}")]
    Malformed(String),

    /// The array decoded but no element survived validation.
    #[error("generated output has no usable elements ({} dropped)", .dropped.len())]
    Empty {
        /// Elements that were dropped, if any.
        dropped: Vec<ItemError>,
    },
}

/// Why a field ended up `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    /// The resolver failed or the deadline expired.
    #[error(transparent)]
    Resolver(#[from] ResolverError),

    /// The extracted scalar did not coerce to the declared type.
    #[error(transparent)]
    Coercion(#[from] CoercionError),

    /// The generated array could not be used.
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Entry of [`super::ExtractionResult::errors`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Failed field.
    pub field: String,
    /// Failure, rendered as text on the wire.
    #[serde(serialize_with = "serialize_display")]
    pub reason: FailureReason,
}

fn serialize_display<S: serde::Serializer>(
    reason: &FailureReason,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(reason)
}
