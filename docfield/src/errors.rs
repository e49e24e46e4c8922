//! Public error types for docfield.

use thiserror::Error;

/// Errors that can occur when setting up or running extractions.
///
/// Field-level failures never show up here: they are reported inside each
/// `ExtractionResult`. This enum covers what prevents a run from starting,
/// plus I/O around batch reports.
#[derive(Debug, Error)]
pub enum Error {
    /// The schema document is invalid.
    #[error("Invalid schema: {0}")]
    Schema(#[from] docfield_core::schema::SchemaError),

    /// A document location could not be turned into a document.
    #[error("{0}")]
    Document(#[from] docfield_core::document::DocumentError),

    /// Error from the Content Understanding backend.
    #[cfg(feature = "azure")]
    #[error("Azure Content Understanding error: {0}")]
    Azure(#[from] docfield_azure::AzureError),

    /// Reading documents or writing reports failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A report could not be serialized.
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
