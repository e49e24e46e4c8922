use docfield_core::resolver::ResolverError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AzureError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Operation location not found in response headers")]
    MissingOperationLocation,

    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Operation failed: {0}")]
    OperationFailed(String),

    #[error("Failed to parse JSON: {0}")]
    JsonParseError(String),

    #[error("Failed to read document: {0}")]
    Io(#[from] std::io::Error),
}

impl AzureError {
    /// Whether retrying the same request may succeed.
    ///
    /// Request timeouts, rate limiting, server errors, connection failures and
    /// expired polls are transient; everything else is not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Status { status, .. } => matches!(status, 408 | 429 | 500..=599),
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout(_) => true,
            _ => false,
        }
    }
}

impl From<AzureError> for ResolverError {
    fn from(error: AzureError) -> Self {
        if error.is_transient() {
            Self::Transient(error.to_string())
        } else {
            Self::Permanent(error.to_string())
        }
    }
}
