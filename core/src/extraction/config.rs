//! Configuration for result shaping and engine retry/deadline behavior.

use std::time::Duration;

/// Per-schema output settings, read from the schema document's `config` block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionConfig {
    /// Keep resolver evidence (confidence, source reference) on each field.
    pub return_details: bool,
}

impl ExtractionConfig {
    /// Set whether resolver evidence is kept in results.
    #[must_use]
    pub const fn with_return_details(mut self, enabled: bool) -> Self {
        self.return_details = enabled;
        self
    }
}

/// Configuration for engine retry and cancellation behavior.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Retries after a transient resolver failure (default: 2).
    pub max_retries: u32,
    /// Delay before the first retry; doubled for every further retry (default: 200 ms).
    pub base_backoff: Duration,
    /// Budget for a whole run, measured from its start (default: none).
    pub deadline: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_backoff: Duration::from_millis(200),
            deadline: None,
        }
    }
}

impl EngineConfig {
    /// Set the number of retries on transient failures.
    #[must_use]
    pub const fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the delay before the first retry.
    #[must_use]
    pub const fn with_base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    /// Set the run deadline.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Delay before retry number `retry` (0-based): `base_backoff << retry`.
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        self.base_backoff.saturating_mul(1u32 << retry.min(16))
    }
}
