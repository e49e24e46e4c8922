//! Configuration for the high-level extractor.

use docfield_core::extraction::EngineConfig;

/// Configuration shared by every run of an [`crate::Extractor`].
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Retry and deadline behavior of each document run.
    pub engine: EngineConfig,

    /// Documents processed at the same time by directory runs.
    ///
    /// Default: 4
    pub batch_concurrency: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            batch_concurrency: 4,
        }
    }
}

impl ExtractorConfig {
    /// Create a new `ExtractorConfig` with default settings.
    ///
    /// Equivalent to `ExtractorConfig::default()`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the engine configuration.
    #[must_use]
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Set the batch concurrency; values below 1 are raised to 1.
    #[must_use]
    pub fn with_batch_concurrency(mut self, concurrency: usize) -> Self {
        self.batch_concurrency = concurrency.max(1);
        self
    }
}
