//! Per-document extraction: resolution, coercion, generation and aggregation.
//!
//! - [`ExtractionEngine`] - Resolves every field concurrently with retries and a deadline
//! - [`expand`] - Decodes and validates `generate` output
//! - [`ExtractionResult`] - One [`FieldResult`] per schema field, in schema order
//! - [`EngineConfig`] / [`ExtractionConfig`] - Engine and schema-level settings
//! - [`RunMetrics`] - Attempt and timing counters

pub mod config;
pub mod error;
pub mod generate;
pub mod metrics;
pub mod orchestrator;
pub mod result;

pub use config::{EngineConfig, ExtractionConfig};
pub use error::{FailureReason, FieldError, GenerationError, ItemError};
pub use generate::{expand, Expansion};
pub use metrics::RunMetrics;
pub use orchestrator::{ExtractionEngine, FieldPhase};
pub use result::{ExtractionResult, FieldResult, FieldStatus, FieldValue, ItemRecord, ResultBuilder};
