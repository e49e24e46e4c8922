//! # docfield
//!
//! Schema-driven field extraction from utility bills and other scanned documents.
//!
//! A JSON field schema declares what to read from a document: scalar fields
//! pulled out verbatim (`extract`) and record lists synthesised from scattered
//! content (`generate`). An [`Extractor`] sends each field to a pluggable
//! resolver, coerces the answers into typed values, and returns a partial
//! result when some fields fail.
//!
//! ## Example
//!
//! ```no_run
//! # use docfield::prelude::*;
//! # async fn example() -> Result<(), docfield::Error> {
//! docfield::logging::init_tracing();
//!
//! let schema = Schema::from_path("schemas/utility_bill.json")?;
//! let extractor = Extractor::azure(schema, &Settings::from_env()?)?;
//!
//! let report = extractor.extract_dir("utility_bills").await?;
//! report.save("analysis_results").await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `azure` (default): Enable the Azure Content Understanding resolver

#![deny(missing_docs)]

/// Shared extractor configuration.
pub mod config;

/// Public error types.
pub mod errors;

/// Schema-bound extractor with batch runs.
pub mod extractor;

/// Tracing subscriber setup.
pub mod logging;

/// Commonly used types and traits.
pub mod prelude;

/// Batch reports and summaries.
pub mod report;

pub use config::ExtractorConfig;
pub use errors::Error;
pub use extractor::Extractor;
pub use report::{BatchReport, SummaryRow, NOT_FOUND};

/// Azure Content Understanding backend.
#[cfg(feature = "azure")]
pub use docfield_azure as azure;
