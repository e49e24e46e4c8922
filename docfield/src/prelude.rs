//! Common imports for docfield usage.
//!
//! ```
//! use docfield::prelude::*;
//! ```
//!
//! This module re-exports the types needed for typical runs: loading a
//! schema, building documents, plugging in a resolver, and reading results.

// Facade types (always available)
pub use crate::config::ExtractorConfig;
pub use crate::errors::Error;
pub use crate::extractor::Extractor;
pub use crate::report::{BatchReport, SummaryRow};

// Core types
pub use docfield_core::prelude::*;

// Azure backend (feature-gated)
#[cfg(feature = "azure")]
pub use docfield_azure::{AnalyzerResolver, Settings};
