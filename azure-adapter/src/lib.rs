//! Azure Content Understanding backend for docfield.
//!
//! This crate provides analyzer management, document analysis with
//! operation polling, and an [`AnalyzerResolver`] implementing the core
//! `FieldResolver` trait on top of them.

/// Analyzer definitions derived from a field schema.
pub mod analyzer;
/// REST client for analyzers and analyses.
pub mod client;
/// Error types returned by adapter operations.
pub mod error;
/// Field resolution over analysis results.
pub mod resolver;
/// Endpoint, credential and polling settings.
pub mod settings;

pub use analyzer::{analyzer_definition, DEFAULT_FIELD_SCHEMA_NAME};
pub use client::ContentUnderstandingClient;
pub use error::AzureError;
pub use resolver::{field_output_from_analysis, AnalyzerResolver};
pub use settings::{Credential, Settings, DEFAULT_API_VERSION};
