//! Schema-driven field extraction for scanned documents.
//!
//! A declarative [`schema::Schema`] names the fields to read from a
//! [`document::Document`]. The [`extraction::ExtractionEngine`] asks a
//! pluggable [`resolver::FieldResolver`] for each field, coerces the raw text
//! into typed values, expands generated record lists, and reports a partial
//! result whenever some fields fail.

pub mod coerce;
pub mod document;
pub mod extraction;
pub mod resolver;
pub mod schema;

mod scan;

/// Common traits and types for ergonomic usage of the extraction engine.
pub mod prelude {
    pub use crate::coerce::{coerce, CoercionError, TypedValue};
    pub use crate::document::{Document, DocumentError, DocumentSource};
    pub use crate::extraction::{
        EngineConfig, ExtractionConfig, ExtractionEngine, ExtractionResult, FailureReason,
        FieldResult, FieldValue,
    };
    pub use crate::resolver::{
        Evidence, FieldResolver, InMemoryResolver, RawFieldOutput, ResolveRequest, ResolverError,
    };
    pub use crate::schema::{load_schema, FieldMethod, FieldSpec, FieldType, ItemSchema, Schema, SchemaError};
}
