//! Batch reports: per-document results plus a flat summary.

use std::path::{Path, PathBuf};

use docfield_core::extraction::{ExtractionResult, FieldValue};
use docfield_core::schema::{FieldMethod, Schema};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::errors::Error;

/// Placeholder written for fields without a value.
pub const NOT_FOUND: &str = "Not found";

/// File name of the summary written by [`BatchReport::save`].
pub const SUMMARY_FILE: &str = "analysis_summary.json";

/// One summary line: a document id and its scalar field values as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRow {
    /// Document id.
    pub document_id: String,
    /// `(field, value)` for every `extract` field, in schema order.
    pub values: Vec<(String, String)>,
}

impl SummaryRow {
    /// Summarizes `result` against the `extract` fields of `schema`.
    #[must_use]
    pub fn from_result(result: &ExtractionResult, schema: &Schema) -> Self {
        let values = schema
            .fields()
            .iter()
            .filter(|spec| spec.method() == FieldMethod::Extract)
            .map(|spec| {
                let value = result
                    .field(spec.name())
                    .and_then(|field| field.value())
                    .and_then(FieldValue::as_scalar)
                    .map_or_else(|| NOT_FOUND.to_string(), ToString::to_string);
                (spec.name().to_string(), value)
            })
            .collect();

        Self {
            document_id: result.document_id().to_string(),
            values,
        }
    }

    /// Value of `field`.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value.as_str())
    }
}

impl Serialize for SummaryRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len() + 1))?;
        map.serialize_entry("documentId", &self.document_id)?;
        for (field, value) in &self.values {
            map.serialize_entry(field, value)?;
        }
        map.end()
    }
}

/// Outcome of a batch run, in input order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    /// One result per input document.
    pub results: Vec<ExtractionResult>,
    /// One summary row per input document.
    pub summary: Vec<SummaryRow>,
}

impl BatchReport {
    /// Documents whose every field succeeded.
    #[must_use]
    pub fn complete(&self) -> usize {
        self.results.iter().filter(|r| r.is_complete()).count()
    }

    /// Writes `<document id>_analysis.json` for every result and
    /// [`SUMMARY_FILE`] into `dir`, creating it if needed. Returns the summary path.
    pub async fn save(&self, dir: impl AsRef<Path>) -> Result<PathBuf, Error> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;

        for result in &self.results {
            let path = dir.join(format!("{}_analysis.json", result.document_id()));
            tokio::fs::write(&path, serde_json::to_vec_pretty(result)?).await?;
        }

        let summary_path = dir.join(SUMMARY_FILE);
        tokio::fs::write(&summary_path, serde_json::to_vec_pretty(&self.summary)?).await?;
        tracing::info!(path = %summary_path.display(), documents = self.results.len(), "Saved batch report");
        Ok(summary_path)
    }
}
