//! High-level extractor binding a schema to a resolver.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use docfield_core::document::{Document, DocumentSource};
use docfield_core::extraction::{ExtractionEngine, ExtractionResult};
use docfield_core::resolver::FieldResolver;
use docfield_core::schema::Schema;
use futures::stream::{self, StreamExt};

use crate::config::ExtractorConfig;
use crate::errors::Error;
use crate::report::{BatchReport, SummaryRow};

/// Runs one schema against any number of documents.
///
/// # Example
///
/// ```
/// # use std::sync::Arc;
/// # use docfield::prelude::*;
/// # async fn example() -> Result<(), docfield::Error> {
/// let schema = load_schema(r#"{"fieldSchema": {"fields": {
///     "ElectricityConsumption": {"type": "number", "method": "extract", "description": "kWh"}
/// }}}"#)?;
/// let resolver = InMemoryResolver::new().respond("ElectricityConsumption", "150.5 kWh");
/// let extractor = Extractor::new(schema, Arc::new(resolver));
///
/// let result = extractor.extract(&Document::from_bytes(b"bill".to_vec())).await;
/// assert!(result.is_complete());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Extractor {
    schema: Arc<Schema>,
    engine: ExtractionEngine,
    config: ExtractorConfig,
}

impl Extractor {
    /// Creates an extractor with the default configuration.
    #[must_use]
    pub fn new(schema: Schema, resolver: Arc<dyn FieldResolver>) -> Self {
        Self::with_config(schema, resolver, ExtractorConfig::default())
    }

    /// Creates an extractor with `config`.
    #[must_use]
    pub fn with_config(
        schema: Schema,
        resolver: Arc<dyn FieldResolver>,
        config: ExtractorConfig,
    ) -> Self {
        Self {
            schema: Arc::new(schema),
            engine: ExtractionEngine::with_config(resolver, config.engine.clone()),
            config,
        }
    }

    /// Loads the schema document at `path`.
    pub fn from_schema_path(
        path: impl AsRef<Path>,
        resolver: Arc<dyn FieldResolver>,
    ) -> Result<Self, Error> {
        Ok(Self::new(Schema::from_path(path)?, resolver))
    }

    /// Extractor backed by an existing Content Understanding analyzer.
    #[cfg(feature = "azure")]
    pub fn azure(schema: Schema, settings: &docfield_azure::Settings) -> Result<Self, Error> {
        let resolver = docfield_azure::AnalyzerResolver::from_settings(settings)?;
        Ok(Self::new(schema, Arc::new(resolver)))
    }

    /// Recreates the Content Understanding analyzer from `schema` first.
    #[cfg(feature = "azure")]
    pub async fn provision_azure(
        schema: Schema,
        settings: &docfield_azure::Settings,
    ) -> Result<Self, Error> {
        let resolver = docfield_azure::AnalyzerResolver::provision(settings, &schema).await?;
        Ok(Self::new(schema, Arc::new(resolver)))
    }

    /// Schema in use.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Current configuration.
    #[must_use]
    pub const fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extracts every schema field from `document`.
    pub async fn extract(&self, document: &Document) -> ExtractionResult {
        self.engine
            .run(document, &self.schema, self.schema.config())
            .await
    }

    /// Extracts from a file path or http(s) URL.
    pub async fn extract_location(&self, location: &str) -> Result<ExtractionResult, Error> {
        let document = Document::from_location(location)?;
        Ok(self.extract(&document).await)
    }

    /// Extracts from `documents`, at most `concurrency` at a time.
    ///
    /// Results and summary rows follow input order regardless of which
    /// document finishes first.
    pub async fn extract_batch(&self, documents: Vec<Document>, concurrency: usize) -> BatchReport {
        let total = documents.len();
        tracing::info!(documents = total, concurrency, "Batch started");

        let mut indexed: Vec<(usize, ExtractionResult)> = stream::iter(documents.into_iter().enumerate())
            .map(|(index, document)| async move { (index, self.extract(&document).await) })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;
        indexed.sort_by_key(|(index, _)| *index);

        let results: Vec<ExtractionResult> = indexed.into_iter().map(|(_, result)| result).collect();
        let summary = results
            .iter()
            .map(|result| SummaryRow::from_result(result, &self.schema))
            .collect();

        let report = BatchReport { results, summary };
        tracing::info!(documents = total, complete = report.complete(), "Batch finished");
        report
    }

    /// Extracts from every file directly inside `dir`, in file-name order,
    /// using the configured batch concurrency.
    pub async fn extract_dir(&self, dir: impl AsRef<Path>) -> Result<BatchReport, Error> {
        let mut paths = Vec::new();
        let mut entries = tokio::fs::read_dir(dir.as_ref()).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                paths.push(entry.path());
            }
        }
        paths.sort();

        if paths.is_empty() {
            tracing::warn!(dir = %dir.as_ref().display(), "No documents found");
        }

        let documents = document_ids(&paths)
            .into_iter()
            .zip(paths)
            .map(|(id, path)| Document::new(id, DocumentSource::Path(path)))
            .collect();

        Ok(self.extract_batch(documents, self.config.batch_concurrency).await)
    }
}

/// File stems as ids, falling back to the full file name for files sharing a
/// stem (`HKE1.pdf` and `HKE1.png`), so report files never collide.
fn document_ids(paths: &[PathBuf]) -> Vec<String> {
    let stem = |path: &PathBuf| path.file_stem().map(|s| s.to_string_lossy().into_owned());
    let name = |path: &PathBuf| {
        path.file_name()
            .map_or_else(|| path.display().to_string(), |s| s.to_string_lossy().into_owned())
    };

    let mut stems: HashMap<String, usize> = HashMap::new();
    for path in paths {
        if let Some(stem) = stem(path) {
            *stems.entry(stem).or_default() += 1;
        }
    }

    paths
        .iter()
        .map(|path| match stem(path) {
            Some(stem) if stems.get(&stem) == Some(&1) => stem,
            _ => name(path),
        })
        .collect()
}
