//! Caller-owned document handles.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised when building a [`Document`].
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Neither an existing file nor an http(s) URL.
    #[error("Document location must be an existing file or an http(s) URL: {0}")]
    InvalidLocation(String),
}

/// Where the document content lives.
///
/// Two documents with equal sources hold the same content, whatever their ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocumentSource {
    /// A local file.
    Path(PathBuf),
    /// A remotely hosted file.
    Url(String),
    /// Content already in memory.
    Bytes(Vec<u8>),
}

/// A read-only document handle passed by reference to the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    id: String,
    source: DocumentSource,
}

impl Document {
    /// Creates a document with an explicit id.
    pub fn new(id: impl Into<String>, source: DocumentSource) -> Self {
        Self {
            id: id.into(),
            source,
        }
    }

    /// Wraps in-memory content under a random id.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), DocumentSource::Bytes(bytes))
    }

    /// Builds a document from a file path or URL.
    ///
    /// Existing paths win over URLs. The id is the file stem for paths and
    /// the last path segment (without query) for URLs.
    pub fn from_location(location: &str) -> Result<Self, DocumentError> {
        let path = Path::new(location);
        if path.is_file() {
            let id = path
                .file_stem()
                .map_or_else(|| location.to_string(), |s| s.to_string_lossy().into_owned());
            return Ok(Self::new(id, DocumentSource::Path(path.to_path_buf())));
        }

        if location.starts_with("https://") || location.starts_with("http://") {
            let without_query = location.split(['?', '#']).next().unwrap_or(location);
            let id = without_query
                .rsplit('/')
                .find(|segment| !segment.is_empty())
                .unwrap_or(location)
                .to_string();
            return Ok(Self::new(id, DocumentSource::Url(location.to_string())));
        }

        Err(DocumentError::InvalidLocation(location.to_string()))
    }

    /// Caller-facing identifier, echoed in the extraction result.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Where the content lives.
    #[must_use]
    pub const fn source(&self) -> &DocumentSource {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_location_url() {
        let doc =
            Document::from_location("https://raw.githubusercontent.com/org/repo/main/utility_bills/HKE1.png?raw=1")
                .unwrap();
        assert_eq!(doc.id(), "HKE1.png");
        assert!(matches!(doc.source(), DocumentSource::Url(_)));
    }

    #[test]
    fn test_from_location_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("CLP_March.pdf");
        std::fs::write(&path, b"%PDF").unwrap();

        let doc = Document::from_location(path.to_str().unwrap()).unwrap();
        assert_eq!(doc.id(), "CLP_March");
        assert_eq!(doc.source(), &DocumentSource::Path(path));
    }

    #[test]
    fn test_from_location_rejects_other() {
        assert!(matches!(
            Document::from_location("not/a/real/file.pdf"),
            Err(DocumentError::InvalidLocation(_))
        ));
    }

    #[test]
    fn test_from_bytes_has_unique_ids() {
        let a = Document::from_bytes(vec![1]);
        let b = Document::from_bytes(vec![1]);
        assert_ne!(a.id(), b.id());
    }
}
