//! Documents handed to the engine by the text normalization step.
//!
//! The engine never parses source formats. It receives already-normalized
//! text keyed by an opaque identifier; [`load_documents`] is the plain
//! directory reader used by the CLI for `.txt` files produced upstream.

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Opaque document identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A normalized document. Immutable once handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub text: String,
    /// Human readable title, when the producer knows one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Where the text came from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
}

impl Document {
    pub fn new(id: impl Into<DocumentId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            title: None,
            source: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Reads every `.txt` file directly under `dir`, ordered by file name.
///
/// The file stem becomes the document id and the path its source. Files
/// with invalid UTF-8 are skipped with a warning; other I/O failures abort.
pub fn load_documents(dir: impl AsRef<Path>) -> EngineResult<Vec<Document>> {
    let dir = dir.as_ref();
    let mut documents = Vec::new();

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|e| EngineError::DocumentLoad {
            path: e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf()),
            source: e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("directory walk failed")),
        })?;

        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "txt") {
            continue;
        }

        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                warn!("Skipping '{}': not valid UTF-8", path.display());
                continue;
            }
            Err(source) => {
                return Err(EngineError::DocumentLoad {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let id = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        documents.push(Document::new(id.clone(), text).with_title(id).with_source(path));
    }

    debug!("Loaded {} document(s) from '{}'", documents.len(), dir.display());
    Ok(documents)
}
