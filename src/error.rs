//! Error types for the retrieval engine
//!
//! This module provides structured error types using thiserror for better
//! error handling and actionable error messages. Every failure is
//! deterministic for a given corpus and configuration, so none of them are
//! retried internally.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for indexing, clustering, search and recommendation
#[derive(Error, Debug)]
pub enum EngineError {
    /// Nothing to index
    #[error(
        "Cannot build an index from an empty corpus\nSuggestion: Provide at least one document"
    )]
    EmptyCorpus,

    #[error(
        "No index has been built yet\nSuggestion: Call add_documents before clustering, searching or recommending"
    )]
    IndexNotBuilt,

    #[error(
        "Documents have not been clustered for the current index\nSuggestion: Call perform_clustering after add_documents"
    )]
    ClusteringNotPerformed,

    #[error(
        "Corpus of {documents} document(s) is too small: at least {required} required\nSuggestion: Add more documents or switch clustering mode"
    )]
    InsufficientData { documents: usize, required: usize },

    #[error(
        "Density clustering marked all {documents} document(s) as noise\nSuggestion: Increase density_eps or lower density_min_points"
    )]
    NoValidCluster { documents: usize },

    /// Configuration errors
    #[error("Invalid configuration for '{parameter}': {reason}")]
    InvalidConfiguration {
        parameter: &'static str,
        reason: String,
    },

    #[error("Document '{id}' is not part of the indexed corpus")]
    DocumentNotFound { id: String },

    /// File system errors while loading normalized documents
    #[error("Failed to read document '{path}': {source}")]
    DocumentLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),
}

impl EngineError {
    /// Get a stable status code for this error type.
    ///
    /// Returns a string identifier that can be used in JSON responses
    /// for programmatic error handling.
    pub fn status_code(&self) -> String {
        match self {
            Self::EmptyCorpus => "EMPTY_CORPUS",
            Self::IndexNotBuilt => "INDEX_NOT_BUILT",
            Self::ClusteringNotPerformed => "CLUSTERING_NOT_PERFORMED",
            Self::InsufficientData { .. } => "INSUFFICIENT_DATA",
            Self::NoValidCluster { .. } => "NO_VALID_CLUSTER",
            Self::InvalidConfiguration { .. } => "INVALID_CONFIGURATION",
            Self::DocumentNotFound { .. } => "DOCUMENT_NOT_FOUND",
            Self::DocumentLoad { .. } => "DOCUMENT_LOAD_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
        }
        .to_string()
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::EmptyCorpus => vec![
                "Check that the documents directory contains .txt files",
                "Run the text extraction step before indexing",
            ],
            Self::IndexNotBuilt | Self::ClusteringNotPerformed => vec![
                "Index and cluster the corpus first, then retry the query",
            ],
            Self::InsufficientData { .. } => vec![
                "Partition clustering needs at least two documents",
            ],
            Self::NoValidCluster { .. } => vec![
                "Raise clustering.density_eps so neighbourhoods overlap",
                "Lower clustering.density_min_points",
                "Switch clustering.mode to \"partition\"",
            ],
            Self::InvalidConfiguration { .. } | Self::Config(_) => vec![
                "Run 'clusearch config' to inspect the merged settings",
                "Run 'clusearch init --force' to regenerate .clusearch/settings.toml",
            ],
            Self::DocumentNotFound { .. } => vec![
                "Use an id printed by 'clusearch search' or 'clusearch clusters'",
            ],
            Self::DocumentLoad { .. } => vec![
                "Check that the file exists and you have read permissions",
                "Ensure the file is valid UTF-8 text",
            ],
        }
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_are_stable() {
        assert_eq!(EngineError::EmptyCorpus.status_code(), "EMPTY_CORPUS");
        assert_eq!(
            EngineError::NoValidCluster { documents: 3 }.status_code(),
            "NO_VALID_CLUSTER"
        );
        assert_eq!(
            EngineError::InvalidConfiguration {
                parameter: "density_eps",
                reason: "must be positive".to_string(),
            }
            .status_code(),
            "INVALID_CONFIGURATION"
        );
    }

    #[test]
    fn test_messages_carry_context() {
        let err = EngineError::InsufficientData {
            documents: 1,
            required: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("1 document(s)"));
        assert!(msg.contains("at least 2"));
        assert!(!err.recovery_suggestions().is_empty());
    }
}
