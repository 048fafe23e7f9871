//! The main library module for clusearch

pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod evaluation;
pub mod recommend;
pub mod summary;
pub mod vector;

// Explicit exports for better API clarity
pub use config::Settings;
pub use document::{Document, DocumentId, load_documents};
pub use engine::{ClusterOverview, EngineConfig, SearchEngine, Snapshot};
pub use error::{EngineError, EngineResult};
pub use evaluation::{EvaluationReport, RelevanceJudgment};
pub use vector::{ClusterId, ClusteringMode, RankedResult, Score};
