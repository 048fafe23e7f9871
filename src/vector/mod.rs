//! Vector space functionality for cluster-scoped retrieval.
//!
//! Documents are embedded as sparse TF-IDF vectors, grouped into clusters,
//! and queries are answered by routing to the best cluster and ranking only
//! its members.
//!
//! # Architecture
//! The search path is a two-level inverted-file layout: a coarse step picks
//! one cluster by aggregate similarity, a fine step scores each member
//! exactly. Recommendation skips the coarse step and scans the whole corpus.
//! Clustering is either K-means (partition) or DBSCAN (density).

pub mod clustering;
pub mod density;
mod index;
pub mod router;
mod types;

// Re-export core types for public API
pub use clustering::{
    ClusterSet, ClusterStats, Clusterer, ClusteringMode, KMeans, KMeansOptions, KMeansResult,
    assign_to_nearest_centroid,
};
pub use density::Dbscan;
pub use index::{CorpusIndex, Vocabulary, cosine_similarity, tokenize};
pub use router::{
    ClusterAggregation, ClusterScore, RankedResult, RoutedSearch, route_and_rank, score_clusters,
    select_cluster,
};
pub use types::{ClusterId, Score, SparseVector};
