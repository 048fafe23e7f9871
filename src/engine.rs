//! Search engine that orchestrates indexing, clustering, search and
//! recommendation.
//!
//! The engine owns exactly one corpus index and at most one clustering of
//! it. Both are immutable once built and shared through `Arc`s: writers
//! build a replacement without holding any lock and swap it in, readers
//! clone the current pair into a [`Snapshot`] and compute lock-free. A
//! re-index therefore never disturbs an in-flight query, and queries never
//! observe a half-built index.

use crate::config::validate_threshold;
use crate::document::{Document, DocumentId};
use crate::error::{EngineError, EngineResult};
use crate::evaluation::{self, EvaluationReport, RelevanceJudgment};
use crate::recommend;
use crate::vector::{
    ClusterAggregation, ClusterScore, ClusterSet, ClusterStats, ClusteringMode, CorpusIndex,
    KMeansOptions, RankedResult, RoutedSearch, route_and_rank, score_clusters,
};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Engine-level options, validated once at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub mode: ClusteringMode,
    pub kmeans: KMeansOptions,
    pub search_threshold: f32,
    pub recommend_threshold: f32,
    pub ndcg_k: usize,
    pub aggregation: ClusterAggregation,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: ClusteringMode::Partition { k: 6 },
            kmeans: KMeansOptions::default(),
            search_threshold: 0.02,
            recommend_threshold: 0.1,
            ndcg_k: 10,
            aggregation: ClusterAggregation::Mean,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> EngineResult<()> {
        self.mode.validate()?;
        validate_threshold("search_threshold", self.search_threshold)?;
        validate_threshold("recommend_threshold", self.recommend_threshold)?;
        if self.ndcg_k < 1 {
            return Err(EngineError::InvalidConfiguration {
                parameter: "ndcg_k",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Cluster membership summary for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterOverview {
    pub clusters: Vec<ClusterStats>,
    /// Documents labeled as noise (density mode only)
    pub noise: usize,
}

#[derive(Debug, Default)]
struct EngineState {
    index: Option<Arc<CorpusIndex>>,
    clusters: Option<Arc<ClusterSet>>,
}

/// Thread-safe owner of the current index and clustering.
#[derive(Debug)]
pub struct SearchEngine {
    config: EngineConfig,
    state: RwLock<EngineState>,
}

impl SearchEngine {
    /// Creates an engine with no index.
    ///
    /// # Errors
    /// `InvalidConfiguration` for out-of-range options.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: RwLock::new(EngineState::default()),
        })
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replaces the corpus index. Any existing clustering becomes stale and
    /// is dropped.
    ///
    /// On error the previous index and clustering are left untouched.
    pub fn add_documents(&self, documents: Vec<Document>) -> EngineResult<()> {
        let index = Arc::new(CorpusIndex::build(documents)?);

        let mut state = self.state.write();
        if state.clusters.take().is_some() {
            debug!("Dropped clustering of the previous index");
        }
        state.index = Some(index);
        Ok(())
    }

    /// Clusters the current index with the configured strategy.
    ///
    /// # Errors
    /// - `IndexNotBuilt` when no documents were added
    /// - `InsufficientData` / `NoValidCluster` from the strategy
    /// - `ClusteringNotPerformed` when the index was replaced while clustering ran
    pub fn perform_clustering(&self) -> EngineResult<ClusterOverview> {
        let index = self.state.read().index.clone().ok_or(EngineError::IndexNotBuilt)?;
        let clusters = Arc::new(ClusterSet::build(&index, &self.config.mode, &self.config.kmeans)?);

        let mut state = self.state.write();
        let current = state.index.as_ref().map(|i| i.generation());
        if current != Some(clusters.index_generation()) {
            warn!("Index changed while clustering; discarding result");
            return Err(EngineError::ClusteringNotPerformed);
        }
        let overview = overview(&clusters);
        state.clusters = Some(clusters);
        Ok(overview)
    }

    /// Captures the current index and clustering for lock-free reads.
    ///
    /// # Errors
    /// `IndexNotBuilt` when no documents were added.
    pub fn snapshot(&self) -> EngineResult<Snapshot> {
        let state = self.state.read();
        let index = state.index.clone().ok_or(EngineError::IndexNotBuilt)?;
        Ok(Snapshot {
            index,
            clusters: state.clusters.clone(),
        })
    }

    /// Searches with the configured threshold.
    pub fn search(&self, query: &str) -> EngineResult<Vec<RankedResult>> {
        self.search_with_threshold(query, self.config.search_threshold)
    }

    pub fn search_with_threshold(&self, query: &str, threshold: f32) -> EngineResult<Vec<RankedResult>> {
        Ok(self.search_routed(query, threshold)?.results)
    }

    /// Search result including the routing decision and every cluster score.
    pub fn search_routed(&self, query: &str, threshold: f32) -> EngineResult<RoutedSearch> {
        self.snapshot()?.search(query, threshold, self.config.aggregation)
    }

    /// Per-cluster aggregate score of a query.
    pub fn score_clusters(&self, query: &str) -> EngineResult<Vec<ClusterScore>> {
        self.snapshot()?.score_clusters(query, self.config.aggregation)
    }

    /// Recommends with the configured threshold.
    pub fn recommend(&self, id: &DocumentId) -> EngineResult<Vec<RankedResult>> {
        self.recommend_with_threshold(id, self.config.recommend_threshold)
    }

    pub fn recommend_with_threshold(
        &self,
        id: &DocumentId,
        threshold: f32,
    ) -> EngineResult<Vec<RankedResult>> {
        validate_threshold("threshold", threshold)?;
        self.snapshot()?.recommend(id, threshold)
    }

    /// Recommends for a document that need not be part of the corpus.
    pub fn recommend_document(
        &self,
        reference: &Document,
        threshold: f32,
    ) -> EngineResult<Vec<RankedResult>> {
        validate_threshold("threshold", threshold)?;
        Ok(self.snapshot()?.recommend_document(reference, threshold))
    }

    /// Current cluster membership.
    pub fn cluster_stats(&self) -> EngineResult<ClusterOverview> {
        self.snapshot()?.cluster_stats()
    }

    /// Searches `query` and scores the ranking against `judgment`, or
    /// against the substring heuristic when no judgment is given.
    pub fn evaluate(
        &self,
        query: &str,
        judgment: Option<&RelevanceJudgment>,
    ) -> EngineResult<EvaluationReport> {
        self.evaluate_with_k(query, judgment, self.config.ndcg_k)
    }

    /// Like [`evaluate`](Self::evaluate) with an explicit NDCG cutoff.
    ///
    /// # Errors
    /// `InvalidConfiguration` when `k` is 0.
    pub fn evaluate_with_k(
        &self,
        query: &str,
        judgment: Option<&RelevanceJudgment>,
        k: usize,
    ) -> EngineResult<EvaluationReport> {
        self.snapshot()?.evaluate(
            query,
            judgment,
            self.config.search_threshold,
            self.config.aggregation,
            k,
        )
    }
}

fn overview(clusters: &ClusterSet) -> ClusterOverview {
    ClusterOverview {
        clusters: clusters.stats(),
        noise: clusters.noise().len(),
    }
}

/// One consistent view of an index and its clustering.
///
/// Cheap to clone; holds the data alive even after the engine moves on.
#[derive(Debug, Clone)]
pub struct Snapshot {
    index: Arc<CorpusIndex>,
    clusters: Option<Arc<ClusterSet>>,
}

impl Snapshot {
    #[must_use]
    pub fn index(&self) -> &CorpusIndex {
        &self.index
    }

    /// Clustering of this snapshot's index.
    ///
    /// # Errors
    /// `ClusteringNotPerformed` when there is none, or it belongs to an
    /// earlier index.
    pub fn clusters(&self) -> EngineResult<&ClusterSet> {
        match &self.clusters {
            Some(clusters) if clusters.index_generation() == self.index.generation() => Ok(clusters),
            _ => Err(EngineError::ClusteringNotPerformed),
        }
    }

    /// Routes `query` to its best cluster and ranks that cluster's members.
    ///
    /// # Errors
    /// `InvalidConfiguration` for a threshold outside `[0, 1]`.
    pub fn search(
        &self,
        query: &str,
        threshold: f32,
        aggregation: ClusterAggregation,
    ) -> EngineResult<RoutedSearch> {
        validate_threshold("threshold", threshold)?;
        let clusters = self.clusters()?;
        let query_vector = self.index.vectorize(query);
        let routed = route_and_rank(&self.index, clusters, &query_vector, threshold, aggregation);
        debug!(
            "Query routed to cluster {:?}, {} result(s) at threshold {threshold}",
            routed.cluster.map(|c| c.get()),
            routed.results.len()
        );
        Ok(routed)
    }

    pub fn score_clusters(
        &self,
        query: &str,
        aggregation: ClusterAggregation,
    ) -> EngineResult<Vec<ClusterScore>> {
        let clusters = self.clusters()?;
        let query_vector = self.index.vectorize(query);
        Ok(score_clusters(&self.index, clusters, &query_vector, aggregation))
    }

    /// Recommends for an indexed document.
    ///
    /// # Errors
    /// `DocumentNotFound` when `id` is not in the corpus.
    pub fn recommend(&self, id: &DocumentId, threshold: f32) -> EngineResult<Vec<RankedResult>> {
        let position = self
            .index
            .position_of(id)
            .ok_or_else(|| EngineError::DocumentNotFound { id: id.to_string() })?;
        let reference = &self.index.documents()[position];
        Ok(recommend::recommend(&self.index, reference, threshold))
    }

    #[must_use]
    pub fn recommend_document(&self, reference: &Document, threshold: f32) -> Vec<RankedResult> {
        recommend::recommend(&self.index, reference, threshold)
    }

    pub fn cluster_stats(&self) -> EngineResult<ClusterOverview> {
        Ok(overview(self.clusters()?))
    }

    pub fn evaluate(
        &self,
        query: &str,
        judgment: Option<&RelevanceJudgment>,
        threshold: f32,
        aggregation: ClusterAggregation,
        k: usize,
    ) -> EngineResult<EvaluationReport> {
        if k < 1 {
            return Err(EngineError::InvalidConfiguration {
                parameter: "k",
                reason: "must be at least 1".to_string(),
            });
        }
        let routed = self.search(query, threshold, aggregation)?;
        let recommended: Vec<DocumentId> = routed.results.into_iter().map(|r| r.id).collect();

        let default_judgment;
        let judgment = match judgment {
            Some(judgment) => judgment,
            None => {
                default_judgment = RelevanceJudgment::from_substring(query, self.index.documents());
                &default_judgment
            }
        };

        let report = evaluation::evaluate(&recommended, judgment, k);
        info!(
            "Evaluated '{query}': precision {:.3}, recall {:.3}, f1 {:.3}, ndcg@{k} {:.3}",
            report.precision, report.recall, report.f1, report.ndcg
        );
        Ok(report)
    }
}
