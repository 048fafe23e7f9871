//! Query routing and intra-cluster ranking.
//!
//! A query is scored against every cluster, the single best cluster is
//! selected, and only its members are ranked. Documents in other clusters
//! are never returned, even when they would individually score higher;
//! that restriction is part of the search contract.

use crate::document::DocumentId;
use crate::vector::{ClusterId, ClusterSet, CorpusIndex, Score, SparseVector, cosine_similarity};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How per-document similarities combine into a cluster score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterAggregation {
    /// Total similarity; favours large clusters.
    Sum,
    /// Average similarity; keeps a large, weakly related cluster from
    /// winning on size alone.
    #[default]
    Mean,
}

impl ClusterAggregation {
    fn aggregate(self, similarities: impl Iterator<Item = f32>) -> f32 {
        let (total, count) = similarities.fold((0.0f32, 0usize), |(t, c), s| (t + s, c + 1));
        match self {
            Self::Sum => total,
            Self::Mean if count == 0 => 0.0,
            Self::Mean => total / count as f32,
        }
    }
}

/// Aggregate query score of one cluster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterScore {
    pub cluster: ClusterId,
    pub members: usize,
    pub score: f32,
}

/// One ranked document with its similarity and display metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResult {
    /// Position of the document in the corpus
    pub position: usize,
    pub id: DocumentId,
    pub score: Score,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
}

impl RankedResult {
    pub(crate) fn from_position(index: &CorpusIndex, position: usize, score: Score) -> Self {
        let document = &index.documents()[position];
        Self {
            position,
            id: document.id.clone(),
            score,
            title: document.title.clone(),
            source: document.source.clone(),
        }
    }
}

/// Routing decision plus the ranked members of the chosen cluster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutedSearch {
    /// Winning cluster, `None` only when there are no clusters at all
    pub cluster: Option<ClusterId>,
    /// Every cluster's aggregate score, in cluster id order
    pub cluster_scores: Vec<ClusterScore>,
    pub results: Vec<RankedResult>,
}

/// Similarity of the query to every corpus document.
fn similarities(index: &CorpusIndex, query: &SparseVector) -> Vec<f32> {
    index
        .vectors()
        .iter()
        .map(|v| cosine_similarity(query, v))
        .collect()
}

/// Scores every non-noise cluster against a query vector.
pub fn score_clusters(
    index: &CorpusIndex,
    clusters: &ClusterSet,
    query: &SparseVector,
    aggregation: ClusterAggregation,
) -> Vec<ClusterScore> {
    let sims = similarities(index, query);
    aggregate_scores(clusters, &sims, aggregation)
}

fn aggregate_scores(
    clusters: &ClusterSet,
    sims: &[f32],
    aggregation: ClusterAggregation,
) -> Vec<ClusterScore> {
    clusters
        .clustered_documents()
        .map(|(cluster, members)| ClusterScore {
            cluster,
            members: members.len(),
            score: aggregation.aggregate(members.iter().map(|&p| sims[p])),
        })
        .collect()
}

/// Highest-scoring cluster; ties go to the lowest cluster id.
pub fn select_cluster(scores: &[ClusterScore]) -> Option<ClusterId> {
    let mut best: Option<&ClusterScore> = None;
    for candidate in scores {
        best = match best {
            Some(current)
                if candidate.score < current.score
                    || (candidate.score == current.score && candidate.cluster > current.cluster) =>
            {
                Some(current)
            }
            _ => Some(candidate),
        };
    }
    best.map(|s| s.cluster)
}

/// Ranks corpus positions by similarity, descending, ties in corpus order,
/// dropping anything below `threshold`.
pub(crate) fn rank_positions(
    index: &CorpusIndex,
    positions: impl Iterator<Item = usize>,
    similarity_of: impl Fn(usize) -> f32,
    threshold: f32,
) -> Vec<RankedResult> {
    let mut ranked: Vec<(usize, Score)> = positions
        .map(|p| (p, Score::clamped(similarity_of(p))))
        .filter(|(_, score)| score.get() >= threshold)
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked
        .into_iter()
        .map(|(p, score)| RankedResult::from_position(index, p, score))
        .collect()
}

/// Routes a query vector to its best cluster and ranks that cluster's members.
pub fn route_and_rank(
    index: &CorpusIndex,
    clusters: &ClusterSet,
    query: &SparseVector,
    threshold: f32,
    aggregation: ClusterAggregation,
) -> RoutedSearch {
    let sims = similarities(index, query);
    let cluster_scores = aggregate_scores(clusters, &sims, aggregation);
    let cluster = select_cluster(&cluster_scores);

    let results = match cluster {
        Some(cluster) => rank_positions(
            index,
            clusters.members(cluster).iter().copied(),
            |p| sims[p],
            threshold,
        ),
        None => Vec::new(),
    };

    RoutedSearch {
        cluster,
        cluster_scores,
        results,
    }
}
