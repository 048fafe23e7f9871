//! Document clustering for cluster-scoped retrieval.
//!
//! Two interchangeable strategies sit behind the [`Clusterer`] trait and are
//! selected by [`ClusteringMode`]:
//! - Partition: K-means over the TF-IDF vectors (this module)
//! - Density: DBSCAN over cosine distance (see `density`)
//!
//! # K-means Details
//! - Distance metric: squared Euclidean on L2-normalized vectors
//! - Initialization: K-means++ from a seeded RNG, repeated `restarts` times,
//!   the run with the lowest inertia wins
//! - Empty clusters are reseeded with the point farthest from its centroid
//!
//! # Performance Characteristics
//! - O(n * k * nnz * iterations) time complexity
//! - O(k * |vocabulary|) space for dense centroids
//! - Parallel assignment step

use crate::error::{EngineError, EngineResult};
use crate::vector::density::Dbscan;
use crate::vector::{ClusterId, CorpusIndex, SparseVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Convergence tolerance for mean squared centroid movement.
const CONVERGENCE_TOLERANCE: f32 = 1e-6;

/// Epsilon for floating-point comparisons.
const EPSILON: f32 = 1e-10;

/// Smallest corpus partition mode accepts.
const MIN_PARTITION_DOCUMENTS: usize = 2;

/// Which clustering strategy to run. Exactly one is active per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ClusteringMode {
    /// Fixed target cluster count, every document assigned.
    Partition { k: usize },
    /// Neighbourhood radius in cosine distance and minimum neighbour count.
    /// Documents reachable from no core point are noise.
    Density { eps: f32, min_points: usize },
}

impl ClusteringMode {
    /// Checks parameter ranges.
    pub fn validate(&self) -> EngineResult<()> {
        match *self {
            Self::Partition { k } if k < 2 => Err(EngineError::InvalidConfiguration {
                parameter: "partition_count",
                reason: format!("must be at least 2, got {k}"),
            }),
            Self::Density { eps, .. } if !(eps.is_finite() && eps > 0.0) => {
                Err(EngineError::InvalidConfiguration {
                    parameter: "density_eps",
                    reason: format!("must be a positive number, got {eps}"),
                })
            }
            Self::Density { min_points, .. } if min_points < 1 => {
                Err(EngineError::InvalidConfiguration {
                    parameter: "density_min_points",
                    reason: "must be at least 1".to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Tuning knobs for partition mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KMeansOptions {
    pub seed: u64,
    pub max_iterations: usize,
    pub restarts: usize,
}

impl Default for KMeansOptions {
    fn default() -> Self {
        Self {
            seed: 42,
            max_iterations: 300,
            restarts: 10,
        }
    }
}

/// A clustering strategy.
pub trait Clusterer {
    /// Labels each vector with a zero-based raw cluster label, `None` for noise.
    fn fit(&self, vectors: &[SparseVector]) -> EngineResult<Vec<Option<usize>>>;
}

/// Result of a K-means run.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansResult {
    /// Cluster centroids, dense over the vocabulary.
    pub centroids: Vec<Vec<f32>>,

    /// Zero-based cluster assignment for each input vector.
    pub assignments: Vec<usize>,

    /// Sum of squared distances to assigned centroids.
    pub inertia: f32,

    /// Number of iterations until convergence.
    pub iterations: usize,
}

/// K-means partition clusterer.
#[derive(Debug, Clone)]
pub struct KMeans {
    k: usize,
    options: KMeansOptions,
}

impl KMeans {
    pub fn new(k: usize, options: KMeansOptions) -> Self {
        Self { k, options }
    }

    /// The cluster count actually used for a corpus of `documents`.
    ///
    /// Corpora smaller than `2k` get `max(2, documents / 2)` clusters.
    pub fn effective_k(k: usize, documents: usize) -> EngineResult<usize> {
        if documents < MIN_PARTITION_DOCUMENTS {
            return Err(EngineError::InsufficientData {
                documents,
                required: MIN_PARTITION_DOCUMENTS,
            });
        }
        if documents < 2 * k {
            Ok((documents / 2).max(2))
        } else {
            Ok(k)
        }
    }

    /// Runs all restarts and keeps the lowest-inertia result.
    ///
    /// Deterministic for a fixed seed.
    #[must_use = "clustering results should be used or the computation is wasted"]
    pub fn run(&self, vectors: &[SparseVector]) -> EngineResult<KMeansResult> {
        let k = Self::effective_k(self.k, vectors.len())?;
        if k != self.k {
            debug!(
                "Reduced cluster count from {} to {k} for {} document(s)",
                self.k,
                vectors.len()
            );
        }

        let mut best: Option<KMeansResult> = None;
        for restart in 0..self.options.restarts.max(1) {
            let mut rng = StdRng::seed_from_u64(self.options.seed.wrapping_add(restart as u64));
            let result = lloyd(vectors, k, self.options.max_iterations.max(1), &mut rng);
            debug!(
                "K-means restart {restart}: inertia {:.6} after {} iteration(s)",
                result.inertia, result.iterations
            );
            if best.as_ref().is_none_or(|b| result.inertia < b.inertia) {
                best = Some(result);
            }
        }

        // restarts >= 1 so best is always populated
        best.ok_or(EngineError::InsufficientData {
            documents: vectors.len(),
            required: MIN_PARTITION_DOCUMENTS,
        })
    }
}

impl Clusterer for KMeans {
    fn fit(&self, vectors: &[SparseVector]) -> EngineResult<Vec<Option<usize>>> {
        let result = self.run(vectors)?;
        Ok(result.assignments.into_iter().map(Some).collect())
    }
}

/// One K-means run from a K-means++ start.
fn lloyd(vectors: &[SparseVector], k: usize, max_iterations: usize, rng: &mut StdRng) -> KMeansResult {
    let dimension = vectors[0].dimension();
    let mut centroids = initialize_centroids_kmeans_plus_plus(vectors, k, rng);
    let mut assignments = vec![usize::MAX; vectors.len()];
    let mut iterations = 0;
    let mut converged = false;

    while iterations < max_iterations {
        iterations += 1;

        // Assignment step: assign each vector to nearest centroid
        let new_assignments = assign_all(vectors, &centroids);
        if new_assignments == assignments {
            converged = true;
            break;
        }
        assignments = new_assignments;

        // Update step: recompute centroids
        let new_centroids = update_centroids(vectors, &assignments, &centroids, dimension);
        let movement = centroid_movement(&centroids, &new_centroids);
        centroids = new_centroids;

        if movement < CONVERGENCE_TOLERANCE {
            assignments = assign_all(vectors, &centroids);
            converged = true;
            break;
        }
    }

    if !converged {
        warn!("K-means did not fully converge after {max_iterations} iterations");
    }

    let inertia = vectors
        .iter()
        .zip(&assignments)
        .map(|(v, &c)| v.squared_distance_to_dense(&centroids[c], norm_squared(&centroids[c])))
        .sum();

    KMeansResult {
        centroids,
        assignments,
        inertia,
        iterations,
    }
}

/// Assigns every vector to its nearest centroid; ties go to the lowest index.
fn assign_all(vectors: &[SparseVector], centroids: &[Vec<f32>]) -> Vec<usize> {
    let norms: Vec<f32> = centroids.iter().map(|c| norm_squared(c)).collect();
    vectors
        .par_iter()
        .map(|v| assign_to_nearest_centroid(v, centroids, &norms))
        .collect()
}

/// Index of the centroid nearest to `vector` in squared Euclidean distance.
pub fn assign_to_nearest_centroid(
    vector: &SparseVector,
    centroids: &[Vec<f32>],
    centroid_norms: &[f32],
) -> usize {
    let mut best_distance = f32::INFINITY;
    let mut best_cluster = 0;

    for (i, (centroid, &norm)) in centroids.iter().zip(centroid_norms).enumerate() {
        let distance = vector.squared_distance_to_dense(centroid, norm);
        if distance < best_distance {
            best_distance = distance;
            best_cluster = i;
        }
    }

    best_cluster
}

/// Recomputes centroids as the mean of their assigned vectors.
fn update_centroids(
    vectors: &[SparseVector],
    assignments: &[usize],
    old_centroids: &[Vec<f32>],
    dimension: usize,
) -> Vec<Vec<f32>> {
    let k = old_centroids.len();
    let mut new_centroids = vec![vec![0.0; dimension]; k];
    let mut cluster_sizes = vec![0usize; k];

    for (vector, &cluster) in vectors.iter().zip(assignments) {
        vector.add_to_dense(&mut new_centroids[cluster]);
        cluster_sizes[cluster] += 1;
    }

    for (centroid, &size) in new_centroids.iter_mut().zip(&cluster_sizes) {
        if size > 0 {
            for value in centroid.iter_mut() {
                *value /= size as f32;
            }
        }
    }

    let empty: Vec<usize> = (0..k).filter(|&c| cluster_sizes[c] == 0).collect();
    if !empty.is_empty() {
        // Reseed each empty cluster with the point farthest from its own centroid
        let old_norms: Vec<f32> = old_centroids.iter().map(|c| norm_squared(c)).collect();
        let mut candidates: Vec<(usize, f32)> = vectors
            .iter()
            .zip(assignments)
            .enumerate()
            .map(|(i, (v, &c))| (i, v.squared_distance_to_dense(&old_centroids[c], old_norms[c])))
            .collect();
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        for (cluster, (point, _)) in empty.into_iter().zip(candidates) {
            let mut centroid = vec![0.0; dimension];
            vectors[point].add_to_dense(&mut centroid);
            new_centroids[cluster] = centroid;
        }
    }

    new_centroids
}

/// Initializes centroids using the K-means++ algorithm.
///
/// K-means++ selects initial centroids that are far apart, leading to
/// better convergence properties than random initialization.
fn initialize_centroids_kmeans_plus_plus(
    vectors: &[SparseVector],
    k: usize,
    rng: &mut StdRng,
) -> Vec<Vec<f32>> {
    let dimension = vectors[0].dimension();
    let to_dense = |v: &SparseVector| {
        let mut dense = vec![0.0; dimension];
        v.add_to_dense(&mut dense);
        dense
    };

    let mut chosen = Vec::with_capacity(k);
    let first_idx = rng.random_range(0..vectors.len());
    chosen.push(first_idx);
    let mut centroids = vec![to_dense(&vectors[first_idx])];

    // Squared distance of each point to its nearest chosen centroid
    let mut distances: Vec<f32> = vectors
        .iter()
        .map(|v| v.squared_distance_to_dense(&centroids[0], norm_squared(&centroids[0])))
        .collect();

    while centroids.len() < k {
        let total_distance: f32 = distances.iter().sum();

        let next = if total_distance < EPSILON {
            // All points coincide with existing centroids; take the next unused point
            (0..vectors.len())
                .find(|i| !chosen.contains(i))
                .unwrap_or(vectors.len() - 1)
        } else {
            // Choose next centroid with probability proportional to squared distance
            let target = rng.random::<f32>() * total_distance;
            let mut cumulative = 0.0;
            let mut picked = None;
            for (i, &distance) in distances.iter().enumerate() {
                cumulative += distance;
                if cumulative >= target && distance > 0.0 {
                    picked = Some(i);
                    break;
                }
            }
            // Fallback for rounding errors: farthest point
            picked.unwrap_or_else(|| {
                distances
                    .iter()
                    .enumerate()
                    .max_by(|a, b| a.1.total_cmp(b.1))
                    .map(|(i, _)| i)
                    .unwrap_or(0)
            })
        };

        chosen.push(next);
        let centroid = to_dense(&vectors[next]);
        let norm = norm_squared(&centroid);
        for (distance, v) in distances.iter_mut().zip(vectors) {
            *distance = distance.min(v.squared_distance_to_dense(&centroid, norm));
        }
        centroids.push(centroid);
    }

    centroids
}

/// Mean squared movement of centroids between iterations.
fn centroid_movement(old: &[Vec<f32>], new: &[Vec<f32>]) -> f32 {
    old.iter()
        .zip(new)
        .map(|(a, b)| a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>())
        .sum::<f32>()
        / old.len() as f32
}

fn norm_squared(dense: &[f32]) -> f32 {
    dense.iter().map(|x| x * x).sum()
}

/// Member count of one cluster, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterStats {
    pub cluster: ClusterId,
    pub members: usize,
}

/// Cluster membership for one clustering run over one index build.
///
/// Cluster ids are assigned in order of each cluster's first document, so
/// the cluster holding corpus position 0 (if not noise) is always id 1.
#[derive(Debug, Clone)]
pub struct ClusterSet {
    index_generation: u64,
    mode: ClusteringMode,
    labels: Vec<Option<ClusterId>>,
    members: Vec<Vec<usize>>,
}

impl ClusterSet {
    /// Clusters the documents of `index` with the strategy named by `mode`.
    ///
    /// # Errors
    /// - `InvalidConfiguration` for out-of-range mode parameters
    /// - `InsufficientData` when partition mode gets fewer than 2 documents
    /// - `NoValidCluster` when density mode labels everything as noise
    pub fn build(
        index: &CorpusIndex,
        mode: &ClusteringMode,
        options: &KMeansOptions,
    ) -> EngineResult<Self> {
        mode.validate()?;

        let labels = match *mode {
            ClusteringMode::Partition { k } => KMeans::new(k, *options).fit(index.vectors())?,
            ClusteringMode::Density { eps, min_points } => {
                Dbscan::new(eps, min_points).fit(index.vectors())?
            }
        };

        let set = Self::from_raw_labels(index.generation(), mode.clone(), &labels);
        info!(
            "Clustered {} document(s) into {} cluster(s), {} noise",
            index.len(),
            set.cluster_count(),
            set.noise().len()
        );
        Ok(set)
    }

    /// Canonicalizes raw labels: ids follow first appearance, empty clusters vanish.
    pub fn from_raw_labels(
        index_generation: u64,
        mode: ClusteringMode,
        raw_labels: &[Option<usize>],
    ) -> Self {
        let mut remap: HashMap<usize, ClusterId> = HashMap::new();
        let mut members: Vec<Vec<usize>> = Vec::new();
        let mut labels = Vec::with_capacity(raw_labels.len());

        for (position, raw) in raw_labels.iter().enumerate() {
            let label = raw.map(|raw| {
                let id = *remap.entry(raw).or_insert_with(|| {
                    members.push(Vec::new());
                    ClusterId::from_index(members.len() - 1)
                });
                members[id.index()].push(position);
                id
            });
            labels.push(label);
        }

        Self {
            index_generation,
            mode,
            labels,
            members,
        }
    }

    /// Generation of the index this clustering was computed from.
    #[must_use]
    pub fn index_generation(&self) -> u64 {
        self.index_generation
    }

    #[must_use]
    pub fn mode(&self) -> &ClusteringMode {
        &self.mode
    }

    /// Number of non-noise clusters.
    #[must_use]
    pub fn cluster_count(&self) -> usize {
        self.members.len()
    }

    /// Cluster of the document at `position`; `None` for noise.
    #[must_use]
    pub fn label(&self, position: usize) -> Option<ClusterId> {
        self.labels.get(position).copied().flatten()
    }

    /// Labels for every corpus position.
    #[must_use]
    pub fn labels(&self) -> &[Option<ClusterId>] {
        &self.labels
    }

    /// Corpus positions in a cluster, in corpus order.
    #[must_use]
    pub fn members(&self, cluster: ClusterId) -> &[usize] {
        self.members
            .get(cluster.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Iterates clusters in id order with their member positions. Noise is excluded.
    pub fn clustered_documents(&self) -> impl Iterator<Item = (ClusterId, &[usize])> + '_ {
        self.members
            .iter()
            .enumerate()
            .map(|(i, m)| (ClusterId::from_index(i), m.as_slice()))
    }

    /// Corpus positions labeled as noise.
    #[must_use]
    pub fn noise(&self) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, l)| l.is_none())
            .map(|(i, _)| i)
            .collect()
    }

    /// Member counts per cluster, in id order.
    #[must_use]
    pub fn stats(&self) -> Vec<ClusterStats> {
        self.clustered_documents()
            .map(|(cluster, members)| ClusterStats {
                cluster,
                members: members.len(),
            })
            .collect()
    }
}
