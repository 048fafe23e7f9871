//! DBSCAN over cosine distance.
//!
//! - **eps**: maximum cosine distance (`1 - similarity`) between neighbours.
//!   At `eps = 1` documents sharing no term are neighbours too
//! - **min_points**: a document is a core point when at least this many
//!   *other* documents lie within `eps`
//! - Clusters are the connected components of core points plus the border
//!   points reachable from them; everything else is noise
//!
//! Points are visited in corpus order and a border point reachable from two
//! clusters joins the first one that reaches it, so results are
//! deterministic. Neighbourhoods are computed once up front, O(n²) pairs.

use crate::error::{EngineError, EngineResult};
use crate::vector::clustering::Clusterer;
use crate::vector::{SparseVector, cosine_similarity};
use rayon::prelude::*;
use std::collections::VecDeque;
use tracing::debug;

/// Density-based clusterer.
#[derive(Debug, Clone)]
pub struct Dbscan {
    eps: f32,
    min_points: usize,
}

impl Dbscan {
    pub fn new(eps: f32, min_points: usize) -> Self {
        Self { eps, min_points }
    }

    /// Indices of all other points within `eps` cosine distance, per point.
    fn neighbourhoods(&self, vectors: &[SparseVector]) -> Vec<Vec<usize>> {
        (0..vectors.len())
            .into_par_iter()
            .map(|i| {
                (0..vectors.len())
                    .filter(|&j| {
                        j != i && 1.0 - cosine_similarity(&vectors[i], &vectors[j]) <= self.eps
                    })
                    .collect()
            })
            .collect()
    }
}

impl Clusterer for Dbscan {
    fn fit(&self, vectors: &[SparseVector]) -> EngineResult<Vec<Option<usize>>> {
        let n = vectors.len();
        let neighbourhoods = self.neighbourhoods(vectors);
        let is_core: Vec<bool> = neighbourhoods
            .iter()
            .map(|nb| nb.len() >= self.min_points)
            .collect();

        let mut labels: Vec<Option<usize>> = vec![None; n];
        let mut next_cluster = 0;

        for start in 0..n {
            if labels[start].is_some() || !is_core[start] {
                continue;
            }

            // Breadth-first expansion from a fresh core point
            let cluster = next_cluster;
            next_cluster += 1;
            labels[start] = Some(cluster);
            let mut queue: VecDeque<usize> = VecDeque::from([start]);

            while let Some(point) = queue.pop_front() {
                if !is_core[point] {
                    continue;
                }
                for &neighbour in &neighbourhoods[point] {
                    if labels[neighbour].is_none() {
                        labels[neighbour] = Some(cluster);
                        queue.push_back(neighbour);
                    }
                }
            }
        }

        let noise = labels.iter().filter(|l| l.is_none()).count();
        debug!(
            "DBSCAN (eps={}, min_points={}) found {next_cluster} cluster(s), {noise} noise point(s)",
            self.eps, self.min_points
        );

        if next_cluster == 0 {
            return Err(EngineError::NoValidCluster { documents: n });
        }

        Ok(labels)
    }
}
