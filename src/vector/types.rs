//! Type-safe wrappers and core types for the vector space.
//!
//! This module provides newtypes that keep cluster labels, similarity scores
//! and sparse TF-IDF vectors from being mixed up with plain integers and
//! floats.

use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;

/// Type-safe wrapper for cluster IDs.
///
/// Clusters are identified by non-zero IDs to prevent confusion
/// with uninitialized state. Noise points in density mode carry no
/// `ClusterId` at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(NonZeroU32);

impl ClusterId {
    /// Creates a new `ClusterId` from a non-zero u32.
    ///
    /// Returns `None` if the provided ID is zero.
    #[must_use]
    pub fn new(id: u32) -> Option<Self> {
        NonZeroU32::new(id).map(Self)
    }

    /// Creates the id for the cluster at zero-based position `index`.
    #[must_use]
    pub fn from_index(index: usize) -> Self {
        Self(NonZeroU32::MIN.saturating_add(index as u32))
    }

    /// Returns the underlying u32 value.
    #[must_use]
    pub fn get(&self) -> u32 {
        self.0.get()
    }

    /// Zero-based position of this cluster.
    #[must_use]
    pub fn index(&self) -> usize {
        (self.0.get() - 1) as usize
    }
}

impl std::fmt::Display for ClusterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Type-safe wrapper for similarity scores.
///
/// Scores are normalized to the range [0.0, 1.0] where:
/// - 1.0 indicates perfect similarity
/// - 0.0 indicates no shared terms
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Score(f32);

impl Score {
    /// Creates a score, clamping into [0.0, 1.0].
    ///
    /// Cosine similarity of non-negative vectors can drift a few ulps past
    /// 1.0; NaN maps to 0.0.
    #[must_use]
    pub fn clamped(value: f32) -> Self {
        if value.is_nan() {
            Self(0.0)
        } else {
            Self(value.clamp(0.0, 1.0))
        }
    }

    /// Creates a score of 0.0 (no similarity).
    #[must_use]
    pub const fn zero() -> Self {
        Self(0.0)
    }

    /// Returns the underlying f32 value.
    #[must_use]
    pub fn get(&self) -> f32 {
        self.0
    }
}

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Sparse non-negative TF-IDF vector over a frozen vocabulary.
///
/// Entries are kept sorted by dimension so dot products are a linear merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    dimension: usize,
    entries: Vec<(u32, f32)>,
}

impl SparseVector {
    /// Builds a vector from `(dimension index, weight)` pairs.
    ///
    /// Zero weights and indices outside `dimension` are dropped; duplicate
    /// indices are summed.
    #[must_use]
    pub fn from_entries(dimension: usize, mut entries: Vec<(u32, f32)>) -> Self {
        entries.retain(|&(idx, w)| (idx as usize) < dimension && w > 0.0);
        entries.sort_unstable_by_key(|&(idx, _)| idx);
        entries.dedup_by(|later, earlier| {
            if later.0 == earlier.0 {
                earlier.1 += later.1;
                true
            } else {
                false
            }
        });
        Self { dimension, entries }
    }

    /// An all-zero vector of the given dimension.
    #[must_use]
    pub fn zeros(dimension: usize) -> Self {
        Self {
            dimension,
            entries: Vec::new(),
        }
    }

    /// Number of dimensions (the vocabulary size).
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of non-zero components.
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over non-zero `(dimension index, weight)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.entries.iter().map(|&(idx, w)| (idx as usize, w))
    }

    /// Weight at a dimension, zero when absent.
    #[must_use]
    pub fn get(&self, index: usize) -> f32 {
        self.entries
            .binary_search_by_key(&(index as u32), |&(idx, _)| idx)
            .map(|pos| self.entries[pos].1)
            .unwrap_or(0.0)
    }

    /// Dot product with another sparse vector.
    #[must_use]
    pub fn dot(&self, other: &SparseVector) -> f32 {
        debug_assert_eq!(self.dimension, other.dimension, "Vectors must share a vocabulary");

        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0f32;
        while i < self.entries.len() && j < other.entries.len() {
            let (a_idx, a_w) = self.entries[i];
            let (b_idx, b_w) = other.entries[j];
            match a_idx.cmp(&b_idx) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += a_w * b_w;
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }

    /// Dot product with a dense vector of the same dimension.
    #[must_use]
    pub fn dot_dense(&self, dense: &[f32]) -> f32 {
        debug_assert_eq!(self.dimension, dense.len(), "Vectors must share a vocabulary");
        self.iter().map(|(idx, w)| w * dense[idx]).sum()
    }

    /// Squared L2 norm.
    #[must_use]
    pub fn norm_squared(&self) -> f32 {
        self.entries.iter().map(|&(_, w)| w * w).sum()
    }

    /// L2 norm.
    #[must_use]
    pub fn norm(&self) -> f32 {
        self.norm_squared().sqrt()
    }

    /// Scales the vector in place to unit length. Zero vectors are left as-is.
    pub fn normalize(&mut self) {
        let norm = self.norm();
        if norm > 0.0 {
            for entry in &mut self.entries {
                entry.1 /= norm;
            }
        }
    }

    /// Adds this vector into a dense accumulator.
    pub fn add_to_dense(&self, dense: &mut [f32]) {
        for (idx, w) in self.iter() {
            dense[idx] += w;
        }
    }

    /// Squared Euclidean distance to a dense point whose squared norm is
    /// `dense_norm_squared`.
    #[must_use]
    pub fn squared_distance_to_dense(&self, dense: &[f32], dense_norm_squared: f32) -> f32 {
        (self.norm_squared() - 2.0 * self.dot_dense(dense) + dense_norm_squared).max(0.0)
    }
}
