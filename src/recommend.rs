//! Whole-corpus "more like this" recommendation.
//!
//! Unlike search, recommendation ignores clusters: every indexed document,
//! noise included, is a candidate.

use crate::document::Document;
use crate::vector::router::rank_positions;
use crate::vector::{CorpusIndex, RankedResult, SparseVector, cosine_similarity};
use rayon::prelude::*;
use tracing::debug;

/// Ranks the corpus by similarity to `reference`.
///
/// When the reference is an indexed document (matched by id) its stored
/// vector is used and only that corpus entry is excluded, so a duplicate
/// under another id is still recommended. An external reference is
/// vectorized on the fly and every corpus entry with identical text is
/// excluded.
///
/// Results are sorted by descending similarity, ties in corpus order, and
/// keep only scores `>= threshold`.
pub fn recommend(index: &CorpusIndex, reference: &Document, threshold: f32) -> Vec<RankedResult> {
    let (query, excluded): (SparseVector, Vec<usize>) = match index.position_of(&reference.id) {
        Some(position) => (index.vectors()[position].clone(), vec![position]),
        None => {
            let duplicates = index
                .documents()
                .iter()
                .enumerate()
                .filter(|(_, doc)| doc.text == reference.text)
                .map(|(i, _)| i)
                .collect();
            (index.vectorize(&reference.text), duplicates)
        }
    };

    let similarities: Vec<f32> = index
        .vectors()
        .par_iter()
        .map(|v| cosine_similarity(&query, v))
        .collect();

    let results = rank_positions(
        index,
        (0..index.len()).filter(|p| !excluded.contains(p)),
        |p| similarities[p],
        threshold,
    );
    debug!(
        "Recommendation for '{}' kept {} of {} candidate(s) at threshold {threshold}",
        reference.id,
        results.len(),
        index.len() - excluded.len()
    );
    results
}
