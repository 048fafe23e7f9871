//! Retrieval quality metrics.
//!
//! Set metrics (precision, recall, F1) compare what was recommended with
//! what is relevant; NDCG also rewards placing relevant documents early.
//! All metrics are deterministic and defined as 0 on empty inputs instead
//! of dividing by zero. They lie in `[0, 1]` for duplicate-free
//! recommendation lists, which is what search produces.

use crate::document::{Document, DocumentId};
use serde::Serialize;
use std::collections::HashSet;
use std::hash::Hash;

/// Set-based quality of one recommendation list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PrecisionRecall {
    pub precision: f32,
    pub recall: f32,
    pub f1: f32,
}

/// Precision, recall and their harmonic mean.
///
/// # Examples
///
/// ```
/// use clusearch::evaluation::precision_recall_f1;
/// use std::collections::HashSet;
///
/// let recommended: HashSet<_> = ["A", "B", "C"].into();
/// let relevant: HashSet<_> = ["B", "C", "D"].into();
/// let metrics = precision_recall_f1(&recommended, &relevant);
/// assert!((metrics.precision - 2.0 / 3.0).abs() < 1e-6);
/// assert!((metrics.f1 - 2.0 / 3.0).abs() < 1e-6);
/// ```
#[must_use]
pub fn precision_recall_f1<T: Eq + Hash>(
    recommended: &HashSet<T>,
    relevant: &HashSet<T>,
) -> PrecisionRecall {
    let hits = recommended.intersection(relevant).count() as f32;

    let precision = if recommended.is_empty() {
        0.0
    } else {
        hits / recommended.len() as f32
    };
    let recall = if relevant.is_empty() {
        0.0
    } else {
        hits / relevant.len() as f32
    };
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    PrecisionRecall {
        precision,
        recall,
        f1,
    }
}

/// Normalized Discounted Cumulative Gain over the first `k` recommendations.
///
/// Binary gain: an item at 0-based rank `i` contributes `1 / log2(i + 2)`
/// when relevant. The ideal ordering puts `min(|relevant|, k)` relevant
/// items first. Returns 0 when that ideal is 0.
///
/// `recommended` is expected to be duplicate-free: a relevant id repeated
/// at several ranks gains at each of them, which can lift the result
/// above 1.
#[must_use]
pub fn ndcg<T: Eq + Hash>(recommended: &[T], relevant: &HashSet<T>, k: usize) -> f32 {
    let discount = |rank: usize| 1.0 / ((rank + 2) as f32).log2();

    let dcg: f32 = recommended
        .iter()
        .take(k)
        .enumerate()
        .filter(|(_, item)| relevant.contains(item))
        .map(|(rank, _)| discount(rank))
        .sum();

    let idcg: f32 = (0..relevant.len().min(k)).map(discount).sum();

    if idcg > 0.0 { dcg / idcg } else { 0.0 }
}

/// Which documents count as relevant for a query.
///
/// Supplied by the caller; the engine never infers relevance on its own
/// beyond the substring heuristic offered here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelevanceJudgment {
    relevant: HashSet<DocumentId>,
}

impl RelevanceJudgment {
    /// Explicit relevance set, e.g. from a labeled test collection.
    pub fn explicit(ids: impl IntoIterator<Item = impl Into<DocumentId>>) -> Self {
        Self {
            relevant: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Documents whose text contains the trimmed, lowercased query verbatim.
    ///
    /// An empty query judges nothing relevant.
    pub fn from_substring<'a>(query: &str, documents: impl IntoIterator<Item = &'a Document>) -> Self {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Self::default();
        }
        Self {
            relevant: documents
                .into_iter()
                .filter(|doc| doc.text.to_lowercase().contains(&needle))
                .map(|doc| doc.id.clone())
                .collect(),
        }
    }

    pub fn relevant(&self) -> &HashSet<DocumentId> {
        &self.relevant
    }

    pub fn len(&self) -> usize {
        self.relevant.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relevant.is_empty()
    }
}

/// Metric dictionary for one ranked list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub precision: f32,
    pub recall: f32,
    pub f1: f32,
    pub ndcg: f32,
    /// Cutoff used for NDCG
    pub k: usize,
    /// Size of the relevance judgment
    pub relevant: usize,
}

/// Scores an ordered recommendation list against a relevance judgment.
#[must_use]
pub fn evaluate(recommended: &[DocumentId], judgment: &RelevanceJudgment, k: usize) -> EvaluationReport {
    let recommended_set: HashSet<DocumentId> = recommended.iter().cloned().collect();
    let set_metrics = precision_recall_f1(&recommended_set, judgment.relevant());

    EvaluationReport {
        precision: set_metrics.precision,
        recall: set_metrics.recall,
        f1: set_metrics.f1,
        ndcg: ndcg(recommended, judgment.relevant(), k),
        k,
        relevant: judgment.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&'static str]) -> HashSet<&'static str> {
        items.iter().copied().collect()
    }

    #[test]
    fn test_precision_recall_f1_scenario() {
        let metrics = precision_recall_f1(&set(&["A", "B", "C"]), &set(&["B", "C", "D"]));
        assert!((metrics.precision - 2.0 / 3.0).abs() < 1e-6);
        assert!((metrics.recall - 2.0 / 3.0).abs() < 1e-6);
        assert!((metrics.f1 - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_precision_recall_empty_inputs() {
        let empty: HashSet<&str> = HashSet::new();
        let metrics = precision_recall_f1(&empty, &set(&["A"]));
        assert_eq!(metrics, PrecisionRecall { precision: 0.0, recall: 0.0, f1: 0.0 });

        let metrics = precision_recall_f1(&set(&["A"]), &empty);
        assert_eq!(metrics.f1, 0.0);

        let metrics = precision_recall_f1(&set(&["A"]), &set(&["B"]));
        assert_eq!(metrics.f1, 0.0);
    }

    #[test]
    fn test_ndcg_perfect_ranking() {
        assert!((ndcg(&["A", "B", "C"], &set(&["A", "B"]), 10) - 1.0).abs() < 1e-6);
        assert!((ndcg(&["A"], &set(&["A"]), 1) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_ndcg_no_relevant_items() {
        assert_eq!(ndcg(&["A", "B"], &set(&["X"]), 10), 0.0);
        assert_eq!(ndcg(&["A", "B"], &HashSet::new(), 10), 0.0);
        assert_eq!(ndcg::<&str>(&[], &set(&["A"]), 10), 0.0);
        assert_eq!(ndcg(&["A"], &set(&["A"]), 0), 0.0);
    }

    #[test]
    fn test_ndcg_rewards_early_hits() {
        let relevant = set(&["R"]);
        let early = ndcg(&["R", "x", "y"], &relevant, 3);
        let late = ndcg(&["x", "y", "R"], &relevant, 3);
        assert!(early > late);
        // rank 2: 1 / log2(4)
        assert!((late - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_ndcg_counts_repeated_ids_at_every_rank() {
        let relevant = set(&["A"]);
        assert!((ndcg(&["A", "B", "C"], &relevant, 3) - 1.0).abs() < 1e-6);
        // 1 + 1/log2(3) + 1/log2(4)
        let repeated = ndcg(&["A", "A", "A"], &relevant, 3);
        assert!((repeated - 2.130_93).abs() < 1e-4);
    }

    #[test]
    fn test_ndcg_respects_cutoff() {
        assert_eq!(ndcg(&["x", "y", "R"], &set(&["R"]), 2), 0.0);
    }

    #[test]
    fn test_substring_judgment() {
        let docs = vec![
            Document::new("a", "The Final Score was close"),
            Document::new("b", "final exams"),
            Document::new("c", "score"),
        ];
        let judgment = RelevanceJudgment::from_substring("  final score ", &docs);
        assert_eq!(judgment.len(), 1);
        assert!(judgment.relevant().contains(&DocumentId::from("a")));

        assert!(RelevanceJudgment::from_substring("   ", &docs).is_empty());
    }

    #[test]
    fn test_evaluate_report() {
        let recommended: Vec<DocumentId> = ["a", "b", "c"].into_iter().map(DocumentId::from).collect();
        let judgment = RelevanceJudgment::explicit(["b", "c", "d"]);
        let report = evaluate(&recommended, &judgment, 10);

        assert!((report.precision - 2.0 / 3.0).abs() < 1e-6);
        assert!((report.recall - 2.0 / 3.0).abs() < 1e-6);
        assert!(report.ndcg > 0.0 && report.ndcg < 1.0);
        assert_eq!(report.k, 10);
        assert_eq!(report.relevant, 3);
    }
}
