//! TF-IDF vector index over a document corpus.
//!
//! The index is built once per corpus and never grows: the vocabulary is
//! frozen at build time and later text is projected onto it, silently
//! dropping out-of-vocabulary terms.
//!
//! # Weighting
//! - Tokens: lowercase, Unicode word characters, at least two long
//! - Term weight: raw term count times smoothed idf
//!   `ln((1 + n) / (1 + df)) + 1`
//! - Every vector is L2-normalized, so cosine similarity of two indexed
//!   documents reduces to their dot product

use crate::document::Document;
use crate::error::{EngineError, EngineResult};
use crate::vector::SparseVector;
use rayon::prelude::*;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

static TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("Invalid regex"));

/// Source of unique index generations, used to detect stale clusterings.
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Splits normalized text into lowercase terms.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    TOKEN_PATTERN
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn count_terms(text: &str) -> HashMap<String, u32> {
    let mut counts = HashMap::new();
    for token in tokenize(text) {
        *counts.entry(token).or_insert(0) += 1;
    }
    counts
}

/// Frozen term → dimension mapping.
///
/// Dimensions are assigned in lexicographic term order so two builds over
/// the same corpus produce identical vectors.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    terms: Vec<String>,
    dimensions: HashMap<String, u32>,
}

impl Vocabulary {
    fn from_sorted_terms(terms: Vec<String>) -> Self {
        let dimensions = terms
            .iter()
            .enumerate()
            .map(|(i, term)| (term.clone(), i as u32))
            .collect();
        Self { terms, dimensions }
    }

    /// Number of dimensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Dimension of a term, if it is in the vocabulary.
    #[must_use]
    pub fn dimension_of(&self, term: &str) -> Option<usize> {
        self.dimensions.get(term).map(|&d| d as usize)
    }

    /// Term at a dimension.
    #[must_use]
    pub fn term(&self, dimension: usize) -> Option<&str> {
        self.terms.get(dimension).map(String::as_str)
    }
}

/// Documents, their TF-IDF vectors and the vocabulary used to build them.
///
/// Rebuilt wholesale on every indexing call; there is no incremental update.
#[derive(Debug)]
pub struct CorpusIndex {
    generation: u64,
    documents: Vec<Document>,
    vectors: Vec<SparseVector>,
    vocabulary: Vocabulary,
    idf: Vec<f32>,
}

impl CorpusIndex {
    /// Builds the index for a corpus.
    ///
    /// # Errors
    /// `EmptyCorpus` when `documents` is empty.
    pub fn build(documents: Vec<Document>) -> EngineResult<Self> {
        if documents.is_empty() {
            return Err(EngineError::EmptyCorpus);
        }

        let counts: Vec<HashMap<String, u32>> = documents
            .par_iter()
            .map(|doc| count_terms(&doc.text))
            .collect();

        // Document frequency per term, sorted by term
        let mut document_frequency: BTreeMap<&str, u32> = BTreeMap::new();
        for doc_counts in &counts {
            for term in doc_counts.keys() {
                *document_frequency.entry(term.as_str()).or_insert(0) += 1;
            }
        }

        let n = documents.len() as f32;
        let idf: Vec<f32> = document_frequency
            .values()
            .map(|&df| ((1.0 + n) / (1.0 + df as f32)).ln() + 1.0)
            .collect();
        let vocabulary = Vocabulary::from_sorted_terms(
            document_frequency.keys().map(|t| (*t).to_string()).collect(),
        );

        if vocabulary.is_empty() {
            warn!(
                "Corpus of {} document(s) produced an empty vocabulary; all similarities will be 0",
                documents.len()
            );
        }

        let vectors: Vec<SparseVector> = counts
            .par_iter()
            .map(|doc_counts| weigh(doc_counts, &vocabulary, &idf))
            .collect();

        let generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
        info!(
            "Indexed {} document(s), vocabulary size {}",
            documents.len(),
            vocabulary.len()
        );
        debug!("Index generation {generation}");

        Ok(Self {
            generation,
            documents,
            vectors,
            vocabulary,
            idf,
        })
    }

    /// Projects arbitrary text onto the frozen vocabulary.
    ///
    /// The result always has `vocabulary().len()` dimensions; unknown terms
    /// contribute nothing.
    #[must_use]
    pub fn vectorize(&self, text: &str) -> SparseVector {
        weigh(&count_terms(text), &self.vocabulary, &self.idf)
    }

    /// Unique id of this build.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    #[must_use]
    pub fn document(&self, position: usize) -> Option<&Document> {
        self.documents.get(position)
    }

    /// Corpus position of a document id.
    #[must_use]
    pub fn position_of(&self, id: &crate::document::DocumentId) -> Option<usize> {
        self.documents.iter().position(|doc| &doc.id == id)
    }

    #[must_use]
    pub fn vectors(&self) -> &[SparseVector] {
        &self.vectors
    }

    #[must_use]
    pub fn vector(&self, position: usize) -> Option<&SparseVector> {
        self.vectors.get(position)
    }

    #[must_use]
    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Inverse document frequency of a term, if indexed.
    #[must_use]
    pub fn idf(&self, term: &str) -> Option<f32> {
        self.vocabulary.dimension_of(term).map(|d| self.idf[d])
    }

    /// Number of indexed documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

fn weigh(counts: &HashMap<String, u32>, vocabulary: &Vocabulary, idf: &[f32]) -> SparseVector {
    let entries = counts
        .iter()
        .filter_map(|(term, &count)| {
            vocabulary
                .dimension_of(term)
                .map(|d| (d as u32, count as f32 * idf[d]))
        })
        .collect();
    let mut vector = SparseVector::from_entries(vocabulary.len(), entries);
    vector.normalize();
    vector
}

/// Computes cosine similarity between two vectors.
///
/// # Returns
/// * Similarity in [0, 1] for non-negative vectors; 0 when either vector
///   is all-zero
pub fn cosine_similarity(a: &SparseVector, b: &SparseVector) -> f32 {
    let norm_a = a.norm();
    let norm_b = b.norm();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        (a.dot(b) / (norm_a * norm_b)).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<Document> {
        vec![
            Document::new("d1", "the cat sat on the mat"),
            Document::new("d2", "the dog sat on the log"),
            Document::new("d3", "cats and dogs"),
        ]
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("Hello, World! a I x9 año_2"),
            vec!["hello", "world", "x9", "año_2"]
        );
        assert!(tokenize("  ").is_empty());
    }

    #[test]
    fn test_build_empty_corpus() {
        assert!(matches!(
            CorpusIndex::build(Vec::new()),
            Err(EngineError::EmptyCorpus)
        ));
    }

    #[test]
    fn test_vocabulary_is_sorted_and_frozen() {
        let index = CorpusIndex::build(corpus()).unwrap();
        let vocab = index.vocabulary();
        assert_eq!(vocab.term(0), Some("and"));
        assert!(vocab.dimension_of("cat").is_some());
        assert!(vocab.dimension_of("zebra").is_none());

        let before = vocab.len();
        let v = index.vectorize("zebra giraffe cat");
        assert_eq!(index.vocabulary().len(), before);
        assert_eq!(v.dimension(), before);
        assert_eq!(v.nnz(), 1);
    }

    #[test]
    fn test_every_vector_has_vocabulary_dimension() {
        let index = CorpusIndex::build(corpus()).unwrap();
        for v in index.vectors() {
            assert_eq!(v.dimension(), index.vocabulary().len());
            assert!((v.norm() - 1.0).abs() < 1e-5);
            assert!(v.iter().all(|(_, w)| w > 0.0));
        }
    }

    #[test]
    fn test_idf_smoothing() {
        let index = CorpusIndex::build(corpus()).unwrap();
        // "the" appears in 2 of 3 docs: ln(4/3) + 1
        let expected = (4.0f32 / 3.0).ln() + 1.0;
        assert!((index.idf("the").unwrap() - expected).abs() < 1e-6);
        // "cats" appears once: ln(4/2) + 1
        let expected = 2.0f32.ln() + 1.0;
        assert!((index.idf("cats").unwrap() - expected).abs() < 1e-6);
    }

    #[test]
    fn test_out_of_vocabulary_text_is_zero() {
        let index = CorpusIndex::build(corpus()).unwrap();
        let v = index.vectorize("quantum chromodynamics");
        assert!(v.is_zero());
        assert_eq!(cosine_similarity(&v, &index.vectors()[0]), 0.0);
    }

    #[test]
    fn test_cosine_similarity_properties() {
        let index = CorpusIndex::build(corpus()).unwrap();
        let vectors = index.vectors();
        for a in vectors {
            for b in vectors {
                let ab = cosine_similarity(a, b);
                let ba = cosine_similarity(b, a);
                assert!((ab - ba).abs() < 1e-6);
                assert!((0.0..=1.0).contains(&ab));
            }
            assert!((cosine_similarity(a, a) - 1.0).abs() < 1e-5);
        }
        // d1 and d2 share "the", "sat", "on"; d1 and d3 share nothing
        assert!(cosine_similarity(&vectors[0], &vectors[1]) > 0.0);
        assert_eq!(cosine_similarity(&vectors[0], &vectors[2]), 0.0);
    }

    #[test]
    fn test_generations_are_unique() {
        let a = CorpusIndex::build(corpus()).unwrap();
        let b = CorpusIndex::build(corpus()).unwrap();
        assert_ne!(a.generation(), b.generation());
        assert_eq!(a.vectors(), b.vectors());
    }

    #[test]
    fn test_position_lookup() {
        let index = CorpusIndex::build(corpus()).unwrap();
        assert_eq!(index.position_of(&"d2".into()), Some(1));
        assert_eq!(index.position_of(&"missing".into()), None);
        assert_eq!(index.document(2).map(|d| d.id.as_str()), Some("d3"));
        assert_eq!(index.len(), 3);
    }
}
