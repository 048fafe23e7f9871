//! End-to-end behaviour of index → cluster → search/recommend → evaluate
//! on a small two-topic corpus.

use crate::common::sports_finance_corpus;
use clusearch::evaluation::{RelevanceJudgment, precision_recall_f1};
use clusearch::vector::ClusterAggregation;
use clusearch::{ClusteringMode, Document, EngineConfig, EngineError, SearchEngine};
use std::collections::HashSet;

fn two_topic_engine() -> SearchEngine {
    let engine = SearchEngine::new(EngineConfig {
        mode: ClusteringMode::Partition { k: 2 },
        ..EngineConfig::default()
    })
    .unwrap();
    engine.add_documents(sports_finance_corpus()).unwrap();
    engine.perform_clustering().unwrap();
    engine
}

#[test]
fn test_two_topics_form_two_clusters() {
    let engine = two_topic_engine();
    let snapshot = engine.snapshot().unwrap();
    let clusters = snapshot.clusters().unwrap();

    assert_eq!(clusters.cluster_count(), 2);
    for (_, members) in clusters.clustered_documents() {
        assert_eq!(members.len(), 3);
        let topics: HashSet<&str> = members
            .iter()
            .map(|&p| {
                let id = snapshot.index().documents()[p].id.as_str();
                id.split('_').next().unwrap()
            })
            .collect();
        assert_eq!(topics.len(), 1, "cluster mixes topics: {members:?}");
    }
}

#[test]
fn test_query_routes_to_sports_cluster() {
    let engine = two_topic_engine();
    let routed = engine
        .search_routed("championship final score", engine.config().search_threshold)
        .unwrap();

    let winner = routed.cluster.unwrap();
    let sports_score = routed
        .cluster_scores
        .iter()
        .find(|s| s.cluster == winner)
        .unwrap()
        .score;
    let finance_score = routed
        .cluster_scores
        .iter()
        .find(|s| s.cluster != winner)
        .unwrap()
        .score;
    assert!(finance_score < sports_score);

    assert!(!routed.results.is_empty());
    assert!(routed.results[0].score.get() > 0.0);
    assert_eq!(routed.results[0].id.as_str(), "sports_1");
    assert!(
        routed
            .results
            .iter()
            .all(|r| r.id.as_str().starts_with("sports"))
    );
}

#[test]
fn test_search_results_sorted_and_thresholded() {
    let engine = two_topic_engine();
    for query in ["team final", "market interest", "bank", "the", "unknown words"] {
        for threshold in [0.0, 0.02, 0.2] {
            let results = engine.search_with_threshold(query, threshold).unwrap();
            for pair in results.windows(2) {
                assert!(pair[0].score >= pair[1].score, "unsorted for {query}");
            }
            assert!(results.iter().all(|r| r.score.get() >= threshold));
        }
    }
}

#[test]
fn test_search_is_idempotent() {
    let engine = two_topic_engine();
    let first = engine.search("interest rates inflation").unwrap();
    let second = engine.search("interest rates inflation").unwrap();
    assert_eq!(first, second);
    assert!(first.iter().all(|r| r.id.as_str().starts_with("finance")));
}

#[test]
fn test_out_of_vocabulary_query_returns_nothing() {
    let engine = two_topic_engine();
    assert!(engine.search("quantum entanglement").unwrap().is_empty());
}

#[test]
fn test_mean_and_sum_aggregation_agree_on_balanced_clusters() {
    let mean = two_topic_engine();
    let sum = SearchEngine::new(EngineConfig {
        mode: ClusteringMode::Partition { k: 2 },
        aggregation: ClusterAggregation::Sum,
        ..EngineConfig::default()
    })
    .unwrap();
    sum.add_documents(sports_finance_corpus()).unwrap();
    sum.perform_clustering().unwrap();

    assert_eq!(
        mean.search("stock market").unwrap(),
        sum.search("stock market").unwrap()
    );
}

#[test]
fn test_recommend_never_returns_reference() {
    let mut corpus = sports_finance_corpus();
    let duplicate_text = corpus[0].text.clone();
    corpus.push(Document::new("sports_1_copy", duplicate_text));

    let engine = SearchEngine::new(EngineConfig::default()).unwrap();
    engine.add_documents(corpus).unwrap();

    let results = engine.recommend_with_threshold(&"sports_1".into(), 0.0).unwrap();
    assert!(results.iter().all(|r| r.id.as_str() != "sports_1"));
    assert_eq!(results[0].id.as_str(), "sports_1_copy");
    assert_eq!(results.len(), 6);

    let results = engine
        .recommend_with_threshold(&"sports_1_copy".into(), 0.0)
        .unwrap();
    assert!(results.iter().all(|r| r.id.as_str() != "sports_1_copy"));
    assert_eq!(results[0].id.as_str(), "sports_1");
}

#[test]
fn test_recommend_scans_every_cluster() {
    let engine = two_topic_engine();
    // "the" is shared by every document, so at threshold 0 all five others come back
    let results = engine.recommend_with_threshold(&"finance_2".into(), 0.0).unwrap();
    assert_eq!(results.len(), 5);
    assert!(results[0].id.as_str().starts_with("finance"));
    for pair in results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[test]
fn test_empty_corpus_leaves_no_state() {
    let engine = SearchEngine::new(EngineConfig::default()).unwrap();
    assert!(matches!(
        engine.add_documents(Vec::new()),
        Err(EngineError::EmptyCorpus)
    ));
    assert!(matches!(engine.snapshot(), Err(EngineError::IndexNotBuilt)));
    assert!(matches!(
        engine.search("anything"),
        Err(EngineError::IndexNotBuilt)
    ));
}

#[test]
fn test_small_corpus_reduces_partition_count() {
    let engine = SearchEngine::new(EngineConfig::default()).unwrap();
    engine.add_documents(sports_finance_corpus()).unwrap();
    // k = 6 with 6 documents becomes max(2, 6 / 2) = 3
    let overview = engine.perform_clustering().unwrap();
    assert!(overview.clusters.len() <= 3);
    assert_eq!(overview.clusters.iter().map(|c| c.members).sum::<usize>(), 6);
    assert_eq!(overview.noise, 0);
}

#[test]
fn test_single_document_cannot_be_partitioned() {
    let engine = SearchEngine::new(EngineConfig::default()).unwrap();
    engine
        .add_documents(vec![Document::new("only", "a lonely document")])
        .unwrap();
    assert!(matches!(
        engine.perform_clustering(),
        Err(EngineError::InsufficientData {
            documents: 1,
            required: 2
        })
    ));
}

#[test]
fn test_evaluate_search() {
    let engine = two_topic_engine();
    let judgment = RelevanceJudgment::explicit(["sports_1", "sports_2"]);
    let report = engine.evaluate("championship", Some(&judgment)).unwrap();

    // sports_1 and sports_2 are the only documents mentioning the query
    assert!((report.precision - 1.0).abs() < 1e-6);
    assert!((report.recall - 1.0).abs() < 1e-6);
    assert!((report.ndcg - 1.0).abs() < 1e-6);

    let heuristic = engine.evaluate("championship", None).unwrap();
    assert_eq!(heuristic, report);
}

#[test]
fn test_precision_recall_scenario() {
    let recommended: HashSet<&str> = ["A", "B", "C"].into();
    let relevant: HashSet<&str> = ["B", "C", "D"].into();
    let metrics = precision_recall_f1(&recommended, &relevant);
    assert!((metrics.precision - 2.0 / 3.0).abs() < 1e-6);
    assert!((metrics.recall - 2.0 / 3.0).abs() < 1e-6);
    assert!((metrics.f1 - 2.0 / 3.0).abs() < 1e-6);
}
