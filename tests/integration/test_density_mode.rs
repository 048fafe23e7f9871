//! Density clustering: noise handling and the all-noise failure.

use clusearch::{ClusteringMode, Document, EngineConfig, EngineError, SearchEngine};

fn corpus() -> Vec<Document> {
    vec![
        Document::new("solar_a", "solar panel energy"),
        Document::new("solar_b", "solar panel energy storage"),
        Document::new("castle", "medieval castle energy history"),
        Document::new("solar_c", "solar panel energy grid"),
    ]
}

fn density_engine(eps: f32, min_points: usize) -> SearchEngine {
    SearchEngine::new(EngineConfig {
        mode: ClusteringMode::Density { eps, min_points },
        search_threshold: 0.0,
        ..EngineConfig::default()
    })
    .unwrap()
}

#[test]
fn test_outlier_is_noise() {
    let engine = density_engine(0.5, 2);
    engine.add_documents(corpus()).unwrap();
    let overview = engine.perform_clustering().unwrap();

    assert_eq!(overview.clusters.len(), 1);
    assert_eq!(overview.clusters[0].members, 3);
    assert_eq!(overview.noise, 1);

    let snapshot = engine.snapshot().unwrap();
    let clusters = snapshot.clusters().unwrap();
    assert_eq!(clusters.label(2), None);
    assert!(
        clusters
            .clustered_documents()
            .all(|(_, members)| !members.contains(&2))
    );
}

#[test]
fn test_noise_is_never_searched() {
    let engine = density_engine(0.5, 2);
    engine.add_documents(corpus()).unwrap();
    engine.perform_clustering().unwrap();

    let results = engine.search("medieval castle").unwrap();
    assert!(results.iter().all(|r| r.id.as_str() != "castle"));
}

#[test]
fn test_noise_is_still_recommendable() {
    let engine = density_engine(0.5, 2);
    engine.add_documents(corpus()).unwrap();
    engine.perform_clustering().unwrap();

    let results = engine
        .recommend_with_threshold(&"solar_a".into(), 0.1)
        .unwrap();
    assert!(results.iter().any(|r| r.id.as_str() == "castle"));

    let results = engine
        .recommend_with_threshold(&"castle".into(), 0.1)
        .unwrap();
    assert_eq!(results.len(), 3);
}

#[test]
fn test_all_noise_fails() {
    let engine = density_engine(0.1, 2);
    engine
        .add_documents(vec![
            Document::new("a", "apples oranges"),
            Document::new("b", "trains buses"),
            Document::new("c", "violins cellos"),
        ])
        .unwrap();

    assert!(matches!(
        engine.perform_clustering(),
        Err(EngineError::NoValidCluster { documents: 3 })
    ));
    // Failed clustering leaves search unavailable
    assert!(matches!(
        engine.search("apples"),
        Err(EngineError::ClusteringNotPerformed)
    ));
}
