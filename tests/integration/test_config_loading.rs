//! Settings file → engine configuration → documents on disk.

use crate::common::{TestCorpus, sports_finance_corpus};
use clusearch::config::ClusteringStrategy;
use clusearch::{ClusteringMode, EngineConfig, EngineError, SearchEngine, Settings, load_documents};
use std::fs;

#[test]
fn test_settings_drive_engine() {
    let corpus = TestCorpus::from_documents(&sports_finance_corpus());
    let config_dir = tempfile::TempDir::new().unwrap();
    let config_path = config_dir.path().join("settings.toml");

    let toml_content = format!(
        r#"
documents_path = "{}"

[clustering]
mode = "partition"
partition_count = 2

[search]
threshold = 0.05
"#,
        corpus.path().display()
    );
    fs::write(&config_path, toml_content).unwrap();

    let settings = Settings::load_from(&config_path).unwrap();
    assert_eq!(settings.clustering.mode, ClusteringStrategy::Partition);

    let config = EngineConfig::try_from(&settings).unwrap();
    assert_eq!(config.mode, ClusteringMode::Partition { k: 2 });

    let engine = SearchEngine::new(config).unwrap();
    let documents = load_documents(settings.resolved_documents_path()).unwrap();
    assert_eq!(documents.len(), 6);
    // Name order
    assert_eq!(documents[0].id.as_str(), "finance_1");

    engine.add_documents(documents).unwrap();
    engine.perform_clustering().unwrap();

    let results = engine.search("championship final score").unwrap();
    assert_eq!(results[0].id.as_str(), "sports_1");
    assert!(results.iter().all(|r| r.score.get() >= 0.05));
    assert_eq!(
        results[0].source.as_deref(),
        Some(corpus.path().join("sports_1.txt").as_path())
    );
}

#[test]
fn test_invalid_settings_are_rejected() {
    let config_dir = tempfile::TempDir::new().unwrap();
    let config_path = config_dir.path().join("settings.toml");
    fs::write(
        &config_path,
        "[clustering]\nmode = \"density\"\ndensity_min_points = 0\n",
    )
    .unwrap();

    let settings = Settings::load_from(&config_path).unwrap();
    assert!(matches!(
        EngineConfig::try_from(&settings),
        Err(EngineError::InvalidConfiguration {
            parameter: "density_min_points",
            ..
        })
    ));
}

#[test]
fn test_malformed_settings_fail_to_load() {
    let config_dir = tempfile::TempDir::new().unwrap();
    let config_path = config_dir.path().join("settings.toml");
    fs::write(&config_path, "[search]\naggregation = \"median\"\n").unwrap();

    assert!(Settings::load_from(&config_path).is_err());
}

#[test]
fn test_loader_ignores_non_text_files() {
    let corpus = TestCorpus::new();
    corpus.add_file("one.txt", "first document");
    corpus.add_file("two.md", "markdown is not loaded");

    let documents = load_documents(corpus.path()).unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].title.as_deref(), Some("one"));
}
