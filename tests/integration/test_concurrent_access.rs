//! Readers keep working while the index is rebuilt underneath them.

use crate::common::sports_finance_corpus;
use clusearch::{ClusteringMode, EngineConfig, EngineError, SearchEngine};
use std::sync::Arc;
use std::thread;

#[test]
fn test_concurrent_search_during_reindex() {
    let engine = Arc::new(
        SearchEngine::new(EngineConfig {
            mode: ClusteringMode::Partition { k: 2 },
            ..EngineConfig::default()
        })
        .unwrap(),
    );
    engine.add_documents(sports_finance_corpus()).unwrap();
    engine.perform_clustering().unwrap();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for _ in 0..50 {
                    match engine.search("championship final score") {
                        Ok(results) => {
                            for pair in results.windows(2) {
                                assert!(pair[0].score >= pair[1].score);
                            }
                        }
                        // Between a re-index and its clustering
                        Err(EngineError::ClusteringNotPerformed) => {}
                        Err(e) => panic!("unexpected error: {e}"),
                    }
                }
            })
        })
        .collect();

    let writer = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            for _ in 0..10 {
                engine.add_documents(sports_finance_corpus()).unwrap();
                // May lose a race with the next add_documents; never corrupts state
                let _ = engine.perform_clustering();
            }
        })
    };

    for reader in readers {
        reader.join().unwrap();
    }
    writer.join().unwrap();

    engine.perform_clustering().unwrap();
    assert!(!engine.search("championship final score").unwrap().is_empty());
}
