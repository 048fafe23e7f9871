use clusearch::Document;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Three sports and three finance documents sharing only stop words.
/// Only `sports_1` and `sports_2` mention "championship".
pub fn sports_finance_corpus() -> Vec<Document> {
    vec![
        Document::new(
            "sports_1",
            "the team won the championship final with a late score",
        ),
        Document::new(
            "sports_2",
            "fans celebrated the championship team victory after the final whistle",
        ),
        Document::new(
            "sports_3",
            "the coach praised the team defense before the final match",
        ),
        Document::new(
            "finance_1",
            "the bank raised interest rates as inflation pressured the stock market",
        ),
        Document::new(
            "finance_2",
            "investors sold stock shares as the market fell on interest rate fears",
        ),
        Document::new(
            "finance_3",
            "the central bank bond yields and inflation data moved the market",
        ),
    ]
}

/// Directory of `.txt` documents in a temporary location.
pub struct TestCorpus {
    pub dir: TempDir,
}

impl TestCorpus {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    /// Writes each document as `<id>.txt`.
    pub fn from_documents(documents: &[Document]) -> Self {
        let corpus = Self::new();
        for doc in documents {
            corpus.add_file(&format!("{}.txt", doc.id), &doc.text);
        }
        corpus
    }

    pub fn add_file(&self, name: &str, content: &str) -> PathBuf {
        let file_path = self.dir.path().join(name);
        fs::write(&file_path, content).expect("Failed to write file");
        file_path
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

#[test]
fn test_corpus_files_round_trip() {
    let documents = sports_finance_corpus();
    let corpus = TestCorpus::from_documents(&documents);
    let loaded = clusearch::load_documents(corpus.path()).unwrap();

    assert_eq!(loaded.len(), documents.len());
    for doc in &documents {
        let found = loaded.iter().find(|d| d.id == doc.id).unwrap();
        assert_eq!(found.text, doc.text);
    }
}
