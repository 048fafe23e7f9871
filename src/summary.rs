//! Query-focused excerpts for result display.

use regex::Regex;
use std::sync::LazyLock;

/// Longest excerpt returned, in characters.
pub const MAX_SUMMARY_CHARS: usize = 500;

static SENTENCE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?] +").expect("Invalid regex"));

/// Splits after `.`, `!` or `?` followed by spaces, keeping the punctuation.
fn sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for m in SENTENCE_BREAK.find_iter(text) {
        // Punctuation is a single ASCII byte
        sentences.push(&text[start..m.start() + 1]);
        start = m.end();
    }
    sentences.push(&text[start..]);
    sentences
}

/// Builds an excerpt from the sentences that mention query keywords.
///
/// Each sentence scores one point per lowercase query keyword it contains
/// as a substring. Sentences scoring zero are dropped, the rest are ordered
/// by score (ties keep document order) and joined with single spaces. The
/// result is trimmed and cut to [`MAX_SUMMARY_CHARS`] characters.
pub fn generate_summary(text: &str, query: &str) -> String {
    let keywords: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();

    let mut scored: Vec<(&str, usize)> = sentences(text)
        .into_iter()
        .filter_map(|sentence| {
            let lowered = sentence.to_lowercase();
            let score = keywords.iter().filter(|k| lowered.contains(k.as_str())).count();
            (score > 0).then_some((sentence, score))
        })
        .collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1));

    let joined = scored
        .iter()
        .map(|(sentence, _)| *sentence)
        .collect::<Vec<_>>()
        .join(" ");
    joined.trim().chars().take(MAX_SUMMARY_CHARS).collect()
}
