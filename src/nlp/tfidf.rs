//! TF-IDF scoring for unigrams and bigrams. Term frequency comes from the
//! document; inverse document frequency from the embedded 12k-term reference
//! frequency table under a Zipf assumption (document frequency falls off as
//! 1/rank), so `idf = ln(1 + rank)` with unknown words at the table maximum.

use std::collections::HashMap;
use std::sync::OnceLock;

use super::rake::is_stop_word;

/// Rank-ordered reference frequency table, most frequent word first. 12,000
/// terms: a curated common-word head plus a corpus-derived tail (see the
/// file header for provenance).
const WORD_FREQ_TABLE: &str = include_str!("../../data/word_freq.txt");

fn reference_ranks() -> &'static HashMap<&'static str, usize> {
    static RANKS: OnceLock<HashMap<&'static str, usize>> = OnceLock::new();
    RANKS.get_or_init(|| {
        WORD_FREQ_TABLE
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .enumerate()
            .map(|(rank, word)| (word, rank + 1))
            .collect()
    })
}

fn idf(word: &str) -> f64 {
    let ranks = reference_ranks();
    let rank = ranks.get(word).copied().unwrap_or(ranks.len() + 1);
    (1.0 + rank as f64).ln()
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '-' && c != '\'')
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
        .filter(|s| s.len() > 1 && !s.chars().all(|c| c.is_numeric()))
        .collect()
}

/// Score unigrams and adjacent bigrams by `tf * idf`. Stop words are skipped
/// as unigrams and never anchor a bigram.
pub fn tfidf_scores(text: &str) -> HashMap<String, f64> {
    let tokens = tokenize(text);
    if tokens.is_empty() {
        return HashMap::new();
    }
    let total = tokens.len() as f64;

    let mut counts: HashMap<String, f64> = HashMap::new();
    for token in &tokens {
        if !is_stop_word(token) {
            *counts.entry(token.clone()).or_default() += 1.0;
        }
    }
    for pair in tokens.windows(2) {
        if is_stop_word(&pair[0]) || is_stop_word(&pair[1]) {
            continue;
        }
        *counts.entry(format!("{} {}", pair[0], pair[1])).or_default() += 1.0;
    }

    counts
        .into_iter()
        .map(|(term, count)| {
            let term_idf: f64 = term.split(' ').map(idf).sum();
            let score = (count / total) * term_idf;
            (term, score)
        })
        .collect()
}
