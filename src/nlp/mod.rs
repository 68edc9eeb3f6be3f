//! NLP keyword candidates: RAKE and TF-IDF scores, normalized and blended.
//! Fully deterministic for a given input; the candidates are hints for the
//! LLM concept extractor and a secondary signal for importance blending.

pub mod rake;
pub mod tfidf;

use std::collections::HashMap;

/// Weight of the RAKE score in the blend; TF-IDF gets the remainder.
const RAKE_WEIGHT: f64 = 0.6;
const TFIDF_WEIGHT: f64 = 0.4;

/// How many candidates the extractor emits.
pub const TOP_CANDIDATES: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct KeywordCandidate {
    pub text: String,
    pub score: f64,
}

/// Min-max normalize scores into [0, 1]. A flat list collapses to 1.0 so a
/// single dominant candidate still carries full weight.
fn normalize(scores: &mut HashMap<String, f64>) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &v in scores.values() {
        min = min.min(v);
        max = max.max(v);
    }
    let range = max - min;
    for v in scores.values_mut() {
        *v = if range > 0.0 { (*v - min) / range } else { 1.0 };
    }
}

/// Top-20 keyword candidates by the 0.6·RAKE + 0.4·TF-IDF blend.
pub fn extract_keywords(text: &str) -> Vec<KeywordCandidate> {
    let mut rake = rake::rake_scores(text);
    let mut tfidf = tfidf::tfidf_scores(text);
    normalize(&mut rake);
    normalize(&mut tfidf);

    let mut combined: HashMap<String, f64> = HashMap::new();
    for (term, score) in &rake {
        *combined.entry(term.clone()).or_default() += RAKE_WEIGHT * score;
    }
    for (term, score) in &tfidf {
        *combined.entry(term.clone()).or_default() += TFIDF_WEIGHT * score;
    }

    let mut candidates: Vec<KeywordCandidate> = combined
        .into_iter()
        .map(|(text, score)| KeywordCandidate { text, score })
        .collect();
    // Name tiebreak keeps the ordering reproducible across hash seeds.
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.text.cmp(&b.text))
    });
    candidates.truncate(TOP_CANDIDATES);
    candidates
}
