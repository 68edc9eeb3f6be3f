//! Rapid Automatic Keyword Extraction: candidate phrases are maximal runs of
//! content words between stop words / punctuation; each word is scored
//! `degree / frequency` over the phrase co-occurrence graph, and a phrase
//! scores the sum of its word scores.

use std::collections::HashMap;

/// Longest candidate phrase considered; longer runs are noise in practice.
const MAX_PHRASE_WORDS: usize = 4;

pub const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "cannot", "could", "did", "do", "does", "doing", "down", "during", "each",
    "few", "for", "from", "further", "had", "has", "have", "having", "he", "her", "here",
    "hers", "herself", "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it",
    "its", "itself", "just", "me", "more", "most", "my", "myself", "no", "nor", "not", "now",
    "of", "off", "on", "once", "only", "or", "other", "our", "ours", "ourselves", "out",
    "over", "own", "same", "she", "should", "so", "some", "such", "than", "that", "the",
    "their", "theirs", "them", "themselves", "then", "there", "these", "they", "this",
    "those", "through", "to", "too", "under", "until", "up", "very", "was", "we", "were",
    "what", "when", "where", "which", "while", "who", "whom", "why", "will", "with", "would",
    "you", "your", "yours", "yourself", "yourselves",
];

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.binary_search(&word).is_ok()
}

/// Lowercase alphanumeric tokens plus the punctuation/stop-word breaks that
/// delimit candidate phrases.
fn candidate_phrases(text: &str) -> Vec<Vec<String>> {
    let mut phrases = Vec::new();
    let mut current: Vec<String> = Vec::new();

    let flush = |current: &mut Vec<String>, phrases: &mut Vec<Vec<String>>| {
        if !current.is_empty() {
            if current.len() <= MAX_PHRASE_WORDS {
                phrases.push(std::mem::take(current));
            } else {
                current.clear();
            }
        }
    };

    for raw in text.split(|c: char| c.is_whitespace()) {
        // Trailing punctuation (sentence ends, commas, brackets) breaks the
        // phrase; leading punctuation is just stripped.
        let raw = raw.trim_start_matches(|c: char| !c.is_alphanumeric());
        let mut word = String::new();
        let mut broke = false;
        for c in raw.chars() {
            if c.is_alphanumeric() || c == '-' || c == '\'' {
                word.push(c.to_ascii_lowercase());
            } else {
                broke = true;
                break;
            }
        }
        if word.is_empty() || word.chars().all(|c| c.is_numeric()) || is_stop_word(&word) {
            flush(&mut current, &mut phrases);
        } else {
            current.push(word);
            if broke {
                flush(&mut current, &mut phrases);
            }
        }
    }
    flush(&mut current, &mut phrases);
    phrases
}

/// Score every candidate phrase. Keys are the normalized phrase strings.
pub fn rake_scores(text: &str) -> HashMap<String, f64> {
    let phrases = candidate_phrases(text);

    let mut frequency: HashMap<&str, f64> = HashMap::new();
    let mut degree: HashMap<&str, f64> = HashMap::new();
    for phrase in &phrases {
        for word in phrase {
            *frequency.entry(word).or_default() += 1.0;
            // Degree counts co-occurrence with every phrase member, itself
            // included, per the original formulation.
            *degree.entry(word).or_default() += phrase.len() as f64;
        }
    }

    let mut scores: HashMap<String, f64> = HashMap::new();
    for phrase in &phrases {
        let score: f64 = phrase
            .iter()
            .map(|w| degree[w.as_str()] / frequency[w.as_str()])
            .sum();
        let key = phrase.join(" ");
        let entry = scores.entry(key).or_default();
        if score > *entry {
            *entry = score;
        }
    }
    scores
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_words_sorted_for_binary_search() {
        let mut sorted = STOP_WORDS.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, STOP_WORDS, "STOP_WORDS must stay sorted");
    }

    #[test]
    fn test_phrases_split_on_stop_words_and_punctuation() {
        let phrases = candidate_phrases("deep learning is a subset of machine learning, really");
        assert!(phrases.contains(&vec!["deep".to_string(), "learning".to_string()]));
        assert!(phrases.contains(&vec!["subset".to_string()]));
        assert!(phrases.contains(&vec!["machine".to_string(), "learning".to_string()]));
        assert!(phrases.contains(&vec!["really".to_string()]));
    }

    #[test]
    fn test_multiword_phrases_outscore_members() {
        let text = "neural networks process data. neural networks learn representations. \
                    data flows through neural networks.";
        let scores = rake_scores(text);
        let nn = scores["neural networks"];
        let data = scores["data"];
        assert!(nn > data, "phrase score {nn} should beat unigram {data}");
    }

    #[test]
    fn test_deterministic() {
        let text = "graph algorithms traverse nodes and edges efficiently";
        assert_eq!(rake_scores(text), rake_scores(text));
    }
}
