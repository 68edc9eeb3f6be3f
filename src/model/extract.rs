//! Adaptive LLM concept extraction. Short inputs go out as one chat call;
//! long inputs are chunked and extracted concurrently, then merged by
//! normalized name keeping the maximum importance.

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use regex::Regex;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use super::{ChatRequest, ModelService};
use crate::core::error::{AtlasError, Result};
use crate::core::types::{normalize_concept_name, Concept};
use crate::nlp::KeywordCandidate;
use crate::segment::{chunk_text, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};

/// Inputs below this many characters are extracted in a single chat call.
pub const SINGLE_SHOT_MAX_CHARS: usize = 6000;

/// Importance blend weights when a concept matches an NLP candidate.
const LLM_WEIGHT: f64 = 0.7;
const NLP_WEIGHT: f64 = 0.3;

/// Importance assigned to concepts recovered without an explicit score.
const FALLBACK_IMPORTANCE: f64 = 0.5;

pub struct ConceptExtractor {
    service: Arc<dyn ModelService>,
    model: String,
    limit: Arc<Semaphore>,
}

impl ConceptExtractor {
    pub fn new(service: Arc<dyn ModelService>, model: String, limit: Arc<Semaphore>) -> Self {
        Self {
            service,
            model,
            limit,
        }
    }

    /// Extract concepts from `text`, blending importances with the NLP
    /// candidate scores. Fails with `NoConceptsExtracted` when nothing
    /// survives parsing across all chunks.
    pub async fn extract(
        &self,
        text: &str,
        candidates: &[KeywordCandidate],
    ) -> Result<Vec<Concept>> {
        let chars = text.chars().count();
        let mut concepts = if chars < SINGLE_SHOT_MAX_CHARS {
            info!("concept extraction: single-shot ({chars} chars)");
            let response = self.chat_chunk(text, candidates).await?;
            parse_concepts(&response)
        } else {
            let chunks = chunk_text(text, DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP);
            let chunk_count = chunks.len();
            info!("concept extraction: map-reduce over {chunk_count} chunks ({chars} chars)");
            let per_chunk: Vec<Result<Vec<Concept>>> = stream::iter(chunks)
                .map(|chunk| async move {
                    let _permit = self
                        .limit
                        .acquire()
                        .await
                        .map_err(|e| AtlasError::ModelService(e.to_string()))?;
                    let response = self.chat_chunk(&chunk, candidates).await?;
                    Ok(parse_concepts(&response))
                })
                // `buffered` (not unordered) keeps chunk order, which keeps
                // the merged concept order reproducible. All chunk futures are
                // in flight at once; the shared semaphore alone bounds how
                // many calls actually run.
                .buffered(chunk_count)
                .collect()
                .await;

            let mut merged: Vec<Concept> = Vec::new();
            for result in per_chunk {
                merge_keep_max(&mut merged, result?);
            }
            merged
        };

        if concepts.is_empty() {
            return Err(AtlasError::NoConceptsExtracted(
                "model returned no parsable concepts".to_string(),
            ));
        }

        blend_with_candidates(&mut concepts, candidates);
        Ok(concepts)
    }

    async fn chat_chunk(&self, chunk: &str, candidates: &[KeywordCandidate]) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            system: build_system_prompt(candidates),
            prompt: chunk.to_string(),
            num_ctx: context_window_hint(chunk),
        };
        self.service
            .chat(request)
            .await
            .map_err(|e| AtlasError::ModelService(e.to_string()))
    }
}

/// `max(4096, chars/3 + 1024)`, roomy enough for the chunk plus the reply.
fn context_window_hint(text: &str) -> u32 {
    (text.chars().count() as u32 / 3 + 1024).max(4096)
}

fn build_system_prompt(candidates: &[KeywordCandidate]) -> String {
    let mut prompt = String::from(
        "You distill text into the key concepts of a mind map.\n\
         Return a JSON array of objects, each {\"concept\": \"...\", \"importance\": 0.0-1.0}.\n\
         Rules:\n\
         - If the text has any substantive topic, return at least one concept.\n\
         - importance is how central the concept is to the text, between 0 and 1.\n\
         - Prefer multi-word phrases over single words when both convey the idea.\n\
         - Return only the JSON array, no commentary.",
    );
    if !candidates.is_empty() {
        prompt.push_str("\nCandidate keyphrases from statistical analysis (hints, not requirements): ");
        let hints: Vec<&str> = candidates.iter().map(|c| c.text.as_str()).collect();
        prompt.push_str(&hints.join("; "));
    }
    prompt
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawConcept {
    #[serde(alias = "name")]
    concept: String,
    #[serde(default)]
    importance: Option<f64>,
}

/// Parse a model response into deduplicated concepts: structured JSON first,
/// then a lenient pass over bullet-list / comma-separated text.
pub fn parse_concepts(response: &str) -> Vec<Concept> {
    let raw = parse_structured(response).unwrap_or_else(|| parse_loose(response));
    merge_into_new(raw)
}

fn parse_structured(response: &str) -> Option<Vec<Concept>> {
    let start = response.find('[')?;
    let end = response.rfind(']')?;
    if end <= start {
        return None;
    }
    let parsed: Vec<RawConcept> = serde_json::from_str(&response[start..=end]).ok()?;
    let concepts: Vec<Concept> = parsed
        .into_iter()
        .filter(|r| !r.concept.trim().is_empty())
        .map(|r| Concept::new(r.concept, r.importance.unwrap_or(FALLBACK_IMPORTANCE)))
        .collect();
    if concepts.is_empty() {
        None
    } else {
        Some(concepts)
    }
}

fn parse_loose(response: &str) -> Vec<Concept> {
    // "- concept name: 0.8", "* concept (0.7)", "3. concept", "a, b, c"
    let line_re = Regex::new(
        r"(?x)^
          \s*(?:[-*\u{2022}]|\d+[.)])?\s*          # optional bullet / numbering
          (?P<name>[^:(]+?)
          \s*(?:[:(]\s*(?P<score>[0-9]*\.?[0-9]+)\s*\)?)?
          \s*$",
    )
    .ok();
    let Some(line_re) = line_re else {
        warn!("loose concept parser regex failed to compile");
        return Vec::new();
    };

    let mut out = Vec::new();
    for line in response.lines() {
        let line = line.trim().trim_matches('"');
        if line.is_empty() || line.len() > 200 {
            continue;
        }
        let Some(caps) = line_re.captures(line) else {
            continue;
        };
        let score = caps
            .name("score")
            .and_then(|m| m.as_str().parse::<f64>().ok());
        let name_part = caps.name("name").map_or("", |m| m.as_str());

        let parts: Vec<&str> = if score.is_none() && name_part.contains(',') {
            name_part.split(',').collect()
        } else {
            vec![name_part]
        };
        for part in parts {
            let name = normalize_concept_name(part);
            // A plausible concept is a short noun phrase, not a prose line.
            let words = name.split(' ').count();
            if name.is_empty() || words > 6 || !name.chars().any(|c| c.is_alphabetic()) {
                continue;
            }
            out.push(Concept::new(name, score.unwrap_or(FALLBACK_IMPORTANCE)));
        }
    }
    out
}

/// First-occurrence order, maximum importance on name collision.
fn merge_keep_max(into: &mut Vec<Concept>, from: Vec<Concept>) {
    let mut index: HashMap<String, usize> = into
        .iter()
        .enumerate()
        .map(|(i, c)| (c.name.clone(), i))
        .collect();
    for concept in from {
        match index.get(&concept.name) {
            Some(&i) => {
                if concept.importance > into[i].importance {
                    into[i].importance = concept.importance;
                }
            }
            None => {
                index.insert(concept.name.clone(), into.len());
                into.push(concept);
            }
        }
    }
}

fn merge_into_new(from: Vec<Concept>) -> Vec<Concept> {
    let mut out = Vec::new();
    merge_keep_max(&mut out, from);
    out
}

/// `0.7·llm + 0.3·nlp` for concepts that match a candidate by normalized
/// name; others keep their LLM importance.
fn blend_with_candidates(concepts: &mut [Concept], candidates: &[KeywordCandidate]) {
    let nlp: HashMap<String, f64> = candidates
        .iter()
        .map(|c| (normalize_concept_name(&c.text), c.score))
        .collect();
    for concept in concepts {
        if let Some(&nlp_score) = nlp.get(&concept.name) {
            concept.importance =
                (LLM_WEIGHT * concept.importance + NLP_WEIGHT * nlp_score).clamp(0.0, 1.0);
        }
    }
}
