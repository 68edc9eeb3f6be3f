//! Pipeline coordinator: source resolution, concurrent NLP + repository
//! lookup, adaptive concept extraction, embedding fan-out, similarity
//! merging, spatial layout, and persistence. Each request owns all of its
//! intermediate arrays; only the final groups and the text reference cross
//! the boundary.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::error::{AtlasError, Result};
use crate::core::types::{normalize_concept_name, ConceptGroup, Source, TextReference};
use crate::core::AppState;
use crate::layout;
use crate::merge;
use crate::model::embedding::EmbeddingClient;
use crate::model::extract::ConceptExtractor;
use crate::nlp;

/// Group importance blend: member importance vs connection centrality.
const MEMBER_WEIGHT: f64 = 0.7;
const CENTRALITY_WEIGHT: f64 = 0.3;

/// Turn a text or URL into an ordered array of positioned concept groups,
/// persisting the upload and its concepts on success.
pub async fn vectorize(
    state: &Arc<AppState>,
    source: Source,
    user_id: Uuid,
    filename: Option<String>,
) -> Result<Vec<ConceptGroup>> {
    let start = Instant::now();

    // ── Resolve the source to raw text ────────────────────────────────────
    let (text, source_url) = match source {
        Source::Text(text) => (text, None),
        Source::Url(url) => {
            let body = match state.article_cache.get(&url).await {
                Some(cached) => {
                    debug!("article cache hit for {url}");
                    cached
                }
                None => {
                    let body = state.fetcher.fetch_article(&url).await?;
                    state.article_cache.insert(url.clone(), body.clone()).await;
                    body
                }
            };
            (body, Some(url))
        }
    };
    if text.trim().is_empty() {
        return Err(AtlasError::InvalidRequest(
            "input text is empty".to_string(),
        ));
    }

    // ── NLP candidates and stored concepts, in parallel ───────────────────
    let (candidates, stored) = tokio::join!(
        async { nlp::extract_keywords(&text) },
        state.repository.find_user_concepts(user_id)
    );
    match stored {
        Ok(stored) => debug!(
            "user {user_id} has {} previously stored concepts",
            stored.len()
        ),
        Err(e) => warn!("loading stored concepts failed (non-fatal): {e}"),
    }
    info!("nlp produced {} keyword candidates", candidates.len());

    // ── Extract, embed, merge, lay out ────────────────────────────────────
    let extractor = ConceptExtractor::new(
        state.model.clone(),
        state.chat_model.clone(),
        state.model_limit.clone(),
    );
    let concepts = extractor.extract(&text, &candidates).await?;
    info!("extracted {} concepts", concepts.len());

    let embedder = EmbeddingClient::new(
        state.model.clone(),
        state.embed_model.clone(),
        state.model_limit.clone(),
    );
    let names: Vec<String> = concepts.iter().map(|c| c.name.clone()).collect();
    let embeddings = embedder.embed_all(&names).await?;

    let outcome = merge::merge_concepts(&concepts, &embeddings);
    let centroids: Vec<Vec<f64>> = outcome.groups.iter().map(|g| g.centroid.clone()).collect();
    let positions = layout::layout_positions(&centroids, &outcome.group_similarity);

    let total_groups = outcome.groups.len();
    let groups: Vec<ConceptGroup> = outcome
        .groups
        .iter()
        .zip(&positions)
        .zip(&outcome.connections)
        .enumerate()
        .map(|(group_id, ((group, position), connections))| ConceptGroup {
            concepts: group.members.iter().map(|m| m.name.clone()).collect(),
            reduced_embedding: *position,
            connections: connections.clone(),
            importance_score: group_importance(
                group.members[0].importance,
                connections.len(),
                total_groups,
            ),
            group_id,
        })
        .collect();

    // ── Persist the upload ────────────────────────────────────────────────
    let text_id = Uuid::new_v4();
    let filename = filename.unwrap_or_else(|| format!("text-{text_id}.txt"));
    let blob_url = state
        .blob_store
        .upload_text(user_id, &filename, &text)
        .await?;
    state.repository.save_user_concepts(user_id, &names).await?;
    let reference = TextReference {
        text_id,
        user_id,
        filename,
        url: blob_url,
        source_url,
        concepts: names,
        upload_timestamp: Utc::now(),
        file_size: Some(text.len() as u64),
    };
    state.repository.save_text_reference(&reference).await?;

    info!(
        "vectorize: {} groups in {}ms",
        groups.len(),
        start.elapsed().as_millis()
    );
    Ok(groups)
}

/// Thin delegation to the repository.
pub async fn texts_by_concept(
    state: &Arc<AppState>,
    user_id: Uuid,
    concept: &str,
) -> Result<Vec<TextReference>> {
    state
        .repository
        .find_texts_by_concept(user_id, &normalize_concept_name(concept))
        .await
}

/// `0.7·top_member + 0.3·degree/(G-1)`, clamped to [0, 1]; the centrality
/// term vanishes for a single-group map.
fn group_importance(top_member: f64, degree: usize, total_groups: usize) -> f64 {
    let centrality = if total_groups > 1 {
        degree as f64 / (total_groups - 1) as f64
    } else {
        0.0
    };
    (MEMBER_WEIGHT * top_member + CENTRALITY_WEIGHT * centrality).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_importance_blend() {
        assert!((group_importance(1.0, 4, 5) - 1.0).abs() < 1e-9);
        assert!((group_importance(0.5, 0, 5) - 0.35).abs() < 1e-9);
        assert!((group_importance(1.0, 0, 1) - 0.7).abs() < 1e-9);
    }
}
