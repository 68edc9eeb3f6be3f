//! End-to-end pipeline scenarios with a scripted model service, a fake
//! article fetcher, and the in-memory repository. The LLM stage is mocked;
//! everything downstream runs for real.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use uuid::Uuid;

use concept_atlas::core::error::AtlasError;
use concept_atlas::core::types::Source;
use concept_atlas::model::{ChatRequest, ModelCallError, ModelService};
use concept_atlas::pipeline;
use concept_atlas::scraping::ArticleFetcher;
use concept_atlas::AppState;

// ---------------------------------------------------------------------------
// Mocks
// ---------------------------------------------------------------------------

/// Scripted model service. Chat either replays a fixed response or reports
/// the `topic-N` markers it sees in the prompt; embeddings are a
/// deterministic bag-of-words hash, plural-insensitive so singular/plural
/// concept names land on identical vectors.
struct MockModel {
    fixed_chat: Option<String>,
    embed_dim: usize,
    failing_embeds: HashSet<String>,
    chat_calls: AtomicUsize,
}

impl MockModel {
    fn fixed(response: &str) -> Self {
        Self {
            fixed_chat: Some(response.to_string()),
            embed_dim: 32,
            failing_embeds: HashSet::new(),
            chat_calls: AtomicUsize::new(0),
        }
    }

    fn topic_reporter() -> Self {
        Self {
            fixed_chat: None,
            embed_dim: 32,
            failing_embeds: HashSet::new(),
            chat_calls: AtomicUsize::new(0),
        }
    }

    fn embedding(&self, name: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.embed_dim];
        for word in name.split_whitespace() {
            let stem = word.trim_end_matches('s');
            let idx: usize = stem.bytes().map(usize::from).sum::<usize>() % self.embed_dim;
            v[idx] += 1.0;
        }
        v
    }
}

#[async_trait]
impl ModelService for MockModel {
    async fn chat(&self, request: ChatRequest) -> Result<String, ModelCallError> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(fixed) = &self.fixed_chat {
            return Ok(fixed.clone());
        }
        // Report each distinct topic marker present in this chunk.
        let mut seen = Vec::new();
        for word in request.prompt.split_whitespace() {
            let word = word.trim_matches(|c: char| !c.is_alphanumeric() && c != '-');
            if word.starts_with("topic-") && !seen.iter().any(|s| s == word) {
                seen.push(word.to_string());
            }
        }
        let entries: Vec<String> = seen
            .iter()
            .map(|t| format!(r#"{{"concept": "{t}", "importance": 0.6}}"#))
            .collect();
        Ok(format!("[{}]", entries.join(",")))
    }

    async fn embed(&self, _model: &str, prompt: &str) -> Result<Vec<f32>, ModelCallError> {
        if self.failing_embeds.contains(prompt) {
            return Err(ModelCallError::Transient("status 503".to_string()));
        }
        Ok(self.embedding(prompt))
    }
}

struct FakeFetcher {
    body: String,
}

#[async_trait]
impl ArticleFetcher for FakeFetcher {
    async fn fetch_article(&self, _url: &str) -> concept_atlas::Result<String> {
        Ok(self.body.clone())
    }
}

fn state_with_model(model: MockModel) -> Arc<AppState> {
    let client = reqwest::Client::new();
    Arc::new(AppState::new(client).with_model(Arc::new(model)))
}

fn long_topic_text() -> String {
    // ~20k chars across 10 sections, each built around one topic marker.
    (1..=10)
        .map(|i| {
            let filler = format!(
                "This section discusses topic-{i} at length. The subject of topic-{i} \
                 matters because it anchors a whole neighborhood of related ideas. "
            )
            .repeat(12);
            format!("{filler}\n\n")
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_empty_input_is_invalid_request() {
    let state = state_with_model(MockModel::fixed("[]"));
    let err = pipeline::vectorize(&state, Source::Text("   ".to_string()), Uuid::new_v4(), None)
        .await
        .unwrap_err();
    match &err {
        AtlasError::InvalidRequest(_) => {}
        other => panic!("expected InvalidRequest, got {other:?}"),
    }
    assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_short_text_produces_positioned_groups() {
    let state = state_with_model(MockModel::fixed(
        r#"[{"concept": "mitochondrion", "importance": 0.9},
            {"concept": "cell biology", "importance": 0.6}]"#,
    ));
    let text = "The mitochondrion is the powerhouse of the cell. Cells contain mitochondria.";
    let groups = pipeline::vectorize(&state, Source::Text(text.to_string()), Uuid::new_v4(), None)
        .await
        .unwrap();

    assert!(!groups.is_empty());
    assert!(groups
        .iter()
        .any(|g| g.concepts.iter().any(|c| c.contains("mitochondri"))));
    for group in &groups {
        assert_eq!(group.reduced_embedding.len(), 3);
        assert!(group.reduced_embedding.iter().all(|x| x.is_finite()));
        assert!((0.0..=1.0).contains(&group.importance_score));
    }
}

#[tokio::test]
async fn test_long_text_runs_map_reduce() {
    let model = MockModel::topic_reporter();
    let state = state_with_model(model);
    let groups = pipeline::vectorize(
        &state,
        Source::Text(long_topic_text()),
        Uuid::new_v4(),
        None,
    )
    .await
    .unwrap();

    assert!(groups.len() >= 5, "got {} groups", groups.len());

    // Every concept appears in exactly one group; ids are the index; the
    // connection lists are sorted and never self-referential.
    let mut seen: HashSet<String> = HashSet::new();
    for (i, group) in groups.iter().enumerate() {
        assert_eq!(group.group_id, i);
        for name in &group.concepts {
            assert!(seen.insert(name.clone()), "duplicate concept {name}");
        }
        assert!(!group.connections.contains(&i));
        for pair in group.connections.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }
}

#[tokio::test]
async fn test_map_reduce_observable_via_chat_counter() {
    let model = Arc::new(MockModel::topic_reporter());
    let client = reqwest::Client::new();
    let state = Arc::new(AppState::new(client).with_model(model.clone()));
    pipeline::vectorize(
        &state,
        Source::Text(long_topic_text()),
        Uuid::new_v4(),
        None,
    )
    .await
    .unwrap();
    assert!(
        model.chat_calls.load(Ordering::SeqCst) > 1,
        "long input must fan out over chunks"
    );
}

#[tokio::test]
async fn test_near_duplicate_concepts_share_a_group() {
    let state = state_with_model(MockModel::fixed(
        r#"[{"concept": "neural network", "importance": 0.8},
            {"concept": "neural networks", "importance": 0.7},
            {"concept": "gardening", "importance": 0.4}]"#,
    ));
    let groups = pipeline::vectorize(
        &state,
        Source::Text("about neural networks and gardening".to_string()),
        Uuid::new_v4(),
        None,
    )
    .await
    .unwrap();

    let nn_group = groups
        .iter()
        .find(|g| g.concepts.iter().any(|c| c == "neural network"))
        .expect("neural network group");
    assert!(
        nn_group.concepts.iter().any(|c| c == "neural networks"),
        "plural variant must merge into the same group"
    );
    // Higher importance leads the member list.
    assert_eq!(nn_group.concepts[0], "neural network");
}

#[tokio::test]
async fn test_embedding_failure_after_retries_maps_to_model_service() {
    let mut model = MockModel::fixed(
        r#"[{"concept": "alpha", "importance": 0.5},
            {"concept": "beta", "importance": 0.5},
            {"concept": "gamma", "importance": 0.5}]"#,
    );
    model.failing_embeds.insert("gamma".to_string());
    let state = state_with_model(model);
    let err = pipeline::vectorize(
        &state,
        Source::Text("alpha beta gamma".to_string()),
        Uuid::new_v4(),
        None,
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), "ModelService");
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_url_scrape_persists_source_url() {
    let article = "The ecology of kelp forests. ".repeat(180); // ~5,000 chars
    let model = MockModel::fixed(r#"[{"concept": "kelp forests", "importance": 0.9}]"#);
    let client = reqwest::Client::new();
    let state = Arc::new(
        AppState::new(client)
            .with_model(Arc::new(model))
            .with_fetcher(Arc::new(FakeFetcher { body: article })),
    );

    let user_id = Uuid::new_v4();
    let url = "https://example.org/kelp-article";
    let groups = pipeline::vectorize(
        &state,
        Source::Url(url.to_string()),
        user_id,
        Some("kelp.txt".to_string()),
    )
    .await
    .unwrap();
    assert!(!groups.is_empty());

    let texts = pipeline::texts_by_concept(&state, user_id, "kelp forests")
        .await
        .unwrap();
    assert_eq!(texts.len(), 1);
    assert_eq!(texts[0].source_url.as_deref(), Some(url));
    assert_eq!(texts[0].filename, "kelp.txt");
    assert!(texts[0].file_size.unwrap() > 4_000);
    assert!(texts[0].url.starts_with("blob://"));
}

#[tokio::test]
async fn test_no_concepts_extracted() {
    let state = state_with_model(MockModel::fixed("[]"));
    let err = pipeline::vectorize(
        &state,
        Source::Text("some text".to_string()),
        Uuid::new_v4(),
        None,
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), "NoConceptsExtracted");
    assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_pipeline_deterministic_with_mocked_model() {
    let run = || async {
        let state = state_with_model(MockModel::topic_reporter());
        let groups = pipeline::vectorize(
            &state,
            Source::Text(long_topic_text()),
            Uuid::nil(),
            Some("same.txt".to_string()),
        )
        .await
        .unwrap();
        serde_json::to_string(&groups).unwrap()
    };
    assert_eq!(run().await, run().await);
}
