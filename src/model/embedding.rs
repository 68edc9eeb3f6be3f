//! Concurrent batched embedding generation. Every concept name becomes one
//! embedding call; calls run in parallel under the shared semaphore, each
//! with its own retry budget, and results come back in input order.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use backoff::future::retry;
use backoff::ExponentialBackoffBuilder;
use futures::stream::{self, StreamExt};
use tokio::sync::Semaphore;
use tracing::{debug, info};

use super::{ModelCallError, ModelService};
use crate::core::error::{AtlasError, Result};

/// Retries per embedding call on transient transport errors.
const MAX_RETRIES: u32 = 2;
const BACKOFF_BASE_MS: u64 = 200;
const BACKOFF_FACTOR: f64 = 2.0;
const BACKOFF_JITTER: f64 = 0.25;

pub struct EmbeddingClient {
    service: Arc<dyn ModelService>,
    model: String,
    limit: Arc<Semaphore>,
}

impl EmbeddingClient {
    pub fn new(service: Arc<dyn ModelService>, model: String, limit: Arc<Semaphore>) -> Self {
        Self {
            service,
            model,
            limit,
        }
    }

    /// Embed every name; the output index matches the input index. Partial
    /// failure after retries is fatal for the whole batch, as is any
    /// dimension disagreement between returned vectors.
    pub async fn embed_all(&self, names: &[String]) -> Result<Vec<Vec<f32>>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let owned: Vec<String> = names.to_vec();
        let indexed: Vec<(usize, Vec<f32>)> = stream::iter(owned.into_iter().enumerate())
            .map(|(i, name)| async move { self.embed_one(i, &name).await })
            // All futures are in flight at once; the shared semaphore alone
            // bounds how many calls actually run.
            .buffer_unordered(names.len())
            .collect::<Vec<Result<(usize, Vec<f32>)>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        let mut out: Vec<Vec<f32>> = vec![Vec::new(); names.len()];
        for (i, vector) in indexed {
            out[i] = vector;
        }

        let dim = out[0].len();
        if let Some(bad) = out.iter().position(|v| v.len() != dim) {
            return Err(AtlasError::EmbeddingDimensionMismatch(format!(
                "vector {} has dimension {}, expected {}",
                bad,
                out[bad].len(),
                dim
            )));
        }

        info!("embedded {} concepts (dimension {})", out.len(), dim);
        Ok(out)
    }

    async fn embed_one(&self, i: usize, name: &str) -> Result<(usize, Vec<f32>)> {
        let _permit = self
            .limit
            .acquire()
            .await
            .map_err(|e| AtlasError::ModelService(e.to_string()))?;
        let vector = self.embed_with_retry(name).await?;
        Ok((i, vector))
    }

    async fn embed_with_retry(&self, name: &str) -> Result<Vec<f32>> {
        let attempts = AtomicU32::new(0);
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(std::time::Duration::from_millis(BACKOFF_BASE_MS))
            .with_multiplier(BACKOFF_FACTOR)
            .with_randomization_factor(BACKOFF_JITTER)
            .with_max_elapsed_time(None)
            .build();

        retry(policy, || async {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            match self.service.embed(&self.model, name).await {
                Ok(vector) => Ok(vector),
                Err(ModelCallError::Permanent(e)) => {
                    Err(backoff::Error::permanent(AtlasError::ModelService(format!(
                        "embedding '{name}' rejected: {e}"
                    ))))
                }
                Err(ModelCallError::Transient(e)) if attempt >= MAX_RETRIES => {
                    Err(backoff::Error::permanent(AtlasError::ModelService(format!(
                        "embedding '{name}' failed after {} attempts: {e}",
                        attempt + 1
                    ))))
                }
                Err(ModelCallError::Transient(e)) => {
                    debug!("transient embedding failure for '{name}' (attempt {attempt}): {e}");
                    Err(backoff::Error::transient(AtlasError::ModelService(
                        e.to_string(),
                    )))
                }
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChatRequest;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    /// Deterministic pseudo-embedding keyed on the prompt, with optional
    /// scripted failures per prompt.
    struct FakeEmbedder {
        dims: HashMap<String, usize>,
        default_dim: usize,
        transient_failures: Mutex<HashMap<String, u32>>,
        permanent: Vec<String>,
        calls: AtomicUsize,
    }

    impl FakeEmbedder {
        fn new(default_dim: usize) -> Self {
            Self {
                dims: HashMap::new(),
                default_dim,
                transient_failures: Mutex::new(HashMap::new()),
                permanent: Vec::new(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ModelService for FakeEmbedder {
        async fn chat(&self, _r: ChatRequest) -> std::result::Result<String, ModelCallError> {
            Err(ModelCallError::Permanent("not scripted".to_string()))
        }

        async fn embed(
            &self,
            _model: &str,
            prompt: &str,
        ) -> std::result::Result<Vec<f32>, ModelCallError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.permanent.iter().any(|p| p == prompt) {
                return Err(ModelCallError::Permanent("status 400".to_string()));
            }
            {
                let mut failures = self.transient_failures.lock().unwrap();
                if let Some(left) = failures.get_mut(prompt) {
                    if *left > 0 {
                        *left -= 1;
                        return Err(ModelCallError::Transient("status 503".to_string()));
                    }
                }
            }
            let dim = self.dims.get(prompt).copied().unwrap_or(self.default_dim);
            Ok((0..dim).map(|i| (i as f32) / (dim as f32)).collect())
        }
    }

    fn client(service: Arc<FakeEmbedder>) -> EmbeddingClient {
        EmbeddingClient::new(service, "embed-model".to_string(), Arc::new(Semaphore::new(4)))
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_results_in_input_order() {
        let service = Arc::new(FakeEmbedder::new(8));
        let c = client(service);
        let out = c.embed_all(&names(&["a", "b", "c"])).await.unwrap();
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|v| v.len() == 8));
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let mut service = FakeEmbedder::new(4);
        service
            .transient_failures
            .lock()
            .unwrap()
            .insert("flaky".to_string(), 2);
        let service = Arc::new(service);
        let c = client(service.clone());
        let out = c.embed_all(&names(&["flaky", "stable"])).await.unwrap();
        assert_eq!(out.len(), 2);
        // 2 failures + 1 success for "flaky", 1 for "stable".
        assert_eq!(service.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_retry_budget_exhausted_is_fatal() {
        let mut service = FakeEmbedder::new(4);
        service
            .transient_failures
            .lock()
            .unwrap()
            .insert("down".to_string(), 10);
        let service = Arc::new(service);
        let c = client(service.clone());
        match c.embed_all(&names(&["down"])).await {
            Err(AtlasError::ModelService(_)) => {}
            other => panic!("expected ModelService, got {other:?}"),
        }
        // Initial attempt + 2 retries, nothing more.
        assert_eq!(service.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_not_retried() {
        let mut service = FakeEmbedder::new(4);
        service.permanent.push("bad".to_string());
        let service = Arc::new(service);
        let c = client(service.clone());
        assert!(c.embed_all(&names(&["bad"])).await.is_err());
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dimension_mismatch() {
        let mut service = FakeEmbedder::new(8);
        service.dims.insert("odd".to_string(), 5);
        let service = Arc::new(service);
        let c = client(service);
        match c.embed_all(&names(&["ok", "odd"])).await {
            Err(AtlasError::EmbeddingDimensionMismatch(_)) => {}
            other => panic!("expected EmbeddingDimensionMismatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_input() {
        let service = Arc::new(FakeEmbedder::new(8));
        let c = client(service);
        assert!(c.embed_all(&[]).await.unwrap().is_empty());
    }
}
