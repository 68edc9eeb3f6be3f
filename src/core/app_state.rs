use std::sync::Arc;

use crate::core::config;
use crate::model::{HttpModelService, ModelService};
use crate::scraping::{ArticleFetcher, ArticleScraper};
use crate::storage::{BlobStore, ConceptRepository, MemoryBlobStore, MemoryRepository};

/// Process-wide shared handles. Everything here is thread-safe and cheap to
/// clone behind the `Arc`; per-request state never lives in it.
#[derive(Clone)]
pub struct AppState {
    pub http_client: reqwest::Client,
    pub model: Arc<dyn ModelService>,
    pub repository: Arc<dyn ConceptRepository>,
    pub blob_store: Arc<dyn BlobStore>,
    pub fetcher: Arc<dyn ArticleFetcher>,
    /// Scraped article bodies, keyed by URL.
    pub article_cache: moka::future::Cache<String, String>,
    /// Caps concurrent model-service calls across embedding fan-out and
    /// map-reduce extraction.
    pub model_limit: Arc<tokio::sync::Semaphore>,
    pub chat_model: String,
    pub embed_model: String,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("chat_model", &self.chat_model)
            .field("embed_model", &self.embed_model)
            .finish()
    }
}

impl AppState {
    pub fn new(http_client: reqwest::Client) -> Self {
        let model: Arc<dyn ModelService> = Arc::new(HttpModelService::new(
            http_client.clone(),
            config::model_service_url(),
        ));
        Self {
            http_client,
            model,
            repository: Arc::new(MemoryRepository::new()),
            blob_store: Arc::new(MemoryBlobStore::new()),
            fetcher: Arc::new(ArticleScraper::new()),
            article_cache: moka::future::Cache::builder()
                .max_capacity(10_000)
                .time_to_live(std::time::Duration::from_secs(60 * 30))
                .build(),
            model_limit: Arc::new(tokio::sync::Semaphore::new(config::embed_concurrency())),
            chat_model: config::chat_model(),
            embed_model: config::embed_model(),
        }
    }

    pub fn with_model(mut self, model: Arc<dyn ModelService>) -> Self {
        self.model = model;
        self
    }

    pub fn with_repository(mut self, repository: Arc<dyn ConceptRepository>) -> Self {
        self.repository = repository;
        self
    }

    pub fn with_blob_store(mut self, blob_store: Arc<dyn BlobStore>) -> Self {
        self.blob_store = blob_store;
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn ArticleFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }
}
