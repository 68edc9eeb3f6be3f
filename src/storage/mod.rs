//! Storage seams. Users, concepts, and uploaded-text references live in an
//! external column store; text blobs live behind a CDN. Both are consumed
//! through small traits so the pipeline never couples to a driver, and the
//! in-memory implementations back tests and storage-less deployments.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::core::error::Result;
use crate::core::types::{normalize_concept_name, TextReference};

#[async_trait]
pub trait ConceptRepository: Send + Sync {
    async fn save_user_concepts(&self, user_id: Uuid, concepts: &[String]) -> Result<()>;
    async fn save_text_reference(&self, reference: &TextReference) -> Result<()>;
    async fn find_texts_by_concept(
        &self,
        user_id: Uuid,
        concept: &str,
    ) -> Result<Vec<TextReference>>;
    async fn find_user_concepts(&self, user_id: Uuid) -> Result<Vec<String>>;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload `content` and return its public URL.
    async fn upload_text(&self, user_id: Uuid, filename: &str, content: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// In-memory implementations
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryRepository {
    references: RwLock<HashMap<Uuid, Vec<TextReference>>>,
    concepts: RwLock<HashMap<Uuid, BTreeSet<String>>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConceptRepository for MemoryRepository {
    async fn save_user_concepts(&self, user_id: Uuid, concepts: &[String]) -> Result<()> {
        let mut store = self.concepts.write().await;
        let entry = store.entry(user_id).or_default();
        for concept in concepts {
            entry.insert(normalize_concept_name(concept));
        }
        Ok(())
    }

    async fn save_text_reference(&self, reference: &TextReference) -> Result<()> {
        self.references
            .write()
            .await
            .entry(reference.user_id)
            .or_default()
            .push(reference.clone());
        Ok(())
    }

    async fn find_texts_by_concept(
        &self,
        user_id: Uuid,
        concept: &str,
    ) -> Result<Vec<TextReference>> {
        let wanted = normalize_concept_name(concept);
        let store = self.references.read().await;
        Ok(store
            .get(&user_id)
            .map(|refs| {
                refs.iter()
                    .filter(|r| r.concepts.iter().any(|c| *c == wanted))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_user_concepts(&self, user_id: Uuid) -> Result<Vec<String>> {
        let store = self.concepts.read().await;
        Ok(store
            .get(&user_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, String>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload_text(&self, user_id: Uuid, filename: &str, content: &str) -> Result<String> {
        let url = format!("blob://local/{user_id}/{filename}");
        self.blobs
            .write()
            .await
            .insert(url.clone(), content.to_string());
        Ok(url)
    }
}
