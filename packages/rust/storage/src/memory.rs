//! Run-scoped in-memory backend.

use async_trait::async_trait;
use curator_shared::{EmbeddingRecord, FeedbackState, Result, SeenUrls};
use tokio::sync::RwLock;

use crate::backend::StateBackend;

#[derive(Debug, Default)]
struct MemoryState {
    urls: SeenUrls,
    embeddings: Vec<EmbeddingRecord>,
    feedback: FeedbackState,
}

/// Ephemeral backend; state lives as long as the value.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: RwLock<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn load_urls(&self) -> Result<SeenUrls> {
        Ok(self.state.read().await.urls.clone())
    }

    async fn save_urls(&self, urls: &SeenUrls) -> Result<()> {
        self.state.write().await.urls = urls.clone();
        Ok(())
    }

    async fn load_embeddings(&self) -> Result<Vec<EmbeddingRecord>> {
        Ok(self.state.read().await.embeddings.clone())
    }

    async fn save_embeddings(&self, records: &[EmbeddingRecord]) -> Result<()> {
        self.state.write().await.embeddings = records.to_vec();
        Ok(())
    }

    async fn load_feedback(&self) -> Result<FeedbackState> {
        Ok(self.state.read().await.feedback.clone())
    }

    async fn save_feedback(&self, state: &FeedbackState) -> Result<()> {
        self.state.write().await.feedback = state.clone();
        Ok(())
    }
}
