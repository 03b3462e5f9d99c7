//! The physical-backend seam behind [`crate::Store`].

use async_trait::async_trait;
use curator_shared::{EmbeddingRecord, FeedbackState, Result, SeenUrls};

/// One physical home for curator state.
///
/// Loads against an empty or missing backing store return empty values,
/// never an error. Saves replace the stored document wholesale.
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Short name used in logs and health reports.
    fn name(&self) -> &'static str;

    async fn load_urls(&self) -> Result<SeenUrls>;
    async fn save_urls(&self, urls: &SeenUrls) -> Result<()>;

    async fn load_embeddings(&self) -> Result<Vec<EmbeddingRecord>>;
    async fn save_embeddings(&self, records: &[EmbeddingRecord]) -> Result<()>;

    async fn load_feedback(&self) -> Result<FeedbackState>;
    async fn save_feedback(&self, state: &FeedbackState) -> Result<()>;
}
