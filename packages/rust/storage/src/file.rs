//! JSON-document backend: one file per state kind, written atomically.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use curator_shared::{CuratorError, EmbeddingRecord, FeedbackState, Result, SeenUrls};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::backend::StateBackend;

const URLS_FILE: &str = "seen_urls.json";
const EMBEDDINGS_FILE: &str = "embeddings.json";
const FEEDBACK_FILE: &str = "feedback.json";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UrlsDocument {
    #[serde(default)]
    seen_urls: SeenUrls,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct EmbeddingsDocument {
    #[serde(default)]
    embeddings: Vec<EmbeddingRecord>,
}

/// Durable backend storing `seen_urls.json`, `embeddings.json`, and
/// `feedback.json` in one directory.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    dir: PathBuf,
}

impl JsonFileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn read_document<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T> {
        let path = self.dir.join(name);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(?path, "state file missing, starting empty");
                return Ok(T::default());
            }
            Err(e) => return Err(CuratorError::Storage(format!("read {}: {e}", path.display()))),
        };
        if content.trim().is_empty() {
            return Ok(T::default());
        }
        serde_json::from_str(&content)
            .map_err(|e| CuratorError::Storage(format!("parse {}: {e}", path.display())))
    }

    /// Write to a sibling temp file, then rename over the target.
    async fn write_document<T: Serialize + Sync>(&self, name: &str, value: &T) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| CuratorError::Storage(format!("create {}: {e}", self.dir.display())))?;

        let path = self.dir.join(name);
        let tmp = self.dir.join(format!(".{name}.tmp"));
        let json = serde_json::to_vec_pretty(value)
            .map_err(|e| CuratorError::Storage(format!("serialize {name}: {e}")))?;

        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| CuratorError::Storage(format!("write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| CuratorError::Storage(format!("rename to {}: {e}", path.display())))?;

        tracing::debug!(?path, "state file written");
        Ok(())
    }
}

#[async_trait]
impl StateBackend for JsonFileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn load_urls(&self) -> Result<SeenUrls> {
        let doc: UrlsDocument = self.read_document(URLS_FILE).await?;
        Ok(doc.seen_urls)
    }

    async fn save_urls(&self, urls: &SeenUrls) -> Result<()> {
        let doc = UrlsDocument {
            seen_urls: urls.clone(),
        };
        self.write_document(URLS_FILE, &doc).await
    }

    async fn load_embeddings(&self) -> Result<Vec<EmbeddingRecord>> {
        let doc: EmbeddingsDocument = self.read_document(EMBEDDINGS_FILE).await?;
        Ok(doc.embeddings)
    }

    async fn save_embeddings(&self, records: &[EmbeddingRecord]) -> Result<()> {
        let doc = EmbeddingsDocument {
            embeddings: records.to_vec(),
        };
        self.write_document(EMBEDDINGS_FILE, &doc).await
    }

    async fn load_feedback(&self) -> Result<FeedbackState> {
        self.read_document(FEEDBACK_FILE).await
    }

    async fn save_feedback(&self, state: &FeedbackState) -> Result<()> {
        self.write_document(FEEDBACK_FILE, state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_backend() -> JsonFileBackend {
        JsonFileBackend::new(std::env::temp_dir().join(format!("curator_file_{}", Uuid::now_v7())))
    }

    #[tokio::test]
    async fn missing_files_load_empty() {
        let backend = temp_backend();
        assert!(backend.load_urls().await.unwrap().is_empty());
        assert!(backend.load_embeddings().await.unwrap().is_empty());
        assert_eq!(backend.load_feedback().await.unwrap(), FeedbackState::default());
    }

    #[tokio::test]
    async fn documents_use_backing_format() {
        let backend = temp_backend();
        let mut urls = SeenUrls::new();
        urls.insert("https://example.com/a".into(), 1_700_000_000_000);
        backend.save_urls(&urls).await.unwrap();

        let raw = std::fs::read_to_string(backend.dir().join(URLS_FILE)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["seenUrls"]["https://example.com/a"], 1_700_000_000_000i64);
        assert!(!backend.dir().join(format!(".{URLS_FILE}.tmp")).exists());

        let loaded = backend.load_urls().await.unwrap();
        assert_eq!(loaded, urls);
    }

    #[tokio::test]
    async fn embeddings_persist_across_instances() {
        let backend = temp_backend();
        let record = EmbeddingRecord {
            id: "itm_1".into(),
            embedding: vec![0.1, 0.2, 0.3],
            title: "Launch".into(),
            timestamp_ms: 42,
        };
        backend.save_embeddings(std::slice::from_ref(&record)).await.unwrap();

        let reopened = JsonFileBackend::new(backend.dir());
        assert_eq!(reopened.load_embeddings().await.unwrap(), vec![record]);
    }

    #[tokio::test]
    async fn corrupt_file_is_storage_error() {
        let backend = temp_backend();
        std::fs::create_dir_all(backend.dir()).unwrap();
        std::fs::write(backend.dir().join(EMBEDDINGS_FILE), "{not json").unwrap();
        let err = backend.load_embeddings().await.unwrap_err();
        assert!(matches!(err, CuratorError::Storage(_)));
    }
}
