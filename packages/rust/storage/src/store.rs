//! The [`Store`]: ephemeral state always, durable state while it stays healthy.

use std::sync::Mutex;

use curator_shared::{
    CuratorError, DurableBackendKind, EmbeddingRecord, FeedbackState, Result, SeenUrls,
    StoreConfig,
};
use serde::Serialize;

use crate::backend::StateBackend;
use crate::database::LibsqlBackend;
use crate::file::JsonFileBackend;
use crate::memory::MemoryBackend;
use crate::merge;

/// Database file name inside the store directory.
const DB_FILE_NAME: &str = "curator.db";

/// Snapshot of the store's persistence mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreHealth {
    /// `"durable"` while a durable backend is in use, `"ephemeral"` otherwise.
    pub mode: &'static str,
    pub durable_backend: Option<&'static str>,
    pub degraded: bool,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct HealthState {
    degraded: bool,
    last_error: Option<String>,
}

/// Curator state behind one interface.
///
/// Loads merge the ephemeral and durable copies by recency. Saves always
/// write the ephemeral copy and write the durable copy until the first
/// durable failure, after which the store stays ephemeral-only.
pub struct Store {
    ephemeral: MemoryBackend,
    durable: Option<Box<dyn StateBackend>>,
    health: Mutex<HealthState>,
}

impl Store {
    /// Store with no durable backend.
    pub fn ephemeral() -> Self {
        Self {
            ephemeral: MemoryBackend::new(),
            durable: None,
            health: Mutex::new(HealthState::default()),
        }
    }

    pub fn with_durable(backend: Box<dyn StateBackend>) -> Self {
        Self {
            ephemeral: MemoryBackend::new(),
            durable: Some(backend),
            health: Mutex::new(HealthState::default()),
        }
    }

    /// Build the store described by `[store]`.
    ///
    /// A durable backend that cannot be opened leaves the store
    /// ephemeral-only and degraded rather than failing.
    pub async fn open(config: &StoreConfig) -> Self {
        let dir = match config.resolved_dir() {
            Ok(dir) => dir,
            Err(e) => return Self::degraded_from_start(e),
        };

        match config.backend {
            DurableBackendKind::Memory => Self::ephemeral(),
            DurableBackendKind::File => Self::with_durable(Box::new(JsonFileBackend::new(dir))),
            DurableBackendKind::Libsql => match LibsqlBackend::open(&dir.join(DB_FILE_NAME)).await {
                Ok(backend) => Self::with_durable(Box::new(backend)),
                Err(e) => Self::degraded_from_start(e),
            },
        }
    }

    fn degraded_from_start(err: CuratorError) -> Self {
        let store = Self::ephemeral();
        store.degrade("open", &err);
        store
    }

    pub fn health(&self) -> StoreHealth {
        let state = self.health.lock().unwrap_or_else(|p| p.into_inner());
        let durable_active = self.durable.is_some() && !state.degraded;
        StoreHealth {
            mode: if durable_active { "durable" } else { "ephemeral" },
            durable_backend: self.durable.as_ref().map(|d| d.name()),
            degraded: state.degraded,
            last_error: state.last_error.clone(),
        }
    }

    fn healthy_durable(&self) -> Option<&dyn StateBackend> {
        let degraded = self.health.lock().unwrap_or_else(|p| p.into_inner()).degraded;
        if degraded {
            return None;
        }
        self.durable.as_deref()
    }

    fn degrade(&self, operation: &str, err: &CuratorError) {
        tracing::warn!(operation, error = %err, "durable store failed, continuing ephemeral-only");
        let mut state = self.health.lock().unwrap_or_else(|p| p.into_inner());
        state.degraded = true;
        state.last_error = Some(format!("{operation}: {err}"));
    }

    // -----------------------------------------------------------------------
    // Seen URLs
    // -----------------------------------------------------------------------

    pub async fn load_urls(&self) -> Result<SeenUrls> {
        let local = self.ephemeral.load_urls().await?;
        let Some(durable) = self.healthy_durable() else {
            return Ok(local);
        };
        match durable.load_urls().await {
            Ok(stored) => Ok(merge::merge_urls(local, stored)),
            Err(e) => {
                self.degrade("load_urls", &e);
                Ok(local)
            }
        }
    }

    pub async fn save_urls(&self, urls: &SeenUrls) -> Result<()> {
        self.ephemeral.save_urls(urls).await?;
        if let Some(durable) = self.healthy_durable() {
            if let Err(e) = durable.save_urls(urls).await {
                self.degrade("save_urls", &e);
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Embeddings
    // -----------------------------------------------------------------------

    pub async fn load_embeddings(&self) -> Result<Vec<EmbeddingRecord>> {
        let local = self.ephemeral.load_embeddings().await?;
        let Some(durable) = self.healthy_durable() else {
            return Ok(local);
        };
        match durable.load_embeddings().await {
            Ok(stored) => Ok(merge::merge_embeddings(local, stored)),
            Err(e) => {
                self.degrade("load_embeddings", &e);
                Ok(local)
            }
        }
    }

    pub async fn save_embeddings(&self, records: &[EmbeddingRecord]) -> Result<()> {
        self.ephemeral.save_embeddings(records).await?;
        if let Some(durable) = self.healthy_durable() {
            if let Err(e) = durable.save_embeddings(records).await {
                self.degrade("save_embeddings", &e);
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Feedback history + learned weights
    // -----------------------------------------------------------------------

    pub async fn load_feedback(&self) -> Result<FeedbackState> {
        let local = self.ephemeral.load_feedback().await?;
        let Some(durable) = self.healthy_durable() else {
            return Ok(local);
        };
        match durable.load_feedback().await {
            Ok(stored) => Ok(merge::merge_feedback(local, stored)),
            Err(e) => {
                self.degrade("load_feedback", &e);
                Ok(local)
            }
        }
    }

    pub async fn save_feedback(&self, state: &FeedbackState) -> Result<()> {
        self.ephemeral.save_feedback(state).await?;
        if let Some(durable) = self.healthy_durable() {
            if let Err(e) = durable.save_feedback(state).await {
                self.degrade("save_feedback", &e);
            }
        }
        Ok(())
    }
}
