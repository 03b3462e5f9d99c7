//! Two-pass dedup: exact URL, then embedding similarity.

use std::sync::Arc;

use futures::StreamExt;
use serde::Serialize;
use tracing::{info, instrument, warn};

use curator_shared::{
    ContentItem, CuratorError, DedupConfig, DedupStatus, Degradation, EmbeddingService, Result,
    Stage, TimeBudget,
};
use curator_storage::Store;

use crate::semantic::{self, DuplicateMatch};
use crate::url;

/// Counts for one dedup run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DedupStats {
    pub input: usize,
    pub url_duplicates: usize,
    pub url_expired: usize,
    pub url_evicted: usize,
    /// Items that reached the similarity comparison.
    pub processed: usize,
    pub unique: usize,
    pub duplicates: usize,
    /// Stored embeddings purged for age.
    pub expired: usize,
    pub evicted: usize,
    pub stored_embeddings: usize,
    pub storage_mode: String,
    /// False when the semantic pass was disabled or degraded to pass-through.
    pub semantic_applied: bool,
    pub matches: Vec<DuplicateMatch>,
    pub degradations: Vec<Degradation>,
}

#[derive(Debug)]
pub struct DedupOutcome {
    pub items: Vec<ContentItem>,
    pub stats: DedupStats,
}

pub struct DedupEngine {
    config: DedupConfig,
    embedder: Option<Arc<dyn EmbeddingService>>,
    max_concurrency: usize,
}

impl DedupEngine {
    pub fn new(
        config: DedupConfig,
        embedder: Option<Arc<dyn EmbeddingService>>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            config,
            embedder,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Run both passes and persist the updated seen-URL map and embeddings.
    ///
    /// Embedding failures never fail the run: the URL-unique items pass
    /// through unduplicated and the condition is recorded in the stats.
    #[instrument(skip_all, fields(input = items.len()))]
    pub async fn run(
        &self,
        items: Vec<ContentItem>,
        store: &Store,
        budget: &TimeBudget,
        now_ms: i64,
    ) -> Result<DedupOutcome> {
        let mut stats = DedupStats {
            input: items.len(),
            ..Default::default()
        };

        // --- URL pass ---
        let mut seen = store.load_urls().await?;
        let url_outcome = url::url_pass(items, &mut seen, &self.config, now_ms);
        store.save_urls(&seen).await?;
        stats.url_duplicates = url_outcome.duplicates;
        stats.url_expired = url_outcome.expired;
        stats.url_evicted = url_outcome.evicted;
        info!(
            unique = url_outcome.unique.len(),
            duplicates = url_outcome.duplicates,
            expired = url_outcome.expired,
            "url pass complete"
        );

        let mut items = url_outcome.unique;
        if !self.config.semantic_enabled {
            mark_url_only(&mut items);
            return Ok(self.finish(items, stats, store));
        }

        // --- Semantic pass ---
        let mut history = store.load_embeddings().await?;
        stats.expired =
            semantic::purge_expired_embeddings(&mut history, self.config.embedding_expiry_days, now_ms);

        if let Err(e) = self.attach_embeddings(&mut items, budget).await {
            warn!(error = %e, "semantic dedup degraded to pass-through");
            stats
                .degradations
                .push(Degradation::new(Stage::Dedup, format!("semantic pass skipped: {e}")));
            store.save_embeddings(&history).await?;
            stats.stored_embeddings = history.len();
            mark_url_only(&mut items);
            return Ok(self.finish(items, stats, store));
        }

        stats.processed = items.iter().filter(|i| i.embedding.is_some()).count();
        let outcome = semantic::semantic_pass(
            items,
            &history,
            self.config.similarity_threshold,
            now_ms,
        );

        history.extend(outcome.new_records);
        stats.evicted = semantic::evict_oldest_embeddings(&mut history, self.config.max_embeddings);
        store.save_embeddings(&history).await?;

        stats.semantic_applied = true;
        stats.duplicates = outcome.duplicates.len();
        stats.matches = outcome.duplicates;
        stats.stored_embeddings = history.len();
        Ok(self.finish(outcome.unique, stats, store))
    }

    fn finish(&self, items: Vec<ContentItem>, mut stats: DedupStats, store: &Store) -> DedupOutcome {
        stats.unique = items.len();
        stats.storage_mode = store.health().mode.to_string();
        info!(
            input = stats.input,
            unique = stats.unique,
            url_duplicates = stats.url_duplicates,
            semantic_duplicates = stats.duplicates,
            expired = stats.expired,
            stored = stats.stored_embeddings,
            "dedup complete"
        );
        DedupOutcome { items, stats }
    }

    /// Fill in missing embeddings. Any failed batch fails the whole pass.
    async fn attach_embeddings(&self, items: &mut [ContentItem], budget: &TimeBudget) -> Result<()> {
        let pending: Vec<(usize, String)> = items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.embedding.is_none())
            .map(|(idx, item)| (idx, item.embedding_text(self.config.max_text_chars)))
            .filter(|(_, text)| text.chars().count() > self.config.min_text_chars)
            .collect();

        if pending.is_empty() {
            return Ok(());
        }
        let embedder = self
            .embedder
            .as_ref()
            .ok_or_else(|| CuratorError::config("no embedding service configured"))?;

        let texts: Vec<String> = pending.iter().map(|(_, text)| text.clone()).collect();
        let batches: Vec<&[String]> = texts.chunks(self.config.batch_size.max(1)).collect();
        let batch_count = batches.len();

        let results: Vec<Result<Vec<Vec<f32>>>> = futures::stream::iter(batches.into_iter().enumerate())
            .map(|(batch_idx, batch)| async move {
                budget.check(&format!("embedding batch {batch_idx}"))?;
                let vectors = embedder.embed(batch).await?;
                if vectors.len() != batch.len() {
                    return Err(CuratorError::data(format!(
                        "embedding count mismatch in batch {batch_idx}: sent {}, got {}",
                        batch.len(),
                        vectors.len()
                    )));
                }
                Ok(vectors)
            })
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let mut vectors = Vec::with_capacity(pending.len());
        for result in results {
            vectors.extend(result?);
        }
        info!(batches = batch_count, embedded = vectors.len(), "embeddings fetched");

        for ((idx, _), vector) in pending.into_iter().zip(vectors) {
            if !vector.is_empty() {
                items[idx].embedding = Some(vector);
            }
        }
        Ok(())
    }
}

fn mark_url_only(items: &mut [ContentItem]) {
    for item in items {
        item.dedup = DedupStatus::UrlOnly;
    }
}
