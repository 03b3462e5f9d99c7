//! One curation invocation: Dedup → Cluster → Rank, plus the separate
//! feedback-learning pass.

use std::time::Instant;

use serde::Serialize;
use tracing::{info, instrument};

use curator_cluster::{ClusterEngine, ClusterStats};
use curator_dedup::{DedupEngine, DedupStats};
use curator_feedback::{FeedbackEngine, FeedbackEntry, FeedbackStats, LearnOutcome};
use curator_ranking::{RankingEngine, RankingStats};
use curator_shared::{
    AppConfig, ContentItem, Degradation, FeedbackRecord, LearnedWeights, Result, Stage, TimeBudget, now_ms,
};
use curator_storage::{Store, StoreHealth};

use crate::services::Services;

/// Everything a run produced besides the items.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStats {
    pub input: usize,
    pub output: usize,
    pub dedup: DedupStats,
    /// Absent when clustering is disabled.
    pub cluster: Option<ClusterStats>,
    pub ranking: RankingStats,
    pub weights_version: u64,
    pub store: StoreHealth,
    /// Every degradation from every stage, in stage order.
    pub degradations: Vec<Degradation>,
    pub elapsed_ms: u64,
}

#[derive(Debug)]
pub struct PipelineOutput {
    pub items: Vec<ContentItem>,
    pub stats: PipelineStats,
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a stage finishes with its input and output counts.
    fn stage_done(&self, stage: Stage, input: usize, output: usize);
    /// Called when the run completes.
    fn done(&self, stats: &PipelineStats);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn stage_done(&self, _stage: Stage, _input: usize, _output: usize) {}
    fn done(&self, _stats: &PipelineStats) {}
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Stage engines sharing one store and one set of capabilities.
pub struct Pipeline {
    config: AppConfig,
    store: Store,
    services: Services,
}

impl Pipeline {
    pub fn new(config: AppConfig, store: Store, services: Services) -> Self {
        Self {
            config,
            store,
            services,
        }
    }

    /// Open the configured store and build the remote capabilities.
    pub async fn open(config: AppConfig) -> Result<Self> {
        let store = Store::open(&config.store).await;
        let services = Services::from_config(&config.openai)?;
        Ok(Self::new(config, store, services))
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Curate `items` into the ranked selection.
    ///
    /// Only a ranking failure (no scorer, or every scoring batch failed)
    /// or an ephemeral-store failure aborts the run; everything else is
    /// recorded as a degradation.
    #[instrument(skip_all, fields(input = items.len()))]
    pub async fn run(&self, items: Vec<ContentItem>, progress: &dyn ProgressReporter) -> Result<PipelineOutput> {
        let start = Instant::now();
        let now = now_ms();
        let input = items.len();
        let pipeline = &self.config.pipeline;
        let budget = TimeBudget::new(pipeline.time_budget(), pipeline.min_call_budget());
        let mut degradations = Vec::new();

        info!(input, store = self.store.health().mode, "starting curation run");

        progress.phase("Loading learned weights");
        let weights = self.load_weights().await?;

        // --- Dedup ---
        progress.phase("Deduplicating");
        let dedup = DedupEngine::new(
            self.config.dedup.clone(),
            self.services.embedder.clone(),
            pipeline.max_concurrency,
        )
        .run(items, &self.store, &budget, now)
        .await?;
        progress.stage_done(Stage::Dedup, input, dedup.items.len());
        degradations.extend(dedup.stats.degradations.iter().cloned());

        // --- Cluster ---
        let (items, cluster_stats) = if self.config.clustering.enabled {
            progress.phase("Clustering events");
            let before = dedup.items.len();
            let outcome = ClusterEngine::new(
                self.config.clustering.clone(),
                self.services.summarizer.clone(),
                pipeline.max_concurrency,
            )
            .run(dedup.items, &budget)
            .await;
            progress.stage_done(Stage::Cluster, before, outcome.items.len());
            degradations.extend(outcome.stats.degradations.iter().cloned());
            (outcome.items, Some(outcome.stats))
        } else {
            info!("clustering disabled, passing items through");
            (dedup.items, None)
        };

        // --- Rank ---
        progress.phase("Ranking");
        let before = items.len();
        let ranking = RankingEngine::new(
            self.config.ranking.clone(),
            self.services.scorer.clone(),
            pipeline.max_concurrency,
        )
        .run(items, &weights, &budget)
        .await?;
        progress.stage_done(Stage::Ranking, before, ranking.items.len());
        degradations.extend(ranking.stats.degradations.iter().cloned());

        let store = self.store.health();
        if store.degraded {
            degradations.push(Degradation::new(
                Stage::Store,
                format!(
                    "durable store unavailable: {}",
                    store.last_error.as_deref().unwrap_or("unknown error")
                ),
            ));
        }

        let mut items = ranking.items;
        for item in &mut items {
            item.embedding = None;
        }

        let stats = PipelineStats {
            input,
            output: items.len(),
            dedup: dedup.stats,
            cluster: cluster_stats,
            ranking: ranking.stats,
            weights_version: weights.version,
            store,
            degradations,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };
        progress.done(&stats);

        info!(
            input,
            output = stats.output,
            degradations = stats.degradations.len(),
            elapsed_ms = stats.elapsed_ms,
            "curation run complete"
        );
        Ok(PipelineOutput { items, stats })
    }

    async fn load_weights(&self) -> Result<LearnedWeights> {
        if !self.config.ranking.learned_weights {
            return Ok(LearnedWeights::default());
        }
        Ok(self.store.load_feedback().await?.learned_weights)
    }

    // -----------------------------------------------------------------------
    // Feedback
    // -----------------------------------------------------------------------

    fn feedback(&self) -> FeedbackEngine {
        FeedbackEngine::new(self.config.feedback.clone())
    }

    /// Refresh learned weights from the recorded feedback history.
    pub async fn learn(&self) -> Result<LearnOutcome> {
        self.feedback().learn(&self.store, now_ms()).await
    }

    pub async fn record_feedback(&self, entry: FeedbackEntry) -> Result<FeedbackRecord> {
        self.feedback().record(&self.store, entry, now_ms()).await
    }

    pub async fn feedback_stats(&self) -> Result<FeedbackStats> {
        self.feedback().stats(&self.store, now_ms()).await
    }

    pub async fn weights(&self) -> Result<LearnedWeights> {
        self.feedback().weights(&self.store).await
    }
}
