//! Ranking state machine: select, score in batches, adjust, filter.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use serde::Serialize;
use tracing::{info, instrument, warn};

use curator_shared::{
    ContentItem, CuratorError, Degradation, LearnedWeights, RankingConfig, RawScore, Result,
    ScoreVector, ScoringInput, ScoringService, Stage, TimeBudget,
};

use crate::adjust::adjusted_score;
use crate::filter;
use crate::quota::{self, QuotaPlan};

/// Counts at each ranking stage boundary.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RankingStats {
    pub input: usize,
    pub social_available: usize,
    pub syndicated_available: usize,
    pub social_quota: usize,
    pub syndicated_quota: usize,
    /// Items sent for scoring.
    pub selected: usize,
    /// Items carrying a score after the scoring stage.
    pub scored: usize,
    pub fallback_scored: usize,
    pub batches: usize,
    pub failed_batches: usize,
    /// Failed batches that were never sent because the time budget ran out.
    pub budget_skipped_batches: usize,
    pub after_threshold: usize,
    pub after_cap: usize,
    pub min_score: f64,
    pub per_source_cap: usize,
    pub degradations: Vec<Degradation>,
}

#[derive(Debug)]
pub struct RankingOutcome {
    pub items: Vec<ContentItem>,
    pub stats: RankingStats,
}

pub struct RankingEngine {
    config: RankingConfig,
    scorer: Option<Arc<dyn ScoringService>>,
    max_concurrency: usize,
}

impl RankingEngine {
    pub fn new(
        config: RankingConfig,
        scorer: Option<Arc<dyn ScoringService>>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            config,
            scorer,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Rank `items` and return the filtered selection, highest total first.
    ///
    /// Fails with [`CuratorError::AllBatchesFailed`] when no batch could be
    /// scored, and with a config error when there is no scoring service.
    #[instrument(skip_all, fields(input = items.len()))]
    pub async fn run(
        &self,
        items: Vec<ContentItem>,
        weights: &LearnedWeights,
        budget: &TimeBudget,
    ) -> Result<RankingOutcome> {
        let mut stats = RankingStats {
            input: items.len(),
            min_score: self.config.min_score,
            per_source_cap: self.config.per_source_cap,
            ..Default::default()
        };

        // --- Class split, quota, buckets ---
        let selection = quota::select_candidates(items, &self.config);
        let QuotaPlan { social, syndicated } = selection.plan;
        stats.social_available = selection.social_available;
        stats.syndicated_available = selection.syndicated_available;
        stats.social_quota = social;
        stats.syndicated_quota = syndicated;
        stats.selected = selection.items.len();
        info!(
            selected = stats.selected,
            social_quota = social,
            syndicated_quota = syndicated,
            "candidates selected"
        );

        let mut items = selection.items;
        if items.is_empty() {
            return Ok(RankingOutcome { items, stats });
        }

        // --- Batched scoring ---
        let scorer = self
            .scorer
            .as_ref()
            .ok_or_else(|| CuratorError::config("ranking requires a scoring service"))?;
        let batch_size = self.config.batch_size.max(1);
        let batches: Vec<Vec<ScoringInput>> = items
            .chunks(batch_size)
            .map(|chunk| chunk.iter().map(ScoringInput::from).collect())
            .collect();
        stats.batches = batches.len();

        let results: Vec<Result<Vec<RawScore>>> = futures::stream::iter(batches.iter().enumerate())
            .map(|(batch_idx, inputs)| async move {
                budget.check(&format!("scoring batch {batch_idx}"))?;
                scorer.score(inputs).await
            })
            .buffered(self.max_concurrency)
            .collect()
            .await;

        // --- Tier + learned adjustment, fallback ---
        let weights = self.config.learned_weights.then_some(weights);
        for (batch_idx, (chunk, result)) in items.chunks_mut(batch_size).zip(results).enumerate() {
            match result {
                Ok(raw_scores) => {
                    let by_id: HashMap<&str, &RawScore> =
                        raw_scores.iter().map(|s| (s.id.as_str(), s)).collect();
                    for item in chunk.iter_mut() {
                        item.score = Some(match by_id.get(item.id.as_str()) {
                            Some(raw) => adjusted_score(raw, item.tier, &item.source, weights),
                            None => {
                                stats.fallback_scored += 1;
                                ScoreVector::fallback(item.engagement())
                            }
                        });
                    }
                }
                Err(e) => {
                    warn!(batch = batch_idx, error = %e, "scoring batch failed, using fallback scores");
                    if matches!(e, CuratorError::BudgetExhausted { .. }) {
                        stats.budget_skipped_batches += 1;
                    }
                    stats.failed_batches += 1;
                    stats.fallback_scored += chunk.len();
                    for item in chunk.iter_mut() {
                        item.score = Some(ScoreVector::fallback(item.engagement()));
                    }
                }
            }
        }

        if stats.failed_batches == stats.batches {
            return Err(CuratorError::AllBatchesFailed {
                batches: stats.batches,
            });
        }
        if stats.failed_batches > 0 {
            stats
                .degradations
                .push(Degradation::new(Stage::Ranking, failed_batches_message(&stats)));
        }
        stats.scored = items.len();
        info!(
            scored = stats.scored,
            fallback = stats.fallback_scored,
            failed_batches = stats.failed_batches,
            "scoring complete"
        );

        // --- Post-filters ---
        filter::sort_by_total(&mut items);
        let items = filter::apply_threshold(items, self.config.min_score);
        stats.after_threshold = items.len();
        let items = filter::apply_source_cap(items, self.config.per_source_cap);
        stats.after_cap = items.len();

        info!(
            input = stats.input,
            selected = stats.selected,
            after_llm = stats.scored,
            after_threshold = stats.after_threshold,
            after_cap = stats.after_cap,
            "ranking complete"
        );
        Ok(RankingOutcome { items, stats })
    }
}

fn failed_batches_message(stats: &RankingStats) -> String {
    let mut message = format!("{} of {} scoring batches failed", stats.failed_batches, stats.batches);
    if stats.budget_skipped_batches > 0 {
        message.push_str(&format!(
            " ({} skipped: time budget exhausted)",
            stats.budget_skipped_batches
        ));
    }
    message.push_str("; engagement fallback used");
    message
}
