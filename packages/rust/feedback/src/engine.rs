//! Store-backed feedback operations.

use tracing::{info, instrument};

use curator_shared::{FeedbackConfig, FeedbackRecord, LearnedWeights, Result};
use curator_storage::Store;

use crate::learn::{self, LearnOutcome};
use crate::record::{self, FeedbackEntry};
use crate::stats::{self, FeedbackStats};

/// Reads and writes the feedback/weights portion of a [`Store`].
pub struct FeedbackEngine {
    config: FeedbackConfig,
}

impl FeedbackEngine {
    pub fn new(config: FeedbackConfig) -> Self {
        Self { config }
    }

    /// Record one reviewer action and persist the history.
    #[instrument(skip_all, fields(action = ?entry.action, items = entry.items.len()))]
    pub async fn record(&self, store: &Store, entry: FeedbackEntry, now_ms: i64) -> Result<FeedbackRecord> {
        let mut state = store.load_feedback().await?;
        let record = record::record_feedback(&mut state, entry, &self.config, now_ms);
        store.save_feedback(&state).await?;
        info!(id = %record.id, history = state.feedback_history.len(), "feedback stored");
        Ok(record)
    }

    /// Run a learning pass; weights are saved only when they changed.
    pub async fn learn(&self, store: &Store, now_ms: i64) -> Result<LearnOutcome> {
        let mut state = store.load_feedback().await?;
        let outcome = learn::learn(&mut state, &self.config, now_ms);
        if outcome.is_updated() {
            store.save_feedback(&state).await?;
        }
        Ok(outcome)
    }

    pub async fn stats(&self, store: &Store, now_ms: i64) -> Result<FeedbackStats> {
        let state = store.load_feedback().await?;
        Ok(stats::feedback_stats(&state.feedback_history, now_ms))
    }

    pub async fn weights(&self, store: &Store) -> Result<LearnedWeights> {
        Ok(store.load_feedback().await?.learned_weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curator_shared::{ContentItem, FeedbackAction, ScoreVector, SourceClass};

    const NOW: i64 = 1_760_000_000_000;

    fn approve(source: &str) -> FeedbackEntry {
        let mut item = ContentItem::new(format!("https://{source}.test"), "t", source, SourceClass::Feed);
        let mut score = ScoreVector::fallback(0.0);
        score.category = "tool".into();
        item.score = Some(score);
        FeedbackEntry {
            actor_id: Some("alice".into()),
            action: FeedbackAction::Approved,
            items: vec![item],
        }
    }

    #[tokio::test]
    async fn record_then_learn_round_trip() {
        let store = Store::ephemeral();
        let engine = FeedbackEngine::new(FeedbackConfig::default());

        for n in 0..4 {
            engine.record(&store, approve("Lab"), NOW + n).await.unwrap();
        }
        let outcome = engine.learn(&store, NOW + 10).await.unwrap();
        assert!(!outcome.is_updated());
        assert_eq!(engine.weights(&store).await.unwrap().version, 0);

        engine.record(&store, approve("Lab"), NOW + 5).await.unwrap();
        let outcome = engine.learn(&store, NOW + 10).await.unwrap();
        assert!(outcome.is_updated());

        let weights = engine.weights(&store).await.unwrap();
        assert_eq!(weights.version, 1);
        assert!(weights.source_boosts["Lab"] > 0.0);
        assert!(weights.category_boosts["tool"] > 0.0);

        let stats = engine.stats(&store, NOW + 10).await.unwrap();
        assert_eq!(stats.total, 5);
        assert_eq!(stats.approved, 5);
    }
}
