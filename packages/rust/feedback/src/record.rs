//! Appending reviewer actions to the rolling feedback history.

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use curator_shared::{ContentItem, FeedbackAction, FeedbackConfig, FeedbackRecord, FeedbackState, FeedbackTag, MS_PER_DAY};

/// One reviewer action over a set of selected items.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackEntry {
    #[serde(default)]
    pub actor_id: Option<String>,
    pub action: FeedbackAction,
    /// The items the action applied to; each becomes one tag.
    #[serde(default)]
    pub items: Vec<ContentItem>,
}

/// Drop records at least `expiry_days` old. Returns how many were removed.
pub fn purge_expired(history: &mut Vec<FeedbackRecord>, expiry_days: u32, now_ms: i64) -> usize {
    let expiry = i64::from(expiry_days) * MS_PER_DAY;
    let before = history.len();
    history.retain(|record| now_ms - record.timestamp_ms < expiry);
    before - history.len()
}

/// Keep only the newest `max` records.
pub fn trim_history(history: &mut Vec<FeedbackRecord>, max: usize) -> usize {
    if history.len() <= max {
        return 0;
    }
    history.sort_by_key(|record| record.timestamp_ms);
    let excess = history.len() - max;
    history.drain(..excess);
    excess
}

/// Append `entry` to the history and return the stored record.
pub fn record_feedback(
    state: &mut FeedbackState,
    entry: FeedbackEntry,
    config: &FeedbackConfig,
    now_ms: i64,
) -> FeedbackRecord {
    let record = FeedbackRecord {
        id: format!("fb_{}", Uuid::now_v7().simple()),
        timestamp_ms: now_ms,
        actor_id: entry
            .actor_id
            .filter(|actor| !actor.trim().is_empty())
            .unwrap_or_else(|| "unknown".into()),
        action: entry.action,
        tags: entry.items.iter().map(FeedbackTag::from_item).collect(),
    };
    state.feedback_history.push(record.clone());

    let expired = purge_expired(&mut state.feedback_history, config.expiry_days, now_ms);
    let trimmed = trim_history(&mut state.feedback_history, config.max_history);
    debug!(id = %record.id, tags = record.tags.len(), expired, trimmed, "feedback recorded");
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use curator_shared::{ScoreVector, SourceClass};

    const NOW: i64 = 1_760_000_000_000;

    fn scored(url: &str, source: &str, category: &str) -> ContentItem {
        let mut item = ContentItem::new(url, "title", source, SourceClass::Feed);
        let mut score = ScoreVector::fallback(0.0);
        score.category = category.into();
        item.score = Some(score);
        item
    }

    fn entry(action: FeedbackAction, items: Vec<ContentItem>) -> FeedbackEntry {
        FeedbackEntry {
            actor_id: Some("alice".into()),
            action,
            items,
        }
    }

    #[test]
    fn one_tag_per_item() {
        let mut state = FeedbackState::default();
        let unscored = ContentItem::new("https://c.test", "c", "", SourceClass::Feed);
        let record = record_feedback(
            &mut state,
            entry(
                FeedbackAction::Approved,
                vec![scored("https://a.test", "Lab", "tool"), unscored],
            ),
            &FeedbackConfig::default(),
            NOW,
        );

        assert!(record.id.starts_with("fb_"));
        assert_eq!(record.tags.len(), 2);
        assert_eq!(record.tags[0].category, "tool");
        assert_eq!(record.tags[1].category, "unknown");
        assert_eq!(record.tags[1].source, "unknown");
        assert_eq!(state.feedback_history.len(), 1);
    }

    #[test]
    fn missing_actor_becomes_unknown() {
        let mut state = FeedbackState::default();
        let mut e = entry(FeedbackAction::Ignored, Vec::new());
        e.actor_id = None;
        let record = record_feedback(&mut state, e, &FeedbackConfig::default(), NOW);
        assert_eq!(record.actor_id, "unknown");
    }

    #[test]
    fn expired_records_are_purged_and_history_capped() {
        let config = FeedbackConfig {
            max_history: 3,
            ..Default::default()
        };
        let mut state = FeedbackState::default();
        for n in 0..4 {
            record_feedback(&mut state, entry(FeedbackAction::Approved, Vec::new()), &config, NOW - 40 * MS_PER_DAY + n);
        }
        for n in 0..4 {
            record_feedback(&mut state, entry(FeedbackAction::Ignored, Vec::new()), &config, NOW + n);
        }

        assert_eq!(state.feedback_history.len(), 3);
        assert!(state.feedback_history.iter().all(|r| r.action == FeedbackAction::Ignored));
        assert_eq!(state.feedback_history[0].timestamp_ms, NOW + 1);
    }
}
