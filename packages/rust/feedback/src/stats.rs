//! Summary counts over the feedback history.

use std::collections::BTreeMap;

use serde::Serialize;

use curator_shared::{FeedbackAction, FeedbackRecord, MS_PER_DAY};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActionTally {
    pub approved: usize,
    pub ignored: usize,
}

impl ActionTally {
    fn add(&mut self, action: FeedbackAction) {
        match action {
            FeedbackAction::Approved => self.approved += 1,
            FeedbackAction::Ignored => self.ignored += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeedbackStats {
    pub total: usize,
    pub approved: usize,
    pub ignored: usize,
    pub last_7_days: usize,
    pub last_30_days: usize,
    pub by_category: BTreeMap<String, ActionTally>,
    pub by_source: BTreeMap<String, ActionTally>,
}

pub fn feedback_stats(history: &[FeedbackRecord], now_ms: i64) -> FeedbackStats {
    let mut stats = FeedbackStats {
        total: history.len(),
        ..Default::default()
    };

    for record in history {
        match record.action {
            FeedbackAction::Approved => stats.approved += 1,
            FeedbackAction::Ignored => stats.ignored += 1,
        }

        let age = now_ms - record.timestamp_ms;
        if age < 7 * MS_PER_DAY {
            stats.last_7_days += 1;
        }
        if age < 30 * MS_PER_DAY {
            stats.last_30_days += 1;
        }

        for tag in &record.tags {
            let category = if tag.category.is_empty() { "unknown" } else { &tag.category };
            let source = if tag.source.is_empty() { "unknown" } else { &tag.source };
            stats.by_category.entry(category.to_string()).or_default().add(record.action);
            stats.by_source.entry(source.to_string()).or_default().add(record.action);
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use curator_shared::FeedbackTag;

    #[test]
    fn tallies_actions_windows_and_tags() {
        let now = 1_760_000_000_000;
        let tag = |category: &str, source: &str| FeedbackTag {
            category: category.into(),
            source: source.into(),
            url: None,
            title: None,
        };
        let history = vec![
            FeedbackRecord {
                id: "fb_1".into(),
                timestamp_ms: now - MS_PER_DAY,
                actor_id: "a".into(),
                action: FeedbackAction::Approved,
                tags: vec![tag("tool", "Lab"), tag("paper", "Lab")],
            },
            FeedbackRecord {
                id: "fb_2".into(),
                timestamp_ms: now - 10 * MS_PER_DAY,
                actor_id: "a".into(),
                action: FeedbackAction::Ignored,
                tags: vec![tag("", "Forum")],
            },
        ];

        let stats = feedback_stats(&history, now);
        assert_eq!(stats.total, 2);
        assert_eq!((stats.approved, stats.ignored), (1, 1));
        assert_eq!((stats.last_7_days, stats.last_30_days), (1, 2));
        assert_eq!(stats.by_source["Lab"], ActionTally { approved: 2, ignored: 0 });
        assert_eq!(stats.by_category["unknown"], ActionTally { approved: 0, ignored: 1 });
    }
}
