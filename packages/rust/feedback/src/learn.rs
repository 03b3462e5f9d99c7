//! Approval-rate boosts with exponential decay of prior weights.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info, instrument};

use curator_shared::types::BOOST_BOUND;
use curator_shared::{FeedbackAction, FeedbackConfig, FeedbackRecord, FeedbackState, MS_PER_DAY, clip};

/// Result of one learning pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum LearnOutcome {
    /// Weights were recomputed and the version bumped.
    Updated {
        version: u64,
        samples: usize,
        categories: usize,
        sources: usize,
    },
    /// Too little history; weights left untouched.
    InsufficientSamples { samples: usize, required: usize },
}

impl LearnOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, Self::Updated { .. })
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    total: usize,
    approved: usize,
}

impl Tally {
    fn add(&mut self, action: FeedbackAction) {
        self.total += 1;
        if action == FeedbackAction::Approved {
            self.approved += 1;
        }
    }
}

fn boost_from_tallies(tallies: BTreeMap<String, Tally>, config: &FeedbackConfig) -> BTreeMap<String, f64> {
    tallies
        .into_iter()
        .filter(|(_, tally)| tally.total >= config.min_samples.max(1))
        .map(|(key, tally)| {
            let rate = tally.approved as f64 / tally.total as f64;
            let raw = (rate - config.baseline) * config.learning_rate * config.scale_factor;
            (key, clip(raw, -BOOST_BOUND, BOOST_BOUND))
        })
        .collect()
}

/// Per-category and per-source boosts from `history`.
///
/// Every tag on a record is one sample for its category and its source.
/// Keys with fewer than `min_samples` samples are absent from the maps.
pub fn compute_boosts(
    history: &[FeedbackRecord],
    config: &FeedbackConfig,
) -> (BTreeMap<String, f64>, BTreeMap<String, f64>) {
    let mut categories: BTreeMap<String, Tally> = BTreeMap::new();
    let mut sources: BTreeMap<String, Tally> = BTreeMap::new();

    for record in history {
        for tag in &record.tags {
            let category = if tag.category.is_empty() { "unknown" } else { tag.category.as_str() };
            let source = if tag.source.is_empty() { "unknown" } else { tag.source.as_str() };
            categories.entry(category.to_string()).or_default().add(record.action);
            sources.entry(source.to_string()).or_default().add(record.action);
        }
    }

    (boost_from_tallies(categories, config), boost_from_tallies(sources, config))
}

/// Multiply every boost by `rate^days`, dropping those that fall below `epsilon`.
///
/// A non-positive `days` leaves the map unchanged.
pub fn apply_decay(boosts: &BTreeMap<String, f64>, rate: f64, days: f64, epsilon: f64) -> BTreeMap<String, f64> {
    if days <= 0.0 {
        return boosts.clone();
    }
    let factor = rate.powf(days);
    boosts
        .iter()
        .map(|(key, value)| (key.clone(), value * factor))
        .filter(|(_, value)| value.abs() >= epsilon)
        .collect()
}

/// Run one learning pass over `state`, mutating its learned weights.
///
/// Only records inside the expiry window count. With fewer than
/// `min_samples` of them the state is not touched.
#[instrument(skip_all, fields(history = state.feedback_history.len()))]
pub fn learn(state: &mut FeedbackState, config: &FeedbackConfig, now_ms: i64) -> LearnOutcome {
    let cutoff = now_ms - i64::from(config.expiry_days) * MS_PER_DAY;
    let window: Vec<FeedbackRecord> = state
        .feedback_history
        .iter()
        .filter(|record| record.timestamp_ms > cutoff)
        .cloned()
        .collect();

    if window.len() < config.min_samples {
        info!(samples = window.len(), required = config.min_samples, "not enough feedback to learn from");
        return LearnOutcome::InsufficientSamples {
            samples: window.len(),
            required: config.min_samples,
        };
    }

    let (category_boosts, source_boosts) = compute_boosts(&window, config);

    let weights = &mut state.learned_weights;
    let days = weights
        .updated_at
        .map(|updated| (now_ms - updated) as f64 / MS_PER_DAY as f64)
        .unwrap_or(0.0);
    debug!(days, "decaying prior weights");

    let mut categories = apply_decay(&weights.category_boosts, config.decay_rate, days, config.epsilon);
    categories.extend(category_boosts);
    let mut sources = apply_decay(&weights.source_boosts, config.decay_rate, days, config.epsilon);
    sources.extend(source_boosts);

    weights.category_boosts = categories;
    weights.source_boosts = sources;
    weights.version += 1;
    weights.updated_at = Some(now_ms);

    info!(
        version = weights.version,
        samples = window.len(),
        categories = weights.category_boosts.len(),
        sources = weights.source_boosts.len(),
        "learned weights updated"
    );
    LearnOutcome::Updated {
        version: weights.version,
        samples: window.len(),
        categories: weights.category_boosts.len(),
        sources: weights.source_boosts.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curator_shared::FeedbackTag;

    const NOW: i64 = 1_760_000_000_000;

    fn record(n: usize, action: FeedbackAction, category: &str, source: &str, age_days: i64) -> FeedbackRecord {
        FeedbackRecord {
            id: format!("fb_{n}"),
            timestamp_ms: NOW - age_days * MS_PER_DAY,
            actor_id: "reviewer".into(),
            action,
            tags: vec![FeedbackTag {
                category: category.into(),
                source: source.into(),
                url: None,
                title: None,
            }],
        }
    }

    #[test]
    fn boosts_follow_approval_rate() {
        let mut history: Vec<FeedbackRecord> = (0..6)
            .map(|n| record(n, FeedbackAction::Approved, "tool", "Lab", 1))
            .collect();
        history.extend((6..16).map(|n| record(n, FeedbackAction::Ignored, "meme", "Forum", 1)));
        history.push(record(99, FeedbackAction::Approved, "rare", "Forum", 1));

        let (categories, sources) = compute_boosts(&history, &FeedbackConfig::default());

        assert!((categories["tool"] - 2.0 / 3.0).abs() < 1e-9);
        assert!((categories["meme"] + 1.0 / 3.0).abs() < 1e-9);
        assert!(!categories.contains_key("rare"));
        // Forum: 1 approved of 11.
        let expected = 1.0 / 11.0 - 1.0 / 3.0;
        assert!((sources["Forum"] - expected).abs() < 1e-9);
    }

    #[test]
    fn boosts_are_clipped() {
        let config = FeedbackConfig {
            scale_factor: 100.0,
            ..Default::default()
        };
        let history: Vec<FeedbackRecord> =
            (0..5).map(|n| record(n, FeedbackAction::Approved, "tool", "Lab", 0)).collect();
        let (categories, _) = compute_boosts(&history, &config);
        assert_eq!(categories["tool"], BOOST_BOUND);
    }

    #[test]
    fn decay_after_a_week() {
        let mut boosts = BTreeMap::new();
        boosts.insert("kept".to_string(), 1.0);
        boosts.insert("faded".to_string(), 0.012);

        let decayed = apply_decay(&boosts, 0.95, 7.0, 0.01);
        assert!((decayed["kept"] - 0.698).abs() < 1e-3);
        assert!(!decayed.contains_key("faded"));

        assert_eq!(apply_decay(&boosts, 0.95, 0.0, 0.01), boosts);
    }

    #[test]
    fn insufficient_history_is_a_no_op() {
        let mut state = FeedbackState {
            feedback_history: (0..4).map(|n| record(n, FeedbackAction::Approved, "tool", "Lab", 0)).collect(),
            ..Default::default()
        };
        let before = state.clone();

        let outcome = learn(&mut state, &FeedbackConfig::default(), NOW);
        assert_eq!(outcome, LearnOutcome::InsufficientSamples { samples: 4, required: 5 });
        assert_eq!(state, before);
    }

    #[test]
    fn expired_records_do_not_count() {
        let mut history: Vec<FeedbackRecord> =
            (0..3).map(|n| record(n, FeedbackAction::Approved, "tool", "Lab", 1)).collect();
        history.extend((3..8).map(|n| record(n, FeedbackAction::Approved, "tool", "Lab", 45)));
        let mut state = FeedbackState {
            feedback_history: history,
            ..Default::default()
        };

        let outcome = learn(&mut state, &FeedbackConfig::default(), NOW);
        assert!(!outcome.is_updated());
    }

    #[test]
    fn new_boosts_overwrite_decayed_priors() {
        let mut state = FeedbackState {
            feedback_history: (0..5).map(|n| record(n, FeedbackAction::Approved, "tool", "Lab", 0)).collect(),
            ..Default::default()
        };
        state.learned_weights.version = 3;
        state.learned_weights.updated_at = Some(NOW - 7 * MS_PER_DAY);
        state.learned_weights.category_boosts.insert("tool".into(), 2.0);
        state.learned_weights.category_boosts.insert("paper".into(), 1.0);
        state.learned_weights.source_boosts.insert("Gone".into(), 0.01);

        let outcome = learn(&mut state, &FeedbackConfig::default(), NOW);

        assert_eq!(
            outcome,
            LearnOutcome::Updated {
                version: 4,
                samples: 5,
                categories: 2,
                sources: 1,
            }
        );
        let weights = &state.learned_weights;
        assert!((weights.category_boosts["tool"] - 2.0 / 3.0).abs() < 1e-9);
        assert!((weights.category_boosts["paper"] - 0.95f64.powi(7)).abs() < 1e-9);
        assert!(!weights.source_boosts.contains_key("Gone"));
        assert_eq!(weights.updated_at, Some(NOW));
    }
}
