//! Deterministic corrections applied on top of model scores.

use curator_shared::types::{ACTIONABILITY_MAX, IMPACT_MAX};
use curator_shared::{LearnedWeights, RawScore, ScoreVector, Tier, clip};

/// Impact / actionability deltas for one provenance tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierAdjustment {
    pub impact: i32,
    pub actionability: i32,
}

impl TierAdjustment {
    pub fn net(&self) -> i32 {
        self.impact + self.actionability
    }
}

pub fn tier_adjustment(tier: Tier) -> TierAdjustment {
    let (impact, actionability) = match tier {
        Tier::A => (2, 1),
        Tier::B => (0, 0),
        Tier::C => (-1, -1),
        Tier::D => (-2, -1),
    };
    TierAdjustment {
        impact,
        actionability,
    }
}

/// Shift impact and actionability by the tier table, clip, and recompute the total.
pub fn apply_tier_boost(score: &mut ScoreVector, tier: Tier) {
    let adjustment = tier_adjustment(tier);
    score.impact = clip(score.impact + f64::from(adjustment.impact), 0.0, IMPACT_MAX);
    score.actionability = clip(
        score.actionability + f64::from(adjustment.actionability),
        0.0,
        ACTIONABILITY_MAX,
    );
    score.tier_boost = adjustment.net();
    score.recompute_total();
}

/// Add the learned `(category, source)` boost and recompute the total.
pub fn apply_learned_boost(score: &mut ScoreVector, weights: &LearnedWeights, source: &str) {
    score.learned_boost = weights.boost_for(&score.category, source);
    score.recompute_total();
}

/// Full adjusted score for one model result.
pub fn adjusted_score(
    raw: &RawScore,
    tier: Tier,
    source: &str,
    weights: Option<&LearnedWeights>,
) -> ScoreVector {
    let category = if raw.category.trim().is_empty() {
        "unknown"
    } else {
        raw.category.trim()
    };
    let mut score = ScoreVector::from_dimensions(
        raw.timeliness,
        raw.impact,
        raw.actionability,
        raw.relevance,
        category,
        raw.rationale.trim(),
    );
    apply_tier_boost(&mut score, tier);
    if let Some(weights) = weights {
        let source = if source.is_empty() { "unknown" } else { source };
        apply_learned_boost(&mut score, weights, source);
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use curator_shared::types::TOTAL_MAX;

    fn base() -> ScoreVector {
        ScoreVector::from_dimensions(4.0, 5.0, 4.0, 6.0, "tool", "")
    }

    #[test]
    fn tier_a_boosts_impact_and_actionability() {
        let mut score = base();
        apply_tier_boost(&mut score, Tier::A);
        assert_eq!(score.impact, 7.0);
        assert_eq!(score.actionability, 5.0);
        assert_eq!(score.tier_boost, 3);
    }

    #[test]
    fn tier_c_penalises() {
        let mut score = base();
        apply_tier_boost(&mut score, Tier::C);
        assert_eq!(score.impact, 4.0);
        assert_eq!(score.actionability, 3.0);
        assert_eq!(score.tier_boost, -2);
    }

    #[test]
    fn tier_a_and_c_differ_by_five() {
        let mut a = base();
        let mut c = base();
        apply_tier_boost(&mut a, Tier::A);
        apply_tier_boost(&mut c, Tier::C);
        assert_eq!(a.total - c.total, 5.0);
    }

    #[test]
    fn tier_adjustment_clips_dimensions() {
        let mut high = ScoreVector::from_dimensions(6.0, 9.0, 7.0, 8.0, "tool", "");
        apply_tier_boost(&mut high, Tier::A);
        assert_eq!(high.impact, 9.0);
        assert_eq!(high.actionability, 7.0);

        let mut low = ScoreVector::from_dimensions(0.0, 1.0, 0.0, 0.0, "tool", "");
        apply_tier_boost(&mut low, Tier::D);
        assert_eq!(low.impact, 0.0);
        assert_eq!(low.actionability, 0.0);
    }

    #[test]
    fn stacked_boosts_stay_within_total_range() {
        let mut weights = LearnedWeights::default();
        weights.category_boosts.insert("tool".into(), 3.0);
        weights.source_boosts.insert("OpenAI".into(), 3.0);
        let raw = RawScore {
            id: "x".into(),
            timeliness: 6.0,
            impact: 9.0,
            actionability: 7.0,
            relevance: 8.0,
            total: Some(99.0),
            category: "tool".into(),
            rationale: String::new(),
        };
        let score = adjusted_score(&raw, Tier::A, "OpenAI", Some(&weights));
        assert_eq!(score.learned_boost, 6.0);
        assert_eq!(score.total, TOTAL_MAX);

        weights.category_boosts.insert("tool".into(), -3.0);
        weights.source_boosts.insert("OpenAI".into(), -3.0);
        let zero = RawScore {
            timeliness: 1.0,
            impact: 1.0,
            actionability: 0.0,
            relevance: 1.0,
            ..raw
        };
        let score = adjusted_score(&zero, Tier::D, "OpenAI", Some(&weights));
        assert_eq!(score.total, 0.0);
    }

    #[test]
    fn empty_category_becomes_unknown() {
        let raw = RawScore {
            id: "x".into(),
            timeliness: 1.0,
            impact: 1.0,
            actionability: 1.0,
            relevance: 1.0,
            total: None,
            category: " ".into(),
            rationale: "why".into(),
        };
        let score = adjusted_score(&raw, Tier::B, "", None);
        assert_eq!(score.category, "unknown");
        assert_eq!(score.learned_boost, 0.0);
        assert_eq!(score.total, 4.0);
    }
}
