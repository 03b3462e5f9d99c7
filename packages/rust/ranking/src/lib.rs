//! Quota-aware candidate selection, batched model scoring with
//! deterministic tier and learned-weight corrections, and threshold /
//! per-source diversity filtering.

pub mod adjust;
mod engine;
pub mod filter;
pub mod quota;

pub use adjust::{TierAdjustment, adjusted_score, apply_learned_boost, apply_tier_boost, tier_adjustment};
pub use engine::{RankingEngine, RankingOutcome, RankingStats};
pub use quota::{QuotaPlan, Selection, plan_quota, select_candidates};
