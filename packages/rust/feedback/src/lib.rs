//! Feedback learning: records reviewer actions and turns them into
//! decayed category/source boosts that ranking reads on its next run.

mod engine;
pub mod learn;
pub mod record;
pub mod stats;

pub use engine::FeedbackEngine;
pub use learn::{LearnOutcome, apply_decay, compute_boosts, learn};
pub use record::{FeedbackEntry, record_feedback};
pub use stats::{ActionTally, FeedbackStats, feedback_stats};
