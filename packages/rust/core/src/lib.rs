//! Pipeline orchestration for Curator.
//!
//! Ties the stage engines together into one invocation
//! (Dedup → Cluster → Rank) plus the independent feedback-learning pass.

pub mod pipeline;
pub mod services;

pub use pipeline::{Pipeline, PipelineOutput, PipelineStats, ProgressReporter, SilentProgress};
pub use services::Services;
