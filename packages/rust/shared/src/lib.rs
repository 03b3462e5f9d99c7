//! Shared types, error model, and configuration for Curator.
//!
//! This crate is the foundation depended on by all other Curator crates.
//! It provides:
//! - [`CuratorError`]: the unified error type
//! - Domain types ([`ContentItem`], [`ScoreVector`], [`EmbeddingRecord`], [`LearnedWeights`])
//! - Configuration ([`AppConfig`] and its sections, config loading)
//! - Capability traits ([`EmbeddingService`], [`ScoringService`], [`SummarizationService`])
//! - [`TimeBudget`], [`cosine_similarity`], and stage [`Degradation`] records

pub mod budget;
pub mod config;
pub mod error;
pub mod services;
pub mod stats;
pub mod types;
pub mod vector;

// Re-export public API at crate root for ergonomic imports.
pub use budget::TimeBudget;
pub use config::{
    AppConfig, ClusterConfig, DedupConfig, DurableBackendKind, FeedbackConfig, OpenAiConfig,
    PipelineConfig, RankingConfig, StoreConfig, config_dir, config_file_path, init_config,
    load_config, load_config_from, resolve_api_key, validate_config,
};
pub use error::{CuratorError, Result};
pub use services::{EmbeddingService, RawScore, ScoringInput, ScoringService, SummarizationService};
pub use stats::{Degradation, Stage};
pub use types::{
    ClusterRef, ContentItem, DedupStatus, EmbeddingRecord, EngagementMetrics, FeedbackAction,
    FeedbackRecord, FeedbackState, FeedbackTag, InputRecord, LearnedWeights, MS_PER_DAY,
    ScoreVector, SeenUrls, SourceClass, Tier, clip, item_id, now_ms,
};
pub use vector::{cosine_distance, cosine_similarity};
