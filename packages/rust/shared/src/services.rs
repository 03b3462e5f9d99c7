//! Capability interfaces injected into the engines.
//!
//! The HTTP implementations live in `curator-llm`; tests use in-process fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{ContentItem, Tier};

/// Text → vector. Output must align 1:1 by index with the input.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Rubric scoring of a batch of items.
#[async_trait]
pub trait ScoringService: Send + Sync {
    async fn score(&self, batch: &[ScoringInput]) -> Result<Vec<RawScore>>;
}

/// Short human-readable label for a group of titles.
#[async_trait]
pub trait SummarizationService: Send + Sync {
    async fn summarize(&self, titles: &[String]) -> Result<String>;
}

/// The slice of an item the scoring capability sees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringInput {
    pub id: String,
    pub title: String,
    pub snippet: String,
    pub source: String,
    pub tier: Tier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    pub engagement: f64,
}

impl From<&ContentItem> for ScoringInput {
    fn from(item: &ContentItem) -> Self {
        Self {
            id: item.id.clone(),
            title: item.title.clone(),
            snippet: item.snippet.clone(),
            source: item.source.clone(),
            tier: item.tier,
            published_at: item.published_at.map(|t| t.to_rfc3339()),
            engagement: item.engagement(),
        }
    }
}

/// One unadjusted result from the scoring capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawScore {
    pub id: String,
    #[serde(default)]
    pub timeliness: f64,
    #[serde(default)]
    pub impact: f64,
    #[serde(default)]
    pub actionability: f64,
    #[serde(default)]
    pub relevance: f64,
    /// Model-reported total; ignored, the total is always recomputed.
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(default)]
    pub category: String,
    #[serde(default, alias = "why")]
    pub rationale: String,
}
