//! Core domain types shared by every curation stage.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Milliseconds in one day; all persisted timestamps are epoch milliseconds.
pub const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Upper bounds of the four scoring dimensions and of the total.
pub const TIMELINESS_MAX: f64 = 6.0;
pub const IMPACT_MAX: f64 = 9.0;
pub const ACTIONABILITY_MAX: f64 = 7.0;
pub const RELEVANCE_MAX: f64 = 8.0;
pub const TOTAL_MAX: f64 = 30.0;

/// Bound applied to every learned category/source boost.
pub const BOOST_BOUND: f64 = 3.0;

/// Current wall-clock time as epoch milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Clamp `value` into `[lo, hi]`; NaN collapses to `lo`.
pub fn clip(value: f64, lo: f64, hi: f64) -> f64 {
    if value.is_nan() {
        return lo;
    }
    value.max(lo).min(hi)
}

/// Stable identifier derived from a URL (first 16 hex chars of its SHA-256).
pub fn item_id(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("itm_{}", &digest[..16])
}

/// Take at most `max_chars` characters (not bytes) of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

// ---------------------------------------------------------------------------
// Source classification
// ---------------------------------------------------------------------------

/// Where an item was collected from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceClass {
    #[default]
    Feed,
    Api,
    Social,
}

impl SourceClass {
    /// Social items are quota'd and bucketed separately from syndicated ones.
    pub fn is_social(&self) -> bool {
        matches!(self, Self::Social)
    }
}

/// Provenance/trust tier, `A` (official) through `D` (aggregator).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    A,
    #[default]
    B,
    C,
    D,
}

impl Tier {
    /// Ordering weight used when picking syndicated candidates.
    pub fn priority(&self) -> u8 {
        match self {
            Self::A => 4,
            Self::B => 3,
            Self::C => 2,
            Self::D => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }
}

/// Social engagement counters as reported upstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngagementMetrics {
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub retweet_count: u64,
    #[serde(default)]
    pub quote_count: u64,
    #[serde(default)]
    pub reply_count: u64,
    #[serde(default)]
    pub impression_count: u64,
}

impl EngagementMetrics {
    /// Weighted engagement signal; reshares count double, impressions barely.
    pub fn signal(&self) -> f64 {
        self.like_count as f64
            + self.retweet_count as f64 * 2.0
            + self.quote_count as f64 * 1.5
            + self.reply_count as f64 * 0.5
            + self.impression_count as f64 * 0.05
    }
}

// ---------------------------------------------------------------------------
// Input records and content items
// ---------------------------------------------------------------------------

/// One record as handed over by the collection collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputRecord {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub source_class: SourceClass,
    #[serde(default)]
    pub tier: Tier,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metrics: Option<EngagementMetrics>,
    /// Precomputed embedding, if the collector already has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Outcome of the dedup stage for an item that survived it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupStatus {
    /// Not yet through dedup.
    #[default]
    Pending,
    /// Passed both the URL and the semantic pass.
    Unique,
    /// Passed the URL pass; the semantic pass was skipped or degraded.
    UrlOnly,
}

/// Cluster annotation carried by an item that belongs to an event group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRef {
    pub cluster_id: String,
    pub label: String,
    pub size: usize,
    pub avg_score: f64,
    pub is_representative: bool,
}

/// A candidate item flowing through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    /// Derived from `url` via [`item_id`].
    pub id: String,
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub snippet: String,
    pub source: String,
    pub source_class: SourceClass,
    pub tier: Tier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<EngagementMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub dedup: DedupStatus,
    #[serde(default)]
    pub cluster: Option<ClusterRef>,
    #[serde(default)]
    pub is_noise: bool,
    /// Set when the item bypassed clustering for lack of an embedding.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub clustering_skipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<ScoreVector>,
}

impl ContentItem {
    /// Build a bare item; the remaining fields keep their defaults.
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        source: impl Into<String>,
        source_class: SourceClass,
    ) -> Self {
        let url = url.into();
        Self {
            id: item_id(&url),
            url,
            title: title.into(),
            snippet: String::new(),
            source: source.into(),
            source_class,
            tier: Tier::default(),
            published_at: None,
            metrics: None,
            embedding: None,
            dedup: DedupStatus::Pending,
            cluster: None,
            is_noise: false,
            clustering_skipped: false,
            score: None,
        }
    }

    /// Text used for embedding: title and snippet, capped at `max_chars`.
    pub fn embedding_text(&self, max_chars: usize) -> String {
        let combined = format!("{}\n{}", self.title.trim(), self.snippet.trim());
        truncate_chars(combined.trim(), max_chars)
    }

    /// Engagement signal, zero when no metrics were collected.
    pub fn engagement(&self) -> f64 {
        self.metrics.as_ref().map(|m| m.signal()).unwrap_or(0.0)
    }

    /// Score total, zero while unscored.
    pub fn total_score(&self) -> f64 {
        self.score.as_ref().map(|s| s.total).unwrap_or(0.0)
    }
}

impl From<InputRecord> for ContentItem {
    fn from(record: InputRecord) -> Self {
        let mut item = ContentItem::new(
            record.url,
            record.title,
            record.source,
            record.source_class,
        );
        item.snippet = record.snippet;
        item.tier = record.tier;
        item.published_at = record.published_at;
        item.metrics = record.metrics;
        item.embedding = record.embedding.filter(|e| !e.is_empty());
        item
    }
}

// ---------------------------------------------------------------------------
// ScoreVector
// ---------------------------------------------------------------------------

/// Multi-dimensional score attached by the ranking stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreVector {
    pub timeliness: f64,
    pub impact: f64,
    pub actionability: f64,
    pub relevance: f64,
    pub category: String,
    #[serde(default)]
    pub rationale: String,
    /// Net impact + actionability delta from the provenance tier.
    #[serde(default)]
    pub tier_boost: i32,
    /// Category + source boost from learned weights.
    #[serde(default)]
    pub learned_boost: f64,
    /// Always within `[0, TOTAL_MAX]`.
    pub total: f64,
    /// True when the total is an engagement heuristic, not a model score.
    #[serde(default)]
    pub fallback: bool,
}

impl ScoreVector {
    /// Build from raw dimension values, clipping each into its range.
    pub fn from_dimensions(
        timeliness: f64,
        impact: f64,
        actionability: f64,
        relevance: f64,
        category: impl Into<String>,
        rationale: impl Into<String>,
    ) -> Self {
        let mut score = Self {
            timeliness: clip(timeliness, 0.0, TIMELINESS_MAX),
            impact: clip(impact, 0.0, IMPACT_MAX),
            actionability: clip(actionability, 0.0, ACTIONABILITY_MAX),
            relevance: clip(relevance, 0.0, RELEVANCE_MAX),
            category: category.into(),
            rationale: rationale.into(),
            tier_boost: 0,
            learned_boost: 0.0,
            total: 0.0,
            fallback: false,
        };
        score.recompute_total();
        score
    }

    /// Heuristic score from an engagement signal: `round(ln(1 + signal) * 6)`.
    pub fn fallback(signal: f64) -> Self {
        let total = clip((signal.max(0.0).ln_1p() * 6.0).round(), 0.0, TOTAL_MAX);
        Self {
            timeliness: 0.0,
            impact: 0.0,
            actionability: 0.0,
            relevance: 0.0,
            category: "unknown".into(),
            rationale: "no model score; estimated from engagement".into(),
            tier_boost: 0,
            learned_boost: 0.0,
            total,
            fallback: true,
        }
    }

    pub fn dimension_sum(&self) -> f64 {
        self.timeliness + self.impact + self.actionability + self.relevance
    }

    /// Total = four dimensions + learned boost, clipped to `[0, TOTAL_MAX]`.
    pub fn recompute_total(&mut self) {
        self.total = clip(self.dimension_sum() + self.learned_boost, 0.0, TOTAL_MAX);
    }
}

// ---------------------------------------------------------------------------
// Persisted records
// ---------------------------------------------------------------------------

/// Seen-URL map: URL → first-seen epoch millis.
pub type SeenUrls = BTreeMap<String, i64>;

/// A persisted embedding of a previously accepted item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingRecord {
    pub id: String,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub title: String,
    pub timestamp_ms: i64,
}

/// What a reviewer did with a drafted selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackAction {
    Approved,
    Ignored,
}

/// The category/source of one item a feedback action applied to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackTag {
    pub category: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl FeedbackTag {
    /// Tag an item by its scored category (or `"unknown"`) and source.
    pub fn from_item(item: &ContentItem) -> Self {
        let category = item
            .score
            .as_ref()
            .map(|s| s.category.clone())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| "unknown".into());
        let source = if item.source.is_empty() {
            "unknown".to_string()
        } else {
            item.source.clone()
        };
        Self {
            category,
            source,
            url: Some(item.url.clone()),
            title: Some(item.title.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRecord {
    pub id: String,
    pub timestamp_ms: i64,
    pub actor_id: String,
    pub action: FeedbackAction,
    #[serde(default)]
    pub tags: Vec<FeedbackTag>,
}

/// Feedback-derived boosts read by the ranking stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnedWeights {
    pub version: u64,
    /// Epoch millis of the last learning pass.
    #[serde(default)]
    pub updated_at: Option<i64>,
    #[serde(default)]
    pub category_boosts: BTreeMap<String, f64>,
    #[serde(default)]
    pub source_boosts: BTreeMap<String, f64>,
}

impl LearnedWeights {
    /// Combined boost for `(category, source)`; each part is bounded to ±3.
    pub fn boost_for(&self, category: &str, source: &str) -> f64 {
        let category_boost = self.category_boosts.get(category).copied().unwrap_or(0.0);
        let source_boost = self.source_boosts.get(source).copied().unwrap_or(0.0);
        clip(category_boost, -BOOST_BOUND, BOOST_BOUND) + clip(source_boost, -BOOST_BOUND, BOOST_BOUND)
    }
}

/// The feedback portion of the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackState {
    #[serde(default)]
    pub feedback_history: Vec<FeedbackRecord>,
    #[serde(default)]
    pub learned_weights: LearnedWeights,
}
