//! Application configuration for Curator.
//!
//! User config lives at `~/.curator/curator.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CuratorError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "curator.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".curator";

// ---------------------------------------------------------------------------
// Config structs (matching curator.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub openai: OpenAiConfig,

    #[serde(default)]
    pub dedup: DedupConfig,

    #[serde(default)]
    pub clustering: ClusterConfig,

    #[serde(default)]
    pub ranking: RankingConfig,

    #[serde(default)]
    pub feedback: FeedbackConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Which durable backend sits behind the ephemeral one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurableBackendKind {
    /// No durable state; every run starts empty.
    Memory,
    /// JSON documents in `store.dir`.
    #[default]
    File,
    /// A libSQL database at `store.dir/curator.db`.
    Libsql,
}

/// `[store]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding durable state.
    #[serde(default = "default_store_dir")]
    pub dir: String,

    #[serde(default)]
    pub backend: DurableBackendKind,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: default_store_dir(),
            backend: DurableBackendKind::default(),
        }
    }
}

fn default_store_dir() -> String {
    "~/.curator/state".into()
}

impl StoreConfig {
    /// `dir` with a leading `~/` expanded to the home directory.
    pub fn resolved_dir(&self) -> Result<PathBuf> {
        expand_home(&self.dir)
    }
}

/// `[openai]` section: any OpenAI-compatible endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_scoring_model")]
    pub scoring_model: String,

    #[serde(default = "default_scoring_model")]
    pub summary_model: String,

    /// Per-call timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per call, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            embedding_model: default_embedding_model(),
            scoring_model: default_scoring_model(),
            summary_model: default_scoring_model(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1/".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_scoring_model() -> String {
    "gpt-4o-mini".into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_attempts() -> u32 {
    3
}
fn default_initial_backoff_ms() -> u64 {
    500
}

/// `[dedup]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    #[serde(default = "default_seven_days")]
    pub url_expiry_days: u32,

    #[serde(default = "default_max_urls")]
    pub max_urls: usize,

    /// Run the embedding pass at all.
    #[serde(default = "default_true")]
    pub semantic_enabled: bool,

    /// Cosine similarity at or above which an item is a duplicate.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    #[serde(default = "default_seven_days")]
    pub embedding_expiry_days: u32,

    #[serde(default = "default_max_embeddings")]
    pub max_embeddings: usize,

    /// Texts per embedding request.
    #[serde(default = "default_embed_batch_size")]
    pub batch_size: usize,

    /// Items whose embedding text is this short are not embedded.
    #[serde(default = "default_min_text_chars")]
    pub min_text_chars: usize,

    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            url_expiry_days: default_seven_days(),
            max_urls: default_max_urls(),
            semantic_enabled: true,
            similarity_threshold: default_similarity_threshold(),
            embedding_expiry_days: default_seven_days(),
            max_embeddings: default_max_embeddings(),
            batch_size: default_embed_batch_size(),
            min_text_chars: default_min_text_chars(),
            max_text_chars: default_max_text_chars(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_seven_days() -> u32 {
    7
}
fn default_max_urls() -> usize {
    2000
}
fn default_similarity_threshold() -> f64 {
    0.85
}
fn default_max_embeddings() -> usize {
    500
}
fn default_embed_batch_size() -> usize {
    20
}
fn default_min_text_chars() -> usize {
    10
}
fn default_max_text_chars() -> usize {
    500
}

/// `[clustering]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cosine distance threshold (0.25 ⇒ similarity ≥ 0.75).
    #[serde(default = "default_eps")]
    pub eps: f64,

    #[serde(default = "default_min_pts")]
    pub min_pts: usize,

    #[serde(default = "default_max_cluster_size")]
    pub max_cluster_size: usize,

    /// Characters kept from the representative title when no label is generated.
    #[serde(default = "default_label_fallback_chars")]
    pub label_fallback_chars: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            eps: default_eps(),
            min_pts: default_min_pts(),
            max_cluster_size: default_max_cluster_size(),
            label_fallback_chars: default_label_fallback_chars(),
        }
    }
}

fn default_eps() -> f64 {
    0.25
}
fn default_min_pts() -> usize {
    2
}
fn default_max_cluster_size() -> usize {
    8
}
fn default_label_fallback_chars() -> usize {
    30
}

/// `[ranking]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    /// Total output budget before scoring.
    #[serde(default = "default_max_items")]
    pub max_items: usize,

    /// Share of the budget reserved for social items.
    #[serde(default = "default_social_ratio")]
    pub social_ratio: f64,

    #[serde(default = "default_score_batch_size")]
    pub batch_size: usize,

    /// Minimum total (out of 30) to survive the threshold filter.
    #[serde(default = "default_min_score")]
    pub min_score: f64,

    /// Max items from one source in the final selection.
    #[serde(default = "default_per_source_cap")]
    pub per_source_cap: usize,

    #[serde(default = "default_applied_cap")]
    pub applied_bucket_cap: usize,

    #[serde(default = "default_research_cap")]
    pub research_bucket_cap: usize,

    #[serde(default = "default_bucket_cap")]
    pub default_bucket_cap: usize,

    /// Practical/applied social handles that get a larger bucket.
    #[serde(default = "default_applied_sources")]
    pub applied_sources: Vec<String>,

    /// Research/opinion social handles that get a smaller bucket.
    #[serde(default = "default_research_sources")]
    pub research_sources: Vec<String>,

    /// Apply feedback-learned boosts.
    #[serde(default = "default_true")]
    pub learned_weights: bool,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            max_items: default_max_items(),
            social_ratio: default_social_ratio(),
            batch_size: default_score_batch_size(),
            min_score: default_min_score(),
            per_source_cap: default_per_source_cap(),
            applied_bucket_cap: default_applied_cap(),
            research_bucket_cap: default_research_cap(),
            default_bucket_cap: default_bucket_cap(),
            applied_sources: default_applied_sources(),
            research_sources: default_research_sources(),
            learned_weights: true,
        }
    }
}

fn default_max_items() -> usize {
    40
}
fn default_social_ratio() -> f64 {
    0.4
}
fn default_score_batch_size() -> usize {
    8
}
fn default_min_score() -> f64 {
    18.0
}
fn default_per_source_cap() -> usize {
    3
}
fn default_applied_cap() -> usize {
    4
}
fn default_research_cap() -> usize {
    1
}
fn default_bucket_cap() -> usize {
    2
}
fn default_applied_sources() -> Vec<String> {
    [
        "X - ai-agents",
        "X - ai-workflow",
        "X - llm-prompts",
        "X - ai-built",
        "X - ai-freebies",
        "X - buildinpublic",
        "X - ai-tips",
        "X - @simonw",
        "X - @swyx",
        "X - @hwchase17",
        "X - @goodside",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_research_sources() -> Vec<String> {
    vec!["X - @ylecun".into(), "X - @sama".into()]
}

/// `[feedback]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackConfig {
    /// Samples needed before a category/source (or the whole pass) counts.
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    #[serde(default = "default_scale_factor")]
    pub scale_factor: f64,

    /// Expected approval rate with no preference (one of three drafts).
    #[serde(default = "default_baseline")]
    pub baseline: f64,

    /// Per-day multiplier applied to prior boosts.
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f64,

    /// Boosts smaller than this in magnitude are dropped after decay.
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,

    #[serde(default = "default_feedback_expiry_days")]
    pub expiry_days: u32,

    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            min_samples: default_min_samples(),
            learning_rate: default_learning_rate(),
            scale_factor: default_scale_factor(),
            baseline: default_baseline(),
            decay_rate: default_decay_rate(),
            epsilon: default_epsilon(),
            expiry_days: default_feedback_expiry_days(),
            max_history: default_max_history(),
        }
    }
}

fn default_min_samples() -> usize {
    5
}
fn default_learning_rate() -> f64 {
    0.1
}
fn default_scale_factor() -> f64 {
    10.0
}
fn default_baseline() -> f64 {
    1.0 / 3.0
}
fn default_decay_rate() -> f64 {
    0.95
}
fn default_epsilon() -> f64 {
    0.01
}
fn default_feedback_expiry_days() -> u32 {
    30
}
fn default_max_history() -> usize {
    500
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Overall time budget for one invocation; unlimited when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_budget_secs: Option<u64>,

    /// Calls are skipped when less than this remains of the budget.
    #[serde(default = "default_min_call_budget_ms")]
    pub min_call_budget_ms: u64,

    /// Concurrent embedding/scoring batches in flight.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            time_budget_secs: None,
            min_call_budget_ms: default_min_call_budget_ms(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

fn default_min_call_budget_ms() -> u64 {
    2_000
}
fn default_max_concurrency() -> usize {
    4
}

impl PipelineConfig {
    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget_secs.map(Duration::from_secs)
    }

    pub fn min_call_budget(&self) -> Duration {
        Duration::from_millis(self.min_call_budget_ms)
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.curator/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| CuratorError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.curator/curator.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CuratorError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content)
        .map_err(|e| CuratorError::config(format!("failed to parse {}: {e}", path.display())))?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| CuratorError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| CuratorError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CuratorError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject parameter combinations the engines cannot work with.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let dedup = &config.dedup;
    if !(0.0..=1.0).contains(&dedup.similarity_threshold) {
        return Err(CuratorError::config(
            "dedup.similarity_threshold must be within [0, 1]",
        ));
    }
    if dedup.batch_size == 0 || config.ranking.batch_size == 0 {
        return Err(CuratorError::config("batch sizes must be at least 1"));
    }
    if config.ranking.max_items == 0 {
        return Err(CuratorError::config("ranking.max_items must be at least 1"));
    }
    if !(0.0..=2.0).contains(&config.clustering.eps) {
        return Err(CuratorError::config("clustering.eps must be within [0, 2]"));
    }
    if config.clustering.min_pts == 0 || config.clustering.max_cluster_size == 0 {
        return Err(CuratorError::config(
            "clustering.min_pts and clustering.max_cluster_size must be at least 1",
        ));
    }
    if !(0.0..=1.0).contains(&config.ranking.social_ratio) {
        return Err(CuratorError::config("ranking.social_ratio must be within [0, 1]"));
    }
    if !(0.0..=1.0).contains(&config.feedback.decay_rate) {
        return Err(CuratorError::config("feedback.decay_rate must be within [0, 1]"));
    }
    Ok(())
}

/// Read the API key from the env var named in config.
pub fn resolve_api_key(config: &OpenAiConfig) -> Result<String> {
    let var_name = &config.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(CuratorError::config(format!(
            "API key not found. Set the {var_name} environment variable."
        ))),
    }
}

fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| CuratorError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("similarity_threshold"));
        assert!(toml_str.contains("OPENAI_API_KEY"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.dedup.max_urls, 2000);
        assert_eq!(parsed.clustering.max_cluster_size, 8);
        assert_eq!(parsed.ranking.per_source_cap, 3);
        assert!((parsed.feedback.baseline - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn partial_sections_fill_defaults() {
        let toml_str = r#"
[store]
dir = "/tmp/curator"
backend = "libsql"

[ranking]
max_items = 10
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.store.backend, DurableBackendKind::Libsql);
        assert_eq!(config.ranking.max_items, 10);
        assert_eq!(config.ranking.batch_size, 8);
        assert_eq!(config.dedup.batch_size, 20);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = AppConfig::default();
        config.dedup.similarity_threshold = 1.5;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.ranking.batch_size = 0;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.ranking.max_items = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn store_dir_expands_home() {
        let config = StoreConfig {
            dir: "/var/lib/curator".into(),
            backend: DurableBackendKind::File,
        };
        assert_eq!(config.resolved_dir().unwrap(), PathBuf::from("/var/lib/curator"));
    }

    #[test]
    fn missing_api_key_is_config_error() {
        let config = OpenAiConfig {
            // Use a unique env var name to avoid interfering with other tests
            api_key_env: "CURATOR_TEST_NONEXISTENT_KEY_12345".into(),
            ..Default::default()
        };
        let err = resolve_api_key(&config).unwrap_err();
        assert!(matches!(err, CuratorError::Config { .. }));
        assert!(err.to_string().contains("API key not found"));
    }
}
