//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use curator_core::{Pipeline, PipelineStats, ProgressReporter};
use curator_feedback::{FeedbackEntry, LearnOutcome};
use curator_shared::{
    AppConfig, ContentItem, DurableBackendKind, FeedbackAction, InputRecord, Stage, init_config,
    load_config, load_config_from,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Curator: turn a noisy stream of candidate items into a short ranked list.
#[derive(Parser)]
#[command(
    name = "curator",
    version,
    about = "Deduplicate, cluster and rank candidate content items; learn from reviewer feedback.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.curator/curator.toml).
    #[arg(long, env = "CURATOR_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Override `[store].dir`.
    #[arg(long, env = "CURATOR_STORE_DIR", global = true)]
    pub store_dir: Option<String>,

    /// Override `[store].backend`.
    #[arg(long, global = true)]
    pub backend: Option<BackendArg>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum BackendArg {
    Memory,
    File,
    Libsql,
}

impl From<BackendArg> for DurableBackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Memory => Self::Memory,
            BackendArg::File => Self::File,
            BackendArg::Libsql => Self::Libsql,
        }
    }
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum ActionArg {
    Approved,
    Ignored,
}

impl From<ActionArg> for FeedbackAction {
    fn from(arg: ActionArg) -> Self {
        match arg {
            ActionArg::Approved => Self::Approved,
            ActionArg::Ignored => Self::Ignored,
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Curate a JSON array of candidate items.
    Run {
        /// Input file with the candidate records.
        #[arg(short, long)]
        input: PathBuf,

        /// Write the selection here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write run statistics as JSON to this file.
        #[arg(long)]
        stats: Option<PathBuf>,

        /// Overall time budget in seconds.
        #[arg(long, env = "CURATOR_TIME_BUDGET")]
        time_budget: Option<u64>,

        /// Skip event clustering.
        #[arg(long)]
        no_cluster: bool,
    },

    /// Refresh learned weights from the recorded feedback.
    Learn,

    /// Record or inspect reviewer feedback.
    Feedback {
        #[command(subcommand)]
        action: FeedbackCommand,
    },

    /// Print the current learned weights.
    Weights,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub(crate) enum FeedbackCommand {
    /// Record one approve/ignore action over a set of items.
    Record {
        #[arg(long)]
        action: ActionArg,

        /// Reviewer identifier.
        #[arg(long)]
        actor: Option<String>,

        /// JSON file with the items acted upon (as emitted by `run`).
        #[arg(long)]
        items: PathBuf,
    },
    /// Summarize the feedback history.
    Stats,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "curator=info",
        1 => "curator=debug",
        _ => "curator=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    if let Command::Config { action } = &cli.command {
        return match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&resolve_config(&cli)?),
        };
    }

    let mut config = resolve_config(&cli)?;
    match cli.command {
        Command::Run {
            input,
            output,
            stats,
            time_budget,
            no_cluster,
        } => {
            if time_budget.is_some() {
                config.pipeline.time_budget_secs = time_budget;
            }
            if no_cluster {
                config.clustering.enabled = false;
            }
            cmd_run(config, &input, output.as_deref(), stats.as_deref()).await
        }
        Command::Learn => cmd_learn(config).await,
        Command::Feedback { action } => match action {
            FeedbackCommand::Record { action, actor, items } => {
                cmd_feedback_record(config, action.into(), actor, &items).await
            }
            FeedbackCommand::Stats => cmd_feedback_stats(config).await,
        },
        Command::Weights => cmd_weights(config).await,
        Command::Config { .. } => Ok(()),
    }
}

/// Config file, then flag/env overrides.
fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    if let Some(dir) = &cli.store_dir {
        config.store.dir = dir.clone();
    }
    if let Some(backend) = cli.backend {
        config.store.backend = backend.into();
    }
    Ok(config)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path).wrap_err_with(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&raw).wrap_err_with(|| format!("invalid JSON in {}", path.display()))
}

fn write_json<T: Serialize>(path: Option<&Path>, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match path {
        Some(path) => std::fs::write(path, json).wrap_err_with(|| format!("cannot write {}", path.display())),
        None => {
            println!("{json}");
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(config: AppConfig, input: &Path, output: Option<&Path>, stats_path: Option<&Path>) -> Result<()> {
    let records: Vec<InputRecord> = read_json(input)?;
    let items: Vec<ContentItem> = records.into_iter().map(ContentItem::from).collect();
    info!(input = %input.display(), items = items.len(), "curating");

    let pipeline = Pipeline::open(config).await?;
    let reporter = CliProgress::new();
    let result = pipeline.run(items, &reporter).await;
    reporter.spinner.finish_and_clear();
    let result = result?;

    write_json(output, &result.items)?;
    if let Some(path) = stats_path {
        write_json(Some(path), &result.stats)?;
    }

    let stats = &result.stats;
    eprintln!();
    eprintln!("  Curation complete");
    eprintln!("  Input:        {}", stats.input);
    eprintln!(
        "  Dedup:        {} URL duplicates, {} semantic duplicates",
        stats.dedup.url_duplicates, stats.dedup.duplicates
    );
    if let Some(cluster) = &stats.cluster {
        eprintln!("  Events:       {} ({} items, {} noise)", cluster.clusters, cluster.clustered_items, cluster.noise);
    }
    eprintln!(
        "  Ranking:      {} selected, {} above threshold, {} after source cap",
        stats.ranking.selected, stats.ranking.after_threshold, stats.ranking.after_cap
    );
    eprintln!("  Store:        {}", stats.store.mode);
    for degradation in &stats.degradations {
        eprintln!("  Degraded:     {degradation}");
    }
    if let Some(path) = output {
        eprintln!("  Output:       {}", path.display());
    }
    eprintln!("  Time:         {:.1}s", stats.elapsed_ms as f64 / 1000.0);
    eprintln!();
    Ok(())
}

async fn cmd_learn(config: AppConfig) -> Result<()> {
    let pipeline = Pipeline::open(config).await?;
    match pipeline.learn().await? {
        LearnOutcome::Updated {
            version,
            samples,
            categories,
            sources,
        } => {
            println!("Learned weights v{version} from {samples} records ({categories} categories, {sources} sources)");
        }
        LearnOutcome::InsufficientSamples { samples, required } => {
            println!("Not enough feedback yet: {samples} records, {required} required. Weights unchanged.");
        }
    }
    Ok(())
}

async fn cmd_feedback_record(
    config: AppConfig,
    action: FeedbackAction,
    actor: Option<String>,
    items_path: &Path,
) -> Result<()> {
    let items: Vec<ContentItem> = read_json(items_path)?;
    if items.is_empty() {
        return Err(eyre!("{} contains no items", items_path.display()));
    }
    let pipeline = Pipeline::open(config).await?;
    let record = pipeline
        .record_feedback(FeedbackEntry {
            actor_id: actor,
            action,
            items,
        })
        .await?;
    println!("Recorded {} ({} items)", record.id, record.tags.len());
    Ok(())
}

async fn cmd_feedback_stats(config: AppConfig) -> Result<()> {
    let pipeline = Pipeline::open(config).await?;
    write_json(None, &pipeline.feedback_stats().await?)
}

async fn cmd_weights(config: AppConfig) -> Result<()> {
    let pipeline = Pipeline::open(config).await?;
    write_json(None, &pipeline.weights().await?)
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner on stderr.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn stage_done(&self, stage: Stage, input: usize, output: usize) {
        self.spinner.println(format!("  {stage}: {input} → {output}"));
    }

    fn done(&self, _stats: &PipelineStats) {
        self.spinner.finish_and_clear();
    }
}
