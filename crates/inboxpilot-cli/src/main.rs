//! CLI entry point for inboxpilot.
//!
//! This binary provides the `inboxpilot` command with subcommands for
//! running the ingestion loop, executing a single cycle, and inspecting the
//! pipeline's position in the message store.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::{mpsc, watch};
use tracing::info;
use tracing_subscriber::EnvFilter;

use inboxpilot_classify::{LlmClassifier, LlmClient, LlmClientConfig};
use inboxpilot_dispatch::{GoogleCalendarSink, GoogleTasksSink, Router};
use inboxpilot_engine::{
    Engine, EngineConfig, StoreWatcher, WatcherConfig, resolve_initial_watermark,
};
use inboxpilot_store::{Database, FileWatermarkStore, MessageStore, WatermarkStore};

mod config;
use config::Config;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// inboxpilot: turn messenger messages into calendar events and tasks.
#[derive(Parser)]
#[command(
    name = "inboxpilot",
    version,
    about = "Classify incoming messenger messages and file them into your calendar and task list"
)]
struct Cli {
    /// Path of the configuration file.
    #[arg(long, global = true, default_value = "inboxpilot.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ingestion loop (store watcher + poll timer).
    Run {
        /// Disable the file-change trigger and rely on polling only.
        #[arg(long)]
        no_watch: bool,
    },

    /// Run a single ingestion cycle and exit.
    Once,

    /// Show the watermark and how many messages are waiting.
    Status,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // Pick up a local .env before anything reads the environment.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Commands::Run { no_watch } => cmd_run(&cli.config, no_watch).await,
        Commands::Once => cmd_once(&cli.config).await,
        Commands::Status => cmd_status(&cli.config).await,
    }
}

/// Initialize the tracing subscriber, honoring `RUST_LOG`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

// ---------------------------------------------------------------------------
// Pipeline wiring
// ---------------------------------------------------------------------------

/// Build the full pipeline from a validated config.
async fn build_engine(config: &Config) -> Result<Arc<Engine>> {
    let db = Database::open_read_only(&config.store.path)
        .context("failed to open messenger database")?;
    let messages = MessageStore::new(db);

    let watermark_store: Arc<dyn WatermarkStore> =
        Arc::new(FileWatermarkStore::new(&config.store.watermark_path));

    let mut llm_config = match config.llm.provider.as_str() {
        "anthropic" => {
            LlmClientConfig::anthropic(config.llm.api_key.clone(), config.llm.model.clone())
        }
        _ => LlmClientConfig::openai(config.llm.api_key.clone(), config.llm.model.clone()),
    };
    if let Some(base_url) = &config.llm.base_url
        && !base_url.is_empty()
    {
        llm_config.base_url = base_url.clone();
    }
    let classifier = Arc::new(LlmClassifier::new(
        LlmClient::new(llm_config).context("failed to build LLM client")?,
    ));

    let events = Arc::new(GoogleCalendarSink::new(
        config.calendar.token.clone(),
        config.calendar.calendar_id.clone(),
        config.calendar.timezone.clone(),
    ));
    let tasks = Arc::new(GoogleTasksSink::new(
        config.tasks.token.clone(),
        config.tasks.tasklist_id.clone(),
    ));
    let router = Router::new(events, tasks, config.utc_offset()?);

    let initial = resolve_initial_watermark(&messages, watermark_store.as_ref()).await;

    Ok(Arc::new(Engine::new(
        messages,
        watermark_store,
        classifier,
        router,
        EngineConfig {
            poll_interval: std::time::Duration::from_secs(config.engine.poll_interval_secs),
            pace: std::time::Duration::from_millis(config.engine.pace_ms),
        },
        initial,
    )))
}

// ---------------------------------------------------------------------------
// Subcommand: run
// ---------------------------------------------------------------------------

async fn cmd_run(config_path: &std::path::Path, no_watch: bool) -> Result<()> {
    let config = Config::load(config_path)?;
    config.validate()?;

    info!(store = %config.store.path.display(), "starting inboxpilot");

    let engine = build_engine(&config).await?;

    // The sender must outlive the loop even when no watcher holds a clone,
    // or the engine's trigger channel closes immediately.
    let (trigger_tx, trigger_rx) = mpsc::channel(1);

    let _watcher = if no_watch {
        info!("store watcher disabled, polling only");
        None
    } else {
        Some(StoreWatcher::spawn(
            &config.store.path,
            WatcherConfig {
                debounce: std::time::Duration::from_millis(config.engine.debounce_ms),
                settle: std::time::Duration::from_millis(config.engine.settle_ms),
            },
            trigger_tx.clone(),
        )?)
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let engine_task = tokio::spawn(engine.run(trigger_rx, shutdown_rx));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("shutdown signal received, finishing current record");

    let _ = shutdown_tx.send(true);
    engine_task.await.context("engine task panicked")?;

    drop(trigger_tx);
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: once
// ---------------------------------------------------------------------------

async fn cmd_once(config_path: &std::path::Path) -> Result<()> {
    let config = Config::load(config_path)?;
    config.validate()?;

    let engine = build_engine(&config).await?;
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let stats = engine.cycle(&shutdown_rx).await;

    println!(
        "fetched {}, classified {}: {} events, {} tasks, {} informational, \
         {} skipped (no date), {} skipped (blank), {} dispatch failures",
        stats.fetched,
        stats.classified,
        stats.events_created,
        stats.tasks_created,
        stats.informational,
        stats.skipped_dateless,
        stats.skipped_blank,
        stats.dispatch_failures,
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: status
// ---------------------------------------------------------------------------

async fn cmd_status(config_path: &std::path::Path) -> Result<()> {
    let config = Config::load(config_path)?;
    config.validate_store()?;

    let db = Database::open_read_only(&config.store.path)
        .context("failed to open messenger database")?;
    let messages = MessageStore::new(db);
    let watermark_store = FileWatermarkStore::new(&config.store.watermark_path);

    println!("store:     {}", config.store.path.display());
    println!("watermark: {}", config.store.watermark_path.display());

    match watermark_store.load()? {
        Some(watermark) => {
            let pending = messages.fetch_since(watermark).await.len();
            println!("position:  {watermark}");
            println!("pending:   {pending}");
        }
        None => {
            let today = chrono::Local::now().date_naive();
            let seed = messages.seed_watermark(today).await;
            let pending = messages.fetch_since(seed).await.len();
            println!("position:  (not yet seeded; first run would start at {seed})");
            println!("pending:   {pending}");
        }
    }

    if let Some(max) = messages.max_id().await? {
        println!("store max: {max}");
    } else {
        println!("store max: (empty store)");
    }

    Ok(())
}
