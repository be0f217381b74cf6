//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use toolscout_analysis::OpenRouterAnalyzer;
use toolscout_core::{
    AttemptResult, AutoTrigger, BatchProgress, BatchSummary, EnrichmentEngine, RecordOutcome,
    Scheduler, enriched_page, limiter_for, pipeline_status,
};
use toolscout_shared::{
    AppConfig, PipelineConfig, RecordStatus, StatusUpdate, ToolscoutError, init_config,
    load_config, resolve_database_path, validate_api_key, validate_config,
};
use toolscout_storage::{RecordStore, Storage};

use crate::http::{self, AppState};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// toolscout: enrich raw tool-directory records with LLM analysis.
#[derive(Parser)]
#[command(
    name = "toolscout",
    version,
    about = "Enrich raw tool-directory records into structured profiles.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Database path (overrides config).
    #[arg(long, env = "TOOLSCOUT_DB", global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Process every pending record once.
    Run,

    /// Process a single record if it is still pending.
    RunOne {
        /// Raw record id.
        id: String,
    },

    /// Show record counts per status.
    Status,

    /// List enriched records, newest first.
    List {
        /// Page number (1-based).
        #[arg(long, default_value = "1")]
        page: u64,

        /// Records per page (max 100).
        #[arg(long, default_value = "20")]
        page_size: u64,
    },

    /// Import raw records from a JSON array of objects.
    Import {
        /// Path to the JSON file.
        file: PathBuf,
    },

    /// Move a processed or failed record back to pending.
    Reset {
        /// Raw record id.
        id: String,
    },

    /// Start the HTTP server and the automatic scheduler.
    Serve {
        /// Bind address (overrides config).
        #[arg(long)]
        bind: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
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

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "toolscout=info",
        1 => "toolscout=debug",
        _ => "toolscout=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let db = cli.db;
    match cli.command {
        Command::Run => cmd_run(db).await,
        Command::RunOne { id } => cmd_run_one(db, &id).await,
        Command::Status => cmd_status(db).await,
        Command::List { page, page_size } => cmd_list(db, page, page_size).await,
        Command::Import { file } => cmd_import(db, &file).await,
        Command::Reset { id } => cmd_reset(db, &id).await,
        Command::Serve { bind } => cmd_serve(db, bind).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

async fn open_storage(config: &AppConfig, db: Option<PathBuf>) -> Result<Arc<Storage>> {
    let path = match db {
        Some(path) => path,
        None => resolve_database_path(config)?,
    };
    info!(path = %path.display(), "opening database");
    Ok(Arc::new(Storage::open(&path).await?))
}

/// Load config, open the database, and build an engine with a live analyzer.
async fn build_engine(db: Option<PathBuf>) -> Result<(AppConfig, Arc<EnrichmentEngine>)> {
    let config = load_config()?;
    validate_config(&config)?;
    let api_key = validate_api_key(&config)?;

    let storage = open_storage(&config, db).await?;
    let analyzer = OpenRouterAnalyzer::new(&config.analysis, api_key)?;
    let pipeline = PipelineConfig::from(&config);

    let engine = EnrichmentEngine::new(
        storage.clone(),
        storage,
        Arc::new(analyzer),
        limiter_for(pipeline.rate_limit),
    );
    Ok((config, Arc::new(engine)))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(db: Option<PathBuf>) -> Result<()> {
    let (_, engine) = build_engine(db).await?;

    let progress = CliProgress::new();
    let summary = engine.run_all_pending(&progress).await?;
    progress.finish();

    print_summary(&summary);
    Ok(())
}

async fn cmd_run_one(db: Option<PathBuf>, id: &str) -> Result<()> {
    let (_, engine) = build_engine(db).await?;

    match engine.run_single(id).await {
        Ok(outcome) => {
            println!();
            print_outcome(&outcome);
            println!();
            Ok(())
        }
        Err(ToolscoutError::NotPending { id }) => {
            Err(eyre!("record '{id}' is not pending (already processed, failed, or missing)"))
        }
        Err(e) => Err(e.into()),
    }
}

async fn cmd_status(db: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config, db).await?;
    let status = pipeline_status(storage.as_ref(), storage.as_ref()).await?;

    println!();
    println!("  Pending:   {}", status.pending);
    println!("  Processed: {}", status.processed);
    println!("  Failed:    {}", status.failed);
    println!("  Enriched:  {}", status.total_enriched);
    println!();
    Ok(())
}

async fn cmd_list(db: Option<PathBuf>, page: u64, page_size: u64) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config, db).await?;
    let page = enriched_page(storage.as_ref(), page, page_size).await?;

    if page.items.is_empty() {
        println!("No enriched records on page {} ({} total).", page.page, page.total);
        return Ok(());
    }

    println!();
    for item in &page.items {
        let profile = &item.record.profile;
        println!(
            "  {:<28} {:<40} {}",
            profile.slug,
            profile.name,
            item.record.processed_at.format("%Y-%m-%d %H:%M")
        );
    }
    println!();
    println!(
        "  Page {}/{} ({} total)",
        page.page,
        page.total_pages.max(1),
        page.total
    );
    println!();
    Ok(())
}

async fn cmd_import(db: Option<PathBuf>, file: &Path) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config, db).await?;

    let text = std::fs::read_to_string(file).map_err(|e| ToolscoutError::io(file, e))?;
    let records = parse_import(&text)
        .wrap_err_with(|| format!("cannot import '{}'", file.display()))?;

    for fields in &records {
        storage.insert_raw_record(fields).await?;
    }

    info!(count = records.len(), file = %file.display(), "imported raw records");
    println!("Imported {} pending record(s).", records.len());
    Ok(())
}

/// Parse an import file: a JSON array whose entries are all objects.
fn parse_import(text: &str) -> Result<Vec<serde_json::Map<String, serde_json::Value>>> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let serde_json::Value::Array(entries) = value else {
        return Err(eyre!("expected a JSON array of objects"));
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| match entry {
            serde_json::Value::Object(fields) => Ok(fields),
            other => Err(eyre!("entry {i} is not an object: {other}")),
        })
        .collect()
}

async fn cmd_reset(db: Option<PathBuf>, id: &str) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config, db).await?;

    let record = storage
        .get_raw_record(id)
        .await?
        .ok_or_else(|| eyre!("no raw record with id '{id}'"))?;

    if record.status == RecordStatus::Pending {
        println!("Record '{id}' is already pending.");
        return Ok(());
    }

    storage.update_status(id, &StatusUpdate::Pending).await?;
    info!(id, from = %record.status, "record reset to pending");
    println!("Record '{id}' reset from {} to pending.", record.status);
    Ok(())
}

async fn cmd_serve(db: Option<PathBuf>, bind: Option<String>) -> Result<()> {
    let (config, engine) = build_engine(db).await?;
    let pipeline = PipelineConfig::from(&config);

    let trigger = AutoTrigger::new(pipeline.auto_trigger);
    let scheduler = Scheduler::new(engine.clone(), trigger.clone(), &pipeline).start();

    let bind = bind.unwrap_or(config.server.bind);
    let state = AppState { engine, trigger };

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .wrap_err_with(|| format!("cannot bind {bind}"))?;
    info!(%bind, "HTTP server listening");
    println!("Listening on http://{bind}");

    axum::serve(listener, http::router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    scheduler.shutdown();
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_outcome(outcome: &RecordOutcome) {
    match &outcome.result {
        AttemptResult::Enriched { slug, fallback, .. } => {
            let note = if *fallback { " (fallback)" } else { "" };
            println!("  ok    {:<28} {}{note}", outcome.name, slug);
        }
        AttemptResult::Failed { error } => {
            println!("  FAIL  {:<28} {}", outcome.name, error);
        }
    }
}

fn print_summary(summary: &BatchSummary) {
    println!();
    if summary.total == 0 {
        println!("  No pending records.");
        println!();
        return;
    }
    for outcome in &summary.outcomes {
        print_outcome(outcome);
    }
    println!();
    println!("  Total:     {}", summary.total);
    println!("  Processed: {}", summary.processed);
    println!("  Failed:    {}", summary.failed);
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Batch progress on an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl BatchProgress for CliProgress {
    fn batch_started(&self, total: usize) {
        self.spinner
            .set_message(format!("Found {total} pending record(s)"));
    }

    fn record_started(&self, current: usize, total: usize, name: &str) {
        self.spinner
            .set_message(format!("Analyzing [{current}/{total}] {name}"));
    }

    fn record_finished(&self, outcome: &RecordOutcome) {
        if let AttemptResult::Failed { error } = &outcome.result {
            self.spinner
                .println(format!("  failed: {} ({error})", outcome.name));
        }
    }
}
