//! Award Force export CLI
//!
//! Local execution entry point. For AWS Lambda, use `award-export-lambda`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use award_export::{
    config::{self, Credentials},
    error::Result,
    models::{Config, StorageBackend},
    pipeline::{self, NotifyOutcome},
    storage::{self, LocalStateStore, StateStore},
};
use clap::{Parser, Subcommand};

/// Award Force entry export with Telegram change notifications
#[derive(Parser, Debug)]
#[command(
    name = "award-export",
    version,
    about = "Fetch Award Force entries, diff against the last run and notify Telegram"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "award-export.toml")]
    config: PathBuf,

    /// Snapshot file to use instead of the configured storage backend
    #[arg(short, long)]
    state: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Without a subcommand a full export run is performed
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check configuration and credentials without touching the network
    Validate,

    /// Show the stored baseline snapshot
    Info,
}

/// Initialize logging from the verbosity flag or the configured level.
fn init_logging(verbose: bool, config_path: &Path) {
    let level = if verbose {
        "debug".to_string()
    } else {
        Config::load(config_path)
            .map(|c| c.logging.level)
            .unwrap_or_else(|_| "info".to_string())
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, &cli.config);

    match execute(cli).await {
        Ok(()) => {
            log::info!("Done!");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        None => run(&cli.config, cli.state.as_deref()).await,
        Some(Command::Validate) => validate(&cli.config),
        Some(Command::Info) => info(&cli.config, cli.state.as_deref()).await,
    }
}

async fn open_store(config: &Config, state: Option<&Path>) -> Result<Box<dyn StateStore>> {
    match state {
        Some(path) => Ok(Box::new(LocalStateStore::new(path))),
        None => storage::open(&config.storage).await,
    }
}

async fn run(config_path: &Path, state: Option<&Path>) -> Result<()> {
    log::info!("Award Force export starting...");

    let (config, credentials) = config::load_all(config_path)?;
    let store = open_store(&config, state).await?;
    log::info!("Baseline location: {}", store.location());

    let report = pipeline::run_export(&config, &credentials, store.as_ref()).await?;

    match &report.notification {
        NotifyOutcome::Delivered(ack) => log::info!(
            "Notified {} change(s) in {} message(s)",
            report.delta.change_count(),
            ack.parts()
        ),
        NotifyOutcome::EmptyDeltaSkip => log::info!("No changes to report"),
    }
    if report.baseline_recovered {
        log::warn!("Previous baseline was unreadable; this run was reported as a first run");
    }
    log::info!(
        "Baseline now holds {} records (was {})",
        report.current_count,
        report.previous_count
    );
    Ok(())
}

fn validate(config_path: &Path) -> Result<()> {
    log::info!("Validating configuration...");

    let config = config::load_config(config_path)?;
    log::info!(
        "✓ Config OK ({} categories, {} tracked fields, storage: {:?})",
        config.api.categories.len(),
        config.api.fields.len(),
        config.storage.backend
    );

    if config.storage.backend == StorageBackend::S3 && config.storage.s3_bucket.is_none() {
        return Err(award_export::error::AppError::config(
            "storage.s3_bucket is required for the s3 backend",
        ));
    }

    let credentials = Credentials::from_env()?;
    log::info!("✓ Credentials OK (chat {})", credentials.chat_id);

    log::info!("All validations passed!");
    Ok(())
}

async fn info(config_path: &Path, state: Option<&Path>) -> Result<()> {
    let config = config::load_config(config_path)?;
    let store = open_store(&config, state).await?;
    log::info!("Baseline location: {}", store.location());

    match store.describe().await? {
        Some(info) => {
            log::info!("Snapshot format: v{}", info.version);
            log::info!("Captured at: {}", info.captured_at);
            log::info!("Records: {}", info.count);
        }
        None => log::info!("No snapshot found yet."),
    }
    Ok(())
}
