//! auto-snapshots: rotates compute snapshots on a cron schedule and reports
//! each instance's outcome to a chat webhook.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use autosnap_compute::ComputeSession;
use autosnap_core::config::{load_dotenv, DEFAULT_CONFIG_PATH};
use autosnap_core::Config;
use autosnap_notify::{Dispatcher, WebhookNotifier};
use autosnap_rotation::{run_scheduler, RotationSchedule, Rotator};

// ── CLI ─────────────────────────────────────────────────────────────

/// Snapshot rotation daemon.
#[derive(Parser, Debug)]
#[command(name = "auto-snapshots", version, about)]
struct Cli {
    /// Path to the YAML config file used for values not set in the environment.
    #[arg(long, env = "CONFIG_PATH", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

// ── logging ─────────────────────────────────────────────────────────

/// Map a configured level name to an `EnvFilter` directive. Accepts the
/// usual `warning` / `critical` spellings as aliases.
fn level_directive(level: &str) -> String {
    match level.trim().to_lowercase().as_str() {
        "warning" => "warn".to_string(),
        "critical" | "fatal" => "error".to_string(),
        other => other.to_string(),
    }
}

fn init_logging(config: &Config) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level_directive(&config.log_level)))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match config.log_file.as_deref() {
        Some(path) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(open_log_file(path)?)),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}

fn open_log_file(path: &Path) -> anyhow::Result<std::fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))
}

/// Load config under a temporary stderr subscriber so warnings emitted
/// while loading are not lost before logging is configured.
fn load_config(path: &Path) -> anyhow::Result<Config> {
    let bootstrap = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("info"))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::with_default(bootstrap, || Config::load(path))
        .context("failed to load configuration")
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    let cli = Cli::parse();

    let config = load_config(&cli.config)?;
    init_logging(&config)?;

    info!("Auto-snapshots BOT started.");
    config.log_summary();

    let schedule = RotationSchedule::parse(&config.cron_schedule)?;

    let session = ComputeSession::from_config(&config)
        .await
        .context("failed to authenticate with the compute API")?;

    let webhook = WebhookNotifier::new(
        config.webhook_url.clone(),
        Duration::from_secs(config.request_timeout_secs),
    )?;
    let dispatcher = Dispatcher::new(vec![Box::new(webhook)]);
    info!(channels = dispatcher.channel_count(), "Notification channels ready");

    let rotator = Rotator::new(
        Arc::new(session),
        Arc::new(dispatcher),
        config.snapshot_description.clone(),
    );

    tokio::select! {
        result = run_scheduler(&schedule, &rotator) => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received, exiting"),
    }

    Ok(())
}
