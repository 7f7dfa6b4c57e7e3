//! lounged - The lounge background service
//!
//! Wires configuration, the stores, the core engine and the daily log
//! together, then serves JSON-line requests on stdin and writes responses
//! and events to stdout. Logs go to stderr.

use anyhow::{Context, Result};
use clap::Parser;
use lounge_config::{Config, load_config_or_default};
use lounge_util::{
    LOUNGE_CONFIG_ENV, LOUNGE_DATA_DIR_ENV, default_config_path, format_datetime_full,
    is_mock_time_active,
};
use lounged::{Service, serve};
use std::path::PathBuf;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// lounged - Occupancy tracking and usage logging for a shared computer room
#[derive(Parser, Debug)]
#[command(name = "lounged")]
#[command(about = "Occupancy tracking and usage logging for a shared computer room", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/lounge/config.toml)
    #[arg(short, long, env = LOUNGE_CONFIG_ENV, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Data directory override (or set LOUNGE_DATA_DIR env var)
    #[arg(short, long, env = LOUNGE_DATA_DIR_ENV)]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Write logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    // stdout carries the protocol
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if args.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "lounged starting");
    if is_mock_time_active() {
        warn!(
            now = %format_datetime_full(&lounge_util::now()),
            "Mock time is active; log days follow the mocked clock"
        );
    }

    let mut config = load_config_or_default(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;
    if let Some(dir) = args.data_dir {
        config.service = config.service.with_data_dir(dir);
    }

    info!(
        config_path = %args.config.display(),
        workstations = config.room.workstations,
        consoles = config.room.consoles,
        "Configuration loaded"
    );

    let runtime = tokio::runtime::Runtime::new().context("Failed to start the async runtime")?;
    let result = runtime.block_on(run(config));
    // A blocked stdin read must not hold up exit
    runtime.shutdown_background();
    result
}

async fn run(config: Config) -> Result<()> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let shutdown = async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Received SIGINT, shutting down gracefully"),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
        }
    };

    let (service, refresh) = Service::open(&config)?;
    serve(
        service,
        refresh,
        tokio::io::stdin(),
        tokio::io::stdout(),
        shutdown,
    )
    .await
}
