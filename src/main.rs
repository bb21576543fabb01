//! TriggerStore - distributed job store
//!
//! Operator CLI: prints the effective configuration and runs multi-instance
//! simulations against an in-memory store.

mod cli;
mod simulate;

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use triggerstore_core::{ConfigError, JobStoreConfig};

use crate::cli::{Cli, Commands};
use crate::simulate::SimulationOptions;

/// Keeps the non-blocking file writer flushing for the program duration.
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

fn init_tracing(log_dir: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let file_layer = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("triggerstore")
                .filename_suffix("log")
                .max_log_files(14)
                .build(dir)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let _ = FILE_GUARD.set(guard);
            Some(fmt::layer().with_writer(non_blocking).with_ansi(false))
        }
        None => None,
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true))
        .with(file_layer)
        .init();

    Ok(())
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("triggerstore").join("config.toml"))
}

/// Load the configuration from `path`, or from the default location when
/// a file exists there, or fall back to defaults.
fn load_config(path: Option<&Path>) -> Result<JobStoreConfig, ConfigError> {
    let path = match path {
        Some(path) => Some(path.to_path_buf()),
        None => default_config_path().filter(|p| p.exists()),
    };

    match path {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            JobStoreConfig::load(&path)
        }
        None => {
            info!("No configuration file found, using defaults");
            Ok(JobStoreConfig::default())
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.log_dir.as_deref())?;

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Simulate {
            instances,
            jobs,
            seconds,
            poll_ms,
            crash_after,
        } => {
            info!("Starting TriggerStore v{} simulation", env!("CARGO_PKG_VERSION"));
            let options = SimulationOptions {
                instances,
                jobs,
                duration: Duration::from_secs(seconds),
                poll_interval: Duration::from_millis(poll_ms),
                crash_after: crash_after.map(Duration::from_secs),
            };
            simulate::run(config, options).await?;
        }
    }

    Ok(())
}
