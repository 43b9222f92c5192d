//! src/logging.rs
//! ============================================================================
//! # Logging: Tracing Initialization
//!
//! Sets up structured logging for the worker: an env-filtered fmt layer on
//! stderr plus a non-blocking rolling file appender. The returned
//! [`WorkerGuard`] must be held for the lifetime of the process or buffered
//! log lines are lost on exit.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    EnvFilter,
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Logger settings. Kept separate from [`Config`](crate::config::Config):
/// logging must come up before the config file is read.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub log_dir: PathBuf,

    pub log_file_prefix: String,

    /// Default level directive when `RUST_LOG` is unset.
    pub log_level: String,

    pub rotation: LogRotation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    Never,
    Daily,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("./logs"),
            log_file_prefix: "scour".to_string(),
            log_level: "info".to_string(),
            rotation: LogRotation::Daily,
        }
    }
}

/// Initialize logging with defaults.
pub fn init_default_logging() -> Result<WorkerGuard> {
    init_logging_with_config(&LoggerConfig::default())
}

/// Initialize logging with an explicit level directive.
pub fn init_logging_with_level(level: &str) -> Result<WorkerGuard> {
    let config = LoggerConfig {
        log_level: level.to_string(),
        ..LoggerConfig::default()
    };
    init_logging_with_config(&config)
}

/// Initialize the global subscriber: stderr fmt layer + rolling file layer.
pub fn init_logging_with_config(config: &LoggerConfig) -> Result<WorkerGuard> {
    setup_log_directory(&config.log_dir)?;

    let appender: RollingFileAppender = match config.rotation {
        LogRotation::Daily => RollingFileAppender::new(
            Rotation::DAILY,
            &config.log_dir,
            &config.log_file_prefix,
        ),
        LogRotation::Never => RollingFileAppender::new(
            Rotation::NEVER,
            &config.log_dir,
            &config.log_file_prefix,
        ),
    };
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {e}"))?;

    Ok(guard)
}

fn setup_log_directory(log_dir: &Path) -> Result<()> {
    if !log_dir.exists() {
        std::fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
    }
    Ok(())
}
