//! src/config.rs
//! ============================================================================
//! # Config: Application Configuration Loader and Saver
//!
//! Manages the user-editable settings consumed by the scan/search worker and
//! the CLI front-end. Loads and saves settings as TOML from the proper
//! cross-platform config path using the
//! [`directories`](https://docs.rs/directories) crate.
//!
//! ## Features
//! - XDG-compliant config discovery and writing (Linux, macOS, Windows)
//! - Robust defaulting if no config file exists
//! - Async load/save for smooth integration with Tokio

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use tokio::fs as TokioFs;

use crate::fs::content::EngineSelector;

/// Search behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Depth budget for recursive searches when the request carries no
    /// explicit depth. 0 or negative means "this directory only".
    pub default_depth: i32,

    /// Default content engine used when a request does not pick one.
    pub engine: EngineSelector,

    /// Override binary path for the selected content engine.
    pub external_cmd: Option<String>,

    /// Minimum interval between progress updates during a walk.
    #[serde(with = "humantime_serde")]
    pub progress_interval: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_depth: 6,
            engine: EngineSelector::Ripgrep,
            external_cmd: None,
            progress_interval: Duration::from_millis(250),
        }
    }
}

/// Channel capacities for the worker protocol. Small and fixed: a full
/// channel means the producer retries or drops, never unbounded growth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub request_capacity: usize,

    pub response_capacity: usize,

    pub progress_capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            request_capacity: 8,
            response_capacity: 8,
            progress_capacity: 32,
        }
    }
}

/// Main configuration struct for the application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Whether the CLI shows dotfiles. The worker itself always returns
    /// them; hiding is a presentation concern.
    pub show_hidden: bool,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub channels: ChannelConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            show_hidden: true,
            search: SearchConfig::default(),
            channels: ChannelConfig::default(),
        }
    }
}

impl Config {
    /// Loads config from TOML file at the XDG-compliant app config dir, or
    /// returns defaults.
    ///
    /// The config is expected at `$XDG_CONFIG_HOME/scour/config.toml`
    /// (Linux), or equivalent on Windows/macOS.
    pub async fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            info!("Loading config from {}", path.display());
            let text = TokioFs::read_to_string(&path).await?;
            let cfg: Self = toml::from_str(&text)?;

            Ok(cfg)
        } else {
            info!(
                "No config file found at {}, using default configuration. Creating it now.",
                path.display()
            );

            let default_config = Self::default();
            default_config.save().await?;

            Ok(default_config)
        }
    }

    /// Saves config to TOML file at the XDG-compliant app config dir.
    pub async fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path()?;

        info!("Saving config to {}", path.display());

        if let Some(parent) = path.parent() {
            TokioFs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        TokioFs::write(&path, toml_str).await?;

        Ok(())
    }

    /// Returns the canonical config file path using `directories::ProjectDirs`.
    pub fn config_path() -> anyhow::Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "example", "scour")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory."))?;
        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    /// Returns the config directory (without filename).
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "example", "scour")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory."))?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }
}
