//! Configuration loader plus strongly typed settings structures.
//!
//! The default config is embedded at compile time and written to
//! `~/.partywatch/config.toml` the first time we run. Every section and key is
//! optional; anything missing takes the built-in default.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

// Embed default configuration file at compile time
const DEFAULT_CONFIG: &str = include_str!("../defaults/config.toml");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Local player's username
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub debug_mode: bool,
    #[serde(default)]
    pub log_message_handler: bool,
    #[serde(default)]
    pub log_feature_events: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            debug_mode: false,
            log_message_handler: false,
            log_feature_events: false,
        }
    }
}

impl LoggingConfig {
    /// Classified chat lines get logged (they are emitted at debug)
    pub fn message_handler_verbose(&self) -> bool {
        self.debug_mode && self.log_message_handler
    }

    /// Party transitions get logged (they are emitted at debug)
    pub fn feature_events_verbose(&self) -> bool {
        self.debug_mode && self.log_feature_events
    }

    /// `EnvFilter` directives used when RUST_LOG is not set
    pub fn filter_directives(&self) -> String {
        let mut directives = vec![format!("partywatch={}", self.level)];
        if self.feature_events_verbose() {
            directives.push("partywatch::core::party=debug".to_string());
        }
        if self.message_handler_verbose() {
            directives.push("partywatch::core::messages=debug".to_string());
        }
        directives.join(",")
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryConfig {
    #[serde(default = "default_summary_enabled")]
    pub enabled: bool,
    #[serde(default = "default_max_invites")]
    pub max_invites: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            enabled: default_summary_enabled(),
            max_invites: default_max_invites(),
        }
    }
}

fn default_summary_enabled() -> bool {
    true
}

fn default_max_invites() -> usize {
    3
}

impl Config {
    /// Load ~/.partywatch/config.toml, creating it on first run
    pub fn load() -> Result<Self> {
        Self::extract_defaults()?;
        Self::load_from_path(&Self::config_path()?)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .context(format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&contents).context(format!("Failed to parse config file: {:?}", path))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// The embedded default config
    pub fn embedded_default() -> Result<Self> {
        Self::from_toml(DEFAULT_CONFIG).context("Failed to parse embedded default config")
    }

    /// Write the default config on first run (only creates missing files)
    fn extract_defaults() -> Result<()> {
        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir).context(format!("Failed to create {:?}", dir))?;

        let config_path = Self::config_path()?;
        if !config_path.exists() {
            fs::write(&config_path, DEFAULT_CONFIG).context("Failed to write config.toml")?;
            tracing::info!("Extracted config.toml to {:?}", config_path);
        }

        Ok(())
    }

    /// Get the base partywatch directory (~/.partywatch/)
    /// Can be overridden with PARTYWATCH_DIR environment variable
    pub fn config_dir() -> Result<PathBuf> {
        if let Ok(custom_dir) = std::env::var("PARTYWATCH_DIR") {
            return Ok(PathBuf::from(custom_dir));
        }

        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(home.join(".partywatch"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }
}
