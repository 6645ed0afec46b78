//! Application settings and configuration management

use crate::audio::{ArgStyle, FixedLocator, PlaybackOptions, PlayerLocator, PlayerRecipe, SystemLocator};
use crate::node::NodeConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Forces a specific player instead of probing the host.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerOverride {
    /// Executable name or path
    pub executable: String,
    /// Arguments; `{file}` is replaced by the sound file path
    #[serde(default = "default_override_args")]
    pub args: Vec<String>,
}

fn default_override_args() -> Vec<String> {
    vec!["{file}".to_string()]
}

/// Application settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Settings {
    /// Directory sound files are looked up in
    #[serde(default = "default_directory")]
    pub directory: String,
    /// File played when a message does not name one
    #[serde(default)]
    pub file: Option<String>,
    /// Options handed to the player
    #[serde(default)]
    pub options: PlaybackOptions,
    /// Allow overlapping playbacks
    #[serde(default)]
    pub allow_multiple: bool,
    #[serde(default)]
    pub player: Option<PlayerOverride>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// "text" or "json"
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_directory() -> String {
    ".".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

/// Error types for configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            directory: default_directory(),
            file: None,
            options: PlaybackOptions::default(),
            allow_multiple: false,
            player: None,
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

impl Settings {
    /// Load settings from a file. A missing file gives the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(&self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config").join("play-soundfile").join("config.json")
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(player) = &self.player {
            if player.executable.trim().is_empty() {
                return Err(ConfigError::ValidationError("Player executable cannot be empty".to_string()));
            }
        }

        if let Some(volume) = self.options.volume {
            if !(0.0..=1.0).contains(&volume) {
                return Err(ConfigError::ValidationError(format!(
                    "Volume must be between 0.0 and 1.0, got {}",
                    volume
                )));
            }
        }

        if self.log_format != "text" && self.log_format != "json" {
            return Err(ConfigError::ValidationError(format!(
                "Unknown log format '{}', expected 'text' or 'json'",
                self.log_format
            )));
        }

        Ok(())
    }

    /// Locator matching these settings: the override if set, else the host probe.
    pub fn locator(&self) -> Arc<dyn PlayerLocator> {
        match &self.player {
            Some(player) => Arc::new(FixedLocator(PlayerRecipe::new(
                player.executable.clone(),
                ArgStyle::Template(player.args.clone()),
            ))),
            None => Arc::new(SystemLocator::new()),
        }
    }

    /// Node configuration derived from these settings.
    pub fn node_config(&self, name: &str) -> NodeConfig {
        NodeConfig {
            name: name.to_string(),
            directory: self.directory.clone(),
            file: self.file.clone().unwrap_or_default(),
            options: self.options.clone(),
            allow_multiple: self.allow_multiple,
        }
    }
}
