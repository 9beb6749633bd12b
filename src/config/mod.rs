mod types;
mod validation;

pub use types::*;
pub use validation::*;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Top-level hivesync configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    #[serde(default)]
    pub secrets: SecretsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,

    /// File the configuration was read from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Config {
    /// Load configuration from file, environment, and defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = path.map(PathBuf::from).or_else(find_config_file);

        let mut config = match config_path {
            Some(config_path) if config_path.exists() => {
                info!("Loading config from {}", config_path.display());
                let mut config = load_config_file(&config_path)?;
                config.source = Some(config_path);
                config
            }
            _ => {
                info!("No config file found, using defaults");
                Config::default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Write default configuration to a file.
    pub fn write_default(path: &str) -> Result<()> {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write config '{path}'"))?;
        Ok(())
    }

    /// State file to use, honouring an explicit override.
    pub fn state_path(&self, cli_override: Option<&str>) -> PathBuf {
        if let Some(path) = cli_override {
            return PathBuf::from(path);
        }
        self.state.path.clone().unwrap_or_else(default_state_path)
    }

    /// Shadow group to mirror into, when the optimizer is enabled.
    pub fn shadow_group(&self) -> Option<&str> {
        self.optimizer
            .enabled
            .then_some(self.optimizer.group_name.as_str())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("HIVESYNC_STATE") {
            self.state.path = Some(PathBuf::from(path));
        }

        if let Some(enabled) = env_flag("HIVESYNC_OPTIMIZER_ENABLED") {
            self.optimizer.enabled = enabled;
        }

        if let Ok(group) = std::env::var("HIVESYNC_OPTIMIZER_GROUP") {
            self.optimizer.group_name = group;
        }

        if env_flag("HIVESYNC_DISABLE_PACING") == Some(true) {
            self.secrets.pacing.enabled = false;
        }

        if let Ok(level) = std::env::var("HIVESYNC_LOG_LEVEL") {
            self.logging.level = level;
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let value = std::env::var(name).ok()?;
    parse_flag(&value)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Find the configuration file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    let candidates = [
        PathBuf::from("hivesync.json"),
        PathBuf::from("hivesync.json5"),
        PathBuf::from("hivesync.yaml"),
        PathBuf::from("hivesync.yml"),
        PathBuf::from("hivesync.toml"),
    ];

    for path in &candidates {
        if path.exists() {
            return Some(path.clone());
        }
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home.join(".hivesync").join("config.json");
        if home_config.exists() {
            return Some(home_config);
        }
    }

    None
}

fn default_state_path() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".hivesync").join("state.json"))
        .unwrap_or_else(|| PathBuf::from("hivesync-state.json"))
}

/// Load configuration from a file path.
pub fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;

    let config = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid YAML config '{}'", path.display()))?,
        Some("toml") => toml::from_str(&content)
            .with_context(|| format!("Invalid TOML config '{}'", path.display()))?,
        // JSON5 is a superset of JSON.
        _ => json5::from_str(&content)
            .with_context(|| format!("Invalid JSON config '{}'", path.display()))?,
    };

    Ok(config)
}
