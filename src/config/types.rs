use crate::roster::OPTIMIZER_GROUP_NAME;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// State
// ============================================================================

/// Where the local management state lives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateConfig {
    /// State file path. Defaults to `~/.hivesync/state.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

// ============================================================================
// Optimizer
// ============================================================================

/// Shadow-group mirroring used by the optimizer feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_optimizer_group")]
    pub group_name: String,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            group_name: default_optimizer_group(),
        }
    }
}

fn default_optimizer_group() -> String {
    OPTIMIZER_GROUP_NAME.to_string()
}

// ============================================================================
// Secrets
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretsConfig {
    #[serde(default)]
    pub pacing: PacingConfig,
}

/// Random pause between secret creations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PacingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_min_ms")]
    pub min_ms: u64,
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_ms: default_min_ms(),
            max_ms: default_max_ms(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_min_ms() -> u64 {
    100
}

fn default_max_ms() -> u64 {
    500
}

// ============================================================================
// Logging
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
