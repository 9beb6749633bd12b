use super::Config;
use anyhow::Result;
use tracing::warn;

/// Validation errors for configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{path}: {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

impl ConfigValidationError {
    fn new(path: &str, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// Validate a configuration object.
pub fn validate_config(config: &Config) -> Vec<ConfigValidationError> {
    let mut errors = Vec::new();

    if config.optimizer.group_name.trim().is_empty() {
        errors.push(ConfigValidationError::new(
            "optimizer.groupName",
            "Optimizer group name must not be empty",
        ));
    }

    let pacing = &config.secrets.pacing;
    if pacing.enabled && pacing.min_ms > pacing.max_ms {
        errors.push(ConfigValidationError::new(
            "secrets.pacing.minMs",
            format!(
                "minMs ({}) must not exceed maxMs ({})",
                pacing.min_ms, pacing.max_ms
            ),
        ));
    }
    if pacing.enabled && pacing.max_ms > 10_000 {
        warn!("Secret pacing of up to {}ms will slow provisioning noticeably", pacing.max_ms);
    }

    if !LOG_LEVELS.contains(&config.logging.level.to_ascii_lowercase().as_str()) {
        errors.push(ConfigValidationError::new(
            "logging.level",
            format!(
                "Unknown log level '{}', expected one of {}",
                config.logging.level,
                LOG_LEVELS.join(", ")
            ),
        ));
    }

    if let Some(path) = &config.state.path {
        if path.as_os_str().is_empty() {
            errors.push(ConfigValidationError::new("state.path", "State path must not be empty"));
        }
    }

    errors
}

/// Validate configuration and return Result.
pub fn validate_config_object(config: &Config) -> Result<()> {
    let errors = validate_config(config);
    if errors.is_empty() {
        Ok(())
    } else {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        anyhow::bail!("Configuration validation failed:\n{}", messages.join("\n"));
    }
}
