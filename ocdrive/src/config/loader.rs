use std::fs;
use std::path::Path;

use tracing::debug;

use super::error::ConfigError;
use super::paths::resolve_paths;
use crate::types::{PathConfig, ShimConfig};

/// Environment variables that override file settings
pub const ENV_OVERRIDES: [&str; 5] = [
    "OCDRIVE_AGENT_BIN",
    "OCDRIVE_SESSION_PREFIX",
    "OCDRIVE_MODEL",
    "OCDRIVE_POLL_INTERVAL_SECS",
    "OCDRIVE_TIMEOUT_SECS",
];

/// Read a config file. A missing file yields the defaults.
pub fn read_config(config_path: &str) -> Result<ShimConfig, ConfigError> {
    let path = Path::new(config_path);
    if !path.exists() {
        debug!(path = config_path, "no config file, using defaults");
        return Ok(ShimConfig::default());
    }

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if content.trim().is_empty() {
        return Ok(ShimConfig::default());
    }
    serde_yaml::from_str(&content).map_err(|source| ConfigError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a config file and apply environment overrides
pub fn read_config_with_env(config_path: &str) -> Result<ShimConfig, ConfigError> {
    let mut config = read_config(config_path)?;
    apply_env_overrides(&mut config)?;
    Ok(config)
}

pub fn apply_env_overrides(config: &mut ShimConfig) -> Result<(), ConfigError> {
    apply_env_overrides_from(config, |var| std::env::var(var).ok())
}

/// Apply overrides using `lookup` in place of the process environment
pub fn apply_env_overrides_from<F>(config: &mut ShimConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(binary) = lookup("OCDRIVE_AGENT_BIN") {
        config.agent.binary = binary;
    }
    if let Some(prefix) = lookup("OCDRIVE_SESSION_PREFIX") {
        config.session.prefix = prefix;
    }
    if let Some(model) = lookup("OCDRIVE_MODEL") {
        config.agent.model = if model.trim().is_empty() {
            None
        } else {
            Some(model)
        };
    }
    if let Some(value) = lookup("OCDRIVE_POLL_INTERVAL_SECS") {
        config.session.poll_interval_secs = parse_secs("OCDRIVE_POLL_INTERVAL_SECS", &value)?;
    }
    if let Some(value) = lookup("OCDRIVE_TIMEOUT_SECS") {
        config.session.timeout_secs = parse_secs("OCDRIVE_TIMEOUT_SECS", &value)?;
    }
    Ok(())
}

fn parse_secs(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::BadSeconds {
            var,
            value: value.to_string(),
        })
}

/// Collect every problem with a config instead of stopping at the first
pub fn validate_config(config: &ShimConfig) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.agent.binary.trim().is_empty() {
        errors.push("agent.binary must not be empty".to_string());
    }
    if config.session.prefix.is_empty() {
        errors.push("session.prefix must not be empty".to_string());
    }
    if config.session.poll_interval_secs == 0 {
        errors.push("session.poll_interval_secs must be at least 1".to_string());
    }
    if config.session.timeout_secs < config.session.poll_interval_secs {
        errors.push(format!(
            "session.timeout_secs ({}) must not be shorter than session.poll_interval_secs ({})",
            config.session.timeout_secs, config.session.poll_interval_secs
        ));
    }
    for (name, value) in [
        ("session.poll_tail_lines", config.session.poll_tail_lines),
        ("session.final_tail_lines", config.session.final_tail_lines),
        ("session.output_tail_lines", config.session.output_tail_lines),
    ] {
        if value == 0 {
            errors.push(format!("{name} must be at least 1"));
        }
    }
    if config.session.max_output_chars == 0 {
        errors.push("session.max_output_chars must be at least 1".to_string());
    }
    if config.exec.command_timeout_secs == 0 {
        errors.push("exec.command_timeout_secs must be at least 1".to_string());
    }
    if let Some(model) = &config.agent.model {
        if !config.agent.allowed_models.is_empty()
            && !config.agent.allowed_models.iter().any(|m| m == model)
        {
            errors.push(format!(
                "agent.model {model} is not listed in agent.allowed_models"
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Invalid(errors))
    }
}

/// Resolve, read, override and validate the active configuration
pub fn load() -> Result<(ShimConfig, PathConfig), ConfigError> {
    let paths = resolve_paths();
    let config = read_config_with_env(&paths.config_path)?;
    validate_config(&config)?;
    debug!(path = %paths.config_path, kind = ?paths.config_type, "configuration loaded");
    Ok((config, paths))
}
