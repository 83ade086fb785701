//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Environment variable for the upstream base URL.
pub const ENV_BASE_URL: &str = "API_BASE_URL";
/// Environment variable for the system prompt replacement.
pub const ENV_SYSTEM_PROMPT: &str = "SYSTEM_PROMPT_REPLACEMENT";
/// Environment variable for the custom headers JSON object.
pub const ENV_CUSTOM_HEADERS: &str = "CUSTOM_HEADERS";
/// Environment variable for the listener address.
pub const ENV_BIND_ADDRESS: &str = "BIND_ADDRESS";
/// Environment variable for the log level.
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: ProxyConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Resolve the full configuration: optional file, then environment, then validation.
pub fn resolve_config(path: Option<&Path>) -> Result<ProxyConfig, ConfigError> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Override file values with environment variables. Empty values are ignored.
pub fn apply_env_overrides<F>(config: &mut ProxyConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(base_url) = get(ENV_BASE_URL) {
        config.upstream.base_url = base_url;
    }
    if let Some(replacement) = get(ENV_SYSTEM_PROMPT) {
        config.rewrite.system_prompt_replacement = Some(replacement);
    }
    if let Some(custom) = get(ENV_CUSTOM_HEADERS) {
        config.headers.custom = Some(custom);
    }
    if let Some(bind_address) = get(ENV_BIND_ADDRESS) {
        config.listener.bind_address = bind_address;
    }
    if let Some(level) = get(ENV_LOG_LEVEL) {
        config.observability.log_level = level;
    }
}
