use std::path::Path;

use crate::config::Config;
use crate::error::ConfigError;
use crate::validate::validate;

/// Load and validate the configuration file at `path`.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file is missing, unreadable,
/// not valid TOML, or fails validation.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    let config = load_from_str(&content)?;
    tracing::debug!("loaded config from {}", path.display());
    Ok(config)
}

/// Parse a TOML string directly into a validated [`Config`].
///
/// Useful for tests or one-off parsing without file I/O.
///
/// # Errors
///
/// Returns [`ConfigError`] on parse or validation failure.
pub fn load_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;

    validate(&config).map_err(|errors| {
        errors
            .into_iter()
            .next()
            .unwrap_or_else(|| ConfigError::Validation {
                field: "unknown".to_string(),
                message: "validation failed".to_string(),
            })
    })?;

    Ok(config)
}
