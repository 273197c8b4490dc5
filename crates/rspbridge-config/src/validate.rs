use std::net::SocketAddr;

use crate::config::Config;
use crate::error::ConfigError;

/// Validate a [`Config`], returning all detected violations.
///
/// Returns `Ok(())` when the config is valid, or `Err` with a
/// vector of every validation error found.
pub fn validate(config: &Config) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.server.listen.parse::<SocketAddr>().is_err() {
        errors.push(ConfigError::Validation {
            field: "server.listen".to_string(),
            message: format!("not a socket address: {:?}", config.server.listen),
        });
    }

    if config
        .target
        .image
        .as_ref()
        .is_some_and(|p| p.as_os_str().is_empty())
    {
        errors.push(ConfigError::Validation {
            field: "target.image".to_string(),
            message: "must not be empty".to_string(),
        });
    }

    if config
        .log
        .file
        .as_ref()
        .is_some_and(|p| p.as_os_str().is_empty())
    {
        errors.push(ConfigError::Validation {
            field: "log.file".to_string(),
            message: "must not be empty".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
