pub mod config;
pub mod error;
pub mod load;
pub mod validate;

pub use config::{Config, LogConfig, LogLevel, ServerConfig, TargetConfig};
pub use error::ConfigError;
pub use load::{load_config, load_from_str};
