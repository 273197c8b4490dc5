use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Log verbosity level.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Every wire exchange.
    Trace,
    /// Dispatch decisions.
    Debug,
    /// Session lifecycle (default).
    #[default]
    Info,
    /// Warnings only.
    Warn,
    /// Errors only.
    Error,
}

impl LogLevel {
    /// The `tracing` filter directive for this level.
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Debugger-facing listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on.
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Exit after the first session ends.
    #[serde(default)]
    pub once: bool,
}

fn default_listen() -> String {
    "127.0.0.1:2345".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            once: false,
        }
    }
}

/// The memory image served to the debugger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Flat binary to load. Without one the target has no memory.
    pub image: Option<PathBuf>,
    /// Load address of the image.
    #[serde(default)]
    pub base: u32,
    /// Program entry point, reported through `qOffsets`.
    pub entry: Option<u32>,
    /// Initial stack pointer.
    #[serde(default)]
    pub stack: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log verbosity level.
    #[serde(default)]
    pub level: LogLevel,
    /// Optional path to a log file; stderr otherwise.
    pub file: Option<PathBuf>,
}

/// Top-level rspbridge configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Listener settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Target settings.
    #[serde(default)]
    pub target: TargetConfig,
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}
