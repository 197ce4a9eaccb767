//! Configuration for the echoline server.
//!
//! Supports both command-line arguments and a TOML configuration file.
//! CLI arguments take precedence over config file values.

use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "echoline")]
#[command(version = "0.1.0")]
#[command(about = "A single-connection TCP line-echo server", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to (e.g., 127.0.0.1:12345)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Line buffer capacity in bytes; input beyond it is discarded
    #[arg(long)]
    pub capacity: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure.
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub buffer: BufferConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

/// Line-buffer configuration.
#[derive(Debug, Deserialize)]
pub struct BufferConfig {
    /// Capacity in bytes; only this many bytes of an input line are kept
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_listen() -> String {
    "127.0.0.1:12345".to_string()
}

fn default_capacity() -> usize {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    pub capacity: usize,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        Self::resolve(CliArgs::parse())
    }

    fn resolve(cli: CliArgs) -> Result<Self, ConfigError> {
        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        // Merge CLI args with TOML config (CLI takes precedence)
        let config = Config {
            listen: cli.listen.unwrap_or(toml_config.server.listen),
            capacity: cli.capacity.unwrap_or(toml_config.buffer.capacity),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        };

        if config.capacity == 0 {
            return Err(ConfigError::InvalidCapacity);
        }

        Ok(config)
    }
}

/// Configuration loading errors.
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    InvalidCapacity,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::InvalidCapacity => {
                write!(f, "Line buffer capacity must be at least 1")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(listen: Option<&str>, capacity: Option<usize>) -> CliArgs {
        CliArgs {
            config: None,
            listen: listen.map(str::to_string),
            capacity,
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn test_default_config() {
        let config = TomlConfig::default();
        assert_eq!(config.server.listen, "127.0.0.1:12345");
        assert_eq!(config.buffer.capacity, 10);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [server]
            listen = "0.0.0.0:12345"

            [buffer]
            capacity = 32

            [logging]
            level = "debug"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen, "0.0.0.0:12345");
        assert_eq!(config.buffer.capacity, 32);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_cli_precedence() {
        let config = Config::resolve(cli(Some("127.0.0.1:9999"), Some(16))).unwrap();
        assert_eq!(config.listen, "127.0.0.1:9999");
        assert_eq!(config.capacity, 16);
    }

    #[test]
    fn test_defaults_without_cli() {
        let config = Config::resolve(cli(None, None)).unwrap();
        assert_eq!(config.listen, "127.0.0.1:12345");
        assert_eq!(config.capacity, 10);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            Config::resolve(cli(None, Some(0))),
            Err(ConfigError::InvalidCapacity)
        ));
    }
}
