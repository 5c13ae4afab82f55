//! Configuration module for the pool-echo server.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values, and config file
//! values take precedence over the built-in defaults.

use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Execution backend for the listener and worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeType {
    /// Blocking accept loop with one OS thread per worker
    #[default]
    Threads,
    /// Tokio multi-thread runtime with one task per worker
    Tokio,
}

/// Command-line arguments for the echo server
#[derive(Parser, Debug, Default)]
#[command(name = "pool-echo")]
#[command(author = "pool-echo authors")]
#[command(version = "0.1.0")]
#[command(about = "A TCP echo server with a bounded worker pool", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to (e.g., 0.0.0.0)
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Capacity of the dispatch queue between the listener and the workers
    #[arg(short, long)]
    pub queue_size: Option<usize>,

    /// Number of connection handlers (workers)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// OS listen backlog for the listening socket
    #[arg(long)]
    pub backlog: Option<u32>,

    /// Per read/write timeout in seconds (0 = no timeout)
    #[arg(long = "io-timeout")]
    pub io_timeout_secs: Option<u64>,

    /// Execution backend
    #[arg(long, value_enum)]
    pub runtime: Option<RuntimeType>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listener-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// OS listen backlog
    #[serde(default = "default_backlog")]
    pub backlog: u32,
    /// Execution backend
    #[serde(default)]
    pub runtime: RuntimeType,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            backlog: default_backlog(),
            runtime: RuntimeType::default(),
        }
    }
}

/// Worker pool configuration
#[derive(Debug, Deserialize)]
pub struct PoolConfig {
    /// Capacity of the dispatch queue
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
    /// Number of workers
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Per read/write timeout in seconds
    #[serde(default)]
    pub io_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            queue_size: default_queue_size(),
            workers: default_workers(),
            io_timeout_secs: 0,
        }
    }
}

/// Logging configuration
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

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8118
}

fn default_backlog() -> u32 {
    1024
}

fn default_queue_size() -> usize {
    100
}

fn default_workers() -> usize {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub queue_size: usize,
    pub workers: usize,
    pub backlog: u32,
    pub io_timeout_secs: u64,
    pub runtime: RuntimeType,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::merge(CliArgs::default(), TomlConfig::default())
    }
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_cli(CliArgs::parse())
    }

    /// Resolve configuration from already-parsed CLI args.
    /// CLI arguments take precedence over TOML file values.
    pub fn from_cli(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        let config = Self::merge(cli, toml_config);
        config.validate()?;
        Ok(config)
    }

    fn merge(cli: CliArgs, toml_config: TomlConfig) -> Self {
        Config {
            host: cli.host.unwrap_or(toml_config.server.host),
            port: cli.port.unwrap_or(toml_config.server.port),
            queue_size: cli.queue_size.unwrap_or(toml_config.pool.queue_size),
            workers: cli.workers.unwrap_or(toml_config.pool.workers),
            backlog: cli.backlog.unwrap_or(toml_config.server.backlog),
            io_timeout_secs: cli
                .io_timeout_secs
                .unwrap_or(toml_config.pool.io_timeout_secs),
            runtime: cli.runtime.unwrap_or(toml_config.server.runtime),
            log_level: cli.log_level.unwrap_or(toml_config.logging.level),
        }
    }

    /// Reject values the pool cannot be built with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.queue_size == 0 {
            return Err(ConfigError::Invalid("queue_size must be at least 1".into()));
        }
        if self.backlog == 0 {
            return Err(ConfigError::Invalid("backlog must be at least 1".into()));
        }
        Ok(())
    }

    /// Address string handed to the listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Deadline applied to each read and write of the echo loop.
    pub fn io_timeout(&self) -> Option<Duration> {
        match self.io_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    Invalid(String),
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
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
