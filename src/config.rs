//! Configuration handling for the DBA shell.
//!
//! This module provides configuration management via CLI arguments and environment variables.

use crate::error::{DbError, DbResult};
use crate::tools::format::OutputFormat;
use clap::Parser;
use std::path::PathBuf;

/// Alias file location relative to `$HOME`.
pub const DEFAULT_ALIAS_FILE: &str = "config/.dbaccess.toml";

// Pool configuration defaults
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_MAX_CONNECTIONS_SQLITE: u32 = 1;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Connection pool configuration options.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct PoolOptions {
    /// Maximum connections in pool (default: 5, 1 for SQLite)
    pub max_connections: Option<u32>,
    /// Connection acquire timeout in seconds (default: 30)
    pub acquire_timeout_secs: Option<u64>,
    /// Whether to test connections before use (default: true)
    pub test_before_acquire: Option<bool>,
}

impl PoolOptions {
    /// Get max_connections with default value based on database type.
    pub fn max_connections_or_default(&self, is_sqlite: bool) -> u32 {
        self.max_connections.unwrap_or(if is_sqlite {
            DEFAULT_MAX_CONNECTIONS_SQLITE
        } else {
            DEFAULT_MAX_CONNECTIONS
        })
    }

    pub fn acquire_timeout_or_default(&self) -> u64 {
        self.acquire_timeout_secs
            .unwrap_or(DEFAULT_ACQUIRE_TIMEOUT_SECS)
    }

    pub fn test_before_acquire_or_default(&self) -> bool {
        self.test_before_acquire.unwrap_or(true)
    }

    /// Validate pool options and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_connections == Some(0) {
            return Err("max_connections must be greater than 0".to_string());
        }
        if self.acquire_timeout_secs == Some(0) {
            return Err("acquire_timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Configuration for the DBA shell.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dba-shell",
    about = "Interactive shell for querying and inspecting Oracle, MySQL and SQLite databases",
    version,
    author
)]
pub struct Config {
    /// Alias file (TOML). Defaults to $HOME/config/.dbaccess.toml
    #[arg(short, long, value_name = "PATH", env = "DBA_SHELL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Alias to connect to at startup, as ALIAS or ALIAS.schema
    #[arg(short, long, value_name = "ALIAS", env = "DBA_SHELL_ALIAS")]
    pub alias: Option<String>,

    /// Default output format
    #[arg(
        short,
        long,
        value_enum,
        default_value = "table",
        env = "DBA_SHELL_FORMAT"
    )]
    pub format: OutputFormat,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "DBA_SHELL_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "DBA_SHELL_JSON_LOGS")]
    pub json_logs: bool,

    /// Enable logging output on stderr (off by default to keep results clean)
    #[arg(long, env = "DBA_SHELL_ENABLE_LOGS")]
    pub enable_logs: bool,

    /// Maximum pooled connections per alias
    #[arg(long, env = "DBA_SHELL_MAX_CONNECTIONS")]
    pub max_connections: Option<u32>,

    /// Connection acquire timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_ACQUIRE_TIMEOUT_SECS,
        env = "DBA_SHELL_ACQUIRE_TIMEOUT"
    )]
    pub acquire_timeout: u64,

    /// Run one shell command and exit, e.g. `tables orders -f json`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            config: None,
            alias: None,
            format: OutputFormat::Table,
            log_level: "info".to_string(),
            json_logs: false,
            enable_logs: false,
            max_connections: None,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT_SECS,
            command: Vec::new(),
        }
    }

    /// Path of the alias file to load.
    pub fn alias_file(&self) -> DbResult<PathBuf> {
        if let Some(path) = &self.config {
            return Ok(path.clone());
        }
        let home = std::env::var_os("HOME").ok_or_else(|| {
            DbError::config("HOME is not set; pass --config with the alias file path")
        })?;
        Ok(PathBuf::from(home).join(DEFAULT_ALIAS_FILE))
    }

    pub fn pool_options(&self) -> DbResult<PoolOptions> {
        let options = PoolOptions {
            max_connections: self.max_connections,
            acquire_timeout_secs: Some(self.acquire_timeout),
            test_before_acquire: None,
        };
        options.validate().map_err(DbError::config)?;
        Ok(options)
    }

    /// True when a single command was given on the command line.
    pub fn is_one_shot(&self) -> bool {
        !self.command.is_empty()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.format, OutputFormat::Table);
        assert_eq!(config.acquire_timeout, DEFAULT_ACQUIRE_TIMEOUT_SECS);
        assert!(!config.is_one_shot());
    }

    #[test]
    fn test_explicit_alias_file_wins() {
        let config = Config {
            config: Some(PathBuf::from("/tmp/aliases.toml")),
            ..Config::default()
        };
        assert_eq!(
            config.alias_file().unwrap(),
            PathBuf::from("/tmp/aliases.toml")
        );
    }

    #[test]
    fn test_pool_defaults_by_backend() {
        let options = PoolOptions::default();
        assert_eq!(options.max_connections_or_default(true), 1);
        assert_eq!(
            options.max_connections_or_default(false),
            DEFAULT_MAX_CONNECTIONS
        );
        assert!(options.test_before_acquire_or_default());
    }

    #[test]
    fn test_zero_max_connections_rejected() {
        let config = Config {
            max_connections: Some(0),
            ..Config::default()
        };
        assert!(matches!(
            config.pool_options(),
            Err(DbError::Config { .. })
        ));
    }

    #[test]
    fn test_trailing_command_parsed() {
        let config =
            Config::try_parse_from(["dba-shell", "-a", "prod", "tables", "ord", "-f", "json"])
                .unwrap();
        assert_eq!(config.alias.as_deref(), Some("prod"));
        assert_eq!(config.command, vec!["tables", "ord", "-f", "json"]);
    }
}
