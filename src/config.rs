//! inodefs configuration

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::sync::Strategy;

/// Default configuration constants
///
/// Mirrors [`crate::constants`] so that a config file can omit any field.
pub mod defaults {
    use crate::constants;

    pub const TABLE_SIZE: usize = constants::TABLE_SIZE;

    pub const MAX_DIR_ENTRIES: usize = constants::MAX_DIR_ENTRIES;

    pub const MAX_NAME_LEN: usize = constants::MAX_NAME_LEN;

    pub const DELAY_CYCLES: u64 = constants::DELAY_CYCLES;

    /// Default strategy name
    pub const fn default_strategy() -> &'static str {
        "nosync"
    }

    /// Default log level
    pub const fn default_log_level() -> &'static str {
        "info"
    }

    /// Per-operation counters are off unless asked for
    pub const ENABLE_STATS: bool = false;
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FsConfig {
    #[serde(default)]
    pub table: TableConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub log: LogConfig,
}

/// Inode table geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Number of inode slots
    #[serde(default = "default_table_size")]
    pub table_size: usize,

    /// Entry slots per directory
    #[serde(default = "default_max_dir_entries")]
    pub max_dir_entries: usize,

    /// Maximum entry name (and printed path) length in bytes
    #[serde(default = "default_max_name_len")]
    pub max_name_len: usize,

    /// Busy-loop cycles at the start of each table operation (0 = off)
    #[serde(default = "default_delay_cycles")]
    pub delay_cycles: u64,
}

fn default_table_size() -> usize {
    defaults::TABLE_SIZE
}

fn default_max_dir_entries() -> usize {
    defaults::MAX_DIR_ENTRIES
}

fn default_max_name_len() -> usize {
    defaults::MAX_NAME_LEN
}

fn default_delay_cycles() -> u64 {
    defaults::DELAY_CYCLES
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            table_size: default_table_size(),
            max_dir_entries: default_max_dir_entries(),
            max_name_len: default_max_name_len(),
            delay_cycles: default_delay_cycles(),
        }
    }
}

/// Synchronization configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Strategy name: "nosync", "mutex" or "rwlock"
    ///
    /// Kept as a string: unknown names are accepted and run unsynchronized.
    #[serde(default = "default_strategy")]
    pub strategy: String,

    /// Collect per-operation counters
    #[serde(default = "default_enable_stats")]
    pub enable_stats: bool,
}

fn default_strategy() -> String {
    defaults::default_strategy().to_string()
}

fn default_enable_stats() -> bool {
    defaults::ENABLE_STATS
}

impl SyncConfig {
    pub fn strategy(&self) -> Strategy {
        Strategy::from_name(&self.strategy)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            enable_stats: default_enable_stats(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    defaults::default_log_level().to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl FsConfig {
    /// Default geometry with the given strategy
    pub fn with_strategy(strategy: Strategy) -> Self {
        let mut config = Self::default();
        config.sync.strategy = strategy.name().to_string();
        config
    }

    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::ReadError(format!("Failed to read config file: {}", e)))?;

        let config: FsConfig = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self).map_err(|e| {
            ConfigError::SerializeError(format!("Failed to serialize config: {}", e))
        })?;

        std::fs::write(path.as_ref(), contents)
            .map_err(|e| ConfigError::WriteError(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.table.table_size == 0 {
            return Err(ConfigError::ValidationError(
                "Table size must be at least 1 (the root directory)".to_string(),
            ));
        }

        if self.table.max_dir_entries == 0 {
            return Err(ConfigError::ValidationError(
                "Directories need at least one entry slot".to_string(),
            ));
        }

        if self.table.max_name_len == 0 {
            return Err(ConfigError::ValidationError(
                "Maximum name length cannot be zero".to_string(),
            ));
        }

        match self.log.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log level: {}",
                    self.log.level
                )));
            }
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Failed to serialize config: {0}")]
    SerializeError(String),

    #[error("Failed to write config: {0}")]
    WriteError(String),

    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}
