//! Configuration for the Ethash engine
//!
//! Supports JSON config files and environment variables:
//!
//! - `ZION_ETHASH_FULL=1` materializes full datasets (eager mode)
//! - `ZION_ETHASH_MEMORY_MB=<n>` registry memory budget
//! - `ZION_ETHASH_THREADS=<n>` dataset build threads (0 = auto)

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::context::DatasetMode;
use crate::error::{EthashError, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EthashConfig {
    /// Epoch context registry
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Logging (used by the binary)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Epoch context registry settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Total bytes of contexts to retain before evicting idle ones
    #[serde(default = "default_memory_budget")]
    pub memory_budget_bytes: u64,

    /// Maximum number of retained contexts
    #[serde(default = "default_max_contexts")]
    pub max_contexts: usize,

    /// Lazy (light cache only) or eager (full dataset) contexts
    #[serde(default)]
    pub dataset_mode: DatasetMode,

    /// Threads for eager dataset builds (0 = auto-detect)
    #[serde(default)]
    pub build_threads: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            memory_budget_bytes: default_memory_budget(),
            max_contexts: default_max_contexts(),
            dataset_mode: DatasetMode::Lazy,
            build_threads: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

impl EthashConfig {
    /// Load config from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            EthashError::Config(format!("failed to read {}: {}", path.as_ref().display(), e))
        })?;
        let config: EthashConfig = serde_json::from_str(&content)
            .map_err(|e| EthashError::Config(format!("failed to parse config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| EthashError::Config(format!("failed to serialize config: {}", e)))?;
        fs::write(path.as_ref(), json).map_err(|e| {
            EthashError::Config(format!("failed to write {}: {}", path.as_ref().display(), e))
        })
    }

    /// Apply `ZION_ETHASH_*` environment overrides
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable source
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("ZION_ETHASH_FULL") {
            let v = v.trim().to_ascii_lowercase();
            self.registry.dataset_mode = if v == "1" || v == "true" || v == "yes" {
                DatasetMode::Eager
            } else {
                DatasetMode::Lazy
            };
        }

        if let Some(v) = lookup("ZION_ETHASH_MEMORY_MB") {
            let mb: u64 = v.trim().parse().map_err(|_| {
                EthashError::Config(format!("ZION_ETHASH_MEMORY_MB is not a number: {v}"))
            })?;
            self.registry.memory_budget_bytes = mb.saturating_mul(1024 * 1024);
        }

        if let Some(v) = lookup("ZION_ETHASH_THREADS") {
            self.registry.build_threads = v.trim().parse().map_err(|_| {
                EthashError::Config(format!("ZION_ETHASH_THREADS is not a number: {v}"))
            })?;
        }

        self.validate()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.registry.memory_budget_bytes == 0 {
            return Err(EthashError::Config("memory_budget_bytes must be > 0".into()));
        }
        if self.registry.max_contexts == 0 {
            return Err(EthashError::Config("max_contexts must be >= 1".into()));
        }
        if self.registry.build_threads > 1024 {
            return Err(EthashError::Config("build_threads must be <= 1024".into()));
        }
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(EthashError::Config(format!(
                "invalid log level: {}. Valid: {:?}",
                self.logging.level, valid_levels
            )));
        }
        Ok(())
    }
}

// Default value functions
fn default_memory_budget() -> u64 {
    // Room for a few light caches, or one eager epoch-0 context
    2 * 1024 * 1024 * 1024
}

fn default_max_contexts() -> usize {
    4
}

fn default_log_level() -> String {
    "info".to_string()
}
