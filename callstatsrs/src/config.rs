//! Configuration system for callstats.
//!
//! TOML-based configuration for the query compiler, the physical table names
//! behind each time granularity, and the warehouse connection.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CallstatsError, Result};
use crate::models::TimeGranularity;
use crate::sql_ast::LiteralMode;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CallstatsConfig {
    pub compiler: CompilerConfig,
    pub tables: TableConfig,
    pub warehouse: WarehouseConfig,
}

/// Query compiler behavior.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Reject unknown granularity tokens instead of falling back to daily.
    pub strict_granularity: bool,
    /// Accept pre-built WHERE text in place of a filter tree (default: false).
    pub allow_raw_filters: bool,
    /// Deepest group nesting that is still compiled (default: 4).
    pub max_group_depth: usize,
    /// How values reach the SQL text (default: bound parameters).
    pub literal_mode: LiteralMode,
}

/// Physical table per time granularity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TableConfig {
    pub min15: String,
    pub min30: String,
    pub hourly: String,
    pub daily: String,
    pub monthly: String,
    pub yearly: String,
}

/// Warehouse connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WarehouseConfig {
    /// DuckDB database path (default: in-memory).
    pub path: String,
    /// Maximum concurrent queries (default: 16).
    pub max_concurrency: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            strict_granularity: false,
            allow_raw_filters: false,
            max_group_depth: 4,
            literal_mode: LiteralMode::Bound,
        }
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            min15: "stats_15min".to_string(),
            min30: "stats_30min".to_string(),
            hourly: "stats_hourly".to_string(),
            daily: "stats_daily".to_string(),
            monthly: "stats_monthly".to_string(),
            yearly: "stats_yearly".to_string(),
        }
    }
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            path: ":memory:".to_string(),
            max_concurrency: 16,
        }
    }
}

impl TableConfig {
    pub fn table_for(&self, granularity: TimeGranularity) -> &str {
        match granularity {
            TimeGranularity::Min15 => &self.min15,
            TimeGranularity::Min30 => &self.min30,
            TimeGranularity::Hourly => &self.hourly,
            TimeGranularity::Daily => &self.daily,
            TimeGranularity::Monthly => &self.monthly,
            TimeGranularity::Yearly => &self.yearly,
        }
    }
}

impl CallstatsConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| CallstatsError::Config(format!("failed to read config file: {e}")))?;
        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| CallstatsError::Config(format!("failed to parse config: {e}")))
    }

    /// Load from default locations (env var, cwd, user config dir, or defaults).
    ///
    /// Search order:
    /// 1. `CALLSTATS_CONFIG` environment variable
    /// 2. `./callstats.toml` (current directory)
    /// 3. `~/.config/callstats/config.toml` (user config dir)
    /// 4. Built-in defaults
    pub fn load_default() -> Self {
        if let Ok(path) = std::env::var("CALLSTATS_CONFIG") {
            match Self::from_file(&path) {
                Ok(cfg) => {
                    tracing::info!(path = %path, "loaded config from CALLSTATS_CONFIG");
                    return cfg;
                }
                Err(e) => tracing::warn!(path = %path, error = %e, "ignoring CALLSTATS_CONFIG"),
            }
        }

        if let Ok(cfg) = Self::from_file("callstats.toml") {
            tracing::info!("loaded config from ./callstats.toml");
            return cfg;
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("callstats").join("config.toml");
            if let Ok(cfg) = Self::from_file(&user_config) {
                tracing::info!(path = %user_config.display(), "loaded config from user config dir");
                return cfg;
            }
        }

        tracing::debug!("no config file found, using defaults");
        Self::default()
    }
}
