// ⚙️ Configuration - JSON file + environment overrides
//
// Every field has a default so an empty `{}` (or no file at all) is a
// working configuration.

use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_DB_PATH: &str = "HEY_DB_PATH";
pub const ENV_BIND_ADDR: &str = "HEY_BIND_ADDR";
pub const ENV_MODEL_PATH: &str = "HEY_MODEL_PATH";

// ============================================================================
// STATISTICS SETTINGS
// ============================================================================

/// Knobs shared by the report builders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsConfig {
    /// Label used when a report groups by category and the category is missing
    #[serde(default = "default_uncategorized_label")]
    pub uncategorized_label: String,

    /// How many merchants the statistics report keeps
    #[serde(default = "default_top_merchants_limit")]
    pub top_merchants_limit: usize,
}

fn default_uncategorized_label() -> String {
    "UNCATEGORIZED".to_string()
}

fn default_top_merchants_limit() -> usize {
    5
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        StatisticsConfig {
            uncategorized_label: default_uncategorized_label(),
            top_merchants_limit: default_top_merchants_limit(),
        }
    }
}

// ============================================================================
// APPLICATION SETTINGS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Spending model artifact; predictions are disabled when unset
    #[serde(default)]
    pub model_path: Option<PathBuf>,

    /// Label value for the statistics report when `months` is not given
    #[serde(default = "default_months")]
    pub default_months: u32,

    #[serde(default)]
    pub statistics: StatisticsConfig,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("hey_insights.db")
}

fn default_bind_address() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_months() -> u32 {
    12
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            database_path: default_database_path(),
            bind_address: default_bind_address(),
            model_path: None,
            default_months: default_months(),
            statistics: StatisticsConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: AppConfig =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;

        Ok(config)
    }

    /// File (if given) then environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => AppConfig::from_file(p)?,
            None => AppConfig::default(),
        };

        config.apply_overrides(|key| env::var(key).ok());

        log::debug!("Loaded configuration: {:?}", config);

        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db) = lookup(ENV_DB_PATH).filter(|v| !v.is_empty()) {
            self.database_path = PathBuf::from(db);
        }
        if let Some(addr) = lookup(ENV_BIND_ADDR).filter(|v| !v.is_empty()) {
            self.bind_address = addr;
        }
        if let Some(model) = lookup(ENV_MODEL_PATH).filter(|v| !v.is_empty()) {
            self.model_path = Some(PathBuf::from(model));
        }
    }
}
