//! Centralized configuration for the migration toolkit.
//!
//! Defaults live on constant holders. Runtime [`Settings`] are assembled from
//! the environment (connection credentials) and an optional JSON file
//! (model list, batch sizes, paths, retry tuning, table names).

use crate::error::{MigrateError, Result};
use crate::network::RetryConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Pipeline defaults.
pub struct MigrationConfig;

impl MigrationConfig {
    /// Rows per insert request.
    pub const BATCH_SIZE: usize = 100;
    /// Maximum IDs in one `in.(...)` filter.
    pub const ID_CHUNK_SIZE: usize = 100;
    pub const CHECKPOINT_FILE: &'static str = "migration-progress.json";
    pub const CONFIG_FILE: &'static str = "migration.json";
    pub const REPORT_PREFIX: &'static str = "migration-report";
}

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const MAX_ATTEMPTS: u32 = 3;
    pub const BASE_DELAY: Duration = Duration::from_secs(1);
    pub const MAX_DELAY: Duration = Duration::from_secs(60);
    pub const REST_PATH: &'static str = "rest/v1";
    /// Rows requested per page; matches PostgREST's default `max-rows`.
    pub const PAGE_SIZE: usize = 1000;
    pub const USER_AGENT: &'static str = "planmig/0.3";
}

/// Environment variable names for connection credentials.
pub struct EnvVars;

impl EnvVars {
    pub const SOURCE_URL: &'static str = "SOURCE_SUPABASE_URL";
    pub const SOURCE_KEY: &'static str = "SOURCE_SUPABASE_SERVICE_KEY";
    pub const DEST_URL: &'static str = "DEST_SUPABASE_URL";
    pub const DEST_KEY: &'static str = "DEST_SUPABASE_SERVICE_KEY";
}

/// Table names on both stores.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TableNames {
    pub models: String,
    pub intervals: String,
    pub tasks: String,
    pub parts: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            models: "equipment_models".to_string(),
            intervals: "maintenance_intervals".to_string(),
            tasks: "maintenance_tasks".to_string(),
            parts: "task_parts".to_string(),
        }
    }
}

/// Retry section of the config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetrySettings {
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub jitter: Option<bool>,
}

impl RetrySettings {
    fn to_config(&self) -> RetryConfig {
        let defaults = RetryConfig::default();
        RetryConfig {
            max_attempts: self.max_attempts.map_or(defaults.max_attempts, |n| n.max(1)),
            base_delay: self
                .base_delay_ms
                .map_or(defaults.base_delay, Duration::from_millis),
            max_delay: self.max_delay_ms.map_or(defaults.max_delay, Duration::from_millis),
            jitter: self.jitter.unwrap_or(defaults.jitter),
        }
    }
}

/// Contents of the optional JSON config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileSettings {
    /// Model names to migrate, in processing order.
    pub models: Vec<String>,
    pub batch_size: Option<usize>,
    pub checkpoint_path: Option<PathBuf>,
    pub report_dir: Option<PathBuf>,
    pub request_timeout_secs: Option<u64>,
    pub retry: RetrySettings,
    pub tables: TableNames,
}

impl FileSettings {
    /// Read the config file, returning `None` when it does not exist.
    pub fn read(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents =
            std::fs::read_to_string(path).map_err(|e| MigrateError::io_with_path(e, path))?;
        let settings = serde_json::from_str(&contents).map_err(|e| {
            MigrateError::config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        Ok(Some(settings))
    }
}

/// Connection details for one store.
#[derive(Clone)]
pub struct StoreCredentials {
    pub url: Url,
    pub service_key: String,
}

impl std::fmt::Debug for StoreCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreCredentials")
            .field("url", &self.url.as_str())
            .field("service_key", &"<redacted>")
            .finish()
    }
}

impl StoreCredentials {
    fn from_env(
        env: &impl Fn(&str) -> Option<String>,
        url_var: &str,
        key_var: &str,
    ) -> Result<Self> {
        let raw_url = required(env, url_var)?;
        let url = Url::parse(&raw_url)
            .map_err(|e| MigrateError::config(format!("{} is not a valid URL: {}", url_var, e)))?;
        let service_key = required(env, key_var)?;
        Ok(Self { url, service_key })
    }
}

fn required(env: &impl Fn(&str) -> Option<String>, var: &str) -> Result<String> {
    env(var)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| MigrateError::config(format!("Missing required environment variable {}", var)))
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub source: StoreCredentials,
    pub destination: StoreCredentials,
    /// Configured model names, in processing order.
    pub models: Vec<String>,
    pub batch_size: usize,
    pub checkpoint_path: PathBuf,
    pub report_dir: PathBuf,
    pub request_timeout: Duration,
    pub retry: RetryConfig,
    pub tables: TableNames,
}

impl Settings {
    /// Combine file settings with credentials looked up through `env`.
    pub fn from_parts(file: FileSettings, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let source = StoreCredentials::from_env(&env, EnvVars::SOURCE_URL, EnvVars::SOURCE_KEY)?;
        let destination = StoreCredentials::from_env(&env, EnvVars::DEST_URL, EnvVars::DEST_KEY)?;

        let batch_size = file.batch_size.unwrap_or(MigrationConfig::BATCH_SIZE);
        if batch_size == 0 {
            return Err(MigrateError::config("batchSize must be greater than zero"));
        }

        Ok(Self {
            source,
            destination,
            models: file.models,
            batch_size,
            checkpoint_path: file
                .checkpoint_path
                .unwrap_or_else(|| PathBuf::from(MigrationConfig::CHECKPOINT_FILE)),
            report_dir: file.report_dir.unwrap_or_else(|| PathBuf::from(".")),
            request_timeout: file
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(NetworkConfig::REQUEST_TIMEOUT),
            retry: file.retry.to_config(),
            tables: file.tables,
        })
    }

    /// Load settings from the process environment.
    pub fn from_env(file: FileSettings) -> Result<Self> {
        Self::from_parts(file, |var| std::env::var(var).ok())
    }

    /// Restrict the configured models to `requested`, preserving configured order.
    ///
    /// With no configured list the requested names become the list.
    pub fn select_models(&self, requested: &[String]) -> ModelSelection {
        if requested.is_empty() {
            return ModelSelection {
                selected: self.models.clone(),
                unknown: Vec::new(),
            };
        }
        if self.models.is_empty() {
            let mut selected: Vec<String> = Vec::new();
            for name in requested {
                if !selected.contains(name) {
                    selected.push(name.clone());
                }
            }
            return ModelSelection {
                selected,
                unknown: Vec::new(),
            };
        }

        let selected = self
            .models
            .iter()
            .filter(|m| requested.contains(m))
            .cloned()
            .collect();
        let unknown = requested
            .iter()
            .filter(|r| !self.models.contains(r))
            .cloned()
            .collect();
        ModelSelection { selected, unknown }
    }
}

/// Result of applying `--models` to the configured list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub selected: Vec<String>,
    /// Requested names that match no configured model.
    pub unknown: Vec<String>,
}
