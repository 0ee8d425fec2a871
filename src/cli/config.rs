use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct WorkerConfig {
    pub store: StoreSettings,
    pub fetch: FetchSettings,
    pub worker: WorkerSettings,
}

/// Job/page store settings
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct StoreSettings {
    /// Postgres connection URL; the service credential travels inside it.
    /// Resolved from the DATABASE_URL environment variable at startup.
    pub database_url: String,
    pub max_connections: u32,
}

/// Fetch settings for the HTTP client
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct FetchSettings {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub max_redirects: usize,
    pub max_content_size: usize,
}

/// Worker loop settings
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct WorkerSettings {
    /// Sleep between claim attempts when the queue is empty, in milliseconds
    pub poll_interval_ms: u64,
    /// Sleep after an unexpected per-job error, in milliseconds
    pub backoff_ms: u64,
    /// Minimum spacing between lease-renewal heartbeats, in seconds
    pub heartbeat_interval_secs: u64,
    /// Lease requested when claiming a URL entry, in minutes
    pub url_lock_minutes: i64,
    /// Job leases older than this are returned to the queue by rescue, in minutes
    pub job_lease_minutes: i64,
    /// Run the stale-job rescue pass every N loop iterations
    pub rescue_every: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            max_connections: 5,
        }
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            user_agent: format!(
                "SeoCrawlerBot/{} (+https://seo-crawler.dev/bot)",
                env!("CARGO_PKG_VERSION")
            ),
            timeout_secs: 15,
            connect_timeout_secs: 10,
            max_redirects: 5,
            max_content_size: 10 * 1024 * 1024,
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            backoff_ms: 3000,
            heartbeat_interval_secs: 15,
            url_lock_minutes: 10,
            job_lease_minutes: 10,
            rescue_every: 30,
        }
    }
}

impl WorkerConfig {
    /// Get the path to the default config file
    fn default_config_path() -> PathBuf {
        let mut path = if let Some(proj_dirs) =
            directories::ProjectDirs::from("com", "seo-crawler", "seo-crawler")
        {
            proj_dirs.config_dir().to_path_buf()
        } else {
            PathBuf::from("./config")
        };

        path.push("worker.yaml");
        path
    }

    /// Load configuration: explicit file if given, the default file if it
    /// exists, built-in defaults otherwise. DATABASE_URL from the environment
    /// always wins for the store URL and is required one way or another.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::load_from_file(p)?,
            None => {
                let default_path = Self::default_config_path();
                if default_path.exists() {
                    Self::load_from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };

        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.trim().is_empty() {
                config.store.database_url = url;
            }
        }

        if config.store.database_url.trim().is_empty() {
            bail!(
                "DATABASE_URL is not set: the worker needs the job store \
                 endpoint and service credential to start"
            );
        }

        Ok(config)
    }

    /// Load configuration from a file
    fn load_from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from: {}", path.display());
        let contents = fs::read_to_string(path)
            .context(format!("Failed to read configuration file: {}", path.display()))?;

        let config: Self = serde_yaml::from_str(&contents)
            .context(format!("Failed to parse configuration file: {}", path.display()))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_operational_bounds() {
        let config = WorkerConfig::default();
        assert_eq!(config.fetch.timeout_secs, 15);
        assert_eq!(config.fetch.max_redirects, 5);
        assert_eq!(config.worker.poll_interval_ms, 2000);
        assert_eq!(config.worker.backoff_ms, 3000);
        assert_eq!(config.worker.heartbeat_interval_secs, 15);
        assert_eq!(config.worker.url_lock_minutes, 10);
        assert_eq!(config.worker.rescue_every, 30);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config: WorkerConfig =
            serde_yaml::from_str("worker:\n  poll_interval_ms: 500\n").unwrap();
        assert_eq!(config.worker.poll_interval_ms, 500);
        assert_eq!(config.worker.backoff_ms, 3000);
        assert_eq!(config.fetch.max_redirects, 5);
    }
}
