//! Engine configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// Tunables for the cache, paginator, sync workers and aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Age below which a cached message counts as fresh.
    pub freshness_ttl_secs: u64,
    /// Page size used when a request asks for `limit <= 0`.
    pub default_page_limit: usize,
    /// Upper bound on any requested page size.
    pub max_page_limit: usize,
    /// Remote identifiers listed per sync run.
    pub sync_page_size: u32,
    /// Sync runs allowed to execute at the same time across all users.
    pub max_concurrent_syncs: usize,
    /// Lifetime of memoized merged first pages; 0 disables memoization.
    pub aggregate_cache_ttl_secs: u64,
    /// Drop a user's memoized pages whenever one of their syncs completes.
    pub invalidate_aggregate_on_sync: bool,
    /// SQLite database file.
    pub database_path: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            freshness_ttl_secs: 60,
            default_page_limit: 50,
            max_page_limit: 500,
            sync_page_size: 50,
            max_concurrent_syncs: 8,
            aggregate_cache_ttl_secs: 60,
            invalidate_aggregate_on_sync: false,
            database_path: default_database_path(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from a JSON file.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the values are usable.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.default_page_limit == 0 {
            return Err(Error::Config("default_page_limit must be positive".into()));
        }
        if self.max_page_limit < self.default_page_limit {
            return Err(Error::Config(
                "max_page_limit must be at least default_page_limit".into(),
            ));
        }
        if self.sync_page_size == 0 {
            return Err(Error::Config("sync_page_size must be positive".into()));
        }
        if self.max_concurrent_syncs == 0 {
            return Err(Error::Config("max_concurrent_syncs must be positive".into()));
        }
        Ok(())
    }

    /// Freshness TTL as a duration.
    #[must_use]
    pub const fn freshness_ttl(&self) -> Duration {
        Duration::from_secs(self.freshness_ttl_secs)
    }

    /// Aggregate cache TTL as a duration.
    #[must_use]
    pub const fn aggregate_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.aggregate_cache_ttl_secs)
    }
}

/// Default on-disk location of the cache database.
#[must_use]
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir().map_or_else(
        || PathBuf::from("mailsync-cache.db"),
        |dir| dir.join("mailsync").join("cache.db"),
    )
}
