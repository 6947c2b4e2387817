use std::path::PathBuf;
use std::sync::Arc;

use crate::logging::LOG_ENV;
use crate::models::{CoreError, CoreErrorKind};
use crate::persistence::{CheckpointStore, DEFAULT_PAGE_SIZE, InMemoryCheckpointStore};
use crate::sqlite::SqliteStore;

pub const MONITOR_PAGE_SIZE_ENV: &str = "DRYDOCK_MONITOR_PAGE_SIZE";
pub const CHECKPOINT_DB_ENV: &str = "DRYDOCK_CHECKPOINT_DB";

/// Engine settings.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EngineConfig {
    /// Repositories requested per page when the monitor snapshot is rebuilt.
    pub monitor_page_size: usize,
    /// SQLite file for pipeline checkpoints; in-memory when unset.
    pub checkpoint_database: Option<PathBuf>,
    /// `tracing` filter directives handed to [`crate::logging::init`].
    pub log_filter: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            monitor_page_size: DEFAULT_PAGE_SIZE,
            checkpoint_database: None,
            log_filter: None,
        }
    }
}

impl EngineConfig {
    /// Reads the configuration from the process environment.
    ///
    /// - `DRYDOCK_MONITOR_PAGE_SIZE` (optional, default 1000)
    /// - `DRYDOCK_CHECKPOINT_DB` (optional, path to a SQLite file)
    /// - `DRYDOCK_LOG` (optional, `tracing` filter directives)
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let monitor_page_size = match non_empty(MONITOR_PAGE_SIZE_ENV) {
            Some(raw) => raw.trim().parse::<usize>().map_err(|_| {
                CoreError::new(
                    CoreErrorKind::InvalidInput,
                    format!("{MONITOR_PAGE_SIZE_ENV} must be a positive integer, got '{raw}'"),
                )
            })?,
            None => defaults.monitor_page_size,
        };

        let config = Self {
            monitor_page_size,
            checkpoint_database: non_empty(CHECKPOINT_DB_ENV).map(PathBuf::from),
            log_filter: non_empty(LOG_ENV),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.monitor_page_size == 0 {
            return Err(CoreError::new(
                CoreErrorKind::InvalidInput,
                "monitor page size must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Opens the configured checkpoint store, migrating SQLite schemas to the
    /// latest version.
    pub fn open_checkpoint_store(&self) -> Result<Arc<dyn CheckpointStore>, CoreError> {
        match &self.checkpoint_database {
            Some(path) => {
                let store = SqliteStore::new(path);
                store.migrate_to_latest()?;
                tracing::info!(path = %path.display(), "opened sqlite checkpoint store");
                Ok(Arc::new(store))
            }
            None => Ok(Arc::new(InMemoryCheckpointStore::default())),
        }
    }
}
