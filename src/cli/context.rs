//! Command execution context
//!
//! Loads config, applies global overrides, opens the durable store and wires
//! up a [`ScanOrchestrator`] so handlers don't repeat that boilerplate.

use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::{DurableStore, MemoryStore, SqliteStore};
use crate::cli::{GlobalOptions, OutputFormat};
use crate::client::HttpClassificationClient;
use crate::config::Config;
use crate::engine::ScanOrchestrator;
use crate::error::Result;
use crate::notifier::StderrNotifier;
use crate::session::ConfigSessionProvider;

/// Context for command execution
pub struct CommandContext {
    /// Loaded config with CLI overrides applied
    pub config: Config,
    pub engine: ScanOrchestrator,
    pub format: OutputFormat,
    /// The on-disk store, when one is in use
    pub disk: Option<Arc<SqliteStore>>,
}

impl CommandContext {
    /// Create a new command context with full initialization.
    ///
    /// # Errors
    /// Returns error if config cannot be loaded, no organization is set, or
    /// the HTTP client cannot be built. An unusable on-disk cache is not an
    /// error: the run falls back to an in-memory store.
    pub fn new(opts: &GlobalOptions) -> Result<Self> {
        let config = load_config(opts)?;
        let engine_config = config.engine_config()?;

        let (store, disk) = open_store(&config, opts.no_cache);

        let api = Arc::new(HttpClassificationClient::new(
            config.api_host(),
            config.api_key.clone(),
        )?);
        let sessions = Arc::new(ConfigSessionProvider::new(config.sessions.clone()));

        let engine =
            ScanOrchestrator::new(engine_config, store, api, sessions, Arc::new(StderrNotifier));

        Ok(Self {
            config,
            engine,
            format: opts.format,
            disk,
        })
    }
}

/// Load the config file and apply global flag overrides.
pub fn load_config(opts: &GlobalOptions) -> Result<Config> {
    let mut config = Config::load_at(opts.config_ref())?;

    if let Some(org) = opts.org_ref() {
        config.org_id = Some(org.to_string());
    }
    if let Some(host) = opts.api_host_ref() {
        config.api_host = Some(host.to_string());
    }
    if let Some(dir) = opts.cache_dir_ref() {
        config.cache.dir = Some(PathBuf::from(dir));
    }

    Ok(config)
}

/// Directory holding the on-disk cache for this config.
pub fn cache_dir(config: &Config) -> Result<PathBuf> {
    match &config.cache.dir {
        Some(dir) => Ok(dir.clone()),
        None => Ok(SqliteStore::cache_dir()?),
    }
}

fn open_store(config: &Config, no_cache: bool) -> (Arc<dyn DurableStore>, Option<Arc<SqliteStore>>) {
    let memory = || -> Arc<dyn DurableStore> {
        match config.cache.max_bytes {
            Some(max) => Arc::new(MemoryStore::with_capacity_bytes(max)),
            None => Arc::new(MemoryStore::new()),
        }
    };

    if no_cache {
        log::debug!("On-disk cache disabled for this run");
        return (memory(), None);
    }

    let opened = cache_dir(config)
        .and_then(|dir| Ok(SqliteStore::open_at(&dir)?))
        .map(|store| Arc::new(store.with_max_bytes(config.cache.max_bytes)));

    match opened {
        Ok(disk) => {
            log::debug!("Using on-disk cache at {}", disk.path().display());
            let store: Arc<dyn DurableStore> = disk.clone();
            (store, Some(disk))
        }
        Err(e) => {
            log::warn!("On-disk cache unavailable ({}); using memory only", e);
            (memory(), None)
        }
    }
}
