//! Configuration management for sensiscan

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::{CacheSettings, CacheTtl, DEFAULT_STORAGE_PREFIX, ENTRY_SCHEMA_VERSION};
use crate::client::ScanMode;
use crate::client::http::DEFAULT_API_HOST;
use crate::engine::{EngineConfig, PollSettings};
use crate::error::{ConfigError, Result};
use crate::session::SessionEntry;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Classification service API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Classification service host
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_host: Option<String>,

    /// Organization that namespaces the durable cache
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,

    /// Session handles known to this installation
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sessions: BTreeMap<String, SessionEntry>,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub poll: PollConfig,
}

/// `cache:` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_storage_prefix")]
    pub storage_prefix: String,

    #[serde(default = "default_memory_ttl_secs")]
    pub memory_ttl_secs: u64,

    #[serde(default = "default_durable_ttl_secs")]
    pub durable_ttl_secs: u64,

    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Directory for the SQLite store (defaults to the XDG cache dir)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    /// Byte budget for the durable store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_bytes: Option<usize>,
}

fn default_storage_prefix() -> String {
    DEFAULT_STORAGE_PREFIX.to_string()
}

fn default_memory_ttl_secs() -> u64 {
    CacheTtl::MEMORY.as_secs()
}

fn default_durable_ttl_secs() -> u64 {
    CacheTtl::DURABLE.as_secs()
}

fn default_schema_version() -> u32 {
    ENTRY_SCHEMA_VERSION
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            storage_prefix: default_storage_prefix(),
            memory_ttl_secs: default_memory_ttl_secs(),
            durable_ttl_secs: default_durable_ttl_secs(),
            schema_version: default_schema_version(),
            dir: None,
            max_bytes: None,
        }
    }
}

/// `poll:` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_progress_every")]
    pub progress_every: u32,

    #[serde(default)]
    pub mode: ScanMode,
}

fn default_interval_ms() -> u64 {
    2000
}

fn default_max_attempts() -> u32 {
    60
}

fn default_progress_every() -> u32 {
    10
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_attempts: default_max_attempts(),
            progress_every: default_progress_every(),
            mode: ScanMode::default(),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::Invalid(
            "Could not determine home directory".to_string(),
        ))?;

        Ok(home.join(".sensiscan").join("config.yaml"))
    }

    /// Resolve an explicit path or fall back to the default
    pub fn resolve_path(path: Option<&str>) -> Result<PathBuf> {
        match path {
            Some(p) => Ok(PathBuf::from(p)),
            None => Self::default_path(),
        }
    }

    /// Load configuration from an optional path (default location otherwise)
    pub fn load_at(path: Option<&str>) -> Result<Self> {
        Self::load_from(Self::resolve_path(path)?)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound.into());
        }

        let contents = std::fs::read_to_string(&path)?;
        let config: Config = serde_yaml::from_str(&contents).map_err(ConfigError::from)?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to an optional path (default location otherwise)
    pub fn save_at(&self, path: Option<&str>) -> Result<()> {
        self.save_to(Self::resolve_path(path)?)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents =
            serde_yaml::to_string(self).map_err(|e| ConfigError::SaveError(e.to_string()))?;

        std::fs::write(&path, contents)?;

        // API keys live here
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&path)?.permissions();
            perms.set_mode(0o600);
            std::fs::set_permissions(&path, perms)?;
        }

        Ok(())
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.poll.max_attempts == 0 {
            return Err(ConfigError::Invalid("poll.max_attempts must be at least 1".into()).into());
        }
        if self.cache.storage_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("cache.storage_prefix must not be empty".into()).into());
        }
        Ok(())
    }

    pub fn require_org_id(&self) -> Result<&str> {
        self.org_id
            .as_deref()
            .filter(|o| !o.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingOrgId.into())
    }

    pub fn api_host(&self) -> &str {
        self.api_host.as_deref().unwrap_or(DEFAULT_API_HOST)
    }

    pub fn cache_settings(&self) -> Result<CacheSettings> {
        Ok(CacheSettings {
            storage_prefix: self.cache.storage_prefix.clone(),
            org_id: self.require_org_id()?.to_string(),
            memory_ttl: Duration::from_secs(self.cache.memory_ttl_secs),
            durable_ttl: Duration::from_secs(self.cache.durable_ttl_secs),
            schema_version: self.cache.schema_version,
        })
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(self.poll.interval_ms),
            max_attempts: self.poll.max_attempts,
            progress_every: self.poll.progress_every,
            mode: self.poll.mode,
        }
    }

    pub fn engine_config(&self) -> Result<EngineConfig> {
        Ok(EngineConfig {
            cache: self.cache_settings()?,
            poll: self.poll_settings(),
        })
    }
}
