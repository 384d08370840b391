//! Two-tier cache for classification results
//!
//! A short-lived in-memory map sits in front of a long-lived durable store.
//! Durable entries carry an absolute expiry and a schema version tag and are
//! namespaced per organization.

pub mod key;
pub mod storage;
pub mod store;
pub mod tiered;

use std::time::Duration;

/// Cache TTL configuration per tier
pub struct CacheTtl;

impl CacheTtl {
    // Memory tier - short so other processes' clears are picked up
    pub const MEMORY: Duration = Duration::from_secs(5 * 60); // 5 min

    // Durable tier - classifications are stable until the schema changes
    pub const DURABLE: Duration = Duration::from_secs(24 * 60 * 60); // 24 hr
}

/// Version tag written into every durable entry.
///
/// Bump when the persisted entry shape changes; older entries are then
/// discarded on read.
pub const ENTRY_SCHEMA_VERSION: u32 = 2;

/// Default namespace prefix for durable keys
pub const DEFAULT_STORAGE_PREFIX: &str = "sensiscan";

/// Settings for a [`TieredCache`]
#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub storage_prefix: String,
    pub org_id: String,
    pub memory_ttl: Duration,
    pub durable_ttl: Duration,
    pub schema_version: u32,
}

impl CacheSettings {
    pub fn new(org_id: impl Into<String>) -> Self {
        Self {
            storage_prefix: DEFAULT_STORAGE_PREFIX.to_string(),
            org_id: org_id.into(),
            memory_ttl: CacheTtl::MEMORY,
            durable_ttl: CacheTtl::DURABLE,
            schema_version: ENTRY_SCHEMA_VERSION,
        }
    }
}

// Re-export main types
pub use storage::SqliteStore;
pub use store::{DurableStore, MemoryStore};
pub use tiered::{ClearStats, TieredCache};
