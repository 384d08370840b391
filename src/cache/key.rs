//! Cache key derivation
//!
//! Memory-tier keys are `database.table`. Durable keys carry a storage prefix
//! and the organization so entries from different orgs or app versions never
//! collide: `<prefix>-<orgId>-<database>.<table>`.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use sha2::{Digest, Sha256};

/// Suffix of the per-org aggregate record
const AGGREGATE_SUFFIX: &str = "persistent";

/// Build the cache key for a table.
pub fn cache_key(database: &str, table: &str) -> String {
    format!("{}.{}", database, table)
}

/// Split a cache key back into `(database, table)`.
///
/// Splits on the first dot, so schema-qualified table names survive.
pub fn split_cache_key(key: &str) -> Option<(&str, &str)> {
    key.split_once('.')
        .filter(|(db, table)| !db.is_empty() && !table.is_empty())
}

/// Namespaced durable-key codec for one organization
#[derive(Debug, Clone)]
pub struct KeyCodec {
    namespace: String,
}

impl KeyCodec {
    pub fn new(prefix: &str, org_id: &str) -> Self {
        Self {
            namespace: format!("{}-{}-", prefix, org_id),
        }
    }

    /// Prefix shared by every durable key of this org
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn storage_key(&self, cache_key: &str) -> String {
        format!("{}{}", self.namespace, cache_key)
    }

    /// Durable prefix covering every table of one database
    pub fn database_prefix(&self, database: &str) -> String {
        format!("{}{}.", self.namespace, database)
    }

    pub fn aggregate_key(&self) -> String {
        format!("{}{}", self.namespace, AGGREGATE_SUFFIX)
    }

    /// Recover the cache key from a durable key, skipping the aggregate record.
    pub fn cache_key_of<'a>(&self, storage_key: &'a str) -> Option<&'a str> {
        let rest = storage_key.strip_prefix(self.namespace.as_str())?;
        if rest == AGGREGATE_SUFFIX {
            return None;
        }
        split_cache_key(rest).map(|_| rest)
    }
}

static SCAN_SEQ: AtomicU64 = AtomicU64::new(0);

/// Generate an opaque scan identifier, unique per completed scan.
pub fn new_scan_id(cache_key: &str) -> String {
    let seq = SCAN_SEQ.fetch_add(1, Ordering::Relaxed);
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(cache_key.as_bytes());
    hasher.update(b"|");
    hasher.update(nanos.to_le_bytes());
    hasher.update(b"|");
    hasher.update(seq.to_le_bytes());
    hasher.update(std::process::id().to_le_bytes());

    let digest = format!("{:x}", hasher.finalize());
    format!("scan-{}", &digest[..24])
}
