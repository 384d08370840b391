//! Memory + durable cache tiers for scan results
//!
//! Reads go memory first, then the durable per-key record, then the per-org
//! aggregate record. Durable hits are promoted into memory. Writes land in
//! memory unconditionally; durable writes are best effort, so a full or broken
//! store never fails a scan.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::CacheSettings;
use super::key::{KeyCodec, split_cache_key};
use super::store::DurableStore;
use crate::models::ScanResult;

/// Durable record: `{result, expireTime, version}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheEntry {
    result: ScanResult,
    /// Absolute expiry, epoch milliseconds
    expire_time: i64,
    version: u32,
}

struct MemoryEntry {
    result: ScanResult,
    cached_at: Instant,
}

/// Why a durable record was rejected
#[derive(Debug, PartialEq, Eq)]
enum Rejection {
    Malformed,
    Expired,
    VersionMismatch,
}

type Aggregate = BTreeMap<String, serde_json::Value>;

/// Two-tier cache of scan results for one organization
pub struct TieredCache {
    memory: Mutex<HashMap<String, MemoryEntry>>,
    /// Serializes read-modify-write cycles on the aggregate record
    aggregate_lock: Mutex<()>,
    durable: Arc<dyn DurableStore>,
    codec: KeyCodec,
    memory_ttl: Duration,
    durable_ttl: Duration,
    schema_version: u32,
}

impl TieredCache {
    pub fn new(durable: Arc<dyn DurableStore>, settings: &CacheSettings) -> Self {
        Self {
            memory: Mutex::new(HashMap::new()),
            aggregate_lock: Mutex::new(()),
            durable,
            codec: KeyCodec::new(&settings.storage_prefix, &settings.org_id),
            memory_ttl: settings.memory_ttl,
            durable_ttl: settings.durable_ttl,
            schema_version: settings.schema_version,
        }
    }

    /// Look up a result by cache key.
    pub fn get(&self, key: &str) -> Option<ScanResult> {
        if let Some(result) = self.memory_get(key) {
            log::debug!("Memory cache hit: {}", key);
            return Some(result);
        }

        let entry = self
            .read_durable(key)
            .or_else(|| self.read_aggregate(key))?;

        log::debug!("Durable cache hit: {}", key);
        self.memory_insert(key, entry.result.clone());
        Some(entry.result)
    }

    /// Store a result in both tiers.
    pub fn put(&self, result: &ScanResult) {
        let key = result.cache_key();
        self.memory_insert(&key, result.clone());

        let entry = CacheEntry {
            result: result.clone(),
            expire_time: now_millis() + self.durable_ttl.as_millis() as i64,
            version: self.schema_version,
        };

        match serde_json::to_string(&entry) {
            Ok(json) => {
                self.write_durable(&self.codec.storage_key(&key), &json);
            }
            Err(e) => {
                log::warn!("Failed to serialize cache entry {}: {}", key, e);
                return;
            }
        }

        if let Ok(value) = serde_json::to_value(&entry) {
            self.update_aggregate(|agg| {
                agg.insert(key.clone(), value);
                true
            });
        }
    }

    /// Remove a key from both tiers, returning what was cached.
    pub fn delete(&self, key: &str) -> Option<ScanResult> {
        let from_memory = self.lock_memory().remove(key).map(|e| e.result);

        let storage_key = self.codec.storage_key(key);
        let from_durable = match self.durable.get(&storage_key) {
            Ok(Some(raw)) => self.decode(&raw).ok().map(|e| e.result),
            Ok(None) => None,
            Err(e) => {
                log::warn!("Failed to read {} before delete: {}", storage_key, e);
                None
            }
        };
        self.discard(&storage_key);

        let mut from_aggregate = None;
        self.update_aggregate(|agg| match agg.remove(key) {
            Some(value) => {
                from_aggregate = self.decode_value(&value).ok().map(|e| e.result);
                true
            }
            None => false,
        });

        from_memory.or(from_durable).or(from_aggregate)
    }

    /// Remove every table of `database` from both tiers.
    ///
    /// Returns the removed table names, sorted and deduplicated. Durable
    /// records that fail validation are deleted without being reported.
    pub fn delete_by_prefix(&self, database: &str) -> Vec<String> {
        let mut tables = BTreeSet::new();

        self.lock_memory().retain(|key, _| match split_cache_key(key) {
            Some((db, table)) if db == database => {
                tables.insert(table.to_string());
                false
            }
            _ => true,
        });

        match self
            .durable
            .keys_with_prefix(&self.codec.database_prefix(database))
        {
            Ok(keys) => {
                for storage_key in keys {
                    let valid = match self.durable.get(&storage_key) {
                        Ok(Some(raw)) => self.decode(&raw).is_ok(),
                        Ok(None) => false,
                        Err(e) => {
                            log::warn!("Failed to read {} before delete: {}", storage_key, e);
                            false
                        }
                    };
                    if let Some((_, table)) = self
                        .codec
                        .cache_key_of(&storage_key)
                        .and_then(split_cache_key)
                        .filter(|_| valid)
                    {
                        tables.insert(table.to_string());
                    }
                    self.discard(&storage_key);
                }
            }
            Err(e) => log::warn!("Failed to list durable keys for {}: {}", database, e),
        }

        self.update_aggregate(|agg| {
            let before = agg.len();
            agg.retain(|key, value| match split_cache_key(key) {
                Some((db, table)) if db == database => {
                    if self.decode_value(value).is_ok() {
                        tables.insert(table.to_string());
                    }
                    false
                }
                _ => true,
            });
            agg.len() != before
        });

        tables.into_iter().collect()
    }

    /// List valid durable cache keys, deleting malformed, expired and
    /// version-mismatched records along the way.
    pub fn scan_all_keys(&self) -> Vec<String> {
        self.sweep_durable().0
    }

    /// Drop every invalid durable record and stale memory entry.
    ///
    /// Returns the number of records removed.
    pub fn purge_expired(&self) -> usize {
        let (_, mut removed) = self.sweep_durable();
        removed += self.prune_aggregate();

        let ttl = self.memory_ttl;
        let mut memory = self.lock_memory();
        let before = memory.len();
        memory.retain(|_, e| e.cached_at.elapsed() < ttl);
        removed += before - memory.len();

        removed
    }

    /// Drop the memory tier and every durable key of this organization.
    pub fn clear_all(&self) -> ClearStats {
        let memory_entries = {
            let mut memory = self.lock_memory();
            let n = memory.len();
            memory.clear();
            n
        };

        let mut durable_entries = 0;
        match self.durable.keys_with_prefix(self.codec.namespace()) {
            Ok(keys) => {
                for key in keys {
                    match self.durable.delete(&key) {
                        Ok(true) => durable_entries += 1,
                        Ok(false) => {}
                        Err(e) => log::warn!("Failed to delete {}: {}", key, e),
                    }
                }
            }
            Err(e) => log::warn!("Failed to list durable cache keys: {}", e),
        }

        ClearStats {
            memory_entries,
            durable_entries,
        }
    }

    /// Number of entries currently held in memory (fresh or stale)
    #[cfg(test)]
    pub fn memory_len(&self) -> usize {
        self.lock_memory().len()
    }

    fn lock_memory(&self) -> MutexGuard<'_, HashMap<String, MemoryEntry>> {
        self.memory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn memory_get(&self, key: &str) -> Option<ScanResult> {
        let mut memory = self.lock_memory();
        match memory.get(key) {
            Some(entry) if entry.cached_at.elapsed() < self.memory_ttl => {
                Some(entry.result.clone())
            }
            Some(_) => {
                memory.remove(key);
                None
            }
            None => None,
        }
    }

    fn memory_insert(&self, key: &str, result: ScanResult) {
        self.lock_memory().insert(
            key.to_string(),
            MemoryEntry {
                result,
                cached_at: Instant::now(),
            },
        );
    }

    fn validate(&self, entry: &CacheEntry) -> Result<(), Rejection> {
        if entry.version != self.schema_version {
            Err(Rejection::VersionMismatch)
        } else if entry.expire_time <= now_millis() {
            Err(Rejection::Expired)
        } else {
            Ok(())
        }
    }

    fn decode(&self, raw: &str) -> Result<CacheEntry, Rejection> {
        let entry: CacheEntry = serde_json::from_str(raw).map_err(|_| Rejection::Malformed)?;
        self.validate(&entry)?;
        Ok(entry)
    }

    fn decode_value(&self, value: &serde_json::Value) -> Result<CacheEntry, Rejection> {
        let entry: CacheEntry =
            serde_json::from_value(value.clone()).map_err(|_| Rejection::Malformed)?;
        self.validate(&entry)?;
        Ok(entry)
    }

    fn read_durable(&self, key: &str) -> Option<CacheEntry> {
        let storage_key = self.codec.storage_key(key);
        let raw = match self.durable.get(&storage_key) {
            Ok(raw) => raw?,
            Err(e) => {
                log::warn!("Durable cache read failed for {}: {}", storage_key, e);
                return None;
            }
        };

        match self.decode(&raw) {
            Ok(entry) => Some(entry),
            Err(reason) => {
                log::debug!("Dropping durable entry {} ({:?})", storage_key, reason);
                self.discard(&storage_key);
                None
            }
        }
    }

    fn read_aggregate(&self, key: &str) -> Option<CacheEntry> {
        let mut found = None;
        self.update_aggregate(|agg| {
            let Some(value) = agg.get(key) else {
                return false;
            };
            match self.decode_value(value) {
                Ok(entry) => {
                    found = Some(entry);
                    false
                }
                Err(reason) => {
                    log::debug!("Dropping aggregate entry {} ({:?})", key, reason);
                    agg.remove(key);
                    true
                }
            }
        });
        found
    }

    /// Load the aggregate record, let `f` edit it, and write it back when
    /// `f` reports a change. A corrupt aggregate record is discarded.
    ///
    /// The whole cycle runs under `aggregate_lock`. Invalid entries are
    /// dropped from every record written back.
    fn update_aggregate<F>(&self, f: F)
    where
        F: FnOnce(&mut Aggregate) -> bool,
    {
        let _guard = self
            .aggregate_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let aggregate_key = self.codec.aggregate_key();
        let mut aggregate: Aggregate = match self.durable.get(&aggregate_key) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(agg) => agg,
                Err(e) => {
                    log::debug!("Dropping corrupt aggregate record: {}", e);
                    self.discard(&aggregate_key);
                    Aggregate::new()
                }
            },
            Ok(None) => Aggregate::new(),
            Err(e) => {
                log::warn!("Aggregate cache read failed: {}", e);
                return;
            }
        };

        if !f(&mut aggregate) {
            return;
        }
        aggregate.retain(|_, value| self.decode_value(value).is_ok());

        if aggregate.is_empty() {
            self.discard(&aggregate_key);
            return;
        }

        match serde_json::to_string(&aggregate) {
            Ok(json) => {
                self.write_durable(&aggregate_key, &json);
            }
            Err(e) => log::warn!("Failed to serialize aggregate record: {}", e),
        }
    }

    /// Drop invalid entries from the stored aggregate record.
    ///
    /// Returns the number of entries removed.
    fn prune_aggregate(&self) -> usize {
        let mut removed = 0;
        self.update_aggregate(|agg| {
            let before = agg.len();
            agg.retain(|_, value| self.decode_value(value).is_ok());
            removed = before - agg.len();
            removed > 0
        });
        removed
    }

    /// Write a durable record. A full store gets one cleanup pass and one
    /// retry; any remaining failure is logged and swallowed.
    ///
    /// Writes of the aggregate record itself happen under `aggregate_lock`
    /// with an already pruned value, so only per-key writes prune it here.
    fn write_durable(&self, storage_key: &str, value: &str) -> bool {
        match self.durable.set(storage_key, value) {
            Ok(()) => true,
            Err(e) if e.is_capacity() => {
                let (_, mut removed) = self.sweep_durable();
                if storage_key != self.codec.aggregate_key() {
                    removed += self.prune_aggregate();
                }
                log::info!(
                    "Durable cache full, removed {} stale entries before retrying {}",
                    removed,
                    storage_key
                );
                match self.durable.set(storage_key, value) {
                    Ok(()) => true,
                    Err(e) => {
                        log::warn!(
                            "Durable cache write for {} failed after cleanup ({}); memory only",
                            storage_key,
                            e
                        );
                        false
                    }
                }
            }
            Err(e) => {
                log::warn!("Durable cache write for {} failed: {}", storage_key, e);
                false
            }
        }
    }

    /// Walk every per-key durable record of this org.
    ///
    /// Returns the valid cache keys and the number of records deleted.
    fn sweep_durable(&self) -> (Vec<String>, usize) {
        let keys = match self.durable.keys_with_prefix(self.codec.namespace()) {
            Ok(keys) => keys,
            Err(e) => {
                log::warn!("Failed to list durable cache keys: {}", e);
                return (Vec::new(), 0);
            }
        };

        let aggregate_key = self.codec.aggregate_key();
        let mut valid = Vec::new();
        let mut removed = 0;

        for storage_key in keys {
            if storage_key == aggregate_key {
                continue;
            }
            let Some(cache_key) = self.codec.cache_key_of(&storage_key) else {
                self.discard(&storage_key);
                removed += 1;
                continue;
            };

            let verdict = match self.durable.get(&storage_key) {
                Ok(Some(raw)) => self.decode(&raw).map(|_| ()),
                Ok(None) => continue,
                Err(e) => {
                    log::warn!("Durable cache read failed for {}: {}", storage_key, e);
                    continue;
                }
            };

            match verdict {
                Ok(()) => valid.push(cache_key.to_string()),
                Err(reason) => {
                    log::debug!("Sweeping durable entry {} ({:?})", storage_key, reason);
                    self.discard(&storage_key);
                    removed += 1;
                }
            }
        }

        (valid, removed)
    }

    fn discard(&self, storage_key: &str) {
        if let Err(e) = self.durable.delete(storage_key) {
            log::warn!("Failed to delete durable entry {}: {}", storage_key, e);
        }
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Statistics about a clear-all operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearStats {
    pub memory_entries: usize,
    pub durable_entries: usize,
}
