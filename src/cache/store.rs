//! Durable key-value store contract
//!
//! The persisted cache tier only needs string values under string keys plus a
//! prefix listing. A full store must say so with
//! [`CacheError::CapacityExceeded`] so the tier can clean up and retry.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::CacheError;

type Result<T> = std::result::Result<T, CacheError>;

/// Durable string key-value store backing the persisted cache tier
pub trait DurableStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Insert or replace a value.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key, returning whether it existed.
    fn delete(&self, key: &str) -> Result<bool>;

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

/// In-process store with an optional byte budget.
///
/// Used when the on-disk cache is unavailable or disabled, and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
    max_bytes: Option<usize>,
    reads: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit total key + value bytes; writes past the limit fail with
    /// `CapacityExceeded`.
    pub fn with_capacity_bytes(max_bytes: usize) -> Self {
        Self {
            max_bytes: Some(max_bytes),
            ..Self::default()
        }
    }

    /// Number of `get` calls served so far.
    #[cfg(test)]
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock().map(|e| e.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| CacheError::Io("memory store lock poisoned".to_string()))
    }
}

impl DurableStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.lock()?;
        if let Some(max) = self.max_bytes {
            let used: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if used + key.len() + value.len() > max {
                return Err(CacheError::CapacityExceeded);
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.lock()?.remove(key).is_some())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .lock()?
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}
