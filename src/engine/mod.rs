//! Scan orchestration
//!
//! [`ScanOrchestrator`] ties the cache, the single-flight guard, the job
//! poller and the invalidation bus together. One instance is built per
//! process from an [`EngineConfig`] and injected collaborators.

pub mod batch;
pub mod flight;
pub mod invalidation;
pub mod poller;

use std::sync::Arc;

use chrono::Utc;
use log::{debug, info};

use crate::cache::key::{cache_key, new_scan_id};
use crate::cache::{CacheSettings, ClearStats, DurableStore, TieredCache};
use crate::client::{ClassificationApi, RawClassification};
use crate::error::{Result, ScanError};
use crate::models::{ColumnClassification, ColumnDescriptor, ScanRequest, ScanResult};
use crate::notifier::Notifier;
use crate::session::SessionProvider;

pub use batch::BatchItem;
pub use flight::SingleFlightGuard;
pub use invalidation::{Invalidation, InvalidationBus, ListenerError, ListenerId};
pub use poller::{ClassificationPoller, PollSettings};

/// Engine settings
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub cache: CacheSettings,
    pub poll: PollSettings,
}

/// What a scan call produced
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    /// Served from cache without touching the service
    Cached(ScanResult),
    /// Freshly classified and cached
    Scanned(ScanResult),
    /// Another scan for the same table is running
    Busy,
}

impl ScanOutcome {
    pub fn result(&self) -> Option<&ScanResult> {
        match self {
            ScanOutcome::Cached(r) | ScanOutcome::Scanned(r) => Some(r),
            ScanOutcome::Busy => None,
        }
    }
}

/// Status of one table as seen by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Busy,
    Ready,
}

struct Inner {
    cache: TieredCache,
    flights: Arc<SingleFlightGuard>,
    poller: ClassificationPoller,
    bus: InvalidationBus,
    notifier: Arc<dyn Notifier>,
}

/// Top-level coordinator. Cheap to clone.
#[derive(Clone)]
pub struct ScanOrchestrator {
    inner: Arc<Inner>,
}

impl ScanOrchestrator {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn DurableStore>,
        api: Arc<dyn ClassificationApi>,
        sessions: Arc<dyn SessionProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                cache: TieredCache::new(store, &config.cache),
                flights: Arc::new(SingleFlightGuard::new()),
                poller: ClassificationPoller::new(api, sessions, config.poll),
                bus: InvalidationBus::new(),
                notifier,
            }),
        }
    }

    /// Classify a table, reusing a cached result when one exists.
    ///
    /// The job itself runs on a spawned task: dropping the returned future
    /// does not stop polling, and the cache is still filled on success.
    /// A `clear` that lands while the job runs is overwritten by its `put`.
    pub async fn scan(&self, request: ScanRequest) -> Result<ScanOutcome> {
        let key = request.cache_key();

        if let Some(hit) = self.inner.cache.get(&key) {
            debug!("Using cached classification for {}", key);
            return Ok(ScanOutcome::Cached(hit));
        }

        let Some(permit) = self.inner.flights.acquire(&key) else {
            debug!("Scan for {} already in flight", key);
            return Ok(ScanOutcome::Busy);
        };

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let outcome = inner.classify(&request).await;
            drop(permit);
            if let Err(e) = &outcome {
                log::warn!("Scan of {} failed: {}", request.cache_key(), e);
                inner.notify_failure(&request.cache_key());
            }
            outcome
        });

        match task.await {
            Ok(outcome) => outcome.map(ScanOutcome::Scanned),
            Err(join_err) => {
                self.inner.notify_failure(&key);
                Err(ScanError::Aborted(join_err.to_string()).into())
            }
        }
    }

    /// Cache-only lookup.
    pub fn get_cached(&self, table: &str, database: &str) -> Option<ScanResult> {
        self.inner.cache.get(&cache_key(database, table))
    }

    /// Drop one table's cached result. Returns whether anything was removed;
    /// listeners hear about it only in that case.
    pub fn clear(&self, table: &str, database: &str) -> bool {
        let removed = self.inner.cache.delete(&cache_key(database, table)).is_some();
        if removed {
            info!("Cleared cached classification for {}.{}", database, table);
            self.inner.bus.notify(table, database);
        }
        removed
    }

    /// Drop everything for this organization. No per-key notifications.
    pub fn clear_all(&self) -> ClearStats {
        let stats = self.inner.cache.clear_all();
        info!(
            "Cleared {} memory and {} durable cache entries",
            stats.memory_entries, stats.durable_entries
        );
        stats
    }

    /// Drop every table of `database`, notifying once per removed table.
    pub fn clear_by_database(&self, database: &str) -> Vec<String> {
        let tables = self.inner.cache.delete_by_prefix(database);
        for table in &tables {
            self.inner.bus.notify(table, database);
        }
        tables
    }

    pub fn is_scanning(&self, table: &str, database: &str) -> bool {
        self.inner.flights.is_in_flight(&cache_key(database, table))
    }

    pub fn state(&self, table: &str, database: &str) -> ScanState {
        if self.is_scanning(table, database) {
            ScanState::Busy
        } else if self.get_cached(table, database).is_some() {
            ScanState::Ready
        } else {
            ScanState::Idle
        }
    }

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Invalidation) -> std::result::Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.inner.bus.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.inner.bus.unsubscribe(id)
    }

    /// Remove stale records from both tiers.
    pub fn purge_expired(&self) -> usize {
        self.inner.cache.purge_expired()
    }

    /// Valid durable cache keys of this organization.
    pub fn cached_keys(&self) -> Vec<String> {
        self.inner.cache.scan_all_keys()
    }
}

impl Inner {
    async fn classify(&self, request: &ScanRequest) -> Result<ScanResult> {
        let raw = self.poller.run(request).await?;
        let key = request.cache_key();

        let result = ScanResult {
            table_name: request.table_name.clone(),
            database_name: request.database_name.clone(),
            columns: order_columns(&request.columns, raw),
            scanned_at: Utc::now(),
            scan_id: new_scan_id(&key),
        };
        self.cache.put(&result);

        info!(
            "Classified {} ({} columns, scan {})",
            key,
            result.columns.len(),
            result.scan_id
        );
        Ok(result)
    }

    fn notify_failure(&self, key: &str) {
        self.notifier
            .error(&format!("Sensitive data scan failed for {}", key));
    }
}

/// Normalize raw verdicts, putting requested columns first in request order.
fn order_columns(
    descriptors: &[ColumnDescriptor],
    raw: Vec<RawClassification>,
) -> Vec<ColumnClassification> {
    let mut pending: Vec<Option<ColumnClassification>> = raw
        .into_iter()
        .map(|r| {
            Some(ColumnClassification::from_raw(
                r.column_name,
                &r.level,
                r.reason.unwrap_or_default(),
                r.confidence.unwrap_or(0.0),
            ))
        })
        .collect();

    let mut ordered = Vec::with_capacity(pending.len());
    for descriptor in descriptors {
        let slot = pending.iter_mut().find(|slot| {
            slot.as_ref()
                .is_some_and(|c| c.column_name == descriptor.name)
        });
        if let Some(column) = slot.and_then(Option::take) {
            ordered.push(column);
        }
    }
    ordered.extend(pending.into_iter().flatten());
    ordered
}
