//! Fan-out of explicit cache clears to listeners
//!
//! Listeners run synchronously on the clearing thread over a snapshot of the
//! subscriber list, so a listener may subscribe or unsubscribe from inside
//! its callback. A listener that errors or panics is logged and skipped.

use std::error::Error as StdError;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A cleared (database, table) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalidation {
    pub table: String,
    pub database: String,
}

impl fmt::Display for Invalidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.table)
    }
}

/// Handle returned by [`InvalidationBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type ListenerError = Box<dyn StdError + Send + Sync>;

type Listener = Arc<dyn Fn(&Invalidation) -> Result<(), ListenerError> + Send + Sync>;

#[derive(Default)]
pub struct InvalidationBus {
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_id: AtomicU64,
}

impl InvalidationBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Invalidation) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, Arc::new(listener)));
        id
    }

    /// Returns false when `id` was not subscribed.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Notify every listener. Returns how many completed without error.
    pub fn notify(&self, table: &str, database: &str) -> usize {
        let event = Invalidation {
            table: table.to_string(),
            database: database.to_string(),
        };
        let snapshot: Vec<(ListenerId, Listener)> = self.lock().clone();

        let mut delivered = 0;
        for (id, listener) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener(&event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => log::warn!("Invalidation listener {:?} failed for {}: {}", id, event, e),
                Err(_) => log::warn!("Invalidation listener {:?} panicked for {}", id, event),
            }
        }
        delivered
    }

    #[cfg(test)]
    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(ListenerId, Listener)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
