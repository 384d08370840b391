//! Single-flight guard over cache keys
//!
//! At most one scan per key runs at a time. Losers are told "busy" straight
//! away; there is no waiting on the winner.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
pub struct SingleFlightGuard {
    in_flight: Mutex<HashSet<String>>,
}

impl SingleFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `key` in flight. Returns false when it already was.
    pub fn try_acquire(&self, key: &str) -> bool {
        self.lock().insert(key.to_string())
    }

    pub fn release(&self, key: &str) {
        self.lock().remove(key);
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.lock().contains(key)
    }

    /// Like [`try_acquire`](Self::try_acquire) but releases on drop.
    pub fn acquire(self: &Arc<Self>, key: &str) -> Option<FlightPermit> {
        self.try_acquire(key).then(|| FlightPermit {
            guard: Arc::clone(self),
            key: key.to_string(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Holds a key in flight until dropped
#[derive(Debug)]
pub struct FlightPermit {
    guard: Arc<SingleFlightGuard>,
    key: String,
}

impl Drop for FlightPermit {
    fn drop(&mut self) {
        self.guard.release(&self.key);
    }
}
