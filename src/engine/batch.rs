//! Bounded concurrent scanning of several tables.

use std::future::Future;
use std::pin::Pin;

use futures::stream::{FuturesUnordered, StreamExt};
use log::debug;

use super::{ScanOrchestrator, ScanOutcome};
use crate::error::Result;
use crate::models::ScanRequest;

/// Outcome of one request in a batch
#[derive(Debug)]
pub struct BatchItem {
    pub database: String,
    pub table: String,
    pub outcome: Result<ScanOutcome>,
}

/// Type alias for boxed futures used in batch scanning
type ScanFuture = Pin<Box<dyn Future<Output = (usize, BatchItem)> + Send>>;

impl ScanOrchestrator {
    /// Scan several tables, at most `max_concurrent` at a time.
    ///
    /// One failing table does not stop the others. Items come back in
    /// request order.
    pub async fn scan_many(
        &self,
        requests: Vec<ScanRequest>,
        max_concurrent: usize,
    ) -> Vec<BatchItem> {
        if requests.is_empty() {
            return Vec::new();
        }

        let max_concurrent = max_concurrent.max(1);
        debug!(
            "Scanning {} tables with max {} concurrent",
            requests.len(),
            max_concurrent
        );

        let total = requests.len();
        let mut futures: FuturesUnordered<ScanFuture> = FuturesUnordered::new();
        let mut pending = requests.into_iter().enumerate();

        let make_future = |index: usize, request: ScanRequest| -> ScanFuture {
            let engine = self.clone();
            Box::pin(async move {
                let database = request.database_name.clone();
                let table = request.table_name.clone();
                let outcome = engine.scan(request).await;
                (
                    index,
                    BatchItem {
                        database,
                        table,
                        outcome,
                    },
                )
            })
        };

        // Seed initial batch up to max_concurrent
        for (index, request) in pending.by_ref().take(max_concurrent) {
            futures.push(make_future(index, request));
        }

        let mut slots: Vec<Option<BatchItem>> = (0..total).map(|_| None).collect();
        while let Some((index, item)) = futures.next().await {
            debug!(
                "{}.{} finished ({})",
                item.database,
                item.table,
                if item.outcome.is_ok() { "ok" } else { "error" }
            );
            slots[index] = Some(item);

            if let Some((next, request)) = pending.next() {
                futures.push(make_future(next, request));
            }
        }

        slots.into_iter().flatten().collect()
    }
}
