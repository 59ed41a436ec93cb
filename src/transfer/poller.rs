//! Periodic poller that re-derives transfer state for observers.
//!
//! Derivation itself is a pure read of engine counters
//! ([`TransferRecord::status`](super::record::TransferRecord::status) and
//! [`progress`](super::record::TransferRecord::progress)); this module only
//! schedules it and fans the results out to an observer. Follow-up policy on
//! terminal transfers (removing the record, deleting local markers, opening
//! the downloaded file) belongs to the observer, not the poller.

use std::sync::Arc;
use std::time::Duration;

use log::debug;
use serde::Serialize;
use tokio::task::JoinHandle;

use super::record::Status;
use super::registry::TransferRegistry;

/// Poll period used by the canonical UI refresh loop.
pub const REFRESH_DELAY: Duration = Duration::from_millis(500);

/// Freshly derived view of one record, delivered once per poll tick.
#[derive(Debug, Clone, Serialize)]
pub struct TransferUpdate {
    pub id: u64,
    pub status: Status,
    pub progress: i32,
}

/// Callback surface the UI binds to. Callbacks run on the poller's task, one
/// at a time, so observers can mutate UI-bound state without extra locking.
pub trait TransferObserver: Send + Sync {
    /// The visible set of records changed: a transfer appeared or one was
    /// removed.
    fn on_transfer_list_changed(&self) {}

    /// One record's derived status and progress for this tick.
    fn on_transfer_updated(&self, update: TransferUpdate);
}

/// Owns the polling task. Dropping the poller stops it.
#[derive(Debug)]
pub struct Poller {
    task: JoinHandle<()>,
}

impl Poller {
    /// Spawn the polling loop on the current tokio runtime.
    pub fn spawn(
        registry: Arc<TransferRegistry>,
        observer: Arc<dyn TransferObserver>,
        period: Duration,
    ) -> Poller {
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut last_seen: Vec<u64> = Vec::new();
            loop {
                interval.tick().await;
                poll_once(&registry, observer.as_ref(), &mut last_seen);
            }
        });
        Poller { task }
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// One poll pass over a stable snapshot of the registry. Each record's
/// derivation is independent; no record can abort the pass for the others.
fn poll_once(registry: &TransferRegistry, observer: &dyn TransferObserver, last_seen: &mut Vec<u64>) {
    let snapshot = registry.list();
    let ids: Vec<u64> = snapshot.iter().map(|record| record.id()).collect();

    if ids != *last_seen {
        debug!(
            "transfer list changed: {} -> {} entries",
            last_seen.len(),
            ids.len()
        );
        observer.on_transfer_list_changed();
        *last_seen = ids;
    }

    for record in &snapshot {
        observer.on_transfer_updated(TransferUpdate {
            id: record.id(),
            status: record.status(),
            progress: record.progress(),
        });
    }
}
