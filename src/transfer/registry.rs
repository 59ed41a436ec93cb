//! The registry of live transfers and its controller operations.

use std::sync::{Arc, Mutex, MutexGuard};

use indexmap::IndexMap;
use log::{debug, info};

use super::record::{Direction, Status, TransferRecord};
use crate::engine::TransferEngine;
use crate::error::{ControlError, EngineError};

/// Which way a [`TransferRegistry::toggle`] call resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleAction {
    Paused,
    Resumed,
}

#[derive(Debug)]
struct Inner {
    records: IndexMap<u64, Arc<TransferRecord>>,
    next_id: u64,
}

/// The single authoritative collection of tracked transfers. Ids are
/// assigned strictly increasing and never reused; insertion order is
/// preserved for listing. The registry does not garbage-collect finished
/// transfers — callers remove records after observing a terminal status.
#[derive(Debug)]
pub struct TransferRegistry {
    inner: Mutex<Inner>,
}

impl TransferRegistry {
    pub fn new() -> TransferRegistry {
        TransferRegistry {
            inner: Mutex::new(Inner {
                records: IndexMap::new(),
                next_id: 1,
            }),
        }
    }

    fn locked(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("transfer registry lock poisoned")
    }

    /// Start a transfer through `engine` and register it. The engine handle
    /// is obtained before the registry is touched, so a refused transfer
    /// leaves no partial record behind. Duplicate resource refs are allowed
    /// and tracked independently.
    pub fn create(
        &self,
        engine: &dyn TransferEngine,
        direction: Direction,
    ) -> Result<Arc<TransferRecord>, EngineError> {
        let handle = match &direction {
            Direction::Upload { local_path } => engine.start_upload(local_path)?,
            Direction::Download {
                remote_key,
                local_path,
            } => engine.start_download(remote_key, local_path)?,
        };

        let mut inner = self.locked();
        let id = inner.next_id;
        inner.next_id += 1;
        let record = Arc::new(TransferRecord::new(id, direction, handle));
        inner.records.insert(id, record.clone());
        info!("transfer {} registered: {}", id, record.file_name());
        Ok(record)
    }

    pub fn get(&self, id: u64) -> Option<Arc<TransferRecord>> {
        self.locked().records.get(&id).cloned()
    }

    /// Snapshot of all live records in insertion order. The returned vector
    /// is stable for the caller even if creates or removals race.
    pub fn list(&self) -> Vec<Arc<TransferRecord>> {
        self.locked().records.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.locked().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locked().records.is_empty()
    }

    /// Unconditionally drop the record. Bookkeeping only: the engine handle
    /// is not released here, so callers should have observed a terminal
    /// status first.
    pub fn remove(&self, id: u64) -> Option<Arc<TransferRecord>> {
        let removed = self.locked().records.shift_remove(&id);
        if removed.is_some() {
            info!("transfer {} removed", id);
        }
        removed
    }

    pub fn pause(&self, id: u64) -> Result<(), ControlError> {
        self.with_record(id, |record| record.pause())
    }

    pub fn resume(&self, id: u64) -> Result<(), ControlError> {
        self.with_record(id, |record| record.resume())
    }

    pub fn abort(&self, id: u64) -> Result<(), ControlError> {
        self.with_record(id, |record| record.abort())
    }

    /// Pause when running, resume otherwise. Reports which action ran so a
    /// caller can label its toggle control.
    pub fn toggle(&self, id: u64) -> Result<ToggleAction, ControlError> {
        let record = self.get(id).ok_or(ControlError::NotFound(id))?;
        if record.status() == Status::InProgress {
            record.pause();
            Ok(ToggleAction::Paused)
        } else {
            record.resume();
            Ok(ToggleAction::Resumed)
        }
    }

    fn with_record(
        &self,
        id: u64,
        action: impl FnOnce(&TransferRecord),
    ) -> Result<(), ControlError> {
        match self.get(id) {
            Some(record) => {
                action(&record);
                Ok(())
            }
            None => {
                // Expected race: another poller may have removed the record.
                debug!("control request for unknown transfer {}", id);
                Err(ControlError::NotFound(id))
            }
        }
    }
}

impl Default for TransferRegistry {
    fn default() -> Self {
        TransferRegistry::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testutil::{FakeEngine, UnavailableEngine};
    use std::path::PathBuf;

    fn upload(name: &str) -> Direction {
        Direction::Upload {
            local_path: PathBuf::from(format!("/notes/{}", name)),
        }
    }

    fn download(key: &str) -> Direction {
        Direction::Download {
            remote_key: key.to_string(),
            local_path: PathBuf::from(format!("/tmp/{}", key)),
        }
    }

    #[test]
    fn ids_are_unique_and_strictly_increasing() {
        let engine = FakeEngine::new();
        let registry = TransferRegistry::new();

        let mut last = 0;
        for i in 0..10 {
            let record = registry.create(&engine, upload(&format!("n{}.txt", i))).unwrap();
            assert!(record.id() > last);
            last = record.id();
        }
    }

    #[test]
    fn duplicate_resource_refs_are_tracked_independently() {
        let engine = FakeEngine::new();
        let registry = TransferRegistry::new();

        let a = registry.create(&engine, upload("same.txt")).unwrap();
        let b = registry.create(&engine, upload("same.txt")).unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn list_is_insertion_ordered_and_stable_without_mutation() {
        let engine = FakeEngine::new();
        let registry = TransferRegistry::new();

        let ids: Vec<u64> = (0..4)
            .map(|i| registry.create(&engine, download(&format!("k{}.txt", i))).unwrap().id())
            .collect();

        let first: Vec<u64> = registry.list().iter().map(|r| r.id()).collect();
        let second: Vec<u64> = registry.list().iter().map(|r| r.id()).collect();
        assert_eq!(first, ids);
        assert_eq!(first, second);
    }

    #[test]
    fn removal_is_final_and_ids_are_never_reused() {
        let engine = FakeEngine::new();
        let registry = TransferRegistry::new();

        let a = registry.create(&engine, upload("a.txt")).unwrap();
        let removed_id = a.id();
        assert!(registry.remove(removed_id).is_some());
        assert!(registry.get(removed_id).is_none());
        assert!(registry.remove(removed_id).is_none());

        let b = registry.create(&engine, upload("b.txt")).unwrap();
        assert!(b.id() > removed_id);
        assert!(registry.list().iter().all(|r| r.id() != removed_id));
    }

    #[test]
    fn failed_creation_leaves_the_registry_untouched() {
        let registry = TransferRegistry::new();
        let err = registry
            .create(&UnavailableEngine, upload("a.txt"))
            .unwrap_err();
        assert!(matches!(err, EngineError::Unavailable(_)));
        assert!(registry.is_empty());

        // The next successful create still starts at id 1.
        let engine = FakeEngine::new();
        let record = registry.create(&engine, upload("a.txt")).unwrap();
        assert_eq!(record.id(), 1);
    }

    #[test]
    fn control_operations_report_not_found_for_unknown_ids() {
        let registry = TransferRegistry::new();
        assert_eq!(registry.pause(99), Err(ControlError::NotFound(99)));
        assert_eq!(registry.resume(99), Err(ControlError::NotFound(99)));
        assert_eq!(registry.abort(99), Err(ControlError::NotFound(99)));
        assert_eq!(registry.toggle(99), Err(ControlError::NotFound(99)));
    }

    #[test]
    fn toggle_pauses_then_resumes_across_engine_settles() {
        let engine = FakeEngine::new();
        let registry = TransferRegistry::new();
        let record = registry.create(&engine, download("a.txt")).unwrap();
        assert_eq!(record.status(), Status::InProgress);

        assert_eq!(registry.toggle(record.id()), Ok(ToggleAction::Paused));
        engine.settle(0);
        assert_eq!(record.status(), Status::Paused);

        assert_eq!(registry.toggle(record.id()), Ok(ToggleAction::Resumed));
        engine.settle(0);
        assert_eq!(record.status(), Status::InProgress);
    }

    #[test]
    fn aborting_one_download_leaves_the_other_untouched() {
        let engine = FakeEngine::new();
        let registry = TransferRegistry::new();
        let a = registry.create(&engine, download("a.txt")).unwrap();
        let b = registry.create(&engine, download("b.txt")).unwrap();
        assert_ne!(a.id(), b.id());

        registry.abort(a.id()).unwrap();
        engine.settle(0);
        engine.settle(1);

        assert_eq!(a.status(), Status::Canceled);
        assert_eq!(b.status(), Status::InProgress);
    }
}
