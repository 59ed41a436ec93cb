//! Transfer engine capability consumed by the registry.
//!
//! A [`TransferHandle`] is the live view into one transfer: the engine's
//! worker publishes state and byte counters into it, callers read them back
//! and send pause/resume/cancel signals through it. Every query and control
//! call is a non-blocking atomic read or write; the actual byte transfer
//! happens on the engine's own tasks.

pub mod s3;

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use crate::error::EngineError;

/// Engine-native transfer state, before mapping into the four-value
/// [`Status`](crate::transfer::record::Status).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeState {
    Waiting,
    InProgress,
    Paused,
    Canceled,
    Failed,
    Completed,
}

impl NativeState {
    fn as_u8(self) -> u8 {
        match self {
            NativeState::Waiting => 0,
            NativeState::InProgress => 1,
            NativeState::Paused => 2,
            NativeState::Canceled => 3,
            NativeState::Failed => 4,
            NativeState::Completed => 5,
        }
    }

    /// Decodes a stored state. Unknown discriminants yield `None`; callers
    /// treat that as still in progress rather than aborting a poll pass.
    pub(crate) fn from_u8(value: u8) -> Option<NativeState> {
        match value {
            0 => Some(NativeState::Waiting),
            1 => Some(NativeState::InProgress),
            2 => Some(NativeState::Paused),
            3 => Some(NativeState::Canceled),
            4 => Some(NativeState::Failed),
            5 => Some(NativeState::Completed),
            _ => None,
        }
    }

    /// No further progress will occur in this state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            NativeState::Canceled | NativeState::Failed | NativeState::Completed
        )
    }
}

/// Shared state between a handle and the worker driving its transfer.
#[derive(Debug)]
pub(crate) struct HandleShared {
    state: AtomicU8,
    transferred: AtomicU64,
    total: AtomicU64,
    pause_requested: AtomicBool,
    cancel_requested: AtomicBool,
    resume_notify: Notify,
}

impl HandleShared {
    fn new() -> HandleShared {
        HandleShared {
            state: AtomicU8::new(NativeState::Waiting.as_u8()),
            transferred: AtomicU64::new(0),
            total: AtomicU64::new(0),
            pause_requested: AtomicBool::new(false),
            cancel_requested: AtomicBool::new(false),
            resume_notify: Notify::new(),
        }
    }

    pub(crate) fn set_state(&self, state: NativeState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    pub(crate) fn state(&self) -> NativeState {
        NativeState::from_u8(self.state.load(Ordering::SeqCst)).unwrap_or(NativeState::InProgress)
    }

    pub(crate) fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::SeqCst);
    }

    pub(crate) fn total(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }

    pub(crate) fn set_transferred(&self, bytes: u64) {
        self.transferred.store(bytes, Ordering::SeqCst);
    }

    pub(crate) fn transferred(&self) -> u64 {
        self.transferred.load(Ordering::SeqCst)
    }

    pub(crate) fn add_transferred(&self, bytes: u64) {
        self.transferred.fetch_add(bytes, Ordering::SeqCst);
    }

    pub(crate) fn pause_requested(&self) -> bool {
        self.pause_requested.load(Ordering::SeqCst)
    }

    pub(crate) fn cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }

    /// Parks the worker until the pause request is cleared or the transfer
    /// is canceled.
    pub(crate) async fn wait_resumed(&self) {
        loop {
            let notified = self.resume_notify.notified();
            if self.cancel_requested() || !self.pause_requested() {
                return;
            }
            notified.await;
        }
    }
}

/// Opaque handle to one live transfer inside the engine. Cloning the handle
/// does not duplicate the transfer; all clones observe the same state.
#[derive(Debug, Clone)]
pub struct TransferHandle {
    shared: Arc<HandleShared>,
}

impl TransferHandle {
    pub(crate) fn new() -> TransferHandle {
        TransferHandle {
            shared: Arc::new(HandleShared::new()),
        }
    }

    pub(crate) fn shared(&self) -> Arc<HandleShared> {
        self.shared.clone()
    }

    /// Percent transferred, 0..=100. Monotonically non-decreasing while the
    /// transfer is running; on a terminal handle this is the last known value.
    pub fn percent_complete(&self) -> u32 {
        if self.native_state() == NativeState::Completed {
            return 100;
        }
        let total = self.shared.total();
        if total == 0 {
            return 0;
        }
        let transferred = self.shared.transferred();
        std::cmp::min(((transferred as f64 / total as f64) * 100.0) as u32, 100)
    }

    /// The engine's own view of the transfer. Never cached by callers.
    pub fn native_state(&self) -> NativeState {
        self.shared.state()
    }

    /// Requests a pause. Idempotent; the worker settles into the paused
    /// state once it observes the flag.
    pub fn pause(&self) {
        self.shared.pause_requested.store(true, Ordering::SeqCst);
    }

    /// Clears a pause request and wakes a parked worker. A no-op on a
    /// transfer that is not paused.
    pub fn resume(&self) {
        self.shared.pause_requested.store(false, Ordering::SeqCst);
        self.shared.resume_notify.notify_waiters();
    }

    /// Best-effort cancel. The handle does not transition immediately; the
    /// next poll observes the engine's settled state.
    pub fn cancel(&self) {
        self.shared.cancel_requested.store(true, Ordering::SeqCst);
        self.shared.resume_notify.notify_waiters();
    }
}

/// The capability the registry consumes to start transfers. Creation spawns
/// the transfer work and returns immediately; progress and completion are
/// reported through the returned handle.
pub trait TransferEngine: Send + Sync {
    /// Begins uploading the file at `local_path` to the object store.
    fn start_upload(&self, local_path: &Path) -> Result<TransferHandle, EngineError>;

    /// Begins downloading `remote_key` from the object store to `local_path`.
    fn start_download(&self, remote_key: &str, local_path: &Path)
        -> Result<TransferHandle, EngineError>;
}

#[cfg(test)]
pub(crate) mod testutil {
    //! In-memory engine for exercising the registry and poller without I/O.

    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use super::{HandleShared, NativeState, TransferEngine, TransferHandle};
    use crate::error::EngineError;

    #[derive(Default)]
    pub(crate) struct FakeEngine {
        handles: Mutex<Vec<Arc<HandleShared>>>,
    }

    impl FakeEngine {
        pub(crate) fn new() -> FakeEngine {
            FakeEngine::default()
        }

        fn handle_at(&self, index: usize) -> Arc<HandleShared> {
            self.handles.lock().unwrap()[index].clone()
        }

        /// Applies outstanding pause/cancel requests the way a real worker
        /// would on its next flag check.
        pub(crate) fn settle(&self, index: usize) {
            let shared = self.handle_at(index);
            if shared.state().is_terminal() {
                return;
            }
            if shared.cancel_requested() {
                shared.set_state(NativeState::Canceled);
            } else if shared.pause_requested() {
                shared.set_state(NativeState::Paused);
            } else if shared.state() == NativeState::Paused {
                shared.set_state(NativeState::InProgress);
            }
        }

        pub(crate) fn set_percent(&self, index: usize, percent: u64) {
            let shared = self.handle_at(index);
            shared.set_total(100);
            shared.set_transferred(percent);
        }

        pub(crate) fn complete(&self, index: usize) {
            let shared = self.handle_at(index);
            shared.set_total(100);
            shared.set_transferred(100);
            shared.set_state(NativeState::Completed);
        }

        pub(crate) fn fail(&self, index: usize) {
            self.handle_at(index).set_state(NativeState::Failed);
        }

        fn start(&self) -> TransferHandle {
            let handle = TransferHandle::new();
            let shared = handle.shared();
            shared.set_total(100);
            shared.set_state(NativeState::InProgress);
            self.handles.lock().unwrap().push(shared);
            handle
        }
    }

    impl TransferEngine for FakeEngine {
        fn start_upload(&self, _local_path: &Path) -> Result<TransferHandle, EngineError> {
            Ok(self.start())
        }

        fn start_download(
            &self,
            _remote_key: &str,
            _local_path: &Path,
        ) -> Result<TransferHandle, EngineError> {
            Ok(self.start())
        }
    }

    /// Engine that refuses all work, for the atomic create-or-fail tests.
    pub(crate) struct UnavailableEngine;

    impl TransferEngine for UnavailableEngine {
        fn start_upload(&self, _local_path: &Path) -> Result<TransferHandle, EngineError> {
            Err(EngineError::Unavailable("engine offline".to_string()))
        }

        fn start_download(
            &self,
            _remote_key: &str,
            _local_path: &Path,
        ) -> Result<TransferHandle, EngineError> {
            Err(EngineError::Unavailable("engine offline".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_state_round_trips_through_u8() {
        for state in [
            NativeState::Waiting,
            NativeState::InProgress,
            NativeState::Paused,
            NativeState::Canceled,
            NativeState::Failed,
            NativeState::Completed,
        ] {
            assert_eq!(NativeState::from_u8(state.as_u8()), Some(state));
        }
    }

    #[test]
    fn unknown_state_discriminant_decodes_to_none() {
        assert_eq!(NativeState::from_u8(42), None);
    }

    #[test]
    fn percent_complete_is_zero_without_a_known_total() {
        let handle = TransferHandle::new();
        handle.shared().set_transferred(512);
        assert_eq!(handle.percent_complete(), 0);
    }

    #[test]
    fn percent_complete_tracks_byte_counters() {
        let handle = TransferHandle::new();
        let shared = handle.shared();
        shared.set_total(200);
        shared.set_transferred(50);
        assert_eq!(handle.percent_complete(), 25);
        shared.add_transferred(150);
        assert_eq!(handle.percent_complete(), 100);
    }

    #[test]
    fn percent_complete_is_pinned_to_100_on_completion() {
        // Zero-byte transfers still report 100 once completed.
        let handle = TransferHandle::new();
        handle.shared().set_state(NativeState::Completed);
        assert_eq!(handle.percent_complete(), 100);
    }

    #[test]
    fn control_signals_set_and_clear_flags() {
        let handle = TransferHandle::new();
        let shared = handle.shared();
        assert!(!shared.pause_requested());

        handle.pause();
        handle.pause();
        assert!(shared.pause_requested());

        handle.resume();
        assert!(!shared.pause_requested());

        handle.cancel();
        assert!(shared.cancel_requested());
    }

    #[tokio::test]
    async fn wait_resumed_returns_once_resumed_or_canceled() {
        let handle = TransferHandle::new();
        handle.pause();

        let shared = handle.shared();
        let waiter = tokio::spawn(async move { shared.wait_resumed().await });
        tokio::task::yield_now().await;
        handle.resume();
        waiter.await.unwrap();

        let handle = TransferHandle::new();
        handle.pause();
        let shared = handle.shared();
        let waiter = tokio::spawn(async move { shared.wait_resumed().await });
        tokio::task::yield_now().await;
        handle.cancel();
        waiter.await.unwrap();
    }
}
