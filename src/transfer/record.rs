//! Transfer records: one tracked upload or download.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::engine::{NativeState, TransferHandle};

/// Progress value reported for canceled transfers, where a percentage no
/// longer applies.
pub const PROGRESS_NOT_APPLICABLE: i32 = -1;

/// Direction of a transfer, fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Direction {
    Upload {
        local_path: PathBuf,
    },
    Download {
        remote_key: String,
        local_path: PathBuf,
    },
}

impl Direction {
    pub fn is_upload(&self) -> bool {
        matches!(self, Direction::Upload { .. })
    }

    /// Display name for the transferred resource, derived from its locator.
    fn display_name(&self) -> String {
        match self {
            Direction::Upload { local_path } => local_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| local_path.to_string_lossy().into_owned()),
            Direction::Download { remote_key, .. } => remote_key
                .rsplit('/')
                .next()
                .unwrap_or(remote_key)
                .to_string(),
        }
    }
}

/// Four-value status surfaced to observers, mapped live from the engine's
/// native state on every query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    #[serde(rename = "in_progress")]
    InProgress,
    #[serde(rename = "paused")]
    Paused,
    #[serde(rename = "canceled")]
    Canceled,
    #[serde(rename = "completed")]
    Completed,
}

impl Status {
    /// No further progress will occur in this status.
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Canceled | Status::Completed)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::InProgress => write!(f, "in_progress"),
            Status::Paused => write!(f, "paused"),
            Status::Canceled => write!(f, "canceled"),
            Status::Completed => write!(f, "completed"),
        }
    }
}

/// One in-flight or recently finished transfer. The record exclusively owns
/// its engine handle; status and progress are derived from the handle on
/// every query and never cached.
#[derive(Debug)]
pub struct TransferRecord {
    id: u64,
    file_name: String,
    direction: Direction,
    handle: TransferHandle,
    created_at: DateTime<Utc>,
}

impl TransferRecord {
    pub(crate) fn new(id: u64, direction: Direction, handle: TransferHandle) -> TransferRecord {
        let file_name = direction.display_name();
        TransferRecord {
            id,
            file_name,
            direction,
            handle,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Display name, derived once at construction.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn direction(&self) -> &Direction {
        &self.direction
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The underlying engine handle. Ownership stays with the record.
    pub fn handle(&self) -> &TransferHandle {
        &self.handle
    }

    /// Current status, derived live from the engine handle. An engine state
    /// outside the mapped set reads as still in progress rather than
    /// poisoning the poll pass.
    pub fn status(&self) -> Status {
        match self.handle.native_state() {
            NativeState::Waiting | NativeState::InProgress => Status::InProgress,
            NativeState::Paused => Status::Paused,
            NativeState::Canceled | NativeState::Failed => Status::Canceled,
            NativeState::Completed => Status::Completed,
        }
    }

    /// Progress for display: the live percent while running, 0 while paused,
    /// [`PROGRESS_NOT_APPLICABLE`] once canceled, 100 once completed.
    pub fn progress(&self) -> i32 {
        match self.status() {
            Status::InProgress => self.handle.percent_complete() as i32,
            Status::Paused => 0,
            Status::Canceled => PROGRESS_NOT_APPLICABLE,
            Status::Completed => 100,
        }
    }

    /// Requests a pause. Safe to call in any state; already-paused and
    /// terminal transfers are unaffected.
    pub fn pause(&self) {
        self.handle.pause();
    }

    /// Requests a resume. Safe to call in any state.
    pub fn resume(&self) {
        self.handle.resume();
    }

    /// Best-effort abort; the next poll observes the engine's settled state.
    pub fn abort(&self) {
        self.handle.cancel();
    }
}
