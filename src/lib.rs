//! Background transfer manager for syncing notes to S3-compatible object
//! storage.
//!
//! The core is the [`TransferRegistry`]: it starts uploads and downloads
//! through a [`TransferEngine`], assigns each one a stable id, and mediates
//! pause/resume/abort. Status and progress are never stored — every query
//! reads the engine handle's live counters, so the registry can never drift
//! from what the engine is actually doing. A [`Poller`] re-derives the
//! visible state on a fixed period and feeds it to a [`TransferObserver`]
//! for rendering; when an observer sees a terminal status it removes the
//! record itself.
//!
//! [`S3Engine`] is the bundled engine, streaming objects over presigned
//! URLs. The `store` module carries the surrounding plumbing (bucket
//! bootstrap, object listing) and `notes` the local files being synced.

pub mod engine;
pub mod error;
pub mod notes;
pub mod store;
pub mod transfer;

pub use engine::s3::S3Engine;
pub use engine::{NativeState, TransferEngine, TransferHandle};
pub use error::{ControlError, EngineError};
pub use store::{StoreConfig, StoreResult};
pub use transfer::poller::{Poller, TransferObserver, TransferUpdate, REFRESH_DELAY};
pub use transfer::record::{Direction, Status, TransferRecord, PROGRESS_NOT_APPLICABLE};
pub use transfer::registry::{ToggleAction, TransferRegistry};
