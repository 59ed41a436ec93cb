//! Error types for transfer creation and control operations.

use thiserror::Error;

/// Failure while starting a transfer. When creation fails the registry is
/// never mutated, so there is no partial record to clean up.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The transfer engine could not be reached or refused the work.
    #[error("transfer engine unavailable: {0}")]
    Unavailable(String),

    /// Reading or validating the local resource failed before the engine was
    /// handed the work.
    #[error("local file error: {0}")]
    LocalIo(#[from] std::io::Error),
}

/// Failure of a controller-level operation on an existing transfer.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ControlError {
    /// The id is unknown or the record was already removed. This is the
    /// expected outcome when a control action races with concurrent removal,
    /// not a hard error.
    #[error("no transfer with id {0}")]
    NotFound(u64),
}
