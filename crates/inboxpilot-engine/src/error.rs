//! Engine error types.

use thiserror::Error;

/// Alias for `Result<T, EngineError>`.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised while setting up or driving the orchestrator.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Setting up the store file watcher failed.
    #[error("watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// A storage operation failed.
    #[error("store error: {0}")]
    Store(#[from] inboxpilot_store::StoreError),

    /// The store path cannot be watched (no parent directory / no file name).
    #[error("store path not watchable: {path}")]
    UnwatchablePath { path: String },
}
