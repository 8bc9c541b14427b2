//! Dispatch error types.
//!
//! All sink implementations surface errors through [`DispatchError`]. The
//! router catches these at its boundary: a failed dispatch is logged and
//! reported as an outcome, never propagated into the poll cycle.

use thiserror::Error;

/// Alias for `Result<T, DispatchError>`.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Errors raised by the external scheduling sinks.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The HTTP request to the service could not be completed.
    #[error("{service} request failed: {reason}")]
    RequestFailed { service: &'static str, reason: String },

    /// The service rejected the request.
    #[error("{service} returned {status}: {body}")]
    ApiError {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// The sink is missing a credential it needs.
    #[error("{service} has no usable credential")]
    MissingCredential { service: &'static str },
}
