//! Classifier error types.
//!
//! All classification subsystems surface errors through [`ClassifyError`].
//! Note that [`crate::classifier::IntentClassifier::classify`] itself is
//! infallible by contract; these errors exist for the layers underneath it
//! and collapse into the fallback intent at the classify seam.

use thiserror::Error;

/// Alias for `Result<T, ClassifyError>`.
pub type ClassifyResult<T> = Result<T, ClassifyError>;

/// Errors raised below the classify seam.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// An HTTP request to the LLM provider failed.
    #[error("llm request failed: {reason}")]
    RequestFailed { reason: String },

    /// The provider answered with a non-success status.
    #[error("llm returned {status}: {body}")]
    ApiError { status: u16, body: String },

    /// The model reply contained no parsable classification object.
    #[error("unparsable model reply: {reason}")]
    UnparsableReply { reason: String },

    /// The API key is missing for a provider that requires one.
    #[error("missing api key for provider: {provider}")]
    MissingApiKey { provider: String },

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
