//! Envelope error types.

use thiserror::Error;

/// Errors raised while encoding or decoding a wire envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The frame was not valid JSON, or an outbound payload failed to serialize.
    #[error("invalid envelope JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The frame was valid JSON but not an object.
    #[error("envelope is not a JSON object (got {0})")]
    NotAnObject(&'static str),
}

/// Result type for envelope operations.
pub type Result<T> = std::result::Result<T, EnvelopeError>;
