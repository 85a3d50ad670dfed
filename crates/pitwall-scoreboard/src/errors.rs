//! Scoreboard error types.

use thiserror::Error;

use crate::payload::TransponderId;

/// Errors raised while applying timing events to the race state.
#[derive(Debug, Error)]
pub enum ScoreboardError {
    /// An event payload did not have the expected shape.
    #[error("invalid {identifier} payload: {source}")]
    Payload {
        /// Event identifier the payload belonged to.
        identifier: String,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },
    /// An event referenced a transponder with no registered driver.
    #[error("no driver registered for transponder {0}")]
    UnknownDriver(TransponderId),
}

impl ScoreboardError {
    /// Short category name used as a structured log field.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Payload { .. } => "payload",
            Self::UnknownDriver(_) => "unknown_driver",
        }
    }
}

/// Result type for scoreboard operations.
pub type Result<T> = std::result::Result<T, ScoreboardError>;
