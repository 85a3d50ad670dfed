//! Client error types.

use thiserror::Error;

/// Errors surfaced by the connection manager and its transports.
///
/// Transmission failures of queued messages are logged, never returned; these
/// errors come from configuration, connecting, and `stop()`.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The configured URL does not parse.
    #[error("invalid server URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The URL parses but is not a WebSocket URL.
    #[error("unsupported URL scheme {scheme:?}, expected ws or wss")]
    UnsupportedScheme {
        /// The rejected scheme.
        scheme: String,
    },

    /// Connecting or talking to the server failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The endpoint can never be reached as built, such as `wss` without TLS
    /// support compiled in.
    #[error("cannot connect to endpoint: {0}")]
    Unreachable(String),

    /// The server did not acknowledge a close in time.
    #[error("close not acknowledged within {timeout_ms}ms")]
    CloseTimeout {
        /// How long `stop()` waited.
        timeout_ms: u64,
    },

    /// Called outside a Tokio runtime.
    #[error("no tokio runtime available")]
    NoRuntime,
}

impl ClientError {
    /// Whether retrying the same operation may succeed. The reconnection
    /// loop gives up on the first error that is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::CloseTimeout { .. } => true,
            Self::InvalidUrl(_)
            | Self::UnsupportedScheme { .. }
            | Self::Unreachable(_)
            | Self::NoRuntime => false,
        }
    }

    /// Short category string for structured logs.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::InvalidUrl(_) | Self::UnsupportedScheme { .. } | Self::Unreachable(_) => {
                "config"
            }
            Self::Transport(_) => "transport",
            Self::CloseTimeout { .. } => "timeout",
            Self::NoRuntime => "runtime",
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
