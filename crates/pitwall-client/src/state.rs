//! Connection lifecycle and dispatched events.

use std::fmt;

use pitwall_core::InboundEnvelope;

/// Lifecycle of the single logical connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection and no attempt in flight.
    Disconnected,
    /// An initial or reconnection attempt is in progress.
    Connecting,
    /// Connected; the pump may transmit.
    Open,
    /// `stop()` sent a close and is waiting for the acknowledgment.
    Closing,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
        };
        f.write_str(s)
    }
}

/// Payload delivered to subscribers.
#[derive(Clone, Debug, PartialEq)]
pub enum ClientEvent {
    /// Delivered on `open`.
    Open,
    /// Delivered on `close`. `clean` is true when the closing handshake
    /// completed.
    Close {
        /// Whether the close handshake completed.
        clean: bool,
    },
    /// Delivered on `error`.
    Error(String),
    /// Delivered on `message.<identifier>`: the decoded frame.
    Message(InboundEnvelope),
    /// Delivered on `message`: the frame text as received.
    Raw(String),
}

impl ClientEvent {
    /// The decoded envelope of a `message.<identifier>` event.
    pub fn envelope(&self) -> Option<&InboundEnvelope> {
        match self {
            Self::Message(envelope) => Some(envelope),
            _ => None,
        }
    }

    /// The raw text of a `message` event.
    pub fn raw(&self) -> Option<&str> {
        match self {
            Self::Raw(text) => Some(text),
            _ => None,
        }
    }
}
