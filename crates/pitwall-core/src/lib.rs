//! # pitwall-core
//!
//! Shared vocabulary for the pitwall live-timing client:
//!
//! - **Tokens**: [`MessageToken`], the 16-character correlation token stamped
//!   on every outbound command
//! - **Envelopes**: [`OutboundEnvelope`] (`command`) and [`InboundEnvelope`]
//!   (`identifier`), the JSON frames exchanged with the timing server
//! - **Topics**: well-known dispatcher topic names (`open`, `close`, `error`,
//!   `message`, `message.<identifier>`)
//! - **Errors**: [`EnvelopeError`] for frames that fail to decode

#![deny(unsafe_code)]

pub mod envelope;
pub mod errors;
pub mod ids;
pub mod topics;

pub use envelope::{InboundEnvelope, OutboundEnvelope};
pub use errors::{EnvelopeError, Result};
pub use ids::MessageToken;
