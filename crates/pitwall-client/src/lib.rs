//! # pitwall-client
//!
//! Resilient WebSocket client for live-timing feeds.
//!
//! [`ConnectionManager`] keeps one logical connection to the timing server:
//!
//! - **Queue**: [`send`](ConnectionManager::send) returns a token at once and
//!   queues the command; a pump drains the queue in order while connected,
//!   one frame per sending interval
//! - **Reconnect**: after any close the manager waits, then retries until
//!   connected (keep-alive) or until the attempt cap is reached
//! - **Topics**: subscribers receive `open`, `close`, `error`, `message`
//!   (raw frame) and `message.<identifier>` (decoded envelope)
//!
//! The physical connection sits behind the [`Connector`] trait;
//! [`WsConnector`] is the `tokio-tungstenite` implementation.

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod manager;
pub mod queue;
pub mod state;
pub mod transport;

#[cfg(test)]
mod mock;

pub use config::ClientConfig;
pub use errors::{ClientError, Result};
pub use manager::ConnectionManager;
pub use pitwall_events::Handler;
pub use state::{ClientEvent, ConnectionState};
pub use transport::{Connector, Link, LinkCommand, LinkPeer, TransportEvent, WsConnector};
