//! # pitwall-events
//!
//! In-process topic dispatcher keyed by dot-delimited paths.
//!
//! Subscribing to `"message.endLap"` registers a [`Handler`] on the `endLap`
//! child of the `message` node. Dispatching walks the path from the root and
//! fires every node along the way that holds handlers, so a dispatch to
//! `"message.endLap"` reaches subscribers of both `message` and
//! `message.endLap`. [`Dispatcher::dispatch_exact`] fires only the terminal
//! node.
//!
//! Handlers run synchronously on the caller, in registration order. A handler
//! that panics is logged and skipped; the remaining handlers still run.

#![deny(unsafe_code)]

pub mod dispatcher;
pub mod handler;

pub use dispatcher::Dispatcher;
pub use handler::{Handler, invoke_all};
