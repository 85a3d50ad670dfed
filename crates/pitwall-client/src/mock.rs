//! In-memory connector for manager tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::Instant;
use url::Url;

use crate::errors::{ClientError, Result};
use crate::transport::{Connector, Link, LinkCommand, LinkPeer, TransportEvent};

#[derive(Default)]
struct Script {
    refuse_all: bool,
    unreachable: bool,
    outcomes: VecDeque<bool>,
    attempts: Vec<(Instant, Url)>,
}

/// Connector whose outcomes are scripted by the test.
///
/// Accepted connections surface as [`MockServer`]s on the receiver returned
/// by [`MockConnector::new`].
#[derive(Clone)]
pub(crate) struct MockConnector {
    script: Arc<Mutex<Script>>,
    accepted: mpsc::UnboundedSender<MockServer>,
}

impl MockConnector {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<MockServer>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                script: Arc::default(),
                accepted: tx,
            },
            rx,
        )
    }

    /// Refuse the next `n` attempts, then fall back to the default.
    pub(crate) fn refuse_next(&self, n: usize) {
        self.script.lock().outcomes.extend(std::iter::repeat_n(false, n));
    }

    /// Refuse every attempt not covered by `refuse_next`.
    pub(crate) fn refuse_all(&self, refuse: bool) {
        self.script.lock().refuse_all = refuse;
    }

    /// Fail every attempt with an error that no retry can fix.
    pub(crate) fn unreachable(&self, unreachable: bool) {
        self.script.lock().unreachable = unreachable;
    }

    /// Times of every connect call so far.
    pub(crate) fn attempt_times(&self) -> Vec<Instant> {
        self.script.lock().attempts.iter().map(|(t, _)| *t).collect()
    }

    /// URLs dialed so far.
    pub(crate) fn dialed(&self) -> Vec<Url> {
        self.script.lock().attempts.iter().map(|(_, u)| u.clone()).collect()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &Url) -> Result<Link> {
        let accept = {
            let mut script = self.script.lock();
            script.attempts.push((Instant::now(), url.clone()));
            if script.unreachable {
                return Err(ClientError::Unreachable("TLS support not compiled in".into()));
            }
            let default = !script.refuse_all;
            script.outcomes.pop_front().unwrap_or(default)
        };
        if !accept {
            return Err(ClientError::Transport("connection refused".into()));
        }
        let (link, peer) = Link::pair();
        let _ = self.accepted.send(MockServer { peer });
        Ok(link)
    }
}

/// Server side of one accepted mock connection.
pub(crate) struct MockServer {
    peer: LinkPeer,
}

impl MockServer {
    /// Next command from the client.
    pub(crate) async fn next_command(&mut self) -> Option<LinkCommand> {
        self.peer.commands.recv().await
    }

    /// A command already waiting, without blocking.
    pub(crate) fn next_command_now(&mut self) -> Option<LinkCommand> {
        self.peer.commands.try_recv().ok()
    }

    /// Next text frame from the client, parsed as JSON.
    pub(crate) async fn next_frame(&mut self) -> Value {
        match self.next_command().await {
            Some(LinkCommand::Text(text)) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected a text frame, got {other:?}"),
        }
    }

    /// Deliver a text frame to the client.
    pub(crate) fn push(&self, text: &str) {
        let _ = self.peer.events.send(TransportEvent::Message(text.to_owned()));
    }

    /// Report a transport error.
    pub(crate) fn error(&self, message: &str) {
        let _ = self.peer.events.send(TransportEvent::Error(message.to_owned()));
    }

    /// Drop the connection.
    pub(crate) fn close(&self, clean: bool) {
        let _ = self.peer.events.send(TransportEvent::Closed { clean });
    }

    /// Wait for the client's close request and acknowledge it cleanly.
    pub(crate) async fn answer_close(&mut self) {
        while let Some(cmd) = self.next_command().await {
            if cmd == LinkCommand::Close {
                self.close(true);
                return;
            }
        }
    }
}
