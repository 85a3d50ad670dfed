//! Bounded outbound FIFO.

use std::collections::VecDeque;

use pitwall_core::{MessageToken, OutboundEnvelope};

/// FIFO of messages waiting for the pump.
///
/// When full, pushing evicts the oldest message.
#[derive(Debug)]
pub struct OutboundQueue {
    items: VecDeque<OutboundEnvelope>,
    capacity: usize,
}

impl OutboundQueue {
    /// Create a queue holding at most `capacity` messages (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Append a message, returning the evicted head if the queue was full.
    pub fn push(&mut self, envelope: OutboundEnvelope) -> Option<OutboundEnvelope> {
        let evicted = if self.items.len() >= self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(envelope);
        evicted
    }

    /// The next message to send.
    pub fn front(&self) -> Option<&OutboundEnvelope> {
        self.items.front()
    }

    /// Remove the head if it is still the message identified by `token`.
    ///
    /// The head may have changed while it was being sent (cleared or evicted).
    pub fn pop_if(&mut self, token: &MessageToken) -> bool {
        if self.items.front().is_some_and(|m| &m.token == token) {
            let _ = self.items.pop_front();
            true
        } else {
            false
        }
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drop every queued message, returning how many were dropped.
    pub fn clear(&mut self) -> usize {
        let n = self.items.len();
        self.items.clear();
        n
    }
}
