//! Wiring between the connection manager and the race state.
//!
//! Client handlers run on the connection's tasks and only forward
//! [`RaceInput`]s over a channel; the [`Scoreboard`] loop is the sole owner
//! of the [`RaceState`].

use std::time::Duration;

use pitwall_client::{ClientEvent, ConnectionManager, Handler};
use pitwall_core::topics;
use pitwall_settings::{Ranking, ScoreboardSettings};
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::payload::FeedEvent;
use crate::race::{RaceInput, RaceState};
use crate::standings::Board;

// ─────────────────────────────────────────────────────────────────────────────
// Bridge
// ─────────────────────────────────────────────────────────────────────────────

/// Subscriptions that forward client events to the scoreboard loop.
pub struct FeedBridge {
    subscriptions: Vec<(String, Handler<ClientEvent>)>,
}

impl FeedBridge {
    /// Subscribe to `open`, `close` and every feed identifier on `manager`.
    pub fn attach(manager: &ConnectionManager) -> (Self, mpsc::UnboundedReceiver<RaceInput>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subscriptions = Vec::with_capacity(FeedEvent::IDENTIFIERS.len() + 2);

        for (topic, input) in [
            (topics::OPEN, RaceInput::Connected),
            (topics::CLOSE, RaceInput::Disconnected),
        ] {
            let tx = tx.clone();
            let handler = manager.on(topic, move |_| {
                let _ = tx.send(input.clone());
            });
            subscriptions.push((topic.to_owned(), handler));
        }

        for identifier in FeedEvent::IDENTIFIERS {
            let topic = topics::message_topic(identifier);
            let tx = tx.clone();
            let handler = manager.on(&topic, move |event| {
                let Some(envelope) = event.envelope() else {
                    return;
                };
                match FeedEvent::decode(identifier, &envelope.data) {
                    Ok(Some(feed)) => {
                        let _ = tx.send(RaceInput::Feed(feed));
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(identifier, kind = e.error_kind(), error = %e, "dropping feed event");
                    }
                }
            });
            subscriptions.push((topic, handler));
        }

        (Self { subscriptions }, rx)
    }

    /// Remove every subscription from `manager`.
    pub fn detach(self, manager: &ConnectionManager) {
        for (topic, handler) in self.subscriptions {
            let _ = manager.unsubscribe(&topic, &handler);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scoreboard loop
// ─────────────────────────────────────────────────────────────────────────────

/// Owner of the race state.
#[derive(Debug)]
pub struct Scoreboard {
    state: RaceState,
    ranking: Ranking,
    shown: Option<Board>,
}

impl Scoreboard {
    /// Empty scoreboard configured from `settings`.
    pub fn new(settings: &ScoreboardSettings) -> Self {
        Self {
            state: RaceState::new(Duration::from_millis(settings.stub_after_finish_ms)),
            ranking: settings.ranking,
            shown: None,
        }
    }

    /// Current race state.
    pub fn state(&self) -> &RaceState {
        &self.state
    }

    /// Current board.
    pub fn board(&self) -> Board {
        Board::from_state(&self.state, self.ranking)
    }

    /// Apply one input. Returns the new board when it differs from the last
    /// one returned.
    pub fn apply(&mut self, input: RaceInput, now: Instant) -> Option<Board> {
        if let Err(e) = self.state.apply(input, now) {
            warn!(kind = e.error_kind(), error = %e, "ignoring feed event");
            return None;
        }
        self.refresh()
    }

    /// Advance the stub schedule to `now`.
    pub fn tick(&mut self, now: Instant) -> Option<Board> {
        if self.state.tick(now) {
            debug!("stub screen raised");
        }
        self.refresh()
    }

    fn refresh(&mut self) -> Option<Board> {
        let board = self.board();
        if self.shown.as_ref() == Some(&board) {
            return None;
        }
        self.shown = Some(board.clone());
        Some(board)
    }

    /// Consume `inputs` until they end or `cancel` fires, calling `on_change`
    /// with every distinct board, starting with the initial one.
    pub async fn run<F>(
        mut self,
        mut inputs: mpsc::UnboundedReceiver<RaceInput>,
        cancel: CancellationToken,
        mut on_change: F,
    ) -> Self
    where
        F: FnMut(&Board),
    {
        if let Some(board) = self.refresh() {
            on_change(&board);
        }

        loop {
            let due = self.state.stub_due();
            let changed = tokio::select! {
                () = cancel.cancelled() => break,
                input = inputs.recv() => {
                    let Some(input) = input else { break };
                    self.apply(input, Instant::now())
                }
                () = sleep_until(due.unwrap_or_else(Instant::now)), if due.is_some() => {
                    self.tick(Instant::now())
                }
            };
            if let Some(board) = changed {
                on_change(&board);
            }
        }
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
