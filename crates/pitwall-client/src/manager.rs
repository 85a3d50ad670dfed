//! Resilient connection manager.
//!
//! Owns the single logical connection, the outbound queue and the topic
//! dispatcher. All lifecycle transitions go through one state lock; handlers
//! are always invoked after that lock is released.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pitwall_core::{InboundEnvelope, MessageToken, OutboundEnvelope, topics};
use pitwall_events::{Dispatcher, Handler, invoke_all};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::errors::{ClientError, Result};
use crate::queue::OutboundQueue;
use crate::state::{ClientEvent, ConnectionState};
use crate::transport::{Connector, Link, LinkCommand, TransportEvent, WsConnector};

/// Per-frame logging: `info` in debug mode, `debug` otherwise.
macro_rules! trace_frame {
    ($debug:expr, $($arg:tt)+) => {
        if $debug {
            info!($($arg)+);
        } else {
            debug!($($arg)+);
        }
    };
}

/// Handle to the live-timing connection.
///
/// Cheap to clone; clones share the same connection.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

struct Inner {
    config: ClientConfig,
    endpoint: Url,
    connector: Arc<dyn Connector>,
    runtime: Handle,
    shared: Mutex<Shared>,
    dispatcher: Mutex<Dispatcher<ClientEvent>>,
}

struct ActiveLink {
    generation: u64,
    outbound: mpsc::UnboundedSender<LinkCommand>,
}

struct Shared {
    lifecycle: ConnectionState,
    attempts: u32,
    reconnecting: bool,
    stopped: bool,
    pumping: bool,
    /// Bumped by every `start` and `stop`. Connect and retry tasks carry the
    /// epoch they were spawned in and leave state alone once it moves on.
    epoch: u64,
    generation: u64,
    link: Option<ActiveLink>,
    queue: OutboundQueue,
    close_waiter: Option<oneshot::Sender<bool>>,
}

impl Shared {
    fn is_stale(&self, epoch: u64) -> bool {
        self.epoch != epoch
    }

    fn is_current(&self, generation: u64) -> bool {
        self.link.as_ref().is_some_and(|l| l.generation == generation)
    }

    fn should_reconnect(&self, config: &ClientConfig) -> bool {
        self.reconnecting
            && (config.keep_alive || self.attempts < config.max_reconnection_attempts)
    }
}

impl ConnectionManager {
    /// Create a manager dialing over WebSocket.
    ///
    /// Must be called within a Tokio runtime. Nothing is dialed until
    /// [`start`](Self::start).
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_connector(config, Arc::new(WsConnector))
    }

    /// Create a manager with a custom [`Connector`].
    pub fn with_connector(config: ClientConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        let endpoint = config.endpoint()?;
        let runtime = Handle::try_current().map_err(|_| ClientError::NoRuntime)?;
        let queue = OutboundQueue::new(config.max_queue_len);
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                endpoint,
                connector,
                runtime,
                shared: Mutex::new(Shared {
                    lifecycle: ConnectionState::Disconnected,
                    attempts: 0,
                    reconnecting: false,
                    stopped: false,
                    pumping: false,
                    epoch: 0,
                    generation: 0,
                    link: None,
                    queue,
                    close_waiter: None,
                }),
                dispatcher: Mutex::new(Dispatcher::new()),
            }),
        })
    }

    /// Begin the first connection attempt.
    ///
    /// Ignored while a connection or reconnection is already in progress.
    pub fn start(&self) {
        let epoch = {
            let mut s = self.inner.shared.lock();
            if s.lifecycle != ConnectionState::Disconnected || s.reconnecting {
                debug!(
                    state = %s.lifecycle,
                    reconnecting = s.reconnecting,
                    "start ignored, connection not idle"
                );
                return;
            }
            s.stopped = false;
            s.epoch += 1;
            s.lifecycle = ConnectionState::Connecting;
            s.epoch
        };
        info!(url = %self.inner.config.url, "connecting");
        let inner = Arc::clone(&self.inner);
        drop(self.inner.runtime.spawn(inner.connect_initial(epoch)));
    }

    /// Queue a command and return its token.
    ///
    /// Never blocks and never fails; the message leaves when the connection is
    /// open, paced by the sending interval.
    pub fn send(&self, command: impl Into<String>, data: Value) -> MessageToken {
        let envelope = OutboundEnvelope::new(command, data);
        let token = envelope.token.clone();
        let command = envelope.command.clone();

        let (start_pump, evicted, queued) = {
            let mut s = self.inner.shared.lock();
            let evicted = s.queue.push(envelope);
            let start = s.queue.len() == 1
                && s.lifecycle == ConnectionState::Open
                && !s.pumping;
            (start, evicted, s.queue.len())
        };

        if let Some(old) = evicted {
            warn!(token = %old.token, command = %old.command, "outbound queue full, dropped oldest message");
        }
        trace_frame!(self.inner.config.debug, token = %token, command = %command, queued, "message queued");

        if start_pump {
            let inner = Arc::clone(&self.inner);
            drop(self.inner.runtime.spawn(inner.pump()));
        }
        token
    }

    /// Close the connection.
    ///
    /// When open, sends a close and waits for the acknowledgment (up to the
    /// close timeout); a clean close resets the attempt counter and discards
    /// the queue. When not open, stops reconnecting, returns to
    /// `Disconnected` and discards the queue without touching the network. A
    /// dial already in flight is not cancelled, but its connection is closed
    /// instead of adopted, and pending retries never fire.
    pub async fn stop(&self) -> Result<()> {
        let pending = {
            let mut s = self.inner.shared.lock();
            s.stopped = true;
            s.epoch += 1;
            let open_link = match (s.lifecycle, s.link.as_ref()) {
                (ConnectionState::Open, Some(link)) => {
                    Some((link.generation, link.outbound.clone()))
                }
                _ => None,
            };
            if let Some((generation, outbound)) = open_link {
                let (tx, rx) = oneshot::channel();
                s.close_waiter = Some(tx);
                s.lifecycle = ConnectionState::Closing;
                Some((generation, outbound, rx))
            } else {
                s.reconnecting = false;
                if s.lifecycle == ConnectionState::Connecting {
                    s.lifecycle = ConnectionState::Disconnected;
                }
                let dropped = s.queue.clear();
                debug!(dropped, "stopped while not connected");
                None
            }
        };

        let Some((generation, outbound, ack)) = pending else {
            return Ok(());
        };

        info!("closing connection");
        if outbound.send(LinkCommand::Close).is_err() {
            debug!("connection task already gone");
        }

        let timeout = self.inner.config.close_timeout;
        match tokio::time::timeout(timeout, ack).await {
            Ok(Ok(clean)) => {
                let mut s = self.inner.shared.lock();
                if clean && !s.reconnecting {
                    s.attempts = 0;
                    let _ = s.queue.clear();
                }
                Ok(())
            }
            Ok(Err(_)) => Ok(()),
            Err(_) => {
                let timeout_ms = delay_millis(timeout);
                warn!(timeout_ms, "close not acknowledged, abandoning connection");
                self.inner.abandon(generation);
                Err(ClientError::CloseTimeout { timeout_ms })
            }
        }
    }

    /// Register `handler` on `topic`.
    pub fn subscribe(&self, topic: &str, handler: Handler<ClientEvent>) {
        self.inner.dispatcher.lock().subscribe(topic, handler);
    }

    /// Register a closure on `topic`, returning the handle needed to
    /// unsubscribe it.
    pub fn on<F>(&self, topic: &str, callback: F) -> Handler<ClientEvent>
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        let handler = Handler::new(callback);
        self.subscribe(topic, handler.clone());
        handler
    }

    /// Remove one registration of `handler` from `topic`.
    pub fn unsubscribe(&self, topic: &str, handler: &Handler<ClientEvent>) -> bool {
        self.inner.dispatcher.lock().unsubscribe(topic, handler)
    }

    /// Remove every handler.
    pub fn clear_subscriptions(&self) {
        self.inner.dispatcher.lock().clear();
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.inner.shared.lock().lifecycle
    }

    /// Whether the connection is open.
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Whether a reconnection loop is running.
    pub fn is_reconnecting(&self) -> bool {
        self.inner.shared.lock().reconnecting
    }

    /// Failed attempts in the current (or last) reconnection loop.
    pub fn reconnection_attempts(&self) -> u32 {
        self.inner.shared.lock().attempts
    }

    /// Messages waiting to be sent.
    pub fn queue_len(&self) -> usize {
        self.inner.shared.lock().queue.len()
    }

    /// The configuration this manager was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.inner.shared.lock();
        f.debug_struct("ConnectionManager")
            .field("url", &self.inner.config.url)
            .field("state", &s.lifecycle)
            .field("reconnecting", &s.reconnecting)
            .field("queued", &s.queue.len())
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Connection lifecycle
// ─────────────────────────────────────────────────────────────────────────────

impl Inner {
    async fn connect_initial(self: Arc<Self>, epoch: u64) {
        match self.connector.connect(&self.endpoint).await {
            Ok(link) => {
                let _ = self.adopt(link, epoch);
            }
            Err(e) => {
                let retryable = e.is_retryable();
                warn!(error = %e, kind = e.error_kind(), retryable, "connection attempt failed");
                {
                    let mut s = self.shared.lock();
                    if s.is_stale(epoch) {
                        debug!("connection attempt outlived its start");
                        return;
                    }
                    s.lifecycle = ConnectionState::Disconnected;
                }
                self.fire(topics::CLOSE, &ClientEvent::Close { clean: false });
                if retryable {
                    self.retry_after_close(epoch).await;
                } else {
                    warn!(kind = e.error_kind(), "connection cannot succeed, not retrying");
                }
            }
        }
    }

    /// Make `link` the current connection. Returns `false` if the manager was
    /// stopped or restarted since `epoch`, in which case the link is closed
    /// instead and state is left alone.
    fn adopt(self: &Arc<Self>, link: Link, epoch: u64) -> bool {
        let Link { outbound, inbound } = link;

        let (generation, previous) = {
            let mut s = self.shared.lock();
            if s.is_stale(epoch) {
                let _ = outbound.send(LinkCommand::Close);
                debug!("stopped while connecting, closing new connection");
                return false;
            }
            s.generation += 1;
            let generation = s.generation;
            let previous = s.link.replace(ActiveLink {
                generation,
                outbound,
            });
            s.lifecycle = ConnectionState::Open;
            s.attempts = 0;
            s.reconnecting = false;
            (generation, previous)
        };

        if let Some(previous) = previous {
            debug!(generation = previous.generation, "closing previous connection");
            let _ = previous.outbound.send(LinkCommand::Close);
        }

        info!(generation, "connection open");
        self.fire(topics::OPEN, &ClientEvent::Open);

        drop(
            self.runtime
                .spawn(Arc::clone(self).read_loop(generation, inbound)),
        );

        let inner = Arc::clone(self);
        let settle = self.config.open_settle_delay;
        drop(self.runtime.spawn(async move {
            sleep(settle).await;
            inner.pump().await;
        }));
        true
    }

    async fn read_loop(
        self: Arc<Self>,
        generation: u64,
        mut inbound: mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        let clean = loop {
            let Some(event) = inbound.recv().await else {
                break false;
            };
            if !self.shared.lock().is_current(generation) {
                debug!(generation, "ignoring event from superseded connection");
                return;
            }
            match event {
                TransportEvent::Message(text) => self.handle_frame(&text),
                TransportEvent::Error(message) => {
                    warn!(error = %message, "transport error");
                    self.fire(topics::ERROR, &ClientEvent::Error(message));
                }
                TransportEvent::Closed { clean } => break clean,
            }
        };
        self.handle_close(generation, clean).await;
    }

    fn handle_frame(&self, text: &str) {
        trace_frame!(self.config.debug, bytes = text.len(), "frame received");
        match InboundEnvelope::decode(text) {
            Ok(envelope) => {
                if let Some(identifier) = envelope.identifier.clone() {
                    let topic = topics::message_topic(&identifier);
                    self.fire_exact(&topic, &ClientEvent::Message(envelope));
                }
                self.fire(topics::MESSAGE, &ClientEvent::Raw(text.to_owned()));
            }
            Err(e) => warn!(error = %e, "dropping malformed frame"),
        }
    }

    async fn handle_close(self: Arc<Self>, generation: u64, clean: bool) {
        let (waiter, retry) = {
            let mut s = self.shared.lock();
            if !s.is_current(generation) {
                return;
            }
            s.link = None;
            s.lifecycle = ConnectionState::Disconnected;
            if clean && !s.reconnecting {
                let dropped = s.queue.clear();
                if dropped > 0 {
                    debug!(dropped, "clean close, discarded queued messages");
                }
            }
            (s.close_waiter.take(), (!s.stopped).then_some(s.epoch))
        };

        info!(generation, clean, "connection closed");
        self.fire(topics::CLOSE, &ClientEvent::Close { clean });
        if let Some(waiter) = waiter {
            let _ = waiter.send(clean);
        }
        if let Some(epoch) = retry {
            self.retry_after_close(epoch).await;
        }
    }

    /// Drop the current connection without waiting for the transport.
    fn abandon(&self, generation: u64) {
        let dropped = {
            let mut s = self.shared.lock();
            if s.is_current(generation) {
                s.link = None;
                s.lifecycle = ConnectionState::Disconnected;
                s.close_waiter = None;
                true
            } else {
                false
            }
        };
        if dropped {
            self.fire(topics::CLOSE, &ClientEvent::Close { clean: false });
        }
    }

    async fn retry_after_close(self: Arc<Self>, epoch: u64) {
        let delay = self.config.close_retry_delay;
        debug!(delay_ms = delay_millis(delay), "scheduling reconnection");
        sleep(delay).await;
        self.reconnect(epoch).await;
    }

    // ── Reconnection ────────────────────────────────────────────────

    async fn reconnect(self: Arc<Self>, epoch: u64) {
        if !self.begin_reconnect(epoch) {
            return;
        }
        info!(url = %self.config.url, "reconnecting");

        while let Some(attempt) = self.next_attempt(epoch) {
            match self.connector.connect(&self.endpoint).await {
                Ok(link) => {
                    if self.adopt(link, epoch) {
                        info!(attempt, "reconnected");
                    }
                    return;
                }
                Err(e) => {
                    if !self.record_failure(epoch) {
                        return;
                    }
                    let delay = self.config.reconnection_interval;
                    let retryable = e.is_retryable();
                    warn!(
                        attempt,
                        delay_ms = delay_millis(delay),
                        error = %e,
                        kind = e.error_kind(),
                        retryable,
                        "reconnection attempt failed"
                    );
                    if !retryable {
                        break;
                    }
                    sleep(delay).await;
                }
            }
        }

        self.finish_reconnect(epoch);
    }

    fn begin_reconnect(&self, epoch: u64) -> bool {
        let mut s = self.shared.lock();
        if s.is_stale(epoch)
            || s.reconnecting
            || s.stopped
            || s.lifecycle != ConnectionState::Disconnected
        {
            debug!(
                state = %s.lifecycle,
                reconnecting = s.reconnecting,
                "reconnection not needed"
            );
            return false;
        }
        s.reconnecting = true;
        s.attempts = 0;
        s.lifecycle = ConnectionState::Connecting;
        true
    }

    /// The 1-based number of the next attempt, or `None` when the loop must end.
    fn next_attempt(&self, epoch: u64) -> Option<u32> {
        let s = self.shared.lock();
        (!s.is_stale(epoch) && s.should_reconnect(&self.config)).then_some(s.attempts + 1)
    }

    /// Count a failed attempt. Returns `false` if the loop was superseded.
    fn record_failure(&self, epoch: u64) -> bool {
        let mut s = self.shared.lock();
        if s.is_stale(epoch) {
            return false;
        }
        s.attempts += 1;
        true
    }

    fn finish_reconnect(&self, epoch: u64) {
        let attempts = {
            let mut s = self.shared.lock();
            if s.is_stale(epoch) {
                debug!("reconnection loop superseded");
                return;
            }
            s.reconnecting = false;
            if s.lifecycle == ConnectionState::Connecting {
                s.lifecycle = ConnectionState::Disconnected;
            }
            s.attempts
        };
        warn!(attempts, "giving up reconnecting");
    }

    // ── Outbound pump ───────────────────────────────────────────────

    async fn pump(self: Arc<Self>) {
        if !self.claim_pump() {
            return;
        }
        while let Some((message, outbound)) = self.next_outbound() {
            self.transmit(&message, &outbound);
            let _ = self.shared.lock().queue.pop_if(&message.token);
            sleep(self.config.sending_interval).await;
        }
    }

    fn claim_pump(&self) -> bool {
        let mut s = self.shared.lock();
        if s.pumping {
            return false;
        }
        s.pumping = true;
        true
    }

    /// Head of the queue and the link to send it on, or `None` (releasing the
    /// pump) when the queue is empty or the connection is not open.
    fn next_outbound(&self) -> Option<(OutboundEnvelope, mpsc::UnboundedSender<LinkCommand>)> {
        let mut s = self.shared.lock();
        let next = match (&s.link, s.queue.front()) {
            (Some(link), Some(head)) if s.lifecycle == ConnectionState::Open => {
                Some((head.clone(), link.outbound.clone()))
            }
            _ => None,
        };
        if next.is_none() {
            s.pumping = false;
        }
        next
    }

    fn transmit(&self, message: &OutboundEnvelope, outbound: &mpsc::UnboundedSender<LinkCommand>) {
        let text = match message.to_json() {
            Ok(text) => text,
            Err(e) => {
                warn!(token = %message.token, error = %e, "failed to encode message, dropped");
                return;
            }
        };
        if outbound.send(LinkCommand::Text(text)).is_err() {
            warn!(token = %message.token, command = %message.command, "transmission failed, message dropped");
        } else {
            trace_frame!(self.config.debug, token = %message.token, command = %message.command, "message sent");
        }
    }

    // ── Dispatch ────────────────────────────────────────────────────

    fn fire(&self, topic: &str, event: &ClientEvent) {
        let handlers = self.dispatcher.lock().collect([topic], false);
        let _ = invoke_all(topic, &handlers, event);
    }

    fn fire_exact(&self, topic: &str, event: &ClientEvent) {
        let handlers = self.dispatcher.lock().collect([topic], true);
        let _ = invoke_all(topic, &handlers, event);
    }
}

fn delay_millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
