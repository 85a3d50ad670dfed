//! Physical connection seam.
//!
//! A [`Connector`] dials the server and hands back a [`Link`]: a command
//! channel into the connection and an event channel out of it. The manager
//! only ever talks to links, so tests can substitute an in-memory connector.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::error::UrlError;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;
use url::Url;

use crate::errors::{ClientError, Result};

/// Instruction for the connection task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkCommand {
    /// Send a text frame.
    Text(String),
    /// Start the closing handshake.
    Close,
}

/// Something that happened on the connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text frame arrived.
    Message(String),
    /// A non-fatal transport error.
    Error(String),
    /// The connection is gone. Always the last event of a link.
    Closed {
        /// Whether a close frame was received from the peer.
        clean: bool,
    },
}

/// Manager side of an established connection.
///
/// Dropping the link starts a graceful close.
#[derive(Debug)]
pub struct Link {
    /// Commands into the connection task.
    pub outbound: mpsc::UnboundedSender<LinkCommand>,
    /// Events out of the connection task.
    pub inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Connection-task side of a [`Link`].
#[derive(Debug)]
pub struct LinkPeer {
    /// Commands sent by the manager.
    pub commands: mpsc::UnboundedReceiver<LinkCommand>,
    /// Events for the manager.
    pub events: mpsc::UnboundedSender<TransportEvent>,
}

impl Link {
    /// Create a connected link/peer pair.
    pub fn pair() -> (Link, LinkPeer) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (
            Link {
                outbound: command_tx,
                inbound: event_rx,
            },
            LinkPeer {
                commands: command_rx,
                events: event_tx,
            },
        )
    }
}

/// Dials the timing server.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open one connection to `url`.
    async fn connect(&self, url: &Url) -> Result<Link>;
}

/// Classify a failed dial. URL problems other than an unreachable host will
/// fail the same way on every attempt.
fn connect_error(e: WsError) -> ClientError {
    match e {
        WsError::Url(UrlError::UnableToConnect(_)) => ClientError::Transport(e.to_string()),
        WsError::Url(url) => ClientError::Unreachable(url.to_string()),
        other => ClientError::Transport(other.to_string()),
    }
}

/// [`Connector`] backed by `tokio-tungstenite`.
#[derive(Clone, Copy, Debug, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &Url) -> Result<Link> {
        let (ws, response) = connect_async(url.as_str())
            .await
            .map_err(connect_error)?;
        debug!(status = %response.status(), "websocket handshake complete");

        let (link, peer) = Link::pair();
        drop(tokio::spawn(link_loop(ws, peer)));
        Ok(link)
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Shuttle frames between the socket and the link until the socket ends.
async fn link_loop(ws: WsStream, mut peer: LinkPeer) {
    let (mut sink, mut stream) = ws.split();
    let mut commands_open = true;
    let mut close_sent = false;
    let mut close_received = false;

    loop {
        tokio::select! {
            cmd = peer.commands.recv(), if commands_open => {
                match cmd {
                    Some(LinkCommand::Text(text)) => {
                        if let Err(e) = sink.send(Message::Text(text.into())).await {
                            let _ = peer.events.send(TransportEvent::Error(e.to_string()));
                        }
                    }
                    Some(LinkCommand::Close) | None => {
                        commands_open = false;
                        if !close_sent {
                            close_sent = true;
                            let frame = CloseFrame {
                                code: CloseCode::Normal,
                                reason: String::new().into(),
                            };
                            if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                                debug!(error = %e, "failed to send close frame");
                                break;
                            }
                        }
                    }
                }
            }
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        let _ = peer.events.send(TransportEvent::Message(text.as_str().to_owned()));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "close frame received");
                        close_received = true;
                    }
                    // Pings are answered by tungstenite; binary frames are not part of the protocol.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        let _ = peer.events.send(TransportEvent::Error(e.to_string()));
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    let _ = peer.events.send(TransportEvent::Closed {
        clean: close_received,
    });
}
