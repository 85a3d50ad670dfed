//! Connection configuration.

use std::time::Duration;

use pitwall_settings::ClientSettings;
use url::Url;

use crate::errors::{ClientError, Result};

/// Immutable configuration of a [`ConnectionManager`](crate::ConnectionManager).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Server URL without the page token.
    pub url: String,
    /// Page token sent as the `token` query parameter.
    pub page_token: Option<String>,
    /// Log every frame at `info` instead of `debug`.
    pub debug: bool,
    /// Ignore `max_reconnection_attempts` and retry until connected.
    pub keep_alive: bool,
    /// Attempt cap per reconnection loop when `keep_alive` is off.
    pub max_reconnection_attempts: u32,
    /// Wait after each failed reconnection attempt.
    pub reconnection_interval: Duration,
    /// Minimum spacing between outbound frames.
    pub sending_interval: Duration,
    /// Wait between a close and the reconnection loop.
    pub close_retry_delay: Duration,
    /// Wait between open and draining the queue.
    pub open_settle_delay: Duration,
    /// How long `stop()` waits for the close acknowledgment.
    pub close_timeout: Duration,
    /// Outbound queue capacity.
    pub max_queue_len: usize,
}

impl ClientConfig {
    /// Defaults for everything but the URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self::from_settings(&ClientSettings {
            url: url.into(),
            ..ClientSettings::default()
        })
    }

    /// Build from loaded settings.
    pub fn from_settings(settings: &ClientSettings) -> Self {
        Self {
            url: settings.url.clone(),
            page_token: settings.page_token.clone(),
            debug: settings.debug,
            keep_alive: settings.keep_alive,
            max_reconnection_attempts: settings.max_reconnection_attempts,
            reconnection_interval: Duration::from_millis(settings.reconnection_interval_ms),
            sending_interval: Duration::from_millis(settings.sending_interval_ms),
            close_retry_delay: Duration::from_millis(settings.close_retry_delay_ms),
            open_settle_delay: Duration::from_millis(settings.open_settle_delay_ms),
            close_timeout: Duration::from_millis(settings.close_timeout_ms),
            max_queue_len: settings.max_queue_len.max(1),
        }
    }

    /// Set the page token.
    #[must_use]
    pub fn with_page_token(mut self, token: impl Into<String>) -> Self {
        self.page_token = Some(token.into());
        self
    }

    /// Set keep-alive.
    #[must_use]
    pub fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Set the attempt cap.
    #[must_use]
    pub fn with_max_reconnection_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnection_attempts = attempts;
        self
    }

    /// Set the debug flag.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// The URL actually dialed: `url` plus `?token=<page_token>` when a token
    /// is set. Only `ws` and `wss` are accepted.
    pub fn endpoint(&self) -> Result<Url> {
        let mut url = Url::parse(&self.url)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ClientError::UnsupportedScheme {
                scheme: url.scheme().to_owned(),
            });
        }
        if let Some(token) = &self.page_token {
            let _ = url.query_pairs_mut().append_pair("token", token);
        }
        Ok(url)
    }
}
