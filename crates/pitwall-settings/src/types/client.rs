//! Connection settings.

use serde::{Deserialize, Serialize};

/// Settings for the live-timing WebSocket connection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// Timing server URL (`ws://` or `wss://`). Required before connecting.
    pub url: String,
    /// Page token appended to the URL as `?token=`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
    /// Log every frame at `info` instead of `debug`.
    pub debug: bool,
    /// Retry forever instead of giving up after `max_reconnection_attempts`.
    pub keep_alive: bool,
    /// Attempt cap per reconnection loop when `keep_alive` is off.
    pub max_reconnection_attempts: u32,
    /// Wait between failed reconnection attempts.
    pub reconnection_interval_ms: u64,
    /// Minimum spacing between outbound frames.
    pub sending_interval_ms: u64,
    /// Wait between a close and the first reconnection attempt.
    pub close_retry_delay_ms: u64,
    /// Wait between open and the first queued frame.
    pub open_settle_delay_ms: u64,
    /// How long `stop()` waits for the close acknowledgment.
    pub close_timeout_ms: u64,
    /// Outbound queue capacity; the oldest message is dropped on overflow.
    pub max_queue_len: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            page_token: None,
            debug: false,
            keep_alive: true,
            max_reconnection_attempts: 5,
            reconnection_interval_ms: 5_000,
            sending_interval_ms: 100,
            close_retry_delay_ms: 5_000,
            open_settle_delay_ms: 100,
            close_timeout_ms: 5_000,
            max_queue_len: 1_024,
        }
    }
}
