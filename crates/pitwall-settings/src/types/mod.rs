//! Settings type definitions.
//!
//! All types use camelCase keys and `#[serde(default)]`, so a partial JSON
//! file only needs the values it changes.

mod client;
mod scoreboard;

pub use client::*;
pub use scoreboard::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings.
///
/// ```json
/// {
///   "client": { "url": "wss://timing.example/ws", "keepAlive": false },
///   "scoreboard": { "ranking": "totalTime" },
///   "logging": { "level": "debug" }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PitwallSettings {
    /// Connection settings.
    pub client: ClientSettings,
    /// Standings presentation.
    pub scoreboard: ScoreboardSettings,
    /// Log filter and format.
    pub logging: LoggingSettings,
}

/// Longest accepted wait between a finish and the stub screen.
pub const MAX_STUB_AFTER_FINISH_MS: u64 = 24 * 60 * 60 * 1000;

impl PitwallSettings {
    /// Reject values the client cannot run with.
    ///
    /// An empty URL is allowed here since it may still come from the command
    /// line.
    pub fn validate(&self) -> Result<()> {
        if self.client.max_queue_len == 0 {
            return Err(SettingsError::InvalidValue(
                "client.maxQueueLen must be at least 1".into(),
            ));
        }
        if !self.client.keep_alive && self.client.max_reconnection_attempts == 0 {
            return Err(SettingsError::InvalidValue(
                "client.maxReconnectionAttempts must be at least 1 when keepAlive is off".into(),
            ));
        }
        if self.scoreboard.stub_after_finish_ms > MAX_STUB_AFTER_FINISH_MS {
            return Err(SettingsError::InvalidValue(format!(
                "scoreboard.stubAfterFinishMs must be at most {MAX_STUB_AFTER_FINISH_MS}, got {}",
                self.scoreboard.stub_after_finish_ms
            )));
        }
        if self.logging.level.trim().is_empty() {
            return Err(SettingsError::InvalidValue("logging.level is empty".into()));
        }
        if !matches!(self.logging.format.as_str(), "compact" | "json") {
            return Err(SettingsError::InvalidValue(format!(
                "logging.format must be \"compact\" or \"json\", got {:?}",
                self.logging.format
            )));
        }
        Ok(())
    }
}
