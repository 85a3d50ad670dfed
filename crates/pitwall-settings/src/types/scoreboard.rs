//! Scoreboard and logging settings.

use serde::{Deserialize, Serialize};

/// How drivers are ordered on the standings table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Ranking {
    /// Fastest single lap first (qualifying).
    #[default]
    BestLap,
    /// Lowest cumulative lap time first (race).
    TotalTime,
}

/// Scoreboard presentation settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoreboardSettings {
    /// Standings order.
    pub ranking: Ranking,
    /// Delay between `finish` and the stub screen.
    pub stub_after_finish_ms: u64,
    /// Command sent once after startup to request a full snapshot.
    pub initial_command: String,
}

impl Default for ScoreboardSettings {
    fn default() -> Self {
        Self {
            ranking: Ranking::BestLap,
            stub_after_finish_ms: 300_000,
            initial_command: "getStatus".to_string(),
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    /// `compact` or `json`.
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}
