//! # pitwall-scoreboard
//!
//! Live kart-timing scoreboard on top of [`pitwall_client`].
//!
//! - [`payload`]: typed `message.<identifier>` payloads ([`FeedEvent`])
//! - [`race`]: the race state and how each feed event changes it
//! - [`standings`]: ranking and per-row highlights derived from the state
//! - [`format`]: lap time, clock and board rendering
//! - [`app`]: the bridge from client topics to the single-owner scoreboard loop

#![deny(unsafe_code)]

pub mod app;
pub mod errors;
pub mod format;
pub mod payload;
pub mod race;
pub mod standings;

pub use app::{FeedBridge, Scoreboard};
pub use errors::{Result, ScoreboardError};
pub use payload::{FeedEvent, TransponderId};
pub use race::{Driver, RaceClock, RaceInput, RaceState};
pub use standings::{Board, LapHighlight, LastLap, StandingRow, standings};
