//! Derived standings table.

use std::cmp::Reverse;

use pitwall_settings::Ranking;

use crate::payload::TransponderId;
use crate::race::{Driver, RaceClock, RaceState};

/// How a last-lap time is highlighted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LapHighlight {
    /// Equals the best lap of the session.
    OverallBest,
    /// Improved the driver's own best.
    PersonalBest,
    /// Anything else.
    Normal,
}

/// The latest completed lap of a driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LastLap {
    /// Lap number.
    pub number: u32,
    /// Lap time (ms).
    pub time: u64,
    /// Highlight class.
    pub highlight: LapHighlight,
}

/// One row of the standings table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StandingRow {
    /// 1-based position.
    pub position: usize,
    /// Driver key.
    pub transponder: TransponderId,
    /// Kart number.
    pub kart: String,
    /// Display name.
    pub name: String,
    /// Completed laps.
    pub laps: usize,
    /// Personal best (ms).
    pub best_time: Option<u64>,
    /// Whether the personal best is the session best.
    pub best_is_overall: bool,
    /// Latest completed lap.
    pub last_lap: Option<LastLap>,
    /// Difference to the leader's best time (ms). `None` for the leader and
    /// for drivers without laps.
    pub gap: Option<u64>,
}

/// Everything rendered on screen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Board {
    /// Race clock.
    pub clock: RaceClock,
    /// Whether the feed connection is open.
    pub connected: bool,
    /// Whether the stub screen covers the table.
    pub stub_visible: bool,
    /// Session best (ms).
    pub best_overall: Option<u64>,
    /// Standings in position order.
    pub rows: Vec<StandingRow>,
}

impl Board {
    /// Snapshot `state` ordered by `ranking`.
    pub fn from_state(state: &RaceState, ranking: Ranking) -> Self {
        Self {
            clock: state.clock(),
            connected: state.is_connected(),
            stub_visible: state.stub_visible(),
            best_overall: state.best_overall(),
            rows: standings(state, ranking),
        }
    }
}

/// Rank the drivers of `state`.
///
/// [`Ranking::BestLap`] orders by personal best, drivers without one last.
/// [`Ranking::TotalTime`] orders by completed laps (most first), then by
/// cumulative lap time. Ties keep transponder order.
pub fn standings(state: &RaceState, ranking: Ranking) -> Vec<StandingRow> {
    let mut drivers: Vec<(&TransponderId, &Driver)> = state.drivers().collect();
    match ranking {
        Ranking::BestLap => drivers.sort_by_key(|(_, d)| (d.best_time.is_none(), d.best_time)),
        Ranking::TotalTime => drivers.sort_by_key(|(_, d)| (Reverse(d.lap_count()), d.total_time())),
    }

    let best_overall = state.best_overall();
    let leader_best = drivers.first().and_then(|(_, d)| d.best_time);

    drivers
        .into_iter()
        .enumerate()
        .map(|(index, (id, driver))| {
            let has_laps = driver.lap_count() > 0;
            let gap = match (driver.best_time, leader_best) {
                (Some(best), Some(leader)) if index > 0 && has_laps => {
                    Some(best.saturating_sub(leader))
                }
                _ => None,
            };
            StandingRow {
                position: index + 1,
                transponder: id.clone(),
                kart: driver.kart.clone(),
                name: driver.name.clone(),
                laps: driver.lap_count(),
                best_time: driver.best_time,
                best_is_overall: driver.best_time.is_some() && driver.best_time == best_overall,
                last_lap: last_lap(driver, best_overall),
                gap,
            }
        })
        .collect()
}

fn last_lap(driver: &Driver, best_overall: Option<u64>) -> Option<LastLap> {
    let (number, time) = driver.last_lap()?;
    let highlight = if Some(time) == best_overall {
        LapHighlight::OverallBest
    } else if driver.improved == Some(true) {
        LapHighlight::PersonalBest
    } else {
        LapHighlight::Normal
    };
    Some(LastLap {
        number,
        time,
        highlight,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
