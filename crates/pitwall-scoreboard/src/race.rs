//! Race state owned by the scoreboard loop.
//!
//! [`RaceState`] is mutated only through [`RaceState::apply`] and
//! [`RaceState::tick`], both of which take the current time explicitly so the
//! stub schedule can be driven from tests without a clock.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::errors::{Result, ScoreboardError};
use crate::payload::{
    AddDriverPayload, EndLapPayload, FeedEvent, Laps, ModifyDriverPayload, RacerSnapshot,
    StatusPayload, TransponderId,
};

/// Race clock, in seconds. `None` until the server reports it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RaceClock {
    /// Time since the session started.
    pub elapsed: Option<u64>,
    /// Time until the session ends.
    pub left: Option<u64>,
}

/// One registered driver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Driver {
    /// Kart number.
    pub kart: String,
    /// Display name.
    pub name: String,
    /// Completed laps.
    pub laps: Laps,
    /// Lap number of the personal best.
    pub best_lap: Option<u32>,
    /// Personal best lap time (ms).
    pub best_time: Option<u64>,
    /// Whether the latest lap improved the personal best.
    pub improved: Option<bool>,
}

impl Driver {
    fn new(kart: String, name: &str) -> Self {
        let name = display_name(&kart, name);
        Self {
            kart,
            name,
            laps: Laps::new(),
            best_lap: None,
            best_time: None,
            improved: None,
        }
    }

    fn from_snapshot(racer: RacerSnapshot) -> Self {
        Self {
            name: display_name(&racer.kart, &racer.name),
            kart: racer.kart,
            laps: racer.laps,
            best_lap: racer.best_lap,
            best_time: racer.best_time,
            improved: racer.improved,
        }
    }

    /// Number of completed laps.
    pub fn lap_count(&self) -> usize {
        self.laps.len()
    }

    /// The highest-numbered completed lap as `(number, time)`.
    pub fn last_lap(&self) -> Option<(u32, u64)> {
        self.laps.last_key_value().map(|(n, t)| (*n, *t))
    }

    /// Sum of all completed lap times (ms).
    pub fn total_time(&self) -> u64 {
        self.laps.values().sum()
    }
}

/// Unnamed karts are listed by number.
fn display_name(kart: &str, name: &str) -> String {
    if name.is_empty() {
        format!("Kart #{kart}")
    } else {
        name.to_owned()
    }
}

/// Input to the race state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RaceInput {
    /// The feed connection opened.
    Connected,
    /// The feed connection closed.
    Disconnected,
    /// A decoded feed event.
    Feed(FeedEvent),
}

/// Everything the scoreboard shows.
#[derive(Clone, Debug)]
pub struct RaceState {
    clock: RaceClock,
    active: bool,
    connected: bool,
    stub_visible: bool,
    drivers: BTreeMap<TransponderId, Driver>,
    best_overall: Option<u64>,
    stub_delay: Duration,
    stub_due: Option<Instant>,
}

impl RaceState {
    /// Empty state with the stub screen up. `stub_delay` is the wait between
    /// `finish` and the stub screen.
    pub fn new(stub_delay: Duration) -> Self {
        Self {
            clock: RaceClock::default(),
            active: false,
            connected: false,
            stub_visible: true,
            drivers: BTreeMap::new(),
            best_overall: None,
            stub_delay,
            stub_due: None,
        }
    }

    /// Apply one input at time `now`.
    ///
    /// On error the state is left unchanged.
    pub fn apply(&mut self, input: RaceInput, now: Instant) -> Result<()> {
        match input {
            RaceInput::Connected => self.connected = true,
            RaceInput::Disconnected => {
                self.connected = false;
                self.stub_visible = true;
            }
            RaceInput::Feed(event) => self.apply_feed(event, now)?,
        }
        Ok(())
    }

    fn apply_feed(&mut self, event: FeedEvent, now: Instant) -> Result<()> {
        match event {
            FeedEvent::Status(status) => self.apply_status(status),
            FeedEvent::Timing(timing) => {
                self.clock = RaceClock {
                    elapsed: timing.elapsed,
                    left: timing.left,
                };
            }
            FeedEvent::Clear => {
                self.drivers.clear();
                self.best_overall = None;
            }
            FeedEvent::EndLap(lap) => self.apply_end_lap(lap)?,
            FeedEvent::AddDriver(add) => self.apply_add_driver(add),
            FeedEvent::ModifyDriver(modify) => self.apply_modify_driver(modify)?,
            FeedEvent::Finish => {
                let delay_ms = delay_millis(self.stub_delay);
                if let Some(due) = now.checked_add(self.stub_delay) {
                    debug!(delay_ms, "session finished, stub scheduled");
                    self.stub_due = Some(due);
                } else {
                    warn!(delay_ms, "stub delay out of range, stub not scheduled");
                    self.stub_due = None;
                }
            }
            FeedEvent::Start => {
                self.stub_due = None;
                self.stub_visible = false;
            }
        }
        Ok(())
    }

    fn apply_status(&mut self, status: StatusPayload) {
        self.clock = RaceClock {
            elapsed: status.elapsed_time,
            left: status.time_left,
        };
        self.active = status.active;
        self.drivers = status
            .racers
            .into_iter()
            .map(|(id, racer)| (id, Driver::from_snapshot(racer)))
            .collect();
        self.best_overall = status.best_lap_time;
        if status.active {
            self.stub_visible = false;
        }
    }

    fn apply_end_lap(&mut self, lap: EndLapPayload) -> Result<()> {
        let driver = self
            .drivers
            .get_mut(&lap.transponder_id)
            .ok_or_else(|| ScoreboardError::UnknownDriver(lap.transponder_id.clone()))?;

        let _ = driver.laps.insert(lap.lap_number, lap.time);
        driver.improved = Some(lap.is_improved);
        if lap.is_improved || driver.best_lap.is_none() {
            driver.best_time = Some(lap.time);
            driver.best_lap = Some(lap.lap_number);
        }

        if self.best_overall.is_none_or(|best| lap.time < best) {
            self.best_overall = Some(lap.time);
        }
        Ok(())
    }

    fn apply_add_driver(&mut self, add: AddDriverPayload) {
        let driver = Driver::new(add.id, &add.name);
        if self.drivers.insert(add.transponder_id.clone(), driver).is_some() {
            debug!(transponder = %add.transponder_id, "driver re-registered");
        }
    }

    fn apply_modify_driver(&mut self, modify: ModifyDriverPayload) -> Result<()> {
        let driver = self
            .drivers
            .get_mut(&modify.transponder_id)
            .ok_or(ScoreboardError::UnknownDriver(modify.transponder_id))?;
        driver.name = display_name(&driver.kart, &modify.name);
        Ok(())
    }

    /// Raise the stub screen if its scheduled time has passed.
    ///
    /// Returns whether anything changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.stub_due {
            Some(due) if due <= now => {
                self.stub_due = None;
                let changed = !self.stub_visible;
                self.stub_visible = true;
                changed
            }
            _ => false,
        }
    }

    /// When the pending stub screen is due, if one is scheduled.
    pub fn stub_due(&self) -> Option<Instant> {
        self.stub_due
    }

    /// Race clock.
    pub fn clock(&self) -> RaceClock {
        self.clock
    }

    /// Whether a session is running.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether the feed connection is open.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Whether the stub screen covers the standings.
    pub fn stub_visible(&self) -> bool {
        self.stub_visible
    }

    /// Best lap of the session (ms).
    pub fn best_overall(&self) -> Option<u64> {
        self.best_overall
    }

    /// Registered drivers in transponder order.
    pub fn drivers(&self) -> impl Iterator<Item = (&TransponderId, &Driver)> {
        self.drivers.iter()
    }

    /// Look up one driver.
    pub fn driver(&self, id: &TransponderId) -> Option<&Driver> {
        self.drivers.get(id)
    }
}

fn delay_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const STUB_DELAY: Duration = Duration::from_secs(300);

    fn feed(state: &mut RaceState, event: FeedEvent) -> Result<()> {
        state.apply(RaceInput::Feed(event), Instant::now())
    }

    fn add(state: &mut RaceState, transponder: &str, kart: &str, name: &str) {
        feed(
            state,
            FeedEvent::AddDriver(AddDriverPayload {
                transponder_id: transponder.into(),
                id: kart.into(),
                name: name.into(),
            }),
        )
        .unwrap();
    }

    fn lap(transponder: &str, number: u32, time: u64, improved: bool) -> FeedEvent {
        FeedEvent::EndLap(EndLapPayload {
            transponder_id: transponder.into(),
            lap_number: number,
            time,
            is_improved: improved,
        })
    }

    fn driver<'a>(state: &'a RaceState, transponder: &str) -> &'a Driver {
        state.driver(&TransponderId::from(transponder)).unwrap()
    }

    // ── drivers ──

    #[test]
    fn add_driver_with_empty_name_uses_kart_number() {
        let mut state = RaceState::new(STUB_DELAY);
        add(&mut state, "100", "7", "");
        add(&mut state, "200", "8", "Robin");

        assert_eq!(driver(&state, "100").name, "Kart #7");
        assert_eq!(driver(&state, "200").name, "Robin");
        assert_eq!(driver(&state, "200").lap_count(), 0);
        assert_eq!(driver(&state, "200").best_time, None);
    }

    #[test]
    fn modify_driver_renames() {
        let mut state = RaceState::new(STUB_DELAY);
        add(&mut state, "100", "7", "");
        feed(
            &mut state,
            FeedEvent::ModifyDriver(ModifyDriverPayload {
                transponder_id: "100".into(),
                name: "Alex".into(),
            }),
        )
        .unwrap();
        assert_eq!(driver(&state, "100").name, "Alex");
    }

    #[test]
    fn modify_unknown_driver_is_an_error() {
        let mut state = RaceState::new(STUB_DELAY);
        let err = feed(
            &mut state,
            FeedEvent::ModifyDriver(ModifyDriverPayload {
                transponder_id: "404".into(),
                name: "Ghost".into(),
            }),
        )
        .unwrap_err();
        assert_matches!(err, ScoreboardError::UnknownDriver(id) if id.as_str() == "404");
    }

    // ── laps ──

    #[test]
    fn first_lap_sets_personal_and_overall_best() {
        let mut state = RaceState::new(STUB_DELAY);
        add(&mut state, "100", "7", "Alex");
        feed(&mut state, lap("100", 1, 45_000, false)).unwrap();

        let alex = driver(&state, "100");
        assert_eq!(alex.best_time, Some(45_000));
        assert_eq!(alex.best_lap, Some(1));
        assert_eq!(alex.improved, Some(false));
        assert_eq!(state.best_overall(), Some(45_000));
    }

    #[test]
    fn slower_lap_keeps_best() {
        let mut state = RaceState::new(STUB_DELAY);
        add(&mut state, "100", "7", "Alex");
        feed(&mut state, lap("100", 1, 45_000, false)).unwrap();
        feed(&mut state, lap("100", 2, 47_500, false)).unwrap();

        let alex = driver(&state, "100");
        assert_eq!(alex.best_time, Some(45_000));
        assert_eq!(alex.best_lap, Some(1));
        assert_eq!(alex.last_lap(), Some((2, 47_500)));
        assert_eq!(alex.total_time(), 92_500);
        assert_eq!(state.best_overall(), Some(45_000));
    }

    #[test]
    fn improved_lap_replaces_best_and_lowers_overall() {
        let mut state = RaceState::new(STUB_DELAY);
        add(&mut state, "100", "7", "Alex");
        add(&mut state, "200", "8", "Robin");
        feed(&mut state, lap("100", 1, 45_000, false)).unwrap();
        feed(&mut state, lap("200", 1, 46_000, false)).unwrap();
        feed(&mut state, lap("200", 2, 44_100, true)).unwrap();

        let robin = driver(&state, "200");
        assert_eq!(robin.best_time, Some(44_100));
        assert_eq!(robin.best_lap, Some(2));
        assert_eq!(robin.improved, Some(true));
        assert_eq!(state.best_overall(), Some(44_100));
    }

    #[test]
    fn lap_for_unknown_transponder_leaves_state_untouched() {
        let mut state = RaceState::new(STUB_DELAY);
        add(&mut state, "100", "7", "Alex");
        let err = feed(&mut state, lap("999", 1, 40_000, true)).unwrap_err();
        assert_matches!(err, ScoreboardError::UnknownDriver(_));
        assert_eq!(state.best_overall(), None);
        assert_eq!(driver(&state, "100").lap_count(), 0);
    }

    // ── snapshots ──

    #[test]
    fn status_replaces_everything() {
        let mut state = RaceState::new(STUB_DELAY);
        add(&mut state, "100", "7", "Alex");

        let racer = RacerSnapshot {
            kart: "3".into(),
            name: String::new(),
            laps: Laps::from([(1, 50_000)]),
            best_lap: Some(1),
            best_time: Some(50_000),
            improved: None,
        };
        feed(
            &mut state,
            FeedEvent::Status(StatusPayload {
                elapsed_time: Some(30),
                time_left: Some(570),
                active: true,
                racers: BTreeMap::from([(TransponderId::from("300"), racer)]),
                best_lap_time: Some(50_000),
            }),
        )
        .unwrap();

        assert!(state.driver(&"100".into()).is_none());
        assert_eq!(driver(&state, "300").name, "Kart #3");
        assert_eq!(state.clock(), RaceClock { elapsed: Some(30), left: Some(570) });
        assert_eq!(state.best_overall(), Some(50_000));
        assert!(state.is_active());
        assert!(!state.stub_visible());
    }

    #[test]
    fn inactive_status_keeps_stub() {
        let mut state = RaceState::new(STUB_DELAY);
        feed(&mut state, FeedEvent::Status(StatusPayload::default())).unwrap();
        assert!(state.stub_visible());
        assert!(!state.is_active());
    }

    #[test]
    fn clear_drops_drivers_and_best() {
        let mut state = RaceState::new(STUB_DELAY);
        add(&mut state, "100", "7", "Alex");
        feed(&mut state, lap("100", 1, 45_000, false)).unwrap();
        feed(&mut state, FeedEvent::Clear).unwrap();

        assert_eq!(state.drivers().count(), 0);
        assert_eq!(state.best_overall(), None);
    }

    // ── stub screen ──

    #[test]
    fn finish_schedules_stub() {
        let mut state = RaceState::new(STUB_DELAY);
        let t0 = Instant::now();
        state.apply(RaceInput::Feed(FeedEvent::Start), t0).unwrap();
        state.apply(RaceInput::Feed(FeedEvent::Finish), t0).unwrap();

        assert_eq!(state.stub_due(), Some(t0 + STUB_DELAY));
        assert!(!state.tick(t0 + Duration::from_secs(299)));
        assert!(!state.stub_visible());
        assert!(state.tick(t0 + STUB_DELAY));
        assert!(state.stub_visible());
        assert_eq!(state.stub_due(), None);
    }

    #[test]
    fn unrepresentable_stub_delay_leaves_stub_unscheduled() {
        let mut state = RaceState::new(Duration::MAX);
        let t0 = Instant::now();
        state.apply(RaceInput::Feed(FeedEvent::Start), t0).unwrap();
        state.apply(RaceInput::Feed(FeedEvent::Finish), t0).unwrap();

        assert_eq!(state.stub_due(), None);
        assert!(!state.tick(t0 + Duration::from_secs(86_400)));
        assert!(!state.stub_visible());
    }

    #[test]
    fn start_cancels_pending_stub() {
        let mut state = RaceState::new(STUB_DELAY);
        let t0 = Instant::now();
        state.apply(RaceInput::Feed(FeedEvent::Finish), t0).unwrap();
        state.apply(RaceInput::Feed(FeedEvent::Start), t0).unwrap();

        assert_eq!(state.stub_due(), None);
        assert!(!state.tick(t0 + STUB_DELAY));
        assert!(!state.stub_visible());
    }

    #[test]
    fn connection_lifecycle() {
        let mut state = RaceState::new(STUB_DELAY);
        let now = Instant::now();
        state.apply(RaceInput::Connected, now).unwrap();
        state.apply(RaceInput::Feed(FeedEvent::Start), now).unwrap();
        assert!(state.is_connected());
        assert!(!state.stub_visible());

        state.apply(RaceInput::Disconnected, now).unwrap();
        assert!(!state.is_connected());
        assert!(state.stub_visible());
    }
}
