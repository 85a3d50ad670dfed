//! Timing feed payloads.
//!
//! Every `message.<identifier>` event the scoreboard consumes decodes into a
//! [`FeedEvent`]. Payloads are camelCase and tolerant: missing or `null`
//! fields fall back to their defaults, and identifiers may arrive as numbers
//! or strings.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::errors::{Result, ScoreboardError};

// ─────────────────────────────────────────────────────────────────────────────
// Identifiers
// ─────────────────────────────────────────────────────────────────────────────

/// Transponder fitted to a kart; the key of the driver table.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TransponderId(String);

impl TransponderId {
    /// The id as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TransponderId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl fmt::Display for TransponderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TransponderId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        string_or_number(deserializer).map(Self)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdWire {
    Int(i64),
    Text(String),
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    Ok(match Option::<IdWire>::deserialize(deserializer)? {
        Some(IdWire::Int(n)) => n.to_string(),
        Some(IdWire::Text(s)) => s,
        None => String::new(),
    })
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ─────────────────────────────────────────────────────────────────────────────
// Laps
// ─────────────────────────────────────────────────────────────────────────────

/// Completed laps of one driver: lap number → lap time in milliseconds.
pub type Laps = BTreeMap<u32, u64>;

#[derive(Deserialize)]
#[serde(untagged)]
enum LapWire {
    Time(u64),
    Record {
        #[serde(default)]
        number: Option<u32>,
        #[serde(default)]
        time: Option<u64>,
    },
}

impl LapWire {
    fn into_entry(self, fallback_number: Option<u32>) -> Option<(u32, u64)> {
        match self {
            Self::Time(time) => Some((fallback_number?, time)),
            Self::Record { number, time } => Some((number.or(fallback_number)?, time?)),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LapsWire {
    Keyed(BTreeMap<String, Option<LapWire>>),
    Listed(Vec<Option<LapWire>>),
}

/// Laps arrive either keyed by lap number or as a list indexed by it.
/// Entries without a time are unfinished and skipped.
fn deserialize_laps<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Laps, D::Error> {
    let Some(wire) = Option::<LapsWire>::deserialize(deserializer)? else {
        return Ok(Laps::new());
    };
    let laps = match wire {
        LapsWire::Keyed(map) => map
            .into_iter()
            .filter_map(|(key, lap)| lap?.into_entry(key.parse().ok()))
            .collect(),
        LapsWire::Listed(list) => list
            .into_iter()
            .enumerate()
            .filter_map(|(index, lap)| lap?.into_entry(u32::try_from(index).ok()))
            .collect(),
    };
    Ok(laps)
}

// ─────────────────────────────────────────────────────────────────────────────
// Payloads
// ─────────────────────────────────────────────────────────────────────────────

/// One driver as carried in a `status` snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RacerSnapshot {
    /// Kart number shown next to the name.
    #[serde(rename = "cartId", alias = "id", deserialize_with = "string_or_number")]
    pub kart: String,
    /// Driver name.
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    /// Completed laps.
    #[serde(deserialize_with = "deserialize_laps")]
    pub laps: Laps,
    /// Lap number of the personal best.
    pub best_lap: Option<u32>,
    /// Personal best lap time (ms).
    pub best_time: Option<u64>,
    /// Whether the latest lap improved the personal best.
    pub improved: Option<bool>,
}

/// `status`: full snapshot of the session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusPayload {
    /// Seconds since the session started.
    pub elapsed_time: Option<u64>,
    /// Seconds until the session ends.
    pub time_left: Option<u64>,
    /// Whether a session is running.
    #[serde(deserialize_with = "null_as_default")]
    pub active: bool,
    /// Registered drivers by transponder.
    #[serde(deserialize_with = "null_as_default")]
    pub racers: BTreeMap<TransponderId, RacerSnapshot>,
    /// Best lap of the session (ms).
    pub best_lap_time: Option<u64>,
}

/// `timing`: race clock tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TimingPayload {
    /// Seconds since the session started.
    pub elapsed: Option<u64>,
    /// Seconds until the session ends.
    pub left: Option<u64>,
}

/// `endLap`: a driver crossed the line.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndLapPayload {
    /// Transponder of the driver.
    pub transponder_id: TransponderId,
    /// Number of the lap just completed.
    pub lap_number: u32,
    /// Lap time (ms).
    pub time: u64,
    /// Whether this lap is a new personal best.
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_improved: bool,
}

/// `addDriver`: a kart joined the session.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddDriverPayload {
    /// Transponder of the new driver.
    pub transponder_id: TransponderId,
    /// Kart number.
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    /// Driver name; may be empty.
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

/// `modifyDriver`: a driver was renamed.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyDriverPayload {
    /// Transponder of the driver.
    pub transponder_id: TransponderId,
    /// New name; may be empty.
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Feed events
// ─────────────────────────────────────────────────────────────────────────────

/// A decoded timing feed event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeedEvent {
    /// Full snapshot.
    Status(StatusPayload),
    /// Clock tick.
    Timing(TimingPayload),
    /// Driver table wiped.
    Clear,
    /// Lap completed.
    EndLap(EndLapPayload),
    /// Driver registered.
    AddDriver(AddDriverPayload),
    /// Driver renamed.
    ModifyDriver(ModifyDriverPayload),
    /// Session finished.
    Finish,
    /// Session started.
    Start,
}

impl FeedEvent {
    /// Identifiers the scoreboard subscribes to.
    pub const IDENTIFIERS: [&'static str; 8] = [
        "status",
        "timing",
        "clear",
        "endLap",
        "addDriver",
        "modifyDriver",
        "finish",
        "start",
    ];

    /// Decode the payload of `identifier`. Unknown identifiers yield `None`.
    pub fn decode(identifier: &str, data: &Value) -> Result<Option<Self>> {
        let event = match identifier {
            "status" => Self::Status(parse(identifier, data)?),
            "timing" => Self::Timing(parse(identifier, data)?),
            "clear" => Self::Clear,
            "endLap" => Self::EndLap(parse(identifier, data)?),
            "addDriver" => Self::AddDriver(parse(identifier, data)?),
            "modifyDriver" => Self::ModifyDriver(parse(identifier, data)?),
            "finish" => Self::Finish,
            "start" => Self::Start,
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

fn parse<T: DeserializeOwned>(identifier: &str, data: &Value) -> Result<T> {
    // A missing payload reads as an empty object so all-default payloads decode.
    let data = if data.is_null() {
        Value::Object(Map::new())
    } else {
        data.clone()
    };
    serde_json::from_value(data).map_err(|source| ScoreboardError::Payload {
        identifier: identifier.to_owned(),
        source,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn decode(identifier: &str, data: Value) -> FeedEvent {
        FeedEvent::decode(identifier, &data).unwrap().unwrap()
    }

    // ── identifiers ──

    #[test]
    fn transponder_accepts_numbers_and_strings() {
        let a: TransponderId = serde_json::from_value(json!(4471)).unwrap();
        let b: TransponderId = serde_json::from_value(json!("4471")).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "4471");
    }

    // ── status ──

    #[test]
    fn status_full_snapshot() {
        let event = decode(
            "status",
            json!({
                "elapsedTime": 125,
                "timeLeft": 475,
                "active": true,
                "bestLapTime": 41_250,
                "racers": {
                    "4471": {
                        "cartId": 7,
                        "name": "Alex",
                        "laps": {"1": {"number": 1, "time": 42_000}, "2": {"number": 2, "time": 41_250}},
                        "bestLap": 2,
                        "bestTime": 41_250,
                        "improved": true
                    }
                }
            }),
        );
        let FeedEvent::Status(status) = event else {
            panic!("expected status");
        };
        assert_eq!(status.elapsed_time, Some(125));
        assert_eq!(status.time_left, Some(475));
        assert!(status.active);
        assert_eq!(status.best_lap_time, Some(41_250));

        let racer = &status.racers[&TransponderId::from("4471")];
        assert_eq!(racer.kart, "7");
        assert_eq!(racer.name, "Alex");
        assert_eq!(racer.laps, Laps::from([(1, 42_000), (2, 41_250)]));
        assert_eq!(racer.best_lap, Some(2));
        assert_eq!(racer.improved, Some(true));
    }

    #[test]
    fn status_tolerates_missing_and_null_fields() {
        let FeedEvent::Status(status) = decode(
            "status",
            json!({"racers": null, "bestLapTime": null, "active": null}),
        ) else {
            panic!("expected status");
        };
        assert_eq!(status, StatusPayload::default());

        let FeedEvent::Status(empty) = decode("status", Value::Null) else {
            panic!("expected status");
        };
        assert_eq!(empty, StatusPayload::default());
    }

    #[test]
    fn racer_laps_as_list_skip_unfinished() {
        let racer: RacerSnapshot = serde_json::from_value(json!({
            "id": "12",
            "laps": [null, {"time": 50_100}, {"number": 2, "time": null}, 49_800]
        }))
        .unwrap();
        assert_eq!(racer.kart, "12");
        assert_eq!(racer.laps, Laps::from([(1, 50_100), (3, 49_800)]));
        assert_eq!(racer.best_time, None);
    }

    // ── lap and driver events ──

    #[test]
    fn end_lap_payload() {
        let event = decode(
            "endLap",
            json!({"transponderId": 4471, "lapNumber": 3, "time": 40_990, "isImproved": true}),
        );
        assert_matches!(
            event,
            FeedEvent::EndLap(EndLapPayload { lap_number: 3, time: 40_990, is_improved: true, .. })
        );
    }

    #[test]
    fn end_lap_without_time_is_rejected() {
        let err = FeedEvent::decode("endLap", &json!({"transponderId": 1, "lapNumber": 2}))
            .unwrap_err();
        assert_matches!(err, ScoreboardError::Payload { ref identifier, .. } if identifier == "endLap");
    }

    #[test]
    fn add_driver_defaults_name() {
        let FeedEvent::AddDriver(add) = decode("addDriver", json!({"transponderId": "9", "id": 3}))
        else {
            panic!("expected addDriver");
        };
        assert_eq!(add.id, "3");
        assert_eq!(add.name, "");
    }

    #[test]
    fn modify_driver_payload() {
        let FeedEvent::ModifyDriver(modify) =
            decode("modifyDriver", json!({"transponderId": 9, "name": "Sam"}))
        else {
            panic!("expected modifyDriver");
        };
        assert_eq!(modify.transponder_id, TransponderId::from("9"));
        assert_eq!(modify.name, "Sam");
    }

    // ── signals ──

    #[test]
    fn payloadless_events() {
        assert_eq!(decode("clear", Value::Null), FeedEvent::Clear);
        assert_eq!(decode("finish", json!({})), FeedEvent::Finish);
        assert_eq!(decode("start", Value::Null), FeedEvent::Start);
    }

    #[test]
    fn timing_payload() {
        assert_eq!(
            decode("timing", json!({"elapsed": 61, "left": 539})),
            FeedEvent::Timing(TimingPayload {
                elapsed: Some(61),
                left: Some(539)
            })
        );
    }

    #[test]
    fn unknown_identifier_is_ignored() {
        assert!(FeedEvent::decode("weather", &json!({})).unwrap().is_none());
    }

    #[test]
    fn identifiers_all_decode() {
        for identifier in FeedEvent::IDENTIFIERS {
            // Lap and driver events need a payload; everything else decodes from null.
            let data = json!({"transponderId": 1, "lapNumber": 1, "time": 1});
            assert!(FeedEvent::decode(identifier, &data).unwrap().is_some(), "{identifier}");
        }
    }
}
