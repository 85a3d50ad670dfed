//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`PitwallSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `PITWALL_*` environment variable overrides
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{PitwallSettings, Ranking};

/// Resolve the path to the settings file (`~/.pitwall/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".pitwall").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<PitwallSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<PitwallSettings> {
    load_with_env(path, |name| std::env::var(name).ok())
}

/// Load from `path`, resolving environment overrides through `env`.
pub fn load_with_env<F>(path: &Path, env: F) -> Result<PitwallSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = serde_json::to_value(PitwallSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: PitwallSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings, env);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `PITWALL_*` overrides read through `env`.
///
/// Values that fail to parse or fall outside their range are logged and
/// ignored, leaving the file/default value in place.
pub fn apply_env_overrides<F>(settings: &mut PitwallSettings, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader(env);

    // ── Client ──────────────────────────────────────────────────────
    if let Some(v) = env.string("PITWALL_URL") {
        settings.client.url = v;
    }
    if let Some(v) = env.string("PITWALL_PAGE_TOKEN") {
        settings.client.page_token = Some(v);
    }
    if let Some(v) = env.bool("PITWALL_DEBUG") {
        settings.client.debug = v;
    }
    if let Some(v) = env.bool("PITWALL_KEEP_ALIVE") {
        settings.client.keep_alive = v;
    }
    if let Some(v) = env.u32("PITWALL_MAX_RECONNECTION_ATTEMPTS", 1, 10_000) {
        settings.client.max_reconnection_attempts = v;
    }
    if let Some(v) = env.u64("PITWALL_RECONNECTION_INTERVAL_MS", 1, 3_600_000) {
        settings.client.reconnection_interval_ms = v;
    }
    if let Some(v) = env.u64("PITWALL_SENDING_INTERVAL_MS", 0, 60_000) {
        settings.client.sending_interval_ms = v;
    }
    if let Some(v) = env.u64("PITWALL_CLOSE_TIMEOUT_MS", 1, 600_000) {
        settings.client.close_timeout_ms = v;
    }
    if let Some(v) = env.usize("PITWALL_MAX_QUEUE_LEN", 1, 1_000_000) {
        settings.client.max_queue_len = v;
    }

    // ── Scoreboard ──────────────────────────────────────────────────
    if let Some(v) = env.string("PITWALL_RANKING") {
        match parse_ranking(&v) {
            Some(ranking) => settings.scoreboard.ranking = ranking,
            None => warn!(key = "PITWALL_RANKING", value = %v, "invalid ranking env var, ignoring"),
        }
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("PITWALL_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.string("PITWALL_LOG_FORMAT") {
        settings.logging.format = v.to_lowercase();
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u32` within an inclusive range.
pub fn parse_u32_range(val: &str, min: u32, max: u32) -> Option<u32> {
    let n: u32 = val.parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

/// Parse a string as a `usize` within an inclusive range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

/// Parse a ranking name: `bestLap`/`best-lap`/`qualifying` or
/// `totalTime`/`total-time`/`race`.
pub fn parse_ranking(val: &str) -> Option<Ranking> {
    match val.to_lowercase().replace(['-', '_'], "").as_str() {
        "bestlap" | "qualifying" => Some(Ranking::BestLap),
        "totaltime" | "race" => Some(Ranking::TotalTime),
        _ => None,
    }
}

// ── Env var readers ─────────────────────────────────────────────────────────

struct EnvReader<F>(F);

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        self.parsed(name, "boolean", parse_bool)
    }

    fn u32(&self, name: &str, min: u32, max: u32) -> Option<u32> {
        self.parsed(name, "u32", |v| parse_u32_range(v, min, max))
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        self.parsed(name, "u64", |v| parse_u64_range(v, min, max))
    }

    fn usize(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        self.parsed(name, "usize", |v| parse_usize_range(v, min, max))
    }

    fn parsed<T>(&self, name: &str, kind: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
        let val = (self.0)(name)?;
        let result = parse(&val);
        if result.is_none() {
            warn!(key = name, value = %val, kind, "invalid env var, ignoring");
        }
        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
