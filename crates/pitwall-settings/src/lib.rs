//! # pitwall-settings
//!
//! Layered configuration for the pitwall client and scoreboard.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`PitwallSettings::default()`]
//! 2. **User file**: `~/.pitwall/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `PITWALL_*` overrides (highest priority)
//!
//! Command-line flags of the `pitwall` binary are applied on top by the
//! binary itself.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, deep_merge, load_settings, load_settings_from_path, load_with_env,
    settings_path,
};
pub use types::*;

use std::sync::OnceLock;

static SETTINGS: OnceLock<PitwallSettings> = OnceLock::new();

/// Process-wide settings.
///
/// Loaded from the default path on first access; falls back to compiled
/// defaults if loading fails.
pub fn get_settings() -> &'static PitwallSettings {
    SETTINGS.get_or_init(|| {
        load_settings().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load settings, using defaults");
            PitwallSettings::default()
        })
    })
}

/// Install `settings` as the process-wide value.
///
/// Returns the settings back if the global was already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: PitwallSettings) -> std::result::Result<(), PitwallSettings> {
    SETTINGS.set(settings)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
