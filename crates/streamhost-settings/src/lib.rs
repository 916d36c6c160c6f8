//! # streamhost-settings
//!
//! Configuration with layered sources for the session host.
//!
//! Settings are resolved in priority order:
//! 1. **Compiled defaults**: [`StreamingSettings::default()`]
//! 2. **Settings file**: `<config root>/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `STREAMHOST_*` overrides
//! 4. **Override file**: `<search root>/signal_override.json` (or the older
//!    `RSUrlSignalOverride.json`), read once at
//!    startup; only its endpoint field replaces anything.
//!
//! Settings are plain values owned by the caller. There is no global instance.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod overrides;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    default_config_root, deep_merge, load_settings, load_settings_from_path, settings_path,
};
pub use overrides::{
    resolve_override, OverrideConfig, LEGACY_OVERRIDE_FILE_NAME, OVERRIDE_FILE_NAME,
};
pub use types::*;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
