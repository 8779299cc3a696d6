//! # teamboard-settings
//!
//! Configuration for the Teamboard client, loaded from three layers (in
//! priority order):
//! 1. **Compiled defaults**: [`TeamboardSettings::default()`]
//! 2. **User file**: `~/.teamboard/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `TEAMBOARD_*` overrides (highest priority)
//!
//! There is no global instance: the loaded value is handed to the workspace
//! at construction, alongside the remote store handle.
//!
//! # Usage
//!
//! ```no_run
//! use teamboard_settings::load_settings;
//!
//! let settings = load_settings().unwrap_or_default();
//! println!("toast lifetime: {}ms", settings.notifications.toast_duration_ms);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides_from, deep_merge, load_settings, load_settings_from_path,
    settings_path,
};
pub use types::*;
