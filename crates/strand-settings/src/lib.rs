//! # strand-settings
//!
//! Settings for the Strand sync daemon and client.
//!
//! Loading flow: compiled defaults → optional `~/.strand/settings.json`
//! deep-merge → `STRAND_*` environment overrides. All field names are
//! camelCase on disk; partial files are fine.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{load_settings, load_settings_from_path, settings_path};
pub use types::{ClientSettings, LogFormat, LoggingSettings, ServerSettings, StrandSettings};
