//! Settings loading.
//!
//! Three layers, later layers winning: compiled defaults, then an optional
//! `~/.strand/settings.json` merged over them, then `STRAND_*` environment
//! variables. A missing file is fine; a file that exists but is not valid
//! JSON is an error. Env values that fail to parse or fall outside their
//! documented range are warned about and skipped rather than aborting the
//! load.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{LogFormat, StrandSettings};

/// Where the settings file lives: `~/.strand/settings.json`.
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    Path::new(&home).join(".strand").join("settings.json")
}

/// Load settings from the default location, then apply env overrides.
pub fn load_settings() -> Result<StrandSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from an explicit path, then apply env overrides.
pub fn load_settings_from_path(path: &Path) -> Result<StrandSettings> {
    let mut layered = serde_json::to_value(StrandSettings::default())?;

    if path.exists() {
        debug!(?path, "merging settings file over defaults");
        let text = std::fs::read_to_string(path)?;
        let file: Value = serde_json::from_str(&text)?;
        merge_over(&mut layered, file);
    } else {
        debug!(?path, "no settings file, starting from defaults");
    }

    let mut settings: StrandSettings = serde_json::from_value(layered)?;
    overlay_env(&mut settings);
    Ok(settings)
}

/// Merge `overlay` into `base` in place.
///
/// Objects merge key by key, recursively. Anything else (arrays, strings,
/// numbers, booleans) is replaced wholesale. A `null` in the overlay leaves
/// the base value alone, so a file can mention a key without resetting it.
fn merge_over(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                if overlay_val.is_null() {
                    continue;
                }
                match base_map.get_mut(&key) {
                    Some(base_val) => merge_over(base_val, overlay_val),
                    None => {
                        let _ = base_map.insert(key, overlay_val);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// A numeric env override: variable name plus its accepted range.
struct Bounded<T> {
    var: &'static str,
    min: T,
    max: T,
}

impl<T: FromStr + PartialOrd + Copy + std::fmt::Display> Bounded<T> {
    const fn new(var: &'static str, min: T, max: T) -> Self {
        Self { var, min, max }
    }

    /// Read and range-check the variable. Out-of-range or unparseable
    /// values warn and yield `None` so the earlier layer survives.
    fn read(&self) -> Option<T> {
        let raw = std::env::var(self.var).ok()?;
        match raw.parse::<T>() {
            Ok(n) if n >= self.min && n <= self.max => Some(n),
            _ => {
                warn!(
                    var = self.var,
                    value = %raw,
                    min = %self.min,
                    max = %self.max,
                    "ignoring out-of-range env override"
                );
                None
            }
        }
    }
}

const RECONNECT_DELAY_MS: Bounded<u64> = Bounded::new("STRAND_RECONNECT_DELAY_MS", 100, 600_000);
const PORT: Bounded<u16> = Bounded::new("STRAND_PORT", 1, u16::MAX);
const MAX_CONNECTIONS: Bounded<usize> = Bounded::new("STRAND_MAX_CONNECTIONS", 1, 100_000);
const HEARTBEAT_INTERVAL: Bounded<u64> = Bounded::new("STRAND_HEARTBEAT_INTERVAL", 1, 600);
const HEARTBEAT_TIMEOUT: Bounded<u64> = Bounded::new("STRAND_HEARTBEAT_TIMEOUT", 1, 3600);
const DELTA_BUFFER: Bounded<usize> = Bounded::new("STRAND_DELTA_BUFFER", 1, 65_536);

fn env_text(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.is_empty())
}

/// Apply `STRAND_*` environment overrides, the highest-priority layer.
fn overlay_env(settings: &mut StrandSettings) {
    let client = &mut settings.client;
    if let Some(v) = env_text("STRAND_URL") {
        client.url = v;
    }
    if let Some(v) = env_text("STRAND_USER_ID") {
        client.user_id = v;
    }
    if let Some(v) = env_text("STRAND_USER_NAME") {
        client.user_name = v;
    }
    if let Some(v) = env_text("STRAND_USER_COLOR") {
        client.user_color = v;
    }
    if let Some(v) = env_text("STRAND_WORKSPACE") {
        client.workspace_id = Some(v);
    }
    if let Some(v) = RECONNECT_DELAY_MS.read() {
        client.reconnect_delay_ms = v;
    }

    let server = &mut settings.server;
    if let Some(v) = env_text("STRAND_HOST") {
        server.host = v;
    }
    if let Some(v) = PORT.read() {
        server.port = v;
    }
    if let Some(v) = MAX_CONNECTIONS.read() {
        server.max_connections = v;
    }
    if let Some(v) = HEARTBEAT_INTERVAL.read() {
        server.heartbeat_interval_secs = v;
    }
    if let Some(v) = HEARTBEAT_TIMEOUT.read() {
        server.heartbeat_timeout_secs = v;
    }
    if let Some(v) = DELTA_BUFFER.read() {
        server.delta_buffer = v;
    }

    if let Some(v) = env_text("STRAND_LOG_FORMAT") {
        match v.to_lowercase().as_str() {
            "pretty" => settings.logging.format = LogFormat::Pretty,
            "json" => settings.logging.format = LogFormat::Json,
            other => warn!(value = other, "unknown STRAND_LOG_FORMAT, keeping current"),
        }
    }
    if let Some(v) = env_text("STRAND_LOG_FILTER") {
        settings.logging.filter = v;
    }
}
