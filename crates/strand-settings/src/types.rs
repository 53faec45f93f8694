//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and `#[serde(default)]`
//! so partial JSON files deserialize with production defaults for missing
//! fields.

use serde::{Deserialize, Serialize};

/// Root settings for Strand.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StrandSettings {
    /// Settings schema version.
    pub version: String,
    /// Sync client settings.
    pub client: ClientSettings,
    /// Sync server settings.
    pub server: ServerSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for StrandSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            client: ClientSettings::default(),
            server: ServerSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// Settings for the sync provider (client side).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// Server endpoint, e.g. `ws://127.0.0.1:9470/ws`.
    pub url: String,
    /// Session user id sent as a query parameter.
    pub user_id: String,
    /// Session user display name.
    pub user_name: String,
    /// Session user color (hex).
    pub user_color: String,
    /// Optional workspace scope sent once per connection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    /// Delay before reconnecting after a dropped connection.
    pub reconnect_delay_ms: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:9470/ws".to_string(),
            user_id: "anonymous".to_string(),
            user_name: "Anonymous".to_string(),
            user_color: "#808080".to_string(),
            workspace_id: None,
            reconnect_delay_ms: 3000,
        }
    }
}

/// Settings for the sync server.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Host to bind.
    pub host: String,
    /// Port to bind (0 for auto-assign).
    pub port: u16,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Ping interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Disconnect after this many seconds without a pong.
    pub heartbeat_timeout_secs: u64,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Recent deltas retained per resource for `fromVersion` replay.
    pub delta_buffer: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 9470,
            max_connections: 256,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 60,
            max_message_size: 4 * 1024 * 1024, // 4 MB
            delta_buffer: 64,
        }
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable console output.
    Pretty,
    /// Line-delimited JSON.
    Json,
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Output format.
    pub format: LogFormat,
    /// Default `tracing` filter directive (overridden by `RUST_LOG`).
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            filter: "info".to_string(),
        }
    }
}
