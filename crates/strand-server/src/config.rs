//! Server configuration.

use serde::{Deserialize, Serialize};

/// Tunables for one [`StrandServer`](crate::StrandServer) instance.
///
/// Binding defaults to loopback with an auto-assigned port so tests and
/// local runs never collide; the daemon overrides host/port from settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,
    /// Bind port; `0` lets the OS pick.
    pub port: u16,
    /// Upgrade requests beyond this many live connections are refused.
    pub max_connections: usize,
    /// Seconds between pings on each connection.
    pub heartbeat_interval_secs: u64,
    /// Seconds of silence after which a connection is dropped.
    pub heartbeat_timeout_secs: u64,
    /// Largest accepted WebSocket message, in bytes.
    pub max_message_size: usize,
    /// How many recent deltas each resource retains for `fromVersion`
    /// catch-up before falling back to a snapshot.
    pub delta_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 256,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 60,
            max_message_size: 4 * 1024 * 1024,
            delta_buffer: 64,
        }
    }
}
