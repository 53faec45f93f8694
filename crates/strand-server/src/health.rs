//! `/health` endpoint payload.

use std::time::Instant;

use serde::Serialize;

/// What `/health` reports.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `"ok"` whenever the process answers at all.
    pub status: &'static str,
    /// Seconds since boot.
    pub uptime_secs: u64,
    /// Live WebSocket connections.
    pub connections: usize,
    /// Resources currently held by the hub.
    pub resources: usize,
}

impl HealthResponse {
    /// Assemble the report from live counters.
    pub fn gather(started: Instant, connections: usize, resources: usize) -> Self {
        Self {
            status: "ok",
            uptime_secs: started.elapsed().as_secs(),
            connections,
            resources,
        }
    }
}
