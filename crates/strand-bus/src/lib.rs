//! # strand-bus
//!
//! The local publish/subscribe data bus. The sync provider writes
//! `(path, value)` updates here; UI layers subscribe and re-render. Fan-out
//! is `tokio::sync::broadcast`, so slow consumers lag rather than block the
//! publisher, and the bus is strictly write-only for the sync core.

#![deny(unsafe_code)]

use serde_json::Value;
use tokio::sync::broadcast;
use tracing::trace;

/// Default broadcast channel capacity.
const DEFAULT_CAPACITY: usize = 1024;

/// One published update: a path and the full materialized value at it.
#[derive(Clone, Debug, PartialEq)]
pub struct BusUpdate {
    /// Publication path segments, e.g. `["ideas", "idea-123"]`.
    pub path: Vec<String>,
    /// Full current value (never a diff).
    pub value: Value,
}

/// The seam the sync provider publishes through.
///
/// Production code hands the provider a [`DataBus`]; tests substitute a
/// recording sink.
pub trait BusSink: Send + Sync {
    /// Publish the full current value at a path.
    fn publish(&self, path: &[String], value: &Value);
}

/// Broadcast-backed data bus.
#[derive(Clone, Debug)]
pub struct DataBus {
    tx: broadcast::Sender<BusUpdate>,
}

impl DataBus {
    /// Create a bus with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus with an explicit channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all subsequent updates.
    pub fn subscribe(&self) -> broadcast::Receiver<BusUpdate> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for DataBus {
    fn default() -> Self {
        Self::new()
    }
}

impl BusSink for DataBus {
    fn publish(&self, path: &[String], value: &Value) {
        let update = BusUpdate {
            path: path.to_vec(),
            value: value.clone(),
        };
        // No receivers is not an error; the UI may not be listening yet.
        if self.tx.send(update).is_err() {
            trace!(path = path.join("/"), "bus publish with no subscribers");
        }
    }
}
