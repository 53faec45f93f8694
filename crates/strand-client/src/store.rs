//! Resource store — what this client currently believes each resource looks
//! like, and the only writer to the data bus for this subsystem.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use strand_bus::BusSink;
use strand_protocol::{ResourceKey, shallow_merge};

/// Local belief about one resource.
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceState {
    /// Last version accepted for this resource.
    pub version: u64,
    /// Full materialized value.
    pub data: Value,
}

/// `{version, data}` per subscribed resource.
#[derive(Debug, Default)]
pub struct ResourceStore {
    entries: HashMap<ResourceKey, ResourceState>,
}

impl ResourceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state for a key.
    pub fn get(&self, key: &ResourceKey) -> Option<&ResourceState> {
        self.entries.get(key)
    }

    /// Current version for a key, if any state exists.
    pub fn version(&self, key: &ResourceKey) -> Option<u64> {
        self.entries.get(key).map(|s| s.version)
    }

    /// Replace the state for a key (snapshot or accepted delta result).
    pub fn put(&mut self, key: ResourceKey, version: u64, data: Value) {
        if let Some(prior) = self.entries.get(&key) {
            if version < prior.version {
                // The server owns version ordering; note regressions but
                // accept them, since a snapshot is always authoritative.
                debug!(
                    resource = %key,
                    prior = prior.version,
                    next = version,
                    "version regressed on overwrite"
                );
            }
        }
        let _ = self.entries.insert(key, ResourceState { version, data });
    }

    /// Shallow-merge an un-versioned partial patch into existing state.
    ///
    /// Returns `false` when no state exists (the patch is dropped); the
    /// version counter is never touched by this path.
    pub fn merge_unversioned(&mut self, key: &ResourceKey, patch: &Value) -> bool {
        match self.entries.get_mut(key) {
            Some(state) => {
                state.data = shallow_merge(&state.data, patch);
                true
            }
            None => false,
        }
    }

    /// Drop the state for a key. Returns `false` if none existed.
    pub fn remove(&mut self, key: &ResourceKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drop all state.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of resources with local state.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Publish the full current value for a key to the bus.
    ///
    /// Exactly one publish per accepted mutation; consumers only ever see
    /// materialized state, never diffs.
    pub fn publish_current(&self, key: &ResourceKey, bus: &dyn BusSink) -> bool {
        match self.entries.get(key) {
            Some(state) => {
                bus.publish(&key.bus_path(), &state.data);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSink;
    use serde_json::json;

    fn key() -> ResourceKey {
        ResourceKey::new("idea", "idea-123")
    }

    #[test]
    fn put_then_get() {
        let mut store = ResourceStore::new();
        store.put(key(), 5, json!({"status": "new"}));
        let state = store.get(&key()).unwrap();
        assert_eq!(state.version, 5);
        assert_eq!(state.data["status"], "new");
    }

    #[test]
    fn version_lookup() {
        let mut store = ResourceStore::new();
        assert_eq!(store.version(&key()), None);
        store.put(key(), 3, json!({}));
        assert_eq!(store.version(&key()), Some(3));
    }

    #[test]
    fn put_overwrites() {
        let mut store = ResourceStore::new();
        store.put(key(), 5, json!({"a": 1}));
        store.put(key(), 6, json!({"a": 2}));
        assert_eq!(store.version(&key()), Some(6));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn merge_unversioned_keeps_version() {
        let mut store = ResourceStore::new();
        store.put(key(), 5, json!({"status": "new", "cursor": 1}));
        assert!(store.merge_unversioned(&key(), &json!({"cursor": 9})));
        let state = store.get(&key()).unwrap();
        assert_eq!(state.version, 5);
        assert_eq!(state.data, json!({"status": "new", "cursor": 9}));
    }

    #[test]
    fn merge_unversioned_without_state_is_dropped() {
        let mut store = ResourceStore::new();
        assert!(!store.merge_unversioned(&key(), &json!({"cursor": 9})));
        assert!(store.is_empty());
    }

    #[test]
    fn remove_clears_entry() {
        let mut store = ResourceStore::new();
        store.put(key(), 1, json!({}));
        assert!(store.remove(&key()));
        assert!(!store.remove(&key()));
        assert!(store.get(&key()).is_none());
    }

    #[test]
    fn publish_current_sends_full_value() {
        let mut store = ResourceStore::new();
        let sink = RecordingSink::default();
        store.put(key(), 5, json!({"status": "new"}));
        assert!(store.publish_current(&key(), &sink));

        let published = sink.published();
        assert_eq!(published.len(), 1);
        assert_eq!(
            published[0].0,
            vec!["ideas".to_string(), "idea-123".to_string()]
        );
        assert_eq!(published[0].1, json!({"status": "new"}));
    }

    #[test]
    fn publish_current_without_state_is_noop() {
        let store = ResourceStore::new();
        let sink = RecordingSink::default();
        assert!(!store.publish_current(&key(), &sink));
        assert!(sink.published().is_empty());
    }
}
