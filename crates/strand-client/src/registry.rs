//! Subscription registry — idempotent bookkeeping of standing interest,
//! independent of connectivity.

use std::collections::HashSet;

use strand_protocol::ResourceKey;

/// The set of resources this provider currently cares about.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    keys: HashSet<ResourceKey>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record interest in a key. Returns `false` if already present.
    pub fn insert(&mut self, key: ResourceKey) -> bool {
        self.keys.insert(key)
    }

    /// Drop interest in a key. Returns `false` if it was not present.
    pub fn remove(&mut self, key: &ResourceKey) -> bool {
        self.keys.remove(key)
    }

    /// Whether a key has a standing subscription.
    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.keys.contains(key)
    }

    /// Iterate all subscribed keys (replay order is unspecified).
    pub fn iter(&self) -> impl Iterator<Item = &ResourceKey> {
        self.keys.iter()
    }

    /// Number of standing subscriptions.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Remove every subscription.
    pub fn clear(&mut self) {
        self.keys.clear();
    }
}
