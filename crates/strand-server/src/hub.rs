//! Authoritative resource state and frame fan-out.
//!
//! The hub owns `{version, data}` per resource, mints strictly increasing
//! and gapless deltas, keeps a bounded ring of recent deltas per resource so
//! a reconnecting client with a recent `fromVersion` can be caught up
//! incrementally, and fans frames out to exactly the connections subscribed
//! to the affected resource.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use strand_protocol::{Delta, ResourceKey, ServerFrame, shallow_merge};

use crate::connection::ClientConnection;
use crate::errors::HubError;

/// Authoritative state for one resource.
struct ResourceEntry {
    version: u64,
    data: Value,
    /// Recent deltas, oldest first; contiguous by construction.
    recent: VecDeque<Delta>,
}

impl ResourceEntry {
    /// Deltas needed to advance a client from `from_version` to the current
    /// version, when the ring still covers that range.
    fn replay_from(&self, from_version: u64) -> Option<Vec<Delta>> {
        let start = self
            .recent
            .iter()
            .position(|d| d.base_version == from_version)?;
        Some(self.recent.iter().skip(start).cloned().collect())
    }
}

struct HubInner {
    resources: HashMap<ResourceKey, ResourceEntry>,
    connections: HashMap<String, Arc<ClientConnection>>,
}

/// The server's resource registry and broadcast fan-out.
pub struct ResourceHub {
    delta_buffer: usize,
    inner: RwLock<HubInner>,
}

impl ResourceHub {
    /// Create a hub retaining `delta_buffer` recent deltas per resource.
    pub fn new(delta_buffer: usize) -> Self {
        Self {
            delta_buffer: delta_buffer.max(1),
            inner: RwLock::new(HubInner {
                resources: HashMap::new(),
                connections: HashMap::new(),
            }),
        }
    }

    // ── Connections ─────────────────────────────────────────────────

    /// Register a connection.
    pub async fn add_connection(&self, connection: Arc<ClientConnection>) {
        let mut inner = self.inner.write().await;
        let _ = inner.connections.insert(connection.id.clone(), connection);
    }

    /// Remove a connection (all its subscriptions die with it).
    pub async fn remove_connection(&self, connection_id: &str) {
        let mut inner = self.inner.write().await;
        let _ = inner.connections.remove(connection_id);
    }

    /// Number of registered connections.
    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }

    // ── Subscriptions ───────────────────────────────────────────────

    /// Subscribe a connection to a resource and answer its catch-up
    /// request.
    ///
    /// - no `from_version` → fresh snapshot
    /// - `from_version` equal to the current version → nothing to send
    /// - `from_version` still covered by the delta ring → replay deltas
    /// - anything else (stale or unknown) → fresh snapshot
    pub async fn subscribe(
        &self,
        connection: &Arc<ClientConnection>,
        key: ResourceKey,
        from_version: Option<u64>,
    ) {
        let _ = connection.subscribe(key.clone());
        let inner = self.inner.read().await;
        let Some(entry) = inner.resources.get(&key) else {
            debug!(resource = %key, conn_id = %connection.id, "subscribed to unknown resource");
            return;
        };

        match from_version {
            Some(version) if version == entry.version => {
                debug!(resource = %key, version, "subscriber already current");
            }
            Some(version) => match entry.replay_from(version) {
                Some(deltas) => {
                    debug!(
                        resource = %key,
                        from = version,
                        count = deltas.len(),
                        "replaying buffered deltas"
                    );
                    for delta in deltas {
                        let frame = ServerFrame::ResourceDelta {
                            resource_type: key.resource_type.clone(),
                            resource_id: key.resource_id.clone(),
                            delta,
                        };
                        if !connection.send_frame(&frame) {
                            warn!(conn_id = %connection.id, resource = %key, "failed to send replay delta");
                        }
                    }
                }
                None => {
                    debug!(resource = %key, from = version, "fromVersion too old, sending snapshot");
                    send_snapshot(connection, &key, entry);
                }
            },
            None => send_snapshot(connection, &key, entry),
        }
    }

    /// Drop a connection's subscription.
    pub async fn unsubscribe(&self, connection: &Arc<ClientConnection>, key: &ResourceKey) {
        let _ = connection.unsubscribe(key);
    }

    // ── Resource mutation (driven by the CRUD surface) ──────────────

    /// Create or replace a resource, broadcasting a snapshot.
    ///
    /// Creation starts at version 1; replacement advances the version and
    /// clears the delta ring since continuity with prior deltas is broken.
    pub async fn put_snapshot(&self, key: ResourceKey, data: Value) -> u64 {
        let mut inner = self.inner.write().await;
        let version = match inner.resources.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                entry.version += 1;
                entry.data = data.clone();
                entry.recent.clear();
                entry.version
            }
            Entry::Vacant(vacant) => {
                let _ = vacant.insert(ResourceEntry {
                    version: 1,
                    data: data.clone(),
                    recent: VecDeque::new(),
                });
                1
            }
        };
        let frame = ServerFrame::ResourceSnapshot {
            resource_type: key.resource_type.clone(),
            resource_id: key.resource_id.clone(),
            data,
            version,
        };
        fan_out(&inner, &key, &frame);
        version
    }

    /// Apply a versioned patch: shallow-merge, bump the version, mint a
    /// delta, and broadcast it to subscribers.
    pub async fn apply_patch(&self, key: &ResourceKey, patch: Value) -> Result<u64, HubError> {
        let mut inner = self.inner.write().await;
        let buffer = self.delta_buffer;
        let entry = inner
            .resources
            .get_mut(key)
            .ok_or_else(|| HubError::NotFound(key.clone()))?;

        let base_version = entry.version;
        entry.version += 1;
        entry.data = shallow_merge(&entry.data, &patch);
        let delta = Delta::new(base_version, entry.version, patch);
        entry.recent.push_back(delta.clone());
        while entry.recent.len() > buffer {
            let _ = entry.recent.pop_front();
        }
        let version = entry.version;

        let frame = ServerFrame::ResourceDelta {
            resource_type: key.resource_type.clone(),
            resource_id: key.resource_id.clone(),
            delta,
        };
        fan_out(&inner, key, &frame);
        Ok(version)
    }

    /// Apply an un-versioned partial patch and broadcast it as
    /// `resource_updated`. The version counter is deliberately untouched;
    /// this is the low-stakes high-frequency side channel.
    pub async fn touch(&self, key: &ResourceKey, patch: Value) -> Result<(), HubError> {
        let mut inner = self.inner.write().await;
        let entry = inner
            .resources
            .get_mut(key)
            .ok_or_else(|| HubError::NotFound(key.clone()))?;
        entry.data = shallow_merge(&entry.data, &patch);

        let frame = ServerFrame::ResourceUpdated {
            resource_type: key.resource_type.clone(),
            resource_id: key.resource_id.clone(),
            data: patch,
        };
        fan_out(&inner, key, &frame);
        Ok(())
    }

    /// Delete a resource. Returns `false` if it did not exist.
    pub async fn remove(&self, key: &ResourceKey) -> bool {
        let mut inner = self.inner.write().await;
        inner.resources.remove(key).is_some()
    }

    /// Current `(version, data)` for a resource.
    pub async fn get(&self, key: &ResourceKey) -> Option<(u64, Value)> {
        let inner = self.inner.read().await;
        inner
            .resources
            .get(key)
            .map(|entry| (entry.version, entry.data.clone()))
    }

    /// Number of resources held.
    pub async fn resource_count(&self) -> usize {
        self.inner.read().await.resources.len()
    }

    // ── Workspace broadcasts ────────────────────────────────────────

    /// Broadcast a workspace-level frame.
    ///
    /// Frames carrying a workspace id go to connections bound to that scope
    /// and to unscoped connections; `workspaces_changed` goes to everyone.
    /// Resource-scoped frames are rejected here.
    pub async fn broadcast_workspace(&self, frame: &ServerFrame) {
        let scope = match frame {
            ServerFrame::WorkspaceCreated { workspace_id }
            | ServerFrame::WorkspaceUpdated { workspace_id }
            | ServerFrame::WorkspaceDeleted { workspace_id } => Some(workspace_id.as_str()),
            ServerFrame::WorkspacesChanged => None,
            _ => {
                debug!("broadcast_workspace called with a resource frame");
                return;
            }
        };
        let inner = self.inner.read().await;
        for connection in inner.connections.values() {
            let relevant = match (scope, connection.workspace()) {
                (Some(scope), Some(bound)) => bound == scope,
                _ => true,
            };
            if relevant && !connection.send_frame(frame) {
                warn!(conn_id = %connection.id, "failed to send workspace event");
            }
        }
    }
}

impl Default for ResourceHub {
    fn default() -> Self {
        Self::new(64)
    }
}

fn send_snapshot(connection: &Arc<ClientConnection>, key: &ResourceKey, entry: &ResourceEntry) {
    let frame = ServerFrame::ResourceSnapshot {
        resource_type: key.resource_type.clone(),
        resource_id: key.resource_id.clone(),
        data: entry.data.clone(),
        version: entry.version,
    };
    if !connection.send_frame(&frame) {
        warn!(conn_id = %connection.id, resource = %key, "failed to send snapshot");
    }
}

fn fan_out(inner: &HubInner, key: &ResourceKey, frame: &ServerFrame) {
    let json = match frame.encode() {
        Ok(json) => Arc::new(json),
        Err(e) => {
            warn!(resource = %key, error = %e, "failed to serialize frame");
            return;
        }
    };
    for connection in inner.connections.values() {
        if connection.is_subscribed(key) && !connection.send(json.clone()) {
            warn!(conn_id = %connection.id, resource = %key, "failed to send frame");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionIdentity;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn key() -> ResourceKey {
        ResourceKey::new("idea", "idea-123")
    }

    fn make_connection(id: &str) -> (Arc<ClientConnection>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(32);
        let conn = Arc::new(ClientConnection::new(
            id.into(),
            SessionIdentity::default(),
            tx,
        ));
        (conn, rx)
    }

    fn parse(msg: &str) -> ServerFrame {
        ServerFrame::decode(msg).unwrap()
    }

    // ── Resource lifecycle ──────────────────────────────────────────

    #[tokio::test]
    async fn put_snapshot_creates_at_version_one() {
        let hub = ResourceHub::default();
        let version = hub.put_snapshot(key(), json!({"a": 1})).await;
        assert_eq!(version, 1);
        let (v, data) = hub.get(&key()).await.unwrap();
        assert_eq!(v, 1);
        assert_eq!(data, json!({"a": 1}));
    }

    #[tokio::test]
    async fn put_snapshot_replacement_advances_version() {
        let hub = ResourceHub::default();
        let _ = hub.put_snapshot(key(), json!({"a": 1})).await;
        let _ = hub.apply_patch(&key(), json!({"b": 2})).await.unwrap();
        let version = hub.put_snapshot(key(), json!({"fresh": true})).await;
        assert_eq!(version, 3);
        let (_, data) = hub.get(&key()).await.unwrap();
        assert_eq!(data, json!({"fresh": true}));
    }

    #[tokio::test]
    async fn apply_patch_mints_gapless_deltas() {
        let hub = ResourceHub::default();
        let _ = hub.put_snapshot(key(), json!({"n": 0})).await;
        assert_eq!(hub.apply_patch(&key(), json!({"n": 1})).await.unwrap(), 2);
        assert_eq!(hub.apply_patch(&key(), json!({"n": 2})).await.unwrap(), 3);
        let (version, data) = hub.get(&key()).await.unwrap();
        assert_eq!(version, 3);
        assert_eq!(data, json!({"n": 2}));
    }

    #[tokio::test]
    async fn apply_patch_to_missing_resource_errors() {
        let hub = ResourceHub::default();
        let err = hub.apply_patch(&key(), json!({})).await.unwrap_err();
        assert!(matches!(err, HubError::NotFound(_)));
    }

    #[tokio::test]
    async fn touch_merges_without_version_bump() {
        let hub = ResourceHub::default();
        let _ = hub.put_snapshot(key(), json!({"a": 1, "cursor": 0})).await;
        hub.touch(&key(), json!({"cursor": 9})).await.unwrap();
        let (version, data) = hub.get(&key()).await.unwrap();
        assert_eq!(version, 1);
        assert_eq!(data, json!({"a": 1, "cursor": 9}));
    }

    #[tokio::test]
    async fn remove_deletes() {
        let hub = ResourceHub::default();
        let _ = hub.put_snapshot(key(), json!({})).await;
        assert!(hub.remove(&key()).await);
        assert!(!hub.remove(&key()).await);
        assert!(hub.get(&key()).await.is_none());
    }

    // ── Fan-out ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn deltas_reach_only_subscribers() {
        let hub = ResourceHub::default();
        let (sub, mut sub_rx) = make_connection("c1");
        let (other, mut other_rx) = make_connection("c2");
        hub.add_connection(sub.clone()).await;
        hub.add_connection(other).await;

        let _ = hub.put_snapshot(key(), json!({"n": 0})).await;
        hub.subscribe(&sub, key(), None).await;
        let _ = sub_rx.recv().await.unwrap(); // snapshot answer

        let _ = hub.apply_patch(&key(), json!({"n": 1})).await.unwrap();
        let msg = sub_rx.recv().await.unwrap();
        assert!(matches!(parse(&msg), ServerFrame::ResourceDelta { .. }));
        assert!(other_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsubscribe_stops_fan_out() {
        let hub = ResourceHub::default();
        let (conn, mut rx) = make_connection("c1");
        hub.add_connection(conn.clone()).await;
        let _ = hub.put_snapshot(key(), json!({"n": 0})).await;
        hub.subscribe(&conn, key(), None).await;
        let _ = rx.recv().await.unwrap();

        hub.unsubscribe(&conn, &key()).await;
        let _ = hub.apply_patch(&key(), json!({"n": 1})).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn removed_connection_gets_nothing() {
        let hub = ResourceHub::default();
        let (conn, mut rx) = make_connection("c1");
        hub.add_connection(conn.clone()).await;
        let _ = hub.put_snapshot(key(), json!({})).await;
        hub.subscribe(&conn, key(), None).await;
        let _ = rx.recv().await.unwrap();

        hub.remove_connection(&conn.id).await;
        let _ = hub.apply_patch(&key(), json!({"n": 1})).await.unwrap();
        assert!(rx.try_recv().is_err());
        assert_eq!(hub.connection_count().await, 0);
    }

    // ── Subscribe catch-up answers ──────────────────────────────────

    #[tokio::test]
    async fn subscribe_without_from_version_gets_snapshot() {
        let hub = ResourceHub::default();
        let (conn, mut rx) = make_connection("c1");
        hub.add_connection(conn.clone()).await;
        let _ = hub.put_snapshot(key(), json!({"a": 1})).await;

        hub.subscribe(&conn, key(), None).await;
        let frame = parse(&rx.recv().await.unwrap());
        assert!(matches!(
            frame,
            ServerFrame::ResourceSnapshot { version: 1, .. }
        ));
    }

    #[tokio::test]
    async fn subscribe_current_version_sends_nothing() {
        let hub = ResourceHub::default();
        let (conn, mut rx) = make_connection("c1");
        hub.add_connection(conn.clone()).await;
        let _ = hub.put_snapshot(key(), json!({"a": 1})).await;

        hub.subscribe(&conn, key(), Some(1)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn subscribe_recent_version_replays_deltas() {
        let hub = ResourceHub::default();
        let (conn, mut rx) = make_connection("c1");
        hub.add_connection(conn.clone()).await;
        let _ = hub.put_snapshot(key(), json!({"n": 0})).await;
        let _ = hub.apply_patch(&key(), json!({"n": 1})).await.unwrap();
        let _ = hub.apply_patch(&key(), json!({"n": 2})).await.unwrap();

        hub.subscribe(&conn, key(), Some(1)).await;
        let first = parse(&rx.recv().await.unwrap());
        let second = parse(&rx.recv().await.unwrap());
        match (first, second) {
            (
                ServerFrame::ResourceDelta { delta: d1, .. },
                ServerFrame::ResourceDelta { delta: d2, .. },
            ) => {
                assert_eq!((d1.base_version, d1.version), (1, 2));
                assert_eq!((d2.base_version, d2.version), (2, 3));
            }
            other => panic!("expected two deltas, got {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn subscribe_stale_version_falls_back_to_snapshot() {
        // Buffer of one delta: older history is gone.
        let hub = ResourceHub::new(1);
        let (conn, mut rx) = make_connection("c1");
        hub.add_connection(conn.clone()).await;
        let _ = hub.put_snapshot(key(), json!({"n": 0})).await;
        for n in 1..=3 {
            let _ = hub.apply_patch(&key(), json!({"n": n})).await.unwrap();
        }

        hub.subscribe(&conn, key(), Some(1)).await;
        let frame = parse(&rx.recv().await.unwrap());
        assert!(matches!(
            frame,
            ServerFrame::ResourceSnapshot { version: 4, .. }
        ));
    }

    #[tokio::test]
    async fn subscribe_unknown_resource_sends_nothing() {
        let hub = ResourceHub::default();
        let (conn, mut rx) = make_connection("c1");
        hub.add_connection(conn.clone()).await;
        hub.subscribe(&conn, key(), None).await;
        assert!(rx.try_recv().is_err());
        // The subscription still stands; a later snapshot reaches it.
        let _ = hub.put_snapshot(key(), json!({"a": 1})).await;
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn snapshot_replacement_clears_replay_buffer() {
        let hub = ResourceHub::default();
        let (conn, mut rx) = make_connection("c1");
        hub.add_connection(conn.clone()).await;
        let _ = hub.put_snapshot(key(), json!({"n": 0})).await;
        let _ = hub.apply_patch(&key(), json!({"n": 1})).await.unwrap();
        let _ = hub.put_snapshot(key(), json!({"n": 10})).await;

        // Version 1 existed, but continuity was broken by the replacement.
        hub.subscribe(&conn, key(), Some(1)).await;
        let frame = parse(&rx.recv().await.unwrap());
        assert!(matches!(frame, ServerFrame::ResourceSnapshot { .. }));
    }

    // ── Workspace broadcasts ────────────────────────────────────────

    #[tokio::test]
    async fn workspace_event_respects_scope() {
        let hub = ResourceHub::default();
        let (scoped_match, mut rx1) = make_connection("c1");
        let (scoped_other, mut rx2) = make_connection("c2");
        let (unscoped, mut rx3) = make_connection("c3");
        scoped_match.bind_workspace("w1".into());
        scoped_other.bind_workspace("w2".into());
        hub.add_connection(scoped_match).await;
        hub.add_connection(scoped_other).await;
        hub.add_connection(unscoped).await;

        hub.broadcast_workspace(&ServerFrame::WorkspaceUpdated {
            workspace_id: "w1".into(),
        })
        .await;

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());
        assert!(rx3.try_recv().is_ok());
    }

    #[tokio::test]
    async fn workspaces_changed_reaches_everyone() {
        let hub = ResourceHub::default();
        let (a, mut rx1) = make_connection("c1");
        let (b, mut rx2) = make_connection("c2");
        a.bind_workspace("w1".into());
        hub.add_connection(a).await;
        hub.add_connection(b).await;

        hub.broadcast_workspace(&ServerFrame::WorkspacesChanged).await;
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[tokio::test]
    async fn resource_frames_rejected_by_workspace_broadcast() {
        let hub = ResourceHub::default();
        let (conn, mut rx) = make_connection("c1");
        let _ = conn.subscribe(key());
        hub.add_connection(conn).await;

        hub.broadcast_workspace(&ServerFrame::ResourceUpdated {
            resource_type: "idea".into(),
            resource_id: "idea-123".into(),
            data: json!({}),
        })
        .await;
        assert!(rx.try_recv().is_err());
    }
}
