//! Per-client connection state.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use strand_protocol::{ResourceKey, ServerFrame};

use crate::session::SessionIdentity;

/// Ping/pong liveness tracking for one connection.
struct Heartbeat {
    /// Cleared by each ping check, set again by any client activity.
    responsive: AtomicBool,
    /// Last time the client showed any sign of life.
    last_seen: Mutex<Instant>,
}

/// One connected sync client, shared between the hub and its session task.
///
/// Everything here is interior-mutable so the hub can fan frames out while
/// the session task mutates subscriptions.
pub struct ClientConnection {
    /// Unique connection id (`conn_<uuid>`).
    pub id: String,
    /// Identity the client presented in its connection URL.
    pub identity: SessionIdentity,
    workspace: Mutex<Option<String>>,
    subscriptions: Mutex<HashSet<ResourceKey>>,
    /// Outbound queue to the session's write half.
    tx: mpsc::Sender<Arc<String>>,
    heartbeat: Heartbeat,
    dropped: AtomicU64,
}

impl ClientConnection {
    /// Wrap a freshly accepted connection around its outbound queue.
    pub fn new(id: String, identity: SessionIdentity, tx: mpsc::Sender<Arc<String>>) -> Self {
        Self {
            id,
            identity,
            workspace: Mutex::new(None),
            subscriptions: Mutex::new(HashSet::new()),
            tx,
            heartbeat: Heartbeat {
                responsive: AtomicBool::new(true),
                last_seen: Mutex::new(Instant::now()),
            },
            dropped: AtomicU64::new(0),
        }
    }

    /// Bind (or rebind) the workspace scope for this connection.
    pub fn bind_workspace(&self, workspace_id: String) {
        *self.workspace.lock() = Some(workspace_id);
    }

    /// The bound workspace scope, if any.
    pub fn workspace(&self) -> Option<String> {
        self.workspace.lock().clone()
    }

    /// Record interest in a resource. `false` when already subscribed.
    pub fn subscribe(&self, key: ResourceKey) -> bool {
        self.subscriptions.lock().insert(key)
    }

    /// Drop interest in a resource. `false` when it was not subscribed.
    pub fn unsubscribe(&self, key: &ResourceKey) -> bool {
        self.subscriptions.lock().remove(key)
    }

    /// Whether this connection wants frames for a resource.
    pub fn is_subscribed(&self, key: &ResourceKey) -> bool {
        self.subscriptions.lock().contains(key)
    }

    /// How many resources this connection is subscribed to.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.lock().len()
    }

    /// Queue a pre-serialized frame. A full or closed queue drops the
    /// frame, counts it, and returns `false` — the hub never blocks on a
    /// slow client.
    pub fn send(&self, message: Arc<String>) -> bool {
        if self.tx.try_send(message).is_ok() {
            true
        } else {
            let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Serialize and queue one frame.
    pub fn send_frame(&self, frame: &ServerFrame) -> bool {
        frame
            .encode()
            .is_ok_and(|json| self.send(Arc::new(json)))
    }

    /// Frames dropped so far because the queue was unavailable.
    pub fn drop_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Note client activity (pong, or any inbound frame).
    pub fn mark_alive(&self) {
        self.heartbeat.responsive.store(true, Ordering::Relaxed);
        *self.heartbeat.last_seen.lock() = Instant::now();
    }

    /// Consume the responsive flag: `true` if the client did anything
    /// since the previous check.
    pub fn check_alive(&self) -> bool {
        self.heartbeat.responsive.swap(false, Ordering::Relaxed)
    }

    /// Time since the client last did anything.
    pub fn idle_for(&self) -> Duration {
        self.heartbeat.last_seen.lock().elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn connection(capacity: usize) -> (ClientConnection, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            ClientConnection::new("conn_t".into(), SessionIdentity::default(), tx),
            rx,
        )
    }

    #[tokio::test]
    async fn send_reaches_the_queue() {
        let (conn, mut rx) = connection(8);
        assert!(conn.send(Arc::new("ping".into())));
        assert_eq!(&**rx.recv().await.unwrap(), "ping");
        assert_eq!(conn.drop_count(), 0);
    }

    #[tokio::test]
    async fn full_queue_drops_and_counts() {
        let (conn, _rx) = connection(1);
        assert!(conn.send(Arc::new("first".into())));
        assert!(!conn.send(Arc::new("second".into())));
        assert!(!conn.send(Arc::new("third".into())));
        assert_eq!(conn.drop_count(), 2);
    }

    #[tokio::test]
    async fn closed_queue_drops() {
        let (conn, rx) = connection(8);
        drop(rx);
        assert!(!conn.send(Arc::new("into the void".into())));
        assert_eq!(conn.drop_count(), 1);
    }

    #[tokio::test]
    async fn send_frame_produces_wire_json() {
        let (conn, mut rx) = connection(8);
        assert!(conn.send_frame(&ServerFrame::ResourceSnapshot {
            resource_type: "idea".into(),
            resource_id: "i1".into(),
            data: json!({"a": 1}),
            version: 3,
        }));
        let raw = rx.recv().await.unwrap();
        let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(v["type"], "resource_snapshot");
        assert_eq!(v["version"], 3);
    }

    #[test]
    fn workspace_rebinds() {
        let (conn, _rx) = connection(1);
        assert!(conn.workspace().is_none());
        conn.bind_workspace("w1".into());
        conn.bind_workspace("w2".into());
        assert_eq!(conn.workspace().as_deref(), Some("w2"));
    }

    #[test]
    fn subscriptions_are_a_set() {
        let (conn, _rx) = connection(1);
        let key = ResourceKey::new("idea", "i1");
        assert!(conn.subscribe(key.clone()));
        assert!(!conn.subscribe(key.clone()));
        assert!(conn.is_subscribed(&key));
        assert_eq!(conn.subscription_count(), 1);
        assert!(conn.unsubscribe(&key));
        assert!(!conn.unsubscribe(&key));
        assert_eq!(conn.subscription_count(), 0);
    }

    #[test]
    fn heartbeat_flag_is_consumed_by_check() {
        let (conn, _rx) = connection(1);
        assert!(conn.check_alive());
        assert!(!conn.check_alive());
        conn.mark_alive();
        assert!(conn.check_alive());
        assert!(conn.idle_for() < Duration::from_secs(1));
    }
}
