//! Graceful shutdown.
//!
//! One `CancellationToken` is shared with every long-lived task; the
//! coordinator cancels it and then waits, bounded, for the tasks that
//! registered their handles.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Owns the shutdown token and the handles to wait on.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    tracked: Mutex<Vec<JoinHandle<()>>>,
}

impl ShutdownCoordinator {
    /// A coordinator with nothing tracked yet.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            tracked: Mutex::new(Vec::new()),
        }
    }

    /// Token for tasks to select on.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Add a task handle to wait on during [`ShutdownCoordinator::drain`].
    pub fn register(&self, handle: JoinHandle<()>) {
        self.tracked.lock().push(handle);
    }

    /// Cancel the token. Idempotent; does not wait.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel and wait up to `grace` for every registered task.
    ///
    /// Tasks that outlive the grace period are left running and logged;
    /// the process is usually about to exit anyway.
    pub async fn drain(&self, grace: Duration) {
        self.shutdown();
        let tracked: Vec<_> = std::mem::take(&mut *self.tracked.lock());
        info!(tasks = tracked.len(), grace_secs = grace.as_secs(), "draining");
        let all = futures::future::join_all(tracked);
        if tokio::time::timeout(grace, all).await.is_err() {
            warn!("drain exceeded {grace:?}; abandoning remaining tasks");
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_is_idempotent_and_observable() {
        let coordinator = ShutdownCoordinator::new();
        assert!(!coordinator.is_shutting_down());
        coordinator.shutdown();
        coordinator.shutdown();
        assert!(coordinator.is_shutting_down());
    }

    #[test]
    fn every_token_clone_sees_the_cancel() {
        let coordinator = ShutdownCoordinator::new();
        let a = coordinator.token();
        let b = coordinator.token();
        coordinator.shutdown();
        assert!(a.is_cancelled() && b.is_cancelled());
    }

    #[tokio::test]
    async fn drain_joins_cooperative_tasks() {
        let coordinator = ShutdownCoordinator::new();
        let token = coordinator.token();
        coordinator.register(tokio::spawn(async move { token.cancelled().await }));
        coordinator.drain(Duration::from_secs(1)).await;
        assert!(coordinator.is_shutting_down());
    }

    #[tokio::test]
    async fn drain_gives_up_on_stuck_tasks() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.register(tokio::spawn(std::future::pending()));
        // Must return despite the task that never finishes.
        coordinator.drain(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn drain_with_nothing_registered() {
        let coordinator = ShutdownCoordinator::default();
        coordinator.drain(Duration::from_millis(10)).await;
        assert!(coordinator.is_shutting_down());
    }
}
