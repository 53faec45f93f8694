//! The sync provider — public surface plus the single driver task that owns
//! all mutable state.
//!
//! The driver is the Rust rendition of the original single-threaded
//! event-loop model: one task owns the connection, the subscription
//! registry, and the resource store, and everything reaches it as either a
//! command from a [`SyncProvider`] handle or an event from the current link.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info};

use strand_bus::BusSink;
use strand_protocol::{ClientFrame, ResourceKey};

use crate::config::ClientConfig;
use crate::connection::{Link, LinkEvent, LinkEventKind};
use crate::errors::ClientError;
use crate::registry::SubscriptionRegistry;
use crate::router::{self, WorkspaceEvents};
use crate::store::ResourceStore;
use crate::transport::Connector;

enum Command {
    Activate { bus: Arc<dyn BusSink> },
    Deactivate { ack: oneshot::Sender<()> },
    Subscribe { key: ResourceKey },
    Unsubscribe { key: ResourceKey },
}

/// Handle to one sync provider instance.
///
/// Cheap to clone; all clones address the same driver task. The driver
/// exits when the last handle is dropped. Must be created inside a tokio
/// runtime.
#[derive(Clone)]
pub struct SyncProvider {
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl SyncProvider {
    /// Create a provider and spawn its driver task.
    pub fn new(config: ClientConfig, connector: Arc<dyn Connector>) -> Self {
        Self::spawn(config, connector, None)
    }

    /// Create a provider with a workspace-list listener attached.
    pub fn with_listener(
        config: ClientConfig,
        connector: Arc<dyn Connector>,
        listener: Arc<dyn WorkspaceEvents>,
    ) -> Self {
        Self::spawn(config, connector, Some(listener))
    }

    fn spawn(
        config: ClientConfig,
        connector: Arc<dyn Connector>,
        listener: Option<Arc<dyn WorkspaceEvents>>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let driver = Driver {
            config,
            connector,
            listener,
            active: false,
            bus: None,
            registry: SubscriptionRegistry::new(),
            store: ResourceStore::new(),
            link: Link::new(),
            events_tx,
            events_rx,
            cmd_rx,
            reconnect_at: None,
        };
        drop(tokio::spawn(driver.run()));
        Self { cmd_tx }
    }

    /// Activate the provider: store the bus sink and start connecting.
    /// Safe to call repeatedly; a pending or open connection is kept.
    pub fn activate(&self, bus: Arc<dyn BusSink>) -> Result<(), ClientError> {
        self.send(Command::Activate { bus })
    }

    /// Deactivate: cancel any pending reconnect, close the live connection,
    /// and clear all subscriptions and local state. Once this returns, no
    /// further bus publish happens. Idempotent.
    pub async fn deactivate(&self) -> Result<(), ClientError> {
        let (ack, done) = oneshot::channel();
        self.send(Command::Deactivate { ack })?;
        done.await.map_err(|_| ClientError::ProviderGone)
    }

    /// Declare standing interest in a resource. Idempotent.
    pub fn subscribe_resource(
        &self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Result<(), ClientError> {
        self.send(Command::Subscribe {
            key: ResourceKey::new(resource_type, resource_id),
        })
    }

    /// Drop interest in a resource and delete any local state for it.
    pub fn unsubscribe_resource(
        &self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Result<(), ClientError> {
        self.send(Command::Unsubscribe {
            key: ResourceKey::new(resource_type, resource_id),
        })
    }

    fn send(&self, command: Command) -> Result<(), ClientError> {
        self.cmd_tx
            .send(command)
            .map_err(|_| ClientError::ProviderGone)
    }
}

struct Driver {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    listener: Option<Arc<dyn WorkspaceEvents>>,
    active: bool,
    bus: Option<Arc<dyn BusSink>>,
    registry: SubscriptionRegistry,
    store: ResourceStore,
    link: Link,
    events_tx: mpsc::UnboundedSender<LinkEvent>,
    events_rx: mpsc::UnboundedReceiver<LinkEvent>,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    reconnect_at: Option<Instant>,
}

impl Driver {
    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.cmd_rx.recv() => match command {
                    Some(command) => self.handle_command(command),
                    // Every handle is gone; stop driving.
                    None => break,
                },
                Some(event) = self.events_rx.recv() => self.handle_link_event(event),
                () = wait_until(self.reconnect_at) => {
                    self.reconnect_at = None;
                    self.connect();
                }
            }
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Activate { bus } => {
                self.active = true;
                self.bus = Some(bus);
                self.connect();
            }
            Command::Deactivate { ack } => {
                self.deactivate();
                let _ = ack.send(());
            }
            Command::Subscribe { key } => self.subscribe(key),
            Command::Unsubscribe { key } => self.unsubscribe(&key),
        }
    }

    fn connect(&mut self) {
        if !self.active {
            debug!("connect ignored, provider inactive");
            return;
        }
        if self.link.is_busy() {
            debug!("connect ignored, connection pending or open");
            return;
        }
        debug!(url = %self.config.url, "connecting");
        self.link.open(
            self.connector.clone(),
            self.config.connection_url(),
            self.events_tx.clone(),
        );
    }

    fn deactivate(&mut self) {
        self.active = false;
        self.reconnect_at = None;
        self.link.close();
        self.registry.clear();
        self.store.clear();
        self.bus = None;
        debug!("provider deactivated");
    }

    fn subscribe(&mut self, key: ResourceKey) {
        if !self.registry.insert(key.clone()) {
            debug!(resource = %key, "already subscribed");
            return;
        }
        if self.link.is_open() {
            let from_version = self.store.version(&key);
            let _ = self
                .link
                .send(ClientFrame::subscribe_resource(&key, from_version));
        }
    }

    fn unsubscribe(&mut self, key: &ResourceKey) {
        if !self.registry.remove(key) {
            debug!(resource = %key, "not subscribed");
            return;
        }
        let _ = self.store.remove(key);
        if self.link.is_open() {
            let _ = self.link.send(ClientFrame::unsubscribe_resource(key));
        }
    }

    fn handle_link_event(&mut self, event: LinkEvent) {
        // A close handler may fire after a newer connection has replaced
        // the link; events from superseded epochs are ignored.
        if !self.link.is_current(event.epoch) {
            debug!(epoch = event.epoch, "stale link event ignored");
            return;
        }
        match event.kind {
            LinkEventKind::Opened => self.on_open(),
            LinkEventKind::Inbound(text) => self.on_inbound(&text),
            LinkEventKind::Closed => self.on_closed(),
        }
    }

    fn on_open(&mut self) {
        if !self.link.mark_open() {
            return;
        }
        info!(url = %self.config.url, subscriptions = self.registry.len(), "connection open");
        if let Some(workspace_id) = &self.config.workspace_id {
            let _ = self.link.send(ClientFrame::Subscribe {
                workspace_id: workspace_id.clone(),
            });
        }
        // Replay every standing subscription from its last known version.
        for key in self.registry.iter() {
            let _ = self
                .link
                .send(ClientFrame::subscribe_resource(key, self.store.version(key)));
        }
    }

    fn on_inbound(&mut self, text: &str) {
        if !self.active {
            // Frames already queued in the event loop when deactivate ran.
            return;
        }
        let Some(bus) = self.bus.clone() else {
            return;
        };
        let reply = router::route(
            text,
            &self.registry,
            &mut self.store,
            bus.as_ref(),
            self.listener.as_deref(),
        );
        if let Some(frame) = reply {
            let _ = self.link.send(frame);
        }
    }

    fn on_closed(&mut self) {
        if !self.link.mark_closed() {
            return;
        }
        if self.active {
            debug!(
                delay = ?self.config.reconnect_delay,
                "connection closed, scheduling reconnect"
            );
            self.reconnect_at = Some(Instant::now() + self.config.reconnect_delay);
        }
    }
}

/// Sleep until the deadline, or forever when there is none.
async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
