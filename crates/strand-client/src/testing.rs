//! In-memory doubles for the transport and bus seams, so provider behavior
//! can be driven without sockets. Also used by downstream integration tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use strand_bus::BusSink;
use strand_protocol::{ClientFrame, ServerFrame};

use crate::errors::ClientError;
use crate::router::{WorkspaceEvents, WorkspaceSignal};
use crate::transport::{ConnectionRx, ConnectionTx, Connector};

/// Channel-backed connector. Each successful `connect` hands the test a
/// [`MemoryServerEnd`] through the acceptor channel.
pub struct MemoryConnector {
    accept_tx: mpsc::UnboundedSender<MemoryServerEnd>,
    attempts: AtomicUsize,
    refuse: AtomicBool,
}

impl MemoryConnector {
    /// Create a connector and the acceptor the test reads server ends from.
    pub fn pair() -> (Arc<Self>, mpsc::UnboundedReceiver<MemoryServerEnd>) {
        let (accept_tx, accept_rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            accept_tx,
            attempts: AtomicUsize::new(0),
            refuse: AtomicBool::new(false),
        });
        (connector, accept_rx)
    }

    /// Total `connect` calls so far, successful or refused.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Make subsequent attempts fail with a transport error.
    pub fn set_refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(
        &self,
        _url: &str,
    ) -> Result<(Box<dyn ConnectionTx>, Box<dyn ConnectionRx>), ClientError> {
        let _ = self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(ClientError::Transport("connection refused".into()));
        }
        let (client_tx, server_rx) = mpsc::unbounded_channel();
        let (server_tx, client_rx) = mpsc::unbounded_channel();
        let server_end = MemoryServerEnd {
            inbound: server_rx,
            to_client: server_tx,
        };
        self.accept_tx
            .send(server_end)
            .map_err(|_| ClientError::Transport("acceptor dropped".into()))?;
        Ok((
            Box::new(MemoryTx { tx: client_tx }),
            Box::new(MemoryRx { rx: client_rx }),
        ))
    }
}

/// The server side of one in-memory connection.
pub struct MemoryServerEnd {
    inbound: mpsc::UnboundedReceiver<ClientFrame>,
    to_client: mpsc::UnboundedSender<String>,
}

impl MemoryServerEnd {
    /// Push a server frame to the client.
    pub fn send_frame(&self, frame: &ServerFrame) {
        if let Ok(text) = frame.encode() {
            let _ = self.to_client.send(text);
        }
    }

    /// Push raw text to the client (for malformed-frame tests).
    pub fn send_text(&self, text: &str) {
        let _ = self.to_client.send(text.to_owned());
    }

    /// Await the next frame the client sent.
    pub async fn recv_frame(&mut self) -> Option<ClientFrame> {
        self.inbound.recv().await
    }

    /// Non-blocking read of the next client frame.
    pub fn try_recv_frame(&mut self) -> Option<ClientFrame> {
        self.inbound.try_recv().ok()
    }

    /// Drop the connection, as a server-side close.
    pub fn disconnect(self) {}
}

struct MemoryTx {
    tx: mpsc::UnboundedSender<ClientFrame>,
}

#[async_trait]
impl ConnectionTx for MemoryTx {
    async fn send(&mut self, frame: ClientFrame) -> Result<(), ClientError> {
        self.tx
            .send(frame)
            .map_err(|_| ClientError::Transport("peer closed".into()))
    }

    async fn close(&mut self) {}
}

struct MemoryRx {
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl ConnectionRx for MemoryRx {
    async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

/// Bus sink that records every publish.
#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<(Vec<String>, Value)>>,
}

impl RecordingSink {
    /// All `(path, value)` pairs published so far, in order.
    pub fn published(&self) -> Vec<(Vec<String>, Value)> {
        self.records.lock().clone()
    }
}

impl BusSink for RecordingSink {
    fn publish(&self, path: &[String], value: &Value) {
        self.records.lock().push((path.to_vec(), value.clone()));
    }
}

/// Workspace listener that records every signal.
#[derive(Default)]
pub struct RecordingListener {
    signals: Mutex<Vec<WorkspaceSignal>>,
}

impl RecordingListener {
    /// All signals received so far, in order.
    pub fn signals(&self) -> Vec<WorkspaceSignal> {
        self.signals.lock().clone()
    }
}

impl WorkspaceEvents for RecordingListener {
    fn workspace_changed(&self, signal: WorkspaceSignal) {
        self.signals.lock().push(signal);
    }
}
