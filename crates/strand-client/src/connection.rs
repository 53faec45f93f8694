//! Connection lifecycle — exactly one live link per provider, with an epoch
//! counter as the staleness guard.
//!
//! Each connection attempt gets a fresh epoch. Every event a link task emits
//! carries its epoch, so a close handler firing after a newer link has
//! replaced it is recognized as stale and ignored.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use strand_protocol::ClientFrame;

use crate::transport::Connector;

/// Event emitted by a link task back to the provider driver.
#[derive(Debug)]
pub(crate) struct LinkEvent {
    /// Epoch of the link that produced this event.
    pub epoch: u64,
    /// What happened.
    pub kind: LinkEventKind,
}

/// Kinds of link events.
#[derive(Debug)]
pub(crate) enum LinkEventKind {
    /// The connection attempt succeeded.
    Opened,
    /// A text payload arrived.
    Inbound(String),
    /// The connection closed (or the attempt failed).
    Closed,
}

/// Phase of the current link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum LinkPhase {
    /// No link.
    Idle,
    /// An attempt is in flight.
    Connecting,
    /// The connection is established.
    Open,
}

/// The provider's handle on its single connection.
#[derive(Debug)]
pub(crate) struct Link {
    epoch: u64,
    phase: LinkPhase,
    out_tx: Option<mpsc::UnboundedSender<ClientFrame>>,
}

impl Link {
    pub fn new() -> Self {
        Self {
            epoch: 0,
            phase: LinkPhase::Idle,
            out_tx: None,
        }
    }

    /// Whether an attempt is pending or a connection is established.
    pub fn is_busy(&self) -> bool {
        self.phase != LinkPhase::Idle
    }

    /// Whether frames can be sent right now.
    pub fn is_open(&self) -> bool {
        self.phase == LinkPhase::Open
    }

    /// Whether an event belongs to the current link.
    pub fn is_current(&self, epoch: u64) -> bool {
        epoch == self.epoch
    }

    /// Start a new connection attempt. Caller checks [`Link::is_busy`].
    pub fn open(
        &mut self,
        connector: Arc<dyn Connector>,
        url: String,
        events: mpsc::UnboundedSender<LinkEvent>,
    ) {
        self.epoch += 1;
        self.phase = LinkPhase::Connecting;
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        self.out_tx = Some(out_tx);
        let epoch = self.epoch;
        drop(tokio::spawn(run_link(epoch, connector, url, out_rx, events)));
    }

    /// Transition `Connecting` → `Open`. Returns `false` when the link was
    /// torn down in the interim (the open is stale).
    pub fn mark_open(&mut self) -> bool {
        if self.phase == LinkPhase::Connecting {
            self.phase = LinkPhase::Open;
            true
        } else {
            false
        }
    }

    /// The current link closed. Returns `false` when already idle.
    pub fn mark_closed(&mut self) -> bool {
        if self.phase == LinkPhase::Idle {
            return false;
        }
        self.phase = LinkPhase::Idle;
        self.out_tx = None;
        true
    }

    /// Tear down the current link, if any. Dropping the outbound sender
    /// makes the link task close the socket and exit.
    pub fn close(&mut self) {
        self.phase = LinkPhase::Idle;
        self.out_tx = None;
    }

    /// Send a frame over an open link. Returns `false` when not open.
    pub fn send(&self, frame: ClientFrame) -> bool {
        if self.phase != LinkPhase::Open {
            return false;
        }
        match &self.out_tx {
            Some(tx) => tx.send(frame).is_ok(),
            None => false,
        }
    }
}

/// One connection's I/O loop: connect, report open, pump frames both ways,
/// report close. Runs as its own task so a slow connect never blocks the
/// driver.
async fn run_link(
    epoch: u64,
    connector: Arc<dyn Connector>,
    url: String,
    mut out_rx: mpsc::UnboundedReceiver<ClientFrame>,
    events: mpsc::UnboundedSender<LinkEvent>,
) {
    let (mut tx, mut rx) = match connector.connect(&url).await {
        Ok(pair) => pair,
        Err(e) => {
            warn!(error = %e, "connection attempt failed");
            let _ = events.send(LinkEvent {
                epoch,
                kind: LinkEventKind::Closed,
            });
            return;
        }
    };

    if events
        .send(LinkEvent {
            epoch,
            kind: LinkEventKind::Opened,
        })
        .is_err()
    {
        // Driver is gone; nothing to pump for.
        tx.close().await;
        return;
    }

    loop {
        tokio::select! {
            outbound = out_rx.recv() => match outbound {
                Some(frame) => {
                    if let Err(e) = tx.send(frame).await {
                        warn!(error = %e, "outbound send failed");
                        break;
                    }
                }
                None => {
                    // The driver dropped this link; close gracefully.
                    debug!(epoch, "link released, closing");
                    tx.close().await;
                    break;
                }
            },
            inbound = rx.recv() => match inbound {
                Some(text) => {
                    if events
                        .send(LinkEvent { epoch, kind: LinkEventKind::Inbound(text) })
                        .is_err()
                    {
                        return;
                    }
                }
                None => break,
            },
        }
    }

    let _ = events.send(LinkEvent {
        epoch,
        kind: LinkEventKind::Closed,
    });
}
