//! WebSocket session lifecycle — handles a single connected client from
//! upgrade through disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use strand_protocol::{ClientFrame, ResourceKey};

use crate::connection::ClientConnection;
use crate::hub::ResourceHub;

/// Session identity parsed from the connection URL query parameters
/// (`userId`, `userName`, `userColor`). Missing parameters fall back to an
/// anonymous identity; no further authentication happens at this layer.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionIdentity {
    /// Stable user id.
    pub user_id: String,
    /// Display name.
    pub user_name: String,
    /// Presence color (hex).
    pub user_color: String,
}

impl Default for SessionIdentity {
    fn default() -> Self {
        Self {
            user_id: "anonymous".into(),
            user_name: "Anonymous".into(),
            user_color: "#808080".into(),
        }
    }
}

/// Run a WebSocket session for a connected client.
///
/// 1. Registers the connection with the hub
/// 2. Forwards outbound frames via the send channel, pinging periodically
///    and disconnecting unresponsive clients
/// 3. Dispatches inbound frames (`subscribe`, `subscribe_resource`,
///    `unsubscribe_resource`); malformed frames are logged and dropped
/// 4. Cleans up on disconnect
#[instrument(skip_all, fields(conn_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    identity: SessionIdentity,
    hub: Arc<ResourceHub>,
    ping_interval: Duration,
    pong_timeout: Duration,
) {
    let conn_id = format!("conn_{}", Uuid::now_v7());
    let _ = tracing::Span::current().record("conn_id", conn_id.as_str());

    let (mut ws_tx, mut ws_rx) = ws.split();
    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(1024);
    let connection = Arc::new(ClientConnection::new(
        conn_id.clone(),
        identity.clone(),
        send_tx,
    ));

    info!(user_id = %identity.user_id, "client connected");
    hub.add_connection(connection.clone()).await;

    // Outbound forwarder with periodic pings.
    let outbound_conn = connection.clone();
    let outbound = tokio::spawn(async move {
        let mut ping = tokio::time::interval(ping_interval);
        // Skip the immediate first tick.
        let _ = ping.tick().await;

        loop {
            tokio::select! {
                message = send_rx.recv() => {
                    match message {
                        Some(text) => {
                            if ws_tx.send(Message::Text(text.as_str().into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping.tick() => {
                    if !outbound_conn.check_alive() && outbound_conn.idle_for() > pong_timeout {
                        warn!("client unresponsive for {pong_timeout:?}, disconnecting");
                        break;
                    }
                    if ws_tx.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Process incoming messages.
    while let Some(Ok(message)) = ws_rx.next().await {
        let text = match message {
            Message::Text(ref text) => Some(text.to_string()),
            Message::Binary(ref data) => match std::str::from_utf8(data) {
                Ok(text) => Some(text.to_owned()),
                Err(_) => {
                    debug!(len = data.len(), "received non-UTF8 binary frame");
                    None
                }
            },
            Message::Close(_) => {
                debug!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {
                connection.mark_alive();
                None
            }
        };

        let Some(text) = text else { continue };
        connection.mark_alive();

        match ClientFrame::decode(&text) {
            Ok(frame) => dispatch(frame, &connection, &hub).await,
            Err(e) => {
                // A bad frame never tears the connection down.
                warn!(error = %e, "dropping undecodable frame");
            }
        }
    }

    info!(
        subscriptions = connection.subscription_count(),
        dropped = connection.drop_count(),
        "client disconnected"
    );
    outbound.abort();
    hub.remove_connection(&conn_id).await;
}

async fn dispatch(frame: ClientFrame, connection: &Arc<ClientConnection>, hub: &ResourceHub) {
    match frame {
        ClientFrame::Subscribe { workspace_id } => {
            debug!(workspace_id, "workspace scope bound");
            connection.bind_workspace(workspace_id);
        }
        ClientFrame::SubscribeResource {
            resource_type,
            resource_id,
            from_version,
        } => {
            let key = ResourceKey::new(resource_type, resource_id);
            debug!(resource = %key, ?from_version, "resource subscribed");
            hub.subscribe(connection, key, from_version).await;
        }
        ClientFrame::UnsubscribeResource {
            resource_type,
            resource_id,
        } => {
            let key = ResourceKey::new(resource_type, resource_id);
            debug!(resource = %key, "resource unsubscribed");
            hub.unsubscribe(connection, &key).await;
        }
    }
}
