//! `StrandServer` — Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use strand_protocol::ResourceKey;

use crate::config::ServerConfig;
use crate::errors::HubError;
use crate::health::HealthResponse;
use crate::hub::ResourceHub;
use crate::session::{SessionIdentity, run_ws_session};
use crate::shutdown::ShutdownCoordinator;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Authoritative resource hub.
    pub hub: Arc<ResourceHub>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Server configuration.
    pub config: ServerConfig,
}

/// The main Strand server.
pub struct StrandServer {
    config: ServerConfig,
    hub: Arc<ResourceHub>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl StrandServer {
    /// Create a new server.
    pub fn new(config: ServerConfig) -> Self {
        let hub = Arc::new(ResourceHub::new(config.delta_buffer));
        Self {
            config,
            hub,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            hub: self.hub.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            config: self.config.clone(),
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/ws", get(ws_handler))
            .route(
                "/resources/{resourceType}/{resourceId}",
                get(get_resource)
                    .put(put_resource)
                    .patch(patch_resource)
                    .delete(delete_resource),
            )
            .route(
                "/resources/{resourceType}/{resourceId}/touch",
                post(touch_resource),
            )
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind and serve until the shutdown token fires.
    ///
    /// Returns the bound address (useful with port 0) and the serve task's
    /// handle.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener =
            tokio::net::TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let addr = listener.local_addr()?;
        let app = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, app)
                .with_graceful_shutdown(token.cancelled_owned())
                .await;
            if let Err(e) = serve {
                tracing::error!(error = %e, "server error");
            }
        });
        info!(%addr, "listening");
        Ok((addr, handle))
    }

    /// The resource hub (the CRUD layer mutates resources through this).
    pub fn hub(&self) -> &Arc<ResourceHub> {
        &self.hub
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// The server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.hub.connection_count().await;
    let resources = state.hub.resource_count().await;
    Json(HealthResponse::gather(state.start_time, connections, resources))
}

/// GET /ws — WebSocket upgrade.
async fn ws_handler(
    State(state): State<AppState>,
    Query(identity): Query<SessionIdentity>,
    ws: WebSocketUpgrade,
) -> Response {
    if state.hub.connection_count().await >= state.config.max_connections {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let ping_interval = Duration::from_secs(state.config.heartbeat_interval_secs);
    let pong_timeout = Duration::from_secs(state.config.heartbeat_timeout_secs);
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| {
            run_ws_session(socket, identity, state.hub, ping_interval, pong_timeout)
        })
}

/// GET /resources/{type}/{id}
async fn get_resource(
    State(state): State<AppState>,
    Path((resource_type, resource_id)): Path<(String, String)>,
) -> Response {
    let key = ResourceKey::new(resource_type, resource_id);
    match state.hub.get(&key).await {
        Some((version, data)) => {
            Json(json!({"version": version, "data": data})).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// PUT /resources/{type}/{id} — create or replace, broadcasting a snapshot.
async fn put_resource(
    State(state): State<AppState>,
    Path((resource_type, resource_id)): Path<(String, String)>,
    Json(data): Json<Value>,
) -> Response {
    let key = ResourceKey::new(resource_type, resource_id);
    let version = state.hub.put_snapshot(key, data).await;
    Json(json!({"version": version})).into_response()
}

/// PATCH /resources/{type}/{id} — versioned patch, broadcasting a delta.
async fn patch_resource(
    State(state): State<AppState>,
    Path((resource_type, resource_id)): Path<(String, String)>,
    Json(patch): Json<Value>,
) -> Response {
    let key = ResourceKey::new(resource_type, resource_id);
    match state.hub.apply_patch(&key, patch).await {
        Ok(version) => Json(json!({"version": version})).into_response(),
        Err(HubError::NotFound(_)) => StatusCode::NOT_FOUND.into_response(),
    }
}

/// POST /resources/{type}/{id}/touch — un-versioned partial update.
async fn touch_resource(
    State(state): State<AppState>,
    Path((resource_type, resource_id)): Path<(String, String)>,
    Json(patch): Json<Value>,
) -> Response {
    let key = ResourceKey::new(resource_type, resource_id);
    match state.hub.touch(&key, patch).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(HubError::NotFound(_)) => StatusCode::NOT_FOUND.into_response(),
    }
}

/// DELETE /resources/{type}/{id}
async fn delete_resource(
    State(state): State<AppState>,
    Path((resource_type, resource_id)): Path<(String, String)>,
) -> Response {
    let key = ResourceKey::new(resource_type, resource_id);
    if state.hub.remove(&key).await {
        StatusCode::NO_CONTENT.into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}
