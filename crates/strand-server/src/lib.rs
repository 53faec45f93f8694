//! # strand-server
//!
//! The authoritative counterpart of the sync protocol:
//!
//! - Axum HTTP + `WebSocket` gateway with per-connection heartbeat
//! - Resource hub: `{version, data}` per resource, strictly increasing and
//!   gapless delta minting, bounded delta replay buffer
//! - Per-connection subscription filtering and workspace-scoped broadcasts
//! - A small REST surface standing in for the CRUD collaborator that owns
//!   resource data
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod errors;
pub mod health;
pub mod hub;
pub mod server;
pub mod session;
pub mod shutdown;

pub use config::ServerConfig;
pub use errors::HubError;
pub use hub::ResourceHub;
pub use server::StrandServer;
pub use shutdown::ShutdownCoordinator;
