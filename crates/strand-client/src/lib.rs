//! # strand-client
//!
//! The sync provider: keeps local copies of server-held resources eventually
//! consistent over a single WebSocket connection and publishes every accepted
//! change to the local data bus.
//!
//! - **Connection manager**: one live connection per provider, fixed-delay
//!   reconnect, epoch-tagged staleness guard
//! - **Subscription registry**: idempotent interest bookkeeping, replayed on
//!   every reconnect with per-resource `fromVersion`
//! - **Message router**: decodes inbound frames, drops malformed or
//!   unsubscribed ones, dispatches the rest
//! - **Reconciler**: applies a delta only when its `baseVersion` matches the
//!   stored version; any gap forces a snapshot refetch
//! - **Resource store**: `{version, data}` per key, single writer to the bus

#![deny(unsafe_code)]

pub mod config;
mod connection;
pub mod errors;
pub mod provider;
pub mod reconciler;
pub mod registry;
pub mod router;
pub mod store;
pub mod testing;
pub mod transport;

pub use config::ClientConfig;
pub use errors::ClientError;
pub use provider::SyncProvider;
pub use reconciler::DeltaDecision;
pub use router::{WorkspaceEvents, WorkspaceSignal};
pub use transport::{ConnectionRx, ConnectionTx, Connector, WsConnector};
