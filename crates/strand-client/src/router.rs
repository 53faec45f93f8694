//! Inbound frame routing.
//!
//! Decodes server frames, drops malformed ones without touching the
//! connection, filters out frames for resources with no standing
//! subscription, and dispatches the rest to the reconciler and store.

use serde_json::Value;
use tracing::{debug, warn};

use strand_bus::BusSink;
use strand_protocol::{ClientFrame, Delta, ResourceKey, ServerFrame, apply_delta};

use crate::reconciler::{self, DeltaDecision};
use crate::registry::SubscriptionRegistry;
use crate::store::ResourceStore;

/// Workspace-list invalidation signal, forwarded to the external CRUD
/// collaborator which refetches the enclosing list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkspaceSignal {
    /// A workspace was created.
    Created(String),
    /// A workspace was updated.
    Updated(String),
    /// A workspace was deleted.
    Deleted(String),
    /// The list changed in some unspecified way.
    Changed,
}

/// Receiver for workspace-list signals; these are outside the sync core's
/// state machine.
pub trait WorkspaceEvents: Send + Sync {
    /// A workspace-level broadcast arrived; refetch the list.
    fn workspace_changed(&self, signal: WorkspaceSignal);
}

/// Route one inbound text payload.
///
/// Returns a follow-up frame to send (a snapshot request when the
/// reconciler detects divergence), or `None`.
pub(crate) fn route(
    text: &str,
    registry: &SubscriptionRegistry,
    store: &mut ResourceStore,
    bus: &dyn BusSink,
    listener: Option<&dyn WorkspaceEvents>,
) -> Option<ClientFrame> {
    let frame = match ServerFrame::decode(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "dropping undecodable frame");
            return None;
        }
    };

    match frame {
        ServerFrame::ResourceSnapshot {
            resource_type,
            resource_id,
            data,
            version,
        } => {
            let key = ResourceKey::new(resource_type, resource_id);
            if !subscribed(registry, &key) {
                return None;
            }
            store.put(key.clone(), version, data);
            let _ = store.publish_current(&key, bus);
            None
        }
        ServerFrame::ResourceDelta {
            resource_type,
            resource_id,
            delta,
        } => {
            let key = ResourceKey::new(resource_type, resource_id);
            if !subscribed(registry, &key) {
                return None;
            }
            route_delta(&key, &delta, store, bus)
        }
        ServerFrame::ResourceUpdated {
            resource_type,
            resource_id,
            data,
        } => {
            let key = ResourceKey::new(resource_type, resource_id);
            if !subscribed(registry, &key) {
                return None;
            }
            route_partial_update(&key, &data, store, bus);
            None
        }
        ServerFrame::WorkspaceCreated { workspace_id } => {
            notify(listener, WorkspaceSignal::Created(workspace_id));
            None
        }
        ServerFrame::WorkspaceUpdated { workspace_id } => {
            notify(listener, WorkspaceSignal::Updated(workspace_id));
            None
        }
        ServerFrame::WorkspaceDeleted { workspace_id } => {
            notify(listener, WorkspaceSignal::Deleted(workspace_id));
            None
        }
        ServerFrame::WorkspacesChanged => {
            notify(listener, WorkspaceSignal::Changed);
            None
        }
    }
}

fn subscribed(registry: &SubscriptionRegistry, key: &ResourceKey) -> bool {
    if registry.contains(key) {
        true
    } else {
        debug!(resource = %key, "frame for unsubscribed resource dropped");
        false
    }
}

fn route_delta(
    key: &ResourceKey,
    delta: &Delta,
    store: &mut ResourceStore,
    bus: &dyn BusSink,
) -> Option<ClientFrame> {
    match reconciler::decide(store.version(key), delta) {
        DeltaDecision::Apply => {
            // decide() only returns Apply when state exists.
            let prior = store.get(key)?;
            let next = apply_delta(&prior.data, delta);
            store.put(key.clone(), delta.version, next);
            let _ = store.publish_current(key, bus);
            None
        }
        DeltaDecision::Resync => {
            debug!(
                resource = %key,
                base_version = delta.base_version,
                local_version = ?store.version(key),
                "delta diverged, requesting snapshot"
            );
            Some(ClientFrame::subscribe_resource(key, None))
        }
    }
}

fn route_partial_update(key: &ResourceKey, patch: &Value, store: &mut ResourceStore, bus: &dyn BusSink) {
    if store.merge_unversioned(key, patch) {
        let _ = store.publish_current(key, bus);
    } else {
        debug!(resource = %key, "partial update with no local state dropped");
    }
}

fn notify(listener: Option<&dyn WorkspaceEvents>, signal: WorkspaceSignal) {
    if let Some(listener) = listener {
        listener.workspace_changed(signal);
    }
}
