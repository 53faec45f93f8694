//! Client↔server wire frames.
//!
//! Both directions are tagged unions over a `type` string, one variant per
//! logical action, with camelCase field names on the wire.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::delta::Delta;
use crate::errors::ProtocolError;
use crate::key::ResourceKey;

/// Client → server frames.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Scope the connection to a workspace.
    #[serde(rename_all = "camelCase")]
    Subscribe {
        /// Workspace to scope broadcasts to.
        workspace_id: String,
    },

    /// Request a snapshot (`from_version` absent) or a delta stream
    /// starting after `from_version`.
    #[serde(rename_all = "camelCase")]
    SubscribeResource {
        /// Resource type.
        resource_type: String,
        /// Resource id.
        resource_id: String,
        /// Last version known locally; omitted to request a full snapshot.
        #[serde(skip_serializing_if = "Option::is_none")]
        from_version: Option<u64>,
    },

    /// Drop interest in a resource.
    #[serde(rename_all = "camelCase")]
    UnsubscribeResource {
        /// Resource type.
        resource_type: String,
        /// Resource id.
        resource_id: String,
    },
}

/// Server → client frames.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Full authoritative state of one resource.
    #[serde(rename_all = "camelCase")]
    ResourceSnapshot {
        /// Resource type.
        resource_type: String,
        /// Resource id.
        resource_id: String,
        /// Full resource value.
        data: Value,
        /// Authoritative version.
        version: u64,
    },

    /// Incremental change anchored to a specific prior version.
    #[serde(rename_all = "camelCase")]
    ResourceDelta {
        /// Resource type.
        resource_type: String,
        /// Resource id.
        resource_id: String,
        /// The change itself.
        delta: Delta,
    },

    /// Un-versioned partial patch; merged shallowly without touching the
    /// version counter.
    #[serde(rename_all = "camelCase")]
    ResourceUpdated {
        /// Resource type.
        resource_type: String,
        /// Resource id.
        resource_id: String,
        /// Partial field overwrites.
        data: Value,
    },

    /// A workspace was created.
    #[serde(rename_all = "camelCase")]
    WorkspaceCreated {
        /// Affected workspace.
        workspace_id: String,
    },

    /// A workspace was updated.
    #[serde(rename_all = "camelCase")]
    WorkspaceUpdated {
        /// Affected workspace.
        workspace_id: String,
    },

    /// A workspace was deleted.
    #[serde(rename_all = "camelCase")]
    WorkspaceDeleted {
        /// Affected workspace.
        workspace_id: String,
    },

    /// The workspace list changed in some unspecified way.
    WorkspacesChanged,
}

impl ClientFrame {
    /// Build a `subscribe_resource` frame for a key.
    pub fn subscribe_resource(key: &ResourceKey, from_version: Option<u64>) -> Self {
        Self::SubscribeResource {
            resource_type: key.resource_type.clone(),
            resource_id: key.resource_id.clone(),
            from_version,
        }
    }

    /// Build an `unsubscribe_resource` frame for a key.
    pub fn unsubscribe_resource(key: &ResourceKey) -> Self {
        Self::UnsubscribeResource {
            resource_type: key.resource_type.clone(),
            resource_id: key.resource_id.clone(),
        }
    }

    /// Serialize to wire JSON.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// Parse from wire JSON.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }
}

impl ServerFrame {
    /// Serialize to wire JSON.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// Parse from wire JSON.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }

    /// The resource key this frame targets, for the three resource-scoped
    /// kinds; workspace-level frames return `None`.
    pub fn resource_key(&self) -> Option<ResourceKey> {
        match self {
            Self::ResourceSnapshot {
                resource_type,
                resource_id,
                ..
            }
            | Self::ResourceDelta {
                resource_type,
                resource_id,
                ..
            }
            | Self::ResourceUpdated {
                resource_type,
                resource_id,
                ..
            } => Some(ResourceKey::new(resource_type.clone(), resource_id.clone())),
            _ => None,
        }
    }
}
