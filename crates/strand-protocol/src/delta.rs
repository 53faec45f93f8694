//! Version-anchored incremental changes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::merge::shallow_merge;

/// An incremental change computed against a specific prior version.
///
/// Applying a delta is only defined when `base_version` equals the holder's
/// current version for the resource; callers gate on that before calling
/// [`apply_delta`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delta {
    /// The version this delta was computed from.
    pub base_version: u64,
    /// The version after applying this delta.
    pub version: u64,
    /// Opaque change payload (an object of field overwrites).
    pub ops: Value,
}

impl Delta {
    /// Create a delta.
    pub fn new(base_version: u64, version: u64, ops: Value) -> Self {
        Self {
            base_version,
            version,
            ops,
        }
    }

    /// A delta must advance the version.
    pub fn is_well_formed(&self) -> bool {
        self.version > self.base_version
    }
}

/// Apply a delta to the prior data, yielding the new data.
///
/// Only valid when `delta.base_version` equals the current version of the
/// data being patched; the caller owns that check.
pub fn apply_delta(prior: &Value, delta: &Delta) -> Value {
    shallow_merge(prior, &delta.ops)
}
