//! Shallow JSON merge shared by delta application and the un-versioned
//! partial-update path.

use serde_json::Value;

/// Shallow field overwrite of `patch` into `prior`.
///
/// - When both values are objects, each top-level key of `patch` replaces
///   the corresponding key of `prior` (nested objects are replaced, not
///   merged)
/// - `null` values in `patch` overwrite; they do not delete the key
/// - When either side is not an object, `patch` replaces `prior` wholesale
pub fn shallow_merge(prior: &Value, patch: &Value) -> Value {
    match (prior, patch) {
        (Value::Object(prior_map), Value::Object(patch_map)) => {
            let mut merged = prior_map.clone();
            for (key, value) in patch_map {
                let _ = merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        (_, patch) => patch.clone(),
    }
}
