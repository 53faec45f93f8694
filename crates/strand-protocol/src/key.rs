//! Resource identity — the `(type, id)` pair every synchronizable object is
//! keyed by.

use serde::{Deserialize, Serialize};

/// Identifies one synchronizable resource.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceKey {
    /// Resource type (e.g. `"idea"`).
    pub resource_type: String,
    /// Resource id (e.g. `"idea-123"`).
    pub resource_id: String,
}

impl ResourceKey {
    /// Create a key from a type and id.
    pub fn new(resource_type: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
        }
    }

    /// Stable compound form used as a map key and log field, e.g.
    /// `"idea/idea-123"`.
    pub fn compound(&self) -> String {
        format!("{}/{}", self.resource_type, self.resource_id)
    }

    /// Data-bus publication path: pluralized type followed by the id, e.g.
    /// type `"idea"` and id `"idea-123"` publish to `["ideas", "idea-123"]`.
    pub fn bus_path(&self) -> Vec<String> {
        vec![pluralize(&self.resource_type), self.resource_id.clone()]
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.resource_type, self.resource_id)
    }
}

/// Naive English pluralization for bus-path segments.
///
/// Handles the trailing-sibilant `es` case and consonant-`y` → `ies`;
/// everything else gets a trailing `s`.
pub fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }
    let lower = word.to_lowercase();
    if lower.ends_with('s')
        || lower.ends_with('x')
        || lower.ends_with('z')
        || lower.ends_with("ch")
        || lower.ends_with("sh")
    {
        return format!("{word}es");
    }
    if let Some(stem) = word.strip_suffix('y') {
        let penultimate = stem.chars().last();
        let is_vowel = matches!(penultimate, Some('a' | 'e' | 'i' | 'o' | 'u'));
        if !is_vowel {
            return format!("{stem}ies");
        }
    }
    format!("{word}s")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compound_form() {
        let key = ResourceKey::new("idea", "idea-123");
        assert_eq!(key.compound(), "idea/idea-123");
    }

    #[test]
    fn display_matches_compound() {
        let key = ResourceKey::new("note", "n1");
        assert_eq!(key.to_string(), key.compound());
    }

    #[test]
    fn bus_path_pluralizes_type() {
        let key = ResourceKey::new("idea", "idea-123");
        assert_eq!(key.bus_path(), vec!["ideas".to_string(), "idea-123".to_string()]);
    }

    #[test]
    fn keys_are_map_usable() {
        let mut map = std::collections::HashMap::new();
        let _ = map.insert(ResourceKey::new("idea", "a"), 1);
        let _ = map.insert(ResourceKey::new("idea", "b"), 2);
        assert_eq!(map.get(&ResourceKey::new("idea", "a")), Some(&1));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn same_id_different_type_are_distinct() {
        let a = ResourceKey::new("idea", "x");
        let b = ResourceKey::new("note", "x");
        assert_ne!(a, b);
    }

    #[test]
    fn serde_uses_camel_case() {
        let key = ResourceKey::new("idea", "idea-123");
        let json = serde_json::to_string(&key).unwrap();
        assert!(json.contains("resourceType"));
        assert!(json.contains("resourceId"));
    }

    // ── pluralize ───────────────────────────────────────────────────

    #[test]
    fn pluralize_simple() {
        assert_eq!(pluralize("idea"), "ideas");
        assert_eq!(pluralize("note"), "notes");
    }

    #[test]
    fn pluralize_consonant_y() {
        assert_eq!(pluralize("category"), "categories");
    }

    #[test]
    fn pluralize_vowel_y() {
        assert_eq!(pluralize("day"), "days");
    }

    #[test]
    fn pluralize_sibilants() {
        assert_eq!(pluralize("process"), "processes");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("sketch"), "sketches");
        assert_eq!(pluralize("brush"), "brushes");
    }

    #[test]
    fn pluralize_empty() {
        assert_eq!(pluralize(""), "");
    }
}
