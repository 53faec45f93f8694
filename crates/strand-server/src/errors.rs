//! Hub error type.

use strand_protocol::ResourceKey;

/// Errors from resource hub mutations.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// The targeted resource does not exist.
    #[error("resource {0} not found")]
    NotFound(ResourceKey),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = HubError::NotFound(ResourceKey::new("idea", "idea-123"));
        assert_eq!(err.to_string(), "resource idea/idea-123 not found");
    }
}
