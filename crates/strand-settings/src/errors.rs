//! Settings errors.

/// Why a settings load failed.
///
/// A missing file is not an error (defaults apply); these cover a file that
/// exists but cannot be read or parsed.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// The settings file could not be read.
    #[error("could not read settings file: {0}")]
    Io(#[from] std::io::Error),

    /// The settings file is not valid JSON, or does not match the schema.
    #[error("settings file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Shorthand for settings results.
pub type Result<T> = std::result::Result<T, SettingsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_convert_and_display() {
        let io: SettingsError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        assert!(matches!(io, SettingsError::Io(_)));
        assert!(io.to_string().starts_with("could not read"));

        let json: SettingsError = serde_json::from_str::<serde_json::Value>("{oops")
            .unwrap_err()
            .into();
        assert!(matches!(json, SettingsError::Json(_)));
        assert!(json.to_string().contains("not valid JSON"));
    }
}
