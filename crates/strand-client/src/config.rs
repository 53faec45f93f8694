//! Sync provider configuration.

use std::time::Duration;

use strand_settings::ClientSettings;

/// Configuration for one [`SyncProvider`](crate::SyncProvider) instance.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Server endpoint, e.g. `ws://127.0.0.1:9470/ws`.
    pub url: String,
    /// Session user id, sent as the `userId` query parameter.
    pub user_id: String,
    /// Session user display name (`userName`).
    pub user_name: String,
    /// Session user color as a hex string (`userColor`).
    pub user_color: String,
    /// Optional workspace scope sent once per connection.
    pub workspace_id: Option<String>,
    /// Delay before reconnecting after a dropped connection.
    pub reconnect_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from_settings(&ClientSettings::default())
    }
}

impl ClientConfig {
    /// Build a config from loaded settings.
    pub fn from_settings(settings: &ClientSettings) -> Self {
        Self {
            url: settings.url.clone(),
            user_id: settings.user_id.clone(),
            user_name: settings.user_name.clone(),
            user_color: settings.user_color.clone(),
            workspace_id: settings.workspace_id.clone(),
            reconnect_delay: Duration::from_millis(settings.reconnect_delay_ms),
        }
    }

    /// The full connection URL with identifying query parameters appended:
    /// `<url>?userId=<id>&userName=<name>&userColor=<hex>`.
    pub fn connection_url(&self) -> String {
        let sep = if self.url.contains('?') { '&' } else { '?' };
        format!(
            "{}{}userId={}&userName={}&userColor={}",
            self.url,
            sep,
            encode_query(&self.user_id),
            encode_query(&self.user_name),
            encode_query(&self.user_color),
        )
    }
}

/// Percent-encode a query parameter value.
fn encode_query(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char);
            }
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_reconnect_delay_is_three_seconds() {
        let config = ClientConfig::default();
        assert_eq!(config.reconnect_delay, Duration::from_millis(3000));
    }

    #[test]
    fn connection_url_appends_identity() {
        let config = ClientConfig {
            url: "ws://example.test/ws".into(),
            user_id: "u1".into(),
            user_name: "Ada".into(),
            user_color: "#ff8800".into(),
            ..ClientConfig::default()
        };
        assert_eq!(
            config.connection_url(),
            "ws://example.test/ws?userId=u1&userName=Ada&userColor=%23ff8800"
        );
    }

    #[test]
    fn connection_url_uses_ampersand_when_query_present() {
        let config = ClientConfig {
            url: "ws://example.test/ws?v=2".into(),
            ..ClientConfig::default()
        };
        assert!(config.connection_url().starts_with("ws://example.test/ws?v=2&userId="));
    }

    #[test]
    fn query_values_are_percent_encoded() {
        assert_eq!(encode_query("Ada Lovelace"), "Ada%20Lovelace");
        assert_eq!(encode_query("#22aa66"), "%2322aa66");
        assert_eq!(encode_query("plain-value_1.0~x"), "plain-value_1.0~x");
    }

    #[test]
    fn from_settings_copies_fields() {
        let mut settings = ClientSettings::default();
        settings.workspace_id = Some("ws_9".into());
        settings.reconnect_delay_ms = 250;
        let config = ClientConfig::from_settings(&settings);
        assert_eq!(config.workspace_id.as_deref(), Some("ws_9"));
        assert_eq!(config.reconnect_delay, Duration::from_millis(250));
    }
}
