//! Transport options attached to each handle
//!
//! A handle starts from the defaults for its declared response kind and then
//! layers a caller-supplied partial override on top. Every field the override
//! sets wins; headers are merged key by key.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

pub type HeadersMap = BTreeMap<String, String>;

/// How the response body is meant to be interpreted once downloaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    #[default]
    Bytes,
    Text,
    Json,
}

impl ResponseKind {
    /// `Accept` header value sent for this kind
    pub fn accept(&self) -> &'static str {
        match self {
            ResponseKind::Bytes => "*/*",
            ResponseKind::Text => "text/plain, */*",
            ResponseKind::Json => "application/json, */*",
        }
    }
}

/// Cross-origin policy, mirroring the `crossorigin` attribute values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrossOrigin {
    Anonymous,
    UseCredentials,
}

/// Resolved per-handle transport configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransportConfig {
    pub response_kind: ResponseKind,
    /// Per-request timeout; `None` leaves it to the client-wide setting
    pub timeout: Option<Duration>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub headers: HeadersMap,
    pub override_media_type: Option<String>,
    pub with_credentials: bool,
}

impl TransportConfig {
    pub fn from_response_kind(response_kind: ResponseKind) -> Self {
        Self {
            response_kind,
            timeout: None,
            user: None,
            password: None,
            headers: HeadersMap::new(),
            override_media_type: None,
            with_credentials: false,
        }
    }

    /// Apply a partial override, override wins field by field
    pub fn merged(&self, overrides: &TransportOverrides) -> Self {
        let mut headers = self.headers.clone();
        headers.extend(overrides.headers.clone());

        Self {
            response_kind: overrides.response_kind.unwrap_or(self.response_kind),
            timeout: overrides
                .timeout_ms
                .map(Duration::from_millis)
                .or(self.timeout),
            user: overrides.user.clone().or_else(|| self.user.clone()),
            password: overrides.password.clone().or_else(|| self.password.clone()),
            headers,
            override_media_type: overrides
                .override_media_type
                .clone()
                .or_else(|| self.override_media_type.clone()),
            with_credentials: overrides.with_credentials.unwrap_or(self.with_credentials),
        }
    }
}

impl TransportConfig {
    /// Layer this handle-level configuration over orchestrator-wide defaults.
    ///
    /// Unset optional fields fall back to the defaults; headers from the
    /// defaults are kept unless this configuration names the same header.
    pub fn layered_over(&self, defaults: &TransportConfig) -> Self {
        let mut headers = defaults.headers.clone();
        headers.extend(self.headers.clone());

        Self {
            response_kind: self.response_kind,
            timeout: self.timeout.or(defaults.timeout),
            user: self.user.clone().or_else(|| defaults.user.clone()),
            password: self.password.clone().or_else(|| defaults.password.clone()),
            headers,
            override_media_type: self
                .override_media_type
                .clone()
                .or_else(|| defaults.override_media_type.clone()),
            with_credentials: self.with_credentials || defaults.with_credentials,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::from_response_kind(ResponseKind::default())
    }
}

/// Caller-supplied partial transport configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportOverrides {
    pub response_kind: Option<ResponseKind>,
    pub timeout_ms: Option<u64>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub headers: HeadersMap,
    pub override_media_type: Option<String>,
    pub with_credentials: Option<bool>,
}

impl TransportOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_response_kind() {
        let config = TransportConfig::from_response_kind(ResponseKind::Json);
        assert_eq!(config.response_kind, ResponseKind::Json);
        assert!(config.timeout.is_none());
        assert!(config.headers.is_empty());
        assert!(!config.with_credentials);
    }

    #[test]
    fn test_override_wins_key_by_key() {
        let mut base = TransportConfig::from_response_kind(ResponseKind::Text);
        base.user = Some("reader".to_string());
        base.headers
            .insert("X-Client".to_string(), "assetbox".to_string());
        base.headers
            .insert("X-Trace".to_string(), "base".to_string());

        let overrides = TransportOverrides {
            timeout_ms: Some(1500),
            headers: [("X-Trace".to_string(), "override".to_string())].into(),
            with_credentials: Some(true),
            ..Default::default()
        };

        let merged = base.merged(&overrides);

        assert_eq!(merged.response_kind, ResponseKind::Text);
        assert_eq!(merged.timeout, Some(Duration::from_millis(1500)));
        assert_eq!(merged.user.as_deref(), Some("reader"));
        assert_eq!(merged.headers["X-Client"], "assetbox");
        assert_eq!(merged.headers["X-Trace"], "override");
        assert!(merged.with_credentials);
    }

    #[test]
    fn test_empty_override_is_identity() {
        let base = TransportConfig::from_response_kind(ResponseKind::Bytes);
        let overrides = TransportOverrides::default();
        assert!(overrides.is_empty());
        assert_eq!(base.merged(&overrides), base);
    }

    #[test]
    fn test_layered_over_defaults() {
        let mut defaults = TransportConfig::default();
        defaults.timeout = Some(Duration::from_secs(5));
        defaults.user = Some("loader".to_string());
        defaults
            .headers
            .insert("X-Client".to_string(), "loader".to_string());

        let mut local = TransportConfig::from_response_kind(ResponseKind::Json);
        local.timeout = Some(Duration::from_secs(1));
        local
            .headers
            .insert("X-Client".to_string(), "handle".to_string());

        let layered = local.layered_over(&defaults);

        assert_eq!(layered.response_kind, ResponseKind::Json);
        assert_eq!(layered.timeout, Some(Duration::from_secs(1)));
        assert_eq!(layered.user.as_deref(), Some("loader"));
        assert_eq!(layered.headers["X-Client"], "handle");
    }

    #[test]
    fn test_cross_origin_deserialize() {
        let parsed: CrossOrigin = serde_json::from_str("\"use-credentials\"").unwrap();
        assert_eq!(parsed, CrossOrigin::UseCredentials);
    }
}
