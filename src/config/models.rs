use crate::humanize::ByteSize;
use crate::transfer::{CrossOrigin, HeadersMap, HttpConfig, TransportConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub loader: LoaderSettings,
    #[serde(default)]
    pub transport: TransportSettings,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Orchestrator settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoaderSettings {
    /// Prefix for relative locations
    pub base_url: Option<String>,
    /// Path prepended to handles that carry none of their own
    pub path: Option<String>,
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
    /// Policy for handles that carry none of their own
    pub cross_origin: Option<CrossOrigin>,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            path: None,
            max_parallel: default_max_parallel(),
            cross_origin: None,
        }
    }
}

fn default_max_parallel() -> usize {
    32
}

/// HTTP transport settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportSettings {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: ByteSize,
    /// Sent with every request unless a handle overrides the same header
    #[serde(default)]
    pub headers: HeadersMap,
    #[serde(default)]
    pub with_credentials: bool,
    /// Basic auth user (loaded from environment, not from config file)
    #[serde(skip)]
    pub user: Option<String>,
    /// Basic auth password (loaded from environment, not from config file)
    #[serde(skip)]
    pub password: Option<String>,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            user_agent: default_user_agent(),
            max_body_bytes: default_max_body_bytes(),
            headers: HeadersMap::new(),
            with_credentials: false,
            user: None,
            password: None,
        }
    }
}

impl TransportSettings {
    /// Client-wide settings for [`crate::transfer::HttpTransport`]
    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            user_agent: self.user_agent.clone(),
            max_body_bytes: self.max_body_bytes,
            default_headers: self.headers.clone(),
        }
    }

    /// Per-request defaults every handle is layered over
    pub fn request_defaults(&self) -> TransportConfig {
        TransportConfig {
            user: self.user.clone(),
            password: self.password.clone(),
            with_credentials: self.with_credentials,
            ..TransportConfig::default()
        }
    }
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_request_timeout_ms() -> u64 {
    60_000
}

fn default_user_agent() -> String {
    format!("assetbox/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_body_bytes() -> ByteSize {
    ByteSize(64 * 1024 * 1024) // 64 MB
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "assetbox=info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.loader.max_parallel, 32);
        assert!(config.loader.base_url.is_none());
        assert_eq!(config.transport.max_body_bytes.as_u64(), 64 * 1024 * 1024);
        assert!(config.transport.user_agent.starts_with("assetbox/"));
        assert_eq!(config.telemetry.log_filter, "assetbox=info");
    }

    #[test]
    fn test_http_config_conversion() {
        let mut settings = TransportSettings {
            connect_timeout_ms: 1500,
            request_timeout_ms: 2500,
            ..TransportSettings::default()
        };
        settings
            .headers
            .insert("X-Client".to_string(), "assetbox".to_string());

        let http = settings.http_config();
        assert_eq!(http.connect_timeout, Duration::from_millis(1500));
        assert_eq!(http.request_timeout, Duration::from_millis(2500));
        assert_eq!(http.default_headers["X-Client"], "assetbox");
    }

    #[test]
    fn test_request_defaults_carry_credentials() {
        let settings = TransportSettings {
            with_credentials: true,
            user: Some("bob".to_string()),
            password: Some("secret".to_string()),
            ..TransportSettings::default()
        };

        let defaults = settings.request_defaults();
        assert!(defaults.with_credentials);
        assert_eq!(defaults.user.as_deref(), Some("bob"));
        assert_eq!(defaults.password.as_deref(), Some("secret"));
        assert!(defaults.headers.is_empty());
    }
}
