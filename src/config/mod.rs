//! Configuration management for assetbox
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use assetbox::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Fetching with up to {} parallel transfers", config.loader.max_parallel);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `ASSETBOX__<section>__<key>`
//!
//! Examples:
//! - `ASSETBOX__LOADER__BASE_URL=https://cdn.example.com/`
//! - `ASSETBOX__LOADER__MAX_PARALLEL=8`
//! - `ASSETBOX__TRANSPORT__MAX_BODY_BYTES=16MB`
//!
//! Basic-auth credentials come only from `ASSETBOX_HTTP_USER` and
//! `ASSETBOX_HTTP_PASSWORD`.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/assetbox.toml`.
//! This can be overridden using the `ASSETBOX_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{Config, LoaderSettings, TelemetryConfig, TransportSettings};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("Failed to render configuration: {0}")]
    RenderError(#[from] toml::ser::Error),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or a value
    /// fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Render the effective configuration; credentials are never included
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[loader]\nmax_parallel = 2\n").unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.loader.max_parallel, 2);
        assert_eq!(config.transport.connect_timeout_ms, 10_000);
    }

    #[test]
    fn test_validation_runs_after_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[loader]\nbase_url = \"assets/\"\n").unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn test_malformed_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[loader\nmax_parallel = ").unwrap();

        assert!(matches!(
            Config::load_from_path(config_path),
            Err(ConfigError::LoadError(_))
        ));
    }

    #[test]
    fn test_rendered_config_loads_back() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("rendered.toml");

        let mut config = Config::default();
        config.loader.base_url = Some("https://cdn.example.com/".to_string());
        config.loader.max_parallel = 3;
        config.transport.max_body_bytes = ByteSize(2 * 1024 * 1024);
        config.transport.password = Some("secret".to_string());

        let rendered = config.to_toml().unwrap();
        assert!(!rendered.contains("secret"));
        fs::write(&config_path, rendered).unwrap();

        let loaded = Config::load_from_path(config_path).unwrap();
        assert_eq!(loaded.loader.base_url, config.loader.base_url);
        assert_eq!(loaded.loader.max_parallel, 3);
        assert_eq!(loaded.transport.max_body_bytes, ByteSize(2 * 1024 * 1024));
        assert!(loaded.transport.password.is_none());
    }

    #[test]
    fn test_full_config_example() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[loader]
base_url = "http://localhost:8000/assets/"
max_parallel = 8
cross_origin = "use-credentials"

[transport]
connect_timeout_ms = 2000
request_timeout_ms = 15000
user_agent = "game-client/2.1"
max_body_bytes = "512KB"
with_credentials = true

[telemetry]
log_filter = "assetbox=trace"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();

        assert_eq!(config.loader.max_parallel, 8);
        assert_eq!(
            config.loader.cross_origin,
            Some(crate::transfer::CrossOrigin::UseCredentials)
        );
        assert_eq!(config.transport.user_agent, "game-client/2.1");
        assert_eq!(config.transport.max_body_bytes, ByteSize(512 * 1024));
        assert!(config.transport.request_defaults().with_credentials);
        assert_eq!(config.telemetry.log_filter, "assetbox=trace");
    }
}
