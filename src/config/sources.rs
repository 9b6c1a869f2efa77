use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "ASSETBOX_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/assetbox.toml";
const ENV_PREFIX: &str = "ASSETBOX";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = load_from_sources(config_path)?;
    load_secrets(&mut config);

    Ok(config)
}

/// Credentials are never read from TOML, only from the environment
fn load_secrets(config: &mut Config) {
    if let Ok(user) = env::var("ASSETBOX_HTTP_USER") {
        config.transport.user = Some(user);
    }
    if let Ok(password) = env::var("ASSETBOX_HTTP_PASSWORD") {
        config.transport.password = Some(password);
    }
}

/// Load configuration from a specific path and environment
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::debug!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // ASSETBOX__LOADER__MAX_PARALLEL -> loader.max_parallel
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.loader.max_parallel, 32);
        assert_eq!(config.transport.request_timeout_ms, 60_000);
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[loader]
base_url = "https://cdn.example.com/"
path = "levels/"
max_parallel = 4
cross_origin = "anonymous"

[transport]
request_timeout_ms = 5000
max_body_bytes = "8MB"

[transport.headers]
x-client = "assetbox"

[telemetry]
log_filter = "assetbox=debug"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(
            config.loader.base_url.as_deref(),
            Some("https://cdn.example.com/")
        );
        assert_eq!(config.loader.path.as_deref(), Some("levels/"));
        assert_eq!(config.loader.max_parallel, 4);
        assert_eq!(
            config.loader.cross_origin,
            Some(crate::transfer::CrossOrigin::Anonymous)
        );
        assert_eq!(config.transport.request_timeout_ms, 5000);
        assert_eq!(config.transport.max_body_bytes.as_u64(), 8 * 1024 * 1024);
        assert_eq!(config.transport.headers["x-client"], "assetbox");
        assert_eq!(config.telemetry.log_filter, "assetbox=debug");
    }

    #[test]
    fn test_credentials_not_read_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(
            &config_path,
            "[transport]\nuser = \"bob\"\npassword = \"secret\"\n",
        )
        .unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert!(config.transport.user.is_none());
        assert!(config.transport.password.is_none());
    }
}
