use super::models::Config;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("loader.max_parallel must be positive")]
    InvalidMaxParallel,

    #[error("Invalid base URL scheme in '{url}', expected 'http://' or 'https://'")]
    InvalidBaseUrl { url: String },

    #[error("Timeout must be positive: {field} = {value}")]
    InvalidTimeout { field: String, value: u64 },

    #[error("transport.max_body_bytes must be positive")]
    InvalidMaxBodyBytes,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_loader(config)?;
    validate_transport(config)?;
    Ok(())
}

fn validate_loader(config: &Config) -> Result<(), ValidationError> {
    if config.loader.max_parallel == 0 {
        return Err(ValidationError::InvalidMaxParallel);
    }

    if let Some(ref url) = config.loader.base_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ValidationError::InvalidBaseUrl { url: url.clone() });
        }
    }

    Ok(())
}

fn validate_transport(config: &Config) -> Result<(), ValidationError> {
    let timeouts = [
        ("connect_timeout_ms", config.transport.connect_timeout_ms),
        ("request_timeout_ms", config.transport.request_timeout_ms),
    ];

    for (field, value) in timeouts {
        if value == 0 {
            return Err(ValidationError::InvalidTimeout {
                field: field.to_string(),
                value,
            });
        }
    }

    if config.transport.max_body_bytes.as_u64() == 0 {
        return Err(ValidationError::InvalidMaxBodyBytes);
    }

    Ok(())
}
