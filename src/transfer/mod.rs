//! Network side of a handle: transport options, the pluggable transport and
//! the session adapter that turns transport reports into handle events.

pub mod http;
pub mod inline;
pub mod session;
pub mod settings;

use async_trait::async_trait;
use thiserror::Error;

pub use http::{HttpConfig, HttpTransport};
pub use inline::{InlineData, decode_data_uri};
pub use session::{ProgressReport, TransferEvent, TransferReporter, TransferResponse, TransferSession};
pub use settings::{CrossOrigin, HeadersMap, ResponseKind, TransportConfig, TransportOverrides};

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Connection timeout")]
    Timeout,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Too many redirects")]
    TooManyRedirects,

    #[error("Response body exceeds limit of {limit} bytes")]
    BodyTooLarge { limit: u64 },

    #[error("Failed to read body: {0}")]
    Body(String),

    #[error("Invalid data URI: {0}")]
    InlineData(String),
}

pub type Result<T> = std::result::Result<T, TransferError>;

/// Everything a transport needs to perform one transfer
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub url: String,
    pub config: TransportConfig,
    pub cross_origin: Option<CrossOrigin>,
}

impl TransferRequest {
    /// Whether credentials should accompany the request
    pub fn sends_credentials(&self) -> bool {
        self.config.with_credentials || self.cross_origin == Some(CrossOrigin::UseCredentials)
    }
}

/// The low-level transport a session drives.
///
/// Implementations report zero or more progress events followed by exactly
/// one terminal report (`complete` or `fail`) through the reporter. Reports
/// made after the session detached are dropped by the reporter.
#[async_trait(?Send)]
pub trait Transport {
    async fn fetch(&self, request: TransferRequest, reporter: TransferReporter);
}
