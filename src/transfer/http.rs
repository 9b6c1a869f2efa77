//! HTTP transport backed by reqwest

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::{Client, header};
use std::time::Duration;
use tracing::{debug, warn};

use super::{HeadersMap, Result, TransferError, TransferReporter, TransferRequest, TransferResponse, Transport};
use crate::humanize::ByteSize;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
    pub max_body_bytes: ByteSize,
    pub default_headers: HeadersMap,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            user_agent: "assetbox/0.1.0".to_string(),
            max_body_bytes: ByteSize(64 * 1024 * 1024),
            default_headers: HeadersMap::new(),
        }
    }
}

/// Transport performing plain GET requests, streaming the body so progress
/// can be reported chunk by chunk
pub struct HttpTransport {
    client: Client,
    config: HttpConfig,
}

impl HttpTransport {
    pub fn new(config: HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| TransferError::RequestFailed(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    async fn fetch_once(
        &self,
        request: &TransferRequest,
        reporter: &TransferReporter,
    ) -> Result<Option<TransferResponse>> {
        debug!(url = %request.url, "Starting transfer");

        let mut builder = self
            .client
            .get(&request.url)
            .header(header::ACCEPT, request.config.response_kind.accept());

        if let Some(timeout) = request.config.timeout {
            builder = builder.timeout(timeout);
        }

        let mut headers = self.config.default_headers.clone();
        headers.extend(request.config.headers.clone());
        for (name, value) in &headers {
            builder = builder.header(name, value);
        }

        if request.sends_credentials() {
            if let Some(user) = &request.config.user {
                builder = builder.basic_auth(user, request.config.password.as_ref());
            }
        }

        let mut response = builder.send().await.map_err(classify)?;

        let status = response.status();
        let total = response.content_length();
        let limit = self.config.max_body_bytes.as_u64();

        if total.is_some_and(|total| total > limit) {
            return Err(TransferError::BodyTooLarge { limit });
        }

        let media_type = request.config.override_media_type.clone().or_else(|| {
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        });

        let mut body = BytesMut::new();

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| TransferError::Body(e.to_string()))?
        {
            body.extend_from_slice(&chunk);

            if body.len() as u64 > limit {
                return Err(TransferError::BodyTooLarge { limit });
            }

            if !reporter.progress(body.len() as u64, total.unwrap_or(0), total.is_some()) {
                debug!(url = %request.url, "Session detached, abandoning transfer");
                return Ok(None);
            }
        }

        debug!(
            url = %request.url,
            status = status.as_u16(),
            size = body.len(),
            "Transfer finished"
        );

        Ok(Some(TransferResponse {
            status: status.as_u16(),
            body: Bytes::from(body),
            media_type,
        }))
    }
}

#[async_trait(?Send)]
impl Transport for HttpTransport {
    async fn fetch(&self, request: TransferRequest, reporter: TransferReporter) {
        match self.fetch_once(&request, &reporter).await {
            Ok(Some(response)) => {
                reporter.complete(response);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(url = %request.url, error = %e, "Transfer failed");
                reporter.fail(e);
            }
        }
    }
}

fn classify(e: reqwest::Error) -> TransferError {
    if e.is_timeout() {
        TransferError::Timeout
    } else if e.is_redirect() {
        TransferError::TooManyRedirects
    } else if e.is_builder() {
        TransferError::InvalidUrl(e.to_string())
    } else {
        TransferError::RequestFailed(e.to_string())
    }
}
