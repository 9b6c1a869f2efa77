use async_trait::async_trait;
use thiserror::Error;

use crate::handle::SharedHandle;
use crate::object_url::ObjectUrlError;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("{kind}/{key} has no body to decode")]
    MissingBody { kind: String, key: String },
    #[error("invalid UTF-8 text: {0}")]
    InvalidText(#[from] std::string::FromUtf8Error),
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("object reference failed: {0}")]
    ObjectUrl(#[from] ObjectUrlError),
}

/// Resource-type specific decode step, run by the orchestrator after a
/// handle reached `Loaded` and before it calls `ResourceHandle::process`.
///
/// Implementations must not hold a borrow of the handle across an await.
#[async_trait(?Send)]
pub trait Processor {
    async fn decode(&self, handle: &SharedHandle) -> Result<(), ProcessError>;
}
