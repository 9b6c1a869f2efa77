use async_trait::async_trait;
use bytes::Bytes;

use super::traits::{ProcessError, Processor};
use crate::handle::{Payload, SharedHandle};
use crate::transfer::ResponseKind;

/// Interprets the raw body according to the handle's response kind.
///
/// Used for `binary`, `text` and `json` resources and for any kind without a
/// registered processor.
#[derive(Debug, Clone, Default)]
pub struct DefaultProcessor;

impl DefaultProcessor {
    pub fn new() -> Self {
        Self
    }

    pub fn interpret(kind: ResponseKind, body: Bytes) -> Result<Payload, ProcessError> {
        match kind {
            ResponseKind::Bytes => Ok(Payload::Bytes(body)),
            ResponseKind::Text => Ok(Payload::Text(String::from_utf8(body.to_vec())?)),
            ResponseKind::Json => Ok(Payload::Json(serde_json::from_slice(&body)?)),
        }
    }
}

#[async_trait(?Send)]
impl Processor for DefaultProcessor {
    async fn decode(&self, handle: &SharedHandle) -> Result<(), ProcessError> {
        let mut handle = handle.borrow_mut();

        let body = handle.raw_body().ok_or_else(|| ProcessError::MissingBody {
            kind: handle.kind().to_string(),
            key: handle.key().to_string(),
        })?;

        let payload = Self::interpret(handle.transport_config().response_kind, body)?;
        handle.set_payload(payload);

        Ok(())
    }
}
