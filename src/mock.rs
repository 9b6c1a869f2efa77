//! Scripted transport and recording orchestrator for tests and development

use async_trait::async_trait;
use bytes::Bytes;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tokio::sync::Notify;

use crate::handle::{Orchestrator, SharedHandle};
use crate::transfer::{
    CrossOrigin, TransferError, TransferReporter, TransferRequest, TransferResponse, Transport,
    TransportConfig,
};

/// What the mock transport does for one URL
#[derive(Debug, Clone)]
pub enum MockReply {
    Respond {
        status: u16,
        body: Bytes,
        /// Report progress every `chunk_size` bytes when set
        chunk_size: Option<usize>,
        length_computable: bool,
    },
    Fail(String),
    /// Never report anything
    Hang,
}

impl MockReply {
    pub fn ok(body: impl Into<Bytes>) -> Self {
        MockReply::Respond {
            status: 200,
            body: body.into(),
            chunk_size: None,
            length_computable: true,
        }
    }

    pub fn status(status: u16) -> Self {
        MockReply::Respond {
            status,
            body: Bytes::new(),
            chunk_size: None,
            length_computable: true,
        }
    }

    pub fn chunked(body: impl Into<Bytes>, chunk_size: usize) -> Self {
        MockReply::Respond {
            status: 200,
            body: body.into(),
            chunk_size: Some(chunk_size),
            length_computable: true,
        }
    }
}

/// Transport answering from a URL → reply table; unknown URLs get a 404
#[derive(Debug, Default)]
pub struct MockTransport {
    replies: RefCell<HashMap<String, MockReply>>,
    requests: RefCell<Vec<TransferRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, url: impl Into<String>, reply: MockReply) -> Self {
        self.replies.borrow_mut().insert(url.into(), reply);
        self
    }

    /// Requests seen so far, in order
    pub fn requests(&self) -> Vec<TransferRequest> {
        self.requests.borrow().clone()
    }
}

#[async_trait(?Send)]
impl Transport for MockTransport {
    async fn fetch(&self, request: TransferRequest, reporter: TransferReporter) {
        self.requests.borrow_mut().push(request.clone());

        let reply = self
            .replies
            .borrow()
            .get(&request.url)
            .cloned()
            .unwrap_or_else(|| MockReply::status(404));

        tokio::task::yield_now().await;

        match reply {
            MockReply::Respond {
                status,
                body,
                chunk_size,
                length_computable,
            } => {
                if let Some(chunk_size) = chunk_size {
                    let total = body.len() as u64;
                    let mut loaded = 0u64;
                    while loaded < total {
                        loaded = (loaded + chunk_size as u64).min(total);
                        reporter.progress(loaded, total, length_computable);
                        tokio::task::yield_now().await;
                    }
                }

                reporter.complete(TransferResponse {
                    status,
                    body,
                    media_type: None,
                });
            }
            MockReply::Fail(message) => {
                reporter.fail(TransferError::RequestFailed(message));
            }
            MockReply::Hang => {}
        }
    }
}

/// Orchestrator that only records what handles report
pub struct RecordingOrchestrator {
    pub base_address: Option<String>,
    pub cross_origin: Option<CrossOrigin>,
    pub defaults: TransportConfig,
    transport: Rc<dyn Transport>,
    advances: RefCell<Vec<(String, String, bool)>>,
    progress: RefCell<Vec<(String, f64)>>,
    advanced: Notify,
}

impl RecordingOrchestrator {
    pub fn new(transport: Rc<dyn Transport>) -> Self {
        Self {
            base_address: None,
            cross_origin: None,
            defaults: TransportConfig::default(),
            transport,
            advances: RefCell::new(Vec::new()),
            progress: RefCell::new(Vec::new()),
            advanced: Notify::new(),
        }
    }

    pub fn with_base_address(mut self, base: impl Into<String>) -> Self {
        self.base_address = Some(base.into());
        self
    }

    pub fn with_cross_origin(mut self, policy: CrossOrigin) -> Self {
        self.cross_origin = Some(policy);
        self
    }

    /// `(kind, key, success)` for every advance call
    pub fn advances(&self) -> Vec<(String, String, bool)> {
        self.advances.borrow().clone()
    }

    /// `(key, fraction)` for every progress notification
    pub fn progress(&self) -> Vec<(String, f64)> {
        self.progress.borrow().clone()
    }

    pub async fn wait_for_advances(&self, count: usize) {
        while self.advances.borrow().len() < count {
            self.advanced.notified().await;
        }
    }
}

impl Orchestrator for RecordingOrchestrator {
    fn base_address(&self) -> Option<String> {
        self.base_address.clone()
    }

    fn default_cross_origin(&self) -> Option<CrossOrigin> {
        self.cross_origin
    }

    fn transport_defaults(&self) -> TransportConfig {
        self.defaults.clone()
    }

    fn transport(&self) -> Rc<dyn Transport> {
        self.transport.clone()
    }

    fn advance(&self, handle: &SharedHandle, success: bool) {
        let handle = handle.borrow();
        self.advances.borrow_mut().push((
            handle.kind().to_string(),
            handle.key().to_string(),
            success,
        ));
        self.advanced.notify_one();
    }

    fn notify_progress(&self, handle: &SharedHandle, fraction: f64) {
        self.progress
            .borrow_mut()
            .push((handle.borrow().key().to_string(), fraction));
    }
}
