//! Resource handles and their lifecycle
//!
//! A [`ResourceHandle`] is one fetchable item. The orchestrator constructs it,
//! calls [`ResourceHandle::begin_load`], receives an `advance` callback once
//! the transfer finished, and later calls [`ResourceHandle::process`]. Two
//! handles may be paired with [`ResourceHandle::link_pair`]; neither member of
//! a pair reaches `Complete` before the other finished processing.
//!
//! ## Example
//!
//! ```rust,ignore
//! use assetbox::handle::{HandleConfig, ResourceHandle};
//!
//! let atlas = ResourceHandle::new(HandleConfig::new("image", "hero").with_extension("png"))?.into_shared();
//! let data = ResourceHandle::new(HandleConfig::new("json", "hero").with_extension("json"))?.into_shared();
//! ResourceHandle::link_pair(&atlas, &data, "atlas-pair")?;
//! ResourceHandle::begin_load(&atlas, orchestrator.clone())?;
//! ```

mod link;
pub mod location;
mod orchestrator;
mod state;

pub use link::{Finalized, Link};
pub use orchestrator::Orchestrator;
pub use state::HandleState;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::transfer::inline::{decode_data_uri, is_data_uri};
use crate::transfer::{
    CrossOrigin, ProgressReport, ResponseKind, TransferError, TransferEvent, TransferRequest,
    TransferResponse, TransferSession, TransportConfig, TransportOverrides,
};

pub type SharedHandle = Rc<RefCell<ResourceHandle>>;

#[derive(Debug, Error)]
pub enum HandleError {
    #[error("invalid key provided for '{kind}' resource")]
    MissingIdentity { kind: String },

    #[error("{kind}/{key}: invalid transition {from} -> {to}")]
    InvalidTransition {
        kind: String,
        key: String,
        from: HandleState,
        to: HandleState,
    },

    #[error("{kind}/{key} is already linked")]
    AlreadyLinked { kind: String, key: String },

    #[error("{kind}/{key} cannot be linked to itself")]
    SelfLink { kind: String, key: String },
}

pub type Result<T> = std::result::Result<T, HandleError>;

/// Construction options for a handle
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct HandleConfig {
    pub kind: String,
    pub key: String,
    pub url: Option<String>,
    pub path: Option<String>,
    pub extension: Option<String>,
    pub response_kind: Option<ResponseKind>,
    pub transport_overrides: Option<TransportOverrides>,
    pub auxiliary_config: Option<Map<String, Value>>,
    pub cross_origin: Option<CrossOrigin>,
}

impl HandleConfig {
    pub fn new(kind: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            key: key.into(),
            ..Default::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    pub fn with_response_kind(mut self, response_kind: ResponseKind) -> Self {
        self.response_kind = Some(response_kind);
        self
    }

    pub fn with_overrides(mut self, overrides: TransportOverrides) -> Self {
        self.transport_overrides = Some(overrides);
        self
    }
}

/// Decoded (or raw) result of a handle
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Bytes(Bytes),
    Text(String),
    Json(Value),
    /// In-memory reference produced by the object-URL helper
    Reference(String),
}

impl Payload {
    pub fn len(&self) -> usize {
        match self {
            Payload::Bytes(bytes) => bytes.len(),
            Payload::Text(text) => text.len(),
            Payload::Json(value) => value.to_string().len(),
            Payload::Reference(reference) => reference.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Transfer progress; every field stays `None` until the transport reports a
/// length-computable progress event
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TransferProgress {
    pub bytes_loaded: Option<u64>,
    pub bytes_total: Option<u64>,
    pub fraction_complete: Option<f64>,
}

impl TransferProgress {
    /// Apply a progress report, returning the new fraction when it counted
    pub fn apply(&mut self, report: ProgressReport) -> Option<f64> {
        if !report.length_computable {
            return None;
        }

        let ratio = if report.total == 0 {
            1.0
        } else {
            (report.loaded as f64 / report.total as f64).clamp(0.0, 1.0)
        };

        let fraction = match self.fraction_complete {
            Some(previous) => previous.max(ratio),
            None => ratio,
        };

        self.bytes_loaded = Some(report.loaded);
        self.bytes_total = Some(report.total);
        self.fraction_complete = Some(fraction);

        Some(fraction)
    }
}

/// One fetchable resource and its state machine
pub struct ResourceHandle {
    kind: String,
    key: String,
    location: String,
    transfer_url: Option<String>,
    transport: TransportConfig,
    owner: Option<Rc<dyn Orchestrator>>,
    session: Option<TransferSession>,
    state: HandleState,
    progress: TransferProgress,
    cross_origin: Option<CrossOrigin>,
    response: Option<TransferResponse>,
    payload: Option<Payload>,
    auxiliary_config: Map<String, Value>,
    link: Option<Link>,
}

impl ResourceHandle {
    pub fn new(config: HandleConfig) -> Result<Self> {
        if config.kind.is_empty() || config.key.is_empty() {
            return Err(HandleError::MissingIdentity { kind: config.kind });
        }

        let location = location::resolve_location(
            &config.key,
            config.url.as_deref(),
            config.path.as_deref(),
            config.extension.as_deref(),
        );

        let defaults = TransportConfig::from_response_kind(config.response_kind.unwrap_or_default());
        let transport = match &config.transport_overrides {
            Some(overrides) => defaults.merged(overrides),
            None => defaults,
        };

        Ok(Self {
            kind: config.kind,
            key: config.key,
            location,
            transfer_url: None,
            transport,
            owner: None,
            session: None,
            state: HandleState::Pending,
            progress: TransferProgress::default(),
            cross_origin: config.cross_origin,
            response: None,
            payload: None,
            auxiliary_config: config.auxiliary_config.unwrap_or_default(),
            link: None,
        })
    }

    pub fn into_shared(self) -> SharedHandle {
        Rc::new(RefCell::new(self))
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Final fetch address, set once loading begins
    pub fn transfer_url(&self) -> Option<&str> {
        self.transfer_url.as_deref()
    }

    pub fn transport_config(&self) -> &TransportConfig {
        &self.transport
    }

    pub fn state(&self) -> HandleState {
        self.state
    }

    pub fn progress(&self) -> TransferProgress {
        self.progress
    }

    pub fn bytes_loaded(&self) -> Option<u64> {
        self.progress.bytes_loaded
    }

    pub fn bytes_total(&self) -> Option<u64> {
        self.progress.bytes_total
    }

    pub fn fraction_complete(&self) -> Option<f64> {
        self.progress.fraction_complete
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    pub fn take_payload(&mut self) -> Option<Payload> {
        self.payload.take()
    }

    pub fn set_payload(&mut self, payload: Payload) {
        self.payload = Some(payload);
    }

    /// Raw body of the successful transfer
    pub fn raw_body(&self) -> Option<Bytes> {
        self.response.as_ref().map(|r| r.body.clone())
    }

    pub fn response_media_type(&self) -> Option<&str> {
        self.response.as_ref().and_then(|r| r.media_type.as_deref())
    }

    pub fn auxiliary_config(&self) -> &Map<String, Value> {
        &self.auxiliary_config
    }

    pub fn auxiliary_config_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.auxiliary_config
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&TransferSession> {
        self.session.as_ref()
    }

    pub fn set_cross_origin(&mut self, policy: Option<CrossOrigin>) {
        self.cross_origin = policy;
    }

    /// Own policy, or the owning orchestrator's default
    pub fn cross_origin_policy(&self) -> Option<CrossOrigin> {
        self.cross_origin.or_else(|| {
            self.owner
                .as_ref()
                .and_then(|owner| owner.default_cross_origin())
        })
    }

    /// Inject data ahead of time; the handle then skips the transfer
    pub fn populate(&mut self, payload: Payload) -> Result<()> {
        self.transition(HandleState::Populated)?;
        self.payload = Some(payload);
        Ok(())
    }

    /// Called by the orchestrator once the transfer succeeded
    pub fn mark_loaded(&mut self) -> Result<()> {
        self.transition(HandleState::Loaded)?;
        self.payload = self.raw_body().map(Payload::Bytes);
        Ok(())
    }

    /// Called by the orchestrator when it gives up on this handle
    pub fn mark_errored(&mut self) -> Result<()> {
        self.transition(HandleState::Errored)
    }

    fn transition(&mut self, to: HandleState) -> Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(HandleError::InvalidTransition {
                kind: self.kind.clone(),
                key: self.key.clone(),
                from: self.state,
                to,
            });
        }

        debug!(kind = %self.kind, key = %self.key, from = %self.state, %to, "Handle transition");
        self.state = to;
        self.release_for(to);
        Ok(())
    }

    /// Past `Loaded` the body has been decoded into the payload; a finished
    /// handle keeps nothing but its payload.
    fn release_for(&mut self, state: HandleState) {
        if matches!(
            state,
            HandleState::Processing
                | HandleState::WaitingOnLink
                | HandleState::Complete
                | HandleState::Errored
        ) {
            self.response = None;
        }

        if state.is_terminal() {
            if let Some(session) = self.session.take() {
                session.reset_transport();
            }
            self.owner = None;
        }
    }

    /// Hand the handle to `orchestrator` and start loading it.
    ///
    /// Populated handles finalize right away and advance without a transfer.
    /// `data:` addresses are decoded inline. Everything else opens a
    /// [`TransferSession`], which requires a running `LocalSet`.
    pub fn begin_load(this: &SharedHandle, orchestrator: Rc<dyn Orchestrator>) -> Result<()> {
        let populated = {
            let mut handle = this.borrow_mut();
            let populated = handle.state == HandleState::Populated;
            if !populated {
                handle.transition(HandleState::Loading)?;
            }
            handle.owner = Some(orchestrator.clone());
            populated
        };

        if populated {
            let outcome = Self::finalize(this)?;
            debug!(?outcome, "Populated handle finalized without transfer");
            orchestrator.advance(this, true);
            return Ok(());
        }

        let request = {
            let mut handle = this.borrow_mut();
            let url = location::resolve_transfer_url(
                &handle.location,
                orchestrator.base_address().as_deref(),
            );
            handle.transfer_url = Some(url.clone());
            handle.progress = TransferProgress::default();

            TransferRequest {
                url,
                config: handle.transport.layered_over(&orchestrator.transport_defaults()),
                cross_origin: handle.cross_origin_policy(),
            }
        };

        if is_data_uri(&request.url) {
            Self::load_inline(this, &request.url);
            return Ok(());
        }

        let session = TransferSession::open(this, orchestrator.transport(), request);
        this.borrow_mut().session = Some(session);

        Ok(())
    }

    fn load_inline(this: &SharedHandle, url: &str) {
        match decode_data_uri(url) {
            Ok(data) => {
                let response = TransferResponse {
                    status: 200,
                    body: data.body,
                    media_type: Some(data.media_type),
                };
                Self::on_transfer_complete(this, response);
            }
            Err(e) => Self::on_transfer_error(this, e),
        }
    }

    /// Entry point for the bound session's pump
    pub fn on_transfer_event(this: &SharedHandle, event: TransferEvent) {
        match event {
            TransferEvent::Progress(report) => Self::on_transfer_progress(this, report),
            TransferEvent::Complete(response) => Self::on_transfer_complete(this, response),
            TransferEvent::Failed(error) => Self::on_transfer_error(this, error),
        }
    }

    pub fn on_transfer_complete(this: &SharedHandle, response: TransferResponse) {
        let Some((owner, success)) = Self::detach(this, |handle| {
            let success = response.is_success();
            if success {
                debug!(kind = %handle.kind, key = %handle.key, status = response.status, "Transfer complete");
                handle.response = Some(response);
            } else {
                warn!(kind = %handle.kind, key = %handle.key, status = response.status, "Transfer returned error status");
            }
            success
        }) else {
            return;
        };

        owner.advance(this, success);
    }

    pub fn on_transfer_error(this: &SharedHandle, error: TransferError) {
        let Some((owner, _)) = Self::detach(this, |handle| {
            warn!(kind = %handle.kind, key = %handle.key, error = %error, "Transfer failed");
        }) else {
            return;
        };

        owner.advance(this, false);
    }

    pub fn on_transfer_progress(this: &SharedHandle, report: ProgressReport) {
        let notify = {
            let mut handle = this.borrow_mut();
            if handle.state != HandleState::Loading {
                return;
            }
            handle
                .progress
                .apply(report)
                .zip(handle.owner.clone())
        };

        if let Some((fraction, owner)) = notify {
            owner.notify_progress(this, fraction);
        }
    }

    /// Detach the session and run `f` while still loading; hands back the
    /// owner so the caller can advance without holding a borrow
    fn detach<T>(
        this: &SharedHandle,
        f: impl FnOnce(&mut ResourceHandle) -> T,
    ) -> Option<(Rc<dyn Orchestrator>, T)> {
        let mut handle = this.borrow_mut();

        if let Some(session) = &handle.session {
            session.reset_transport();
        }

        if handle.state != HandleState::Loading {
            debug!(kind = %handle.kind, key = %handle.key, state = %handle.state, "Ignoring late transfer event");
            return None;
        }

        let Some(owner) = handle.owner.clone() else {
            warn!(kind = %handle.kind, key = %handle.key, "Transfer finished without an owner");
            return None;
        };

        Some((owner, f(&mut handle)))
    }

    /// Run the post-transfer step: enter `Processing`, finalize (possibly
    /// completing a waiting partner too), then hand the handle to
    /// `continuation`.
    pub fn process(
        this: &SharedHandle,
        continuation: impl FnOnce(&SharedHandle),
    ) -> Result<Finalized> {
        this.borrow_mut().transition(HandleState::Processing)?;
        let outcome = Self::finalize(this)?;
        continuation(this);
        Ok(outcome)
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("kind", &self.kind)
            .field("key", &self.key)
            .field("location", &self.location)
            .field("state", &self.state)
            .field("progress", &self.progress)
            .field("link_role", &self.link.as_ref().map(|l| l.role.as_str()))
            .finish_non_exhaustive()
    }
}
