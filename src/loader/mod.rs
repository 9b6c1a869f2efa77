//! Reference orchestrator
//!
//! [`Loader`] owns a set of handles, starts at most `max_parallel` transfers
//! at a time, runs each kind's processor once a transfer succeeded and keeps
//! finished payloads in a [`PayloadStore`]. Handles report back through the
//! [`Orchestrator`] trait; those callbacks only enqueue a signal, and
//! [`Loader::run`] works the signals off one at a time.
//!
//! Sessions are spawned with `spawn_local`, so `run` must be awaited inside a
//! `tokio::task::LocalSet`.

mod events;
mod store;

pub use events::{FileId, LoadSummary, LoaderEvent};
pub use store::PayloadStore;

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::rc::Rc;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::config::LoaderSettings;
use crate::handle::location;
use crate::handle::{
    Finalized, HandleConfig, HandleError, HandleState, Orchestrator, Payload, ResourceHandle,
    SharedHandle,
};
use crate::observability::Metrics;
use crate::processors::ProcessorRegistry;
use crate::transfer::{CrossOrigin, Transport, TransportConfig};

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error(transparent)]
    Handle(#[from] HandleError),

    #[error("resource {0} was already added")]
    Duplicate(FileId),

    #[error("unknown resource {0}")]
    Unknown(FileId),
}

pub type Result<T> = std::result::Result<T, LoaderError>;

/// Callback from a handle, queued for [`Loader::run`]
struct Advanced {
    handle: SharedHandle,
    success: bool,
}

/// The part of the loader handles hold on to
struct LoaderCore {
    base_url: Option<String>,
    cross_origin: Option<CrossOrigin>,
    defaults: RefCell<TransportConfig>,
    transport: Rc<dyn Transport>,
    signals: UnboundedSender<Advanced>,
    events: UnboundedSender<LoaderEvent>,
}

impl LoaderCore {
    fn emit(&self, event: LoaderEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }
}

impl Orchestrator for LoaderCore {
    fn base_address(&self) -> Option<String> {
        self.base_url.clone()
    }

    fn default_cross_origin(&self) -> Option<CrossOrigin> {
        self.cross_origin
    }

    fn transport_defaults(&self) -> TransportConfig {
        self.defaults.borrow().clone()
    }

    fn transport(&self) -> Rc<dyn Transport> {
        self.transport.clone()
    }

    fn advance(&self, handle: &SharedHandle, success: bool) {
        let _ = self.signals.send(Advanced {
            handle: handle.clone(),
            success,
        });
    }

    fn notify_progress(&self, handle: &SharedHandle, fraction: f64) {
        let file = FileId::of(&handle.borrow());
        self.emit(LoaderEvent::FileProgress { file, fraction });
    }
}

pub struct Loader {
    core: Rc<LoaderCore>,
    settings: LoaderSettings,
    registry: ProcessorRegistry,
    metrics: Arc<Metrics>,
    handles: BTreeMap<FileId, SharedHandle>,
    order: Vec<FileId>,
    queue: VecDeque<SharedHandle>,
    in_flight: usize,
    finished: BTreeSet<FileId>,
    store: PayloadStore,
    signals: UnboundedReceiver<Advanced>,
    events: Option<UnboundedReceiver<LoaderEvent>>,
}

impl Loader {
    pub fn new(
        settings: LoaderSettings,
        transport: Rc<dyn Transport>,
        registry: ProcessorRegistry,
    ) -> Self {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let core = Rc::new(LoaderCore {
            base_url: settings.base_url.clone(),
            cross_origin: settings.cross_origin,
            defaults: RefCell::new(TransportConfig::default()),
            transport,
            signals: signal_tx,
            events: event_tx,
        });

        Self {
            core,
            settings,
            registry,
            metrics: Arc::new(Metrics::new()),
            handles: BTreeMap::new(),
            order: Vec::new(),
            queue: VecDeque::new(),
            in_flight: 0,
            finished: BTreeSet::new(),
            store: PayloadStore::new(),
            signals: signal_rx,
            events: Some(event_rx),
        }
    }

    /// Transport options every handle is layered over
    pub fn with_transport_defaults(self, defaults: TransportConfig) -> Self {
        self.core.defaults.replace(defaults);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    /// Event stream; can be taken once
    pub fn events(&mut self) -> Option<UnboundedReceiver<LoaderEvent>> {
        self.events.take()
    }

    pub fn store(&self) -> &PayloadStore {
        &self.store
    }

    pub fn into_store(self) -> PayloadStore {
        self.store
    }

    pub fn handle(&self, kind: &str, key: &str) -> Option<SharedHandle> {
        self.handles.get(&FileId::new(kind, key)).cloned()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Queue a handle for loading
    ///
    /// The loader-wide `path` is applied to handles without their own path,
    /// unless their url is already absolute.
    pub fn add(&mut self, mut config: HandleConfig) -> Result<SharedHandle> {
        let absolute = config.url.as_deref().is_some_and(location::is_absolute);
        if config.path.is_none() && !absolute {
            config.path = self.settings.path.clone();
        }

        let handle = ResourceHandle::new(config)?.into_shared();
        self.register(handle)
    }

    /// Queue a handle whose data is already known; it never transfers
    pub fn add_populated(&mut self, config: HandleConfig, payload: Payload) -> Result<SharedHandle> {
        let mut handle = ResourceHandle::new(config)?;
        handle.populate(payload)?;
        self.register(handle.into_shared())
    }

    fn register(&mut self, handle: SharedHandle) -> Result<SharedHandle> {
        let file = FileId::of(&handle.borrow());
        if self.handles.contains_key(&file) {
            return Err(LoaderError::Duplicate(file));
        }

        debug!(%file, "Resource queued");
        self.handles.insert(file.clone(), handle.clone());
        self.order.push(file);
        self.queue.push_back(handle.clone());
        Ok(handle)
    }

    /// Pair two handles so neither completes before the other
    pub fn link(&self, a: &SharedHandle, b: &SharedHandle, role: impl Into<String>) -> Result<()> {
        ResourceHandle::link_pair(a, b, role)?;
        Ok(())
    }

    /// [`Loader::link`] by identity
    pub fn link_files(&self, primary: &FileId, partner: &FileId, role: impl Into<String>) -> Result<()> {
        let a = self
            .handles
            .get(primary)
            .ok_or_else(|| LoaderError::Unknown(primary.clone()))?;
        let b = self
            .handles
            .get(partner)
            .ok_or_else(|| LoaderError::Unknown(partner.clone()))?;
        self.link(a, b, role)
    }

    /// Load everything queued, resolving once nothing is queued, in flight
    /// or decoding
    pub async fn run(&mut self) -> Result<LoadSummary> {
        info!(queued = self.queue.len(), max_parallel = self.settings.max_parallel, "Load started");

        loop {
            self.start_queued()?;

            if self.in_flight == 0 {
                break;
            }

            // The core owns a sender for as long as `self` lives
            let Some(signal) = self.signals.recv().await else {
                break;
            };
            self.in_flight -= 1;
            self.on_advance(signal).await?;
        }

        let summary = self.summary();
        info!(
            complete = summary.complete.len(),
            failed = summary.failed.len(),
            stranded = summary.stranded.len(),
            "Load finished"
        );
        self.core.emit(LoaderEvent::Complete(summary.clone()));

        Ok(summary)
    }

    fn start_queued(&mut self) -> Result<()> {
        while self.in_flight < self.settings.max_parallel.max(1) {
            let Some(handle) = self.queue.pop_front() else {
                break;
            };

            self.in_flight += 1;
            self.metrics.file_started();
            ResourceHandle::begin_load(&handle, self.core.clone())?;
        }

        Ok(())
    }

    async fn on_advance(&mut self, signal: Advanced) -> Result<()> {
        let Advanced { handle, success } = signal;
        let state = handle.borrow().state();

        match state {
            HandleState::Loading if success => self.on_loaded(&handle).await,
            HandleState::Loading => self.on_failed(&handle, "transfer failed".to_string()),
            // Populated handles finalize before advancing
            HandleState::Complete | HandleState::WaitingOnLink => {
                self.commit_with_partner(&handle);
                Ok(())
            }
            other => {
                warn!(file = %FileId::of(&handle.borrow()), state = %other, "Unexpected advance");
                Ok(())
            }
        }
    }

    async fn on_loaded(&mut self, handle: &SharedHandle) -> Result<()> {
        let (file, bytes) = {
            let mut h = handle.borrow_mut();
            h.mark_loaded()?;
            let bytes = h.raw_body().map(|b| b.len() as u64).unwrap_or(0);
            (FileId::of(&h), bytes)
        };

        self.metrics.bytes_received(bytes);
        self.core.emit(LoaderEvent::FileLoaded { file: file.clone(), bytes });

        let processor = self.registry.resolve(&file.kind);
        if let Err(e) = processor.decode(handle).await {
            return self.on_failed(handle, e.to_string());
        }

        let outcome = ResourceHandle::process(handle, |h| self.commit(h))?;
        match outcome {
            Finalized::Complete => {}
            Finalized::WaitingOnLink => debug!(%file, "Waiting on linked partner"),
            Finalized::JointComplete { partner } => self.commit(&partner),
        }

        Ok(())
    }

    fn on_failed(&mut self, handle: &SharedHandle, reason: String) -> Result<()> {
        let file = {
            let mut h = handle.borrow_mut();
            h.mark_errored()?;
            FileId::of(&h)
        };

        warn!(%file, %reason, "Resource failed");
        self.metrics.file_failed();
        self.finished.insert(file.clone());
        self.core.emit(LoaderEvent::FileFailed { file, reason });
        Ok(())
    }

    fn commit_with_partner(&mut self, handle: &SharedHandle) {
        self.commit(handle);
        let partner = handle.borrow().partner();
        if let Some(partner) = partner {
            self.commit(&partner);
        }
    }

    /// Store the payload of a completed handle, once
    fn commit(&mut self, handle: &SharedHandle) {
        let h = handle.borrow();
        if h.state() != HandleState::Complete {
            return;
        }

        let file = FileId::of(&h);
        if !self.finished.insert(file.clone()) {
            return;
        }

        if let Some(payload) = h.payload() {
            self.store.insert(file.clone(), payload.clone());
        }

        info!(%file, "Resource complete");
        self.metrics.file_completed();
        self.core.emit(LoaderEvent::FileComplete { file });
    }

    fn summary(&self) -> LoadSummary {
        let mut summary = LoadSummary::default();

        for file in &self.order {
            let Some(handle) = self.handles.get(file) else {
                continue;
            };

            match handle.borrow().state() {
                HandleState::Complete => summary.complete.push(file.clone()),
                HandleState::Errored => summary.failed.push(file.clone()),
                HandleState::WaitingOnLink => summary.stranded.push(file.clone()),
                _ => {}
            }
        }

        summary
    }
}
