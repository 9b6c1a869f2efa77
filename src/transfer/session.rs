//! Transfer session: one in-flight transfer bound to one handle
//!
//! The transport reports through a [`TransferReporter`]; reports travel over
//! an mpsc channel and a local pump task delivers them to the handle. The
//! session keeps three handler slots (complete, error, progress). A terminal
//! report empties all of them, which is what makes the terminal event unique
//! per session.

use bytes::Bytes;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::{TransferError, TransferRequest, Transport};
use crate::handle::{ResourceHandle, SharedHandle};

/// One progress notification from the transport
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressReport {
    pub loaded: u64,
    pub total: u64,
    pub length_computable: bool,
}

/// Completed transfer as seen by the transport, success or not
#[derive(Debug, Clone)]
pub struct TransferResponse {
    pub status: u16,
    pub body: Bytes,
    pub media_type: Option<String>,
}

impl TransferResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug)]
pub enum TransferEvent {
    Progress(ProgressReport),
    Complete(TransferResponse),
    Failed(TransferError),
}

impl TransferEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransferEvent::Progress(_))
    }
}

type EventSender = mpsc::UnboundedSender<TransferEvent>;

#[derive(Debug, Default)]
struct SessionSlots {
    on_complete: Option<EventSender>,
    on_error: Option<EventSender>,
    on_progress: Option<EventSender>,
    /// Set by `reset_transport`; queued events are dropped once set
    reset: bool,
}

impl SessionSlots {
    fn connected(tx: EventSender) -> Self {
        Self {
            on_complete: Some(tx.clone()),
            on_error: Some(tx.clone()),
            on_progress: Some(tx),
            reset: false,
        }
    }

    fn clear(&mut self) {
        self.on_complete = None;
        self.on_error = None;
        self.on_progress = None;
    }

    fn is_empty(&self) -> bool {
        self.on_complete.is_none() && self.on_error.is_none() && self.on_progress.is_none()
    }
}

/// Transport-side end of a session
#[derive(Debug, Clone)]
pub struct TransferReporter {
    slots: Rc<RefCell<SessionSlots>>,
}

impl TransferReporter {
    /// Report progress. Returns `false` when nobody is listening anymore.
    pub fn progress(&self, loaded: u64, total: u64, length_computable: bool) -> bool {
        let slots = self.slots.borrow();
        match &slots.on_progress {
            Some(tx) => tx
                .send(TransferEvent::Progress(ProgressReport {
                    loaded,
                    total,
                    length_computable,
                }))
                .is_ok(),
            None => false,
        }
    }

    /// Terminal report: the transfer finished with a status
    pub fn complete(&self, response: TransferResponse) -> bool {
        let tx = {
            let mut slots = self.slots.borrow_mut();
            let tx = slots.on_complete.take();
            slots.clear();
            tx
        };

        match tx {
            Some(tx) => tx.send(TransferEvent::Complete(response)).is_ok(),
            None => false,
        }
    }

    /// Terminal report: the transfer failed before a status was available
    pub fn fail(&self, error: TransferError) -> bool {
        let tx = {
            let mut slots = self.slots.borrow_mut();
            let tx = slots.on_error.take();
            slots.clear();
            tx
        };

        match tx {
            Some(tx) => tx.send(TransferEvent::Failed(error)).is_ok(),
            None => false,
        }
    }

    pub fn is_detached(&self) -> bool {
        self.slots.borrow().is_empty()
    }
}

/// Handle-side end of a session
#[derive(Debug)]
pub struct TransferSession {
    url: String,
    slots: Rc<RefCell<SessionSlots>>,
}

impl TransferSession {
    /// Open a session for `handle` and start the transport on the local task set.
    ///
    /// Must be called from within a `tokio::task::LocalSet`.
    pub fn open(handle: &SharedHandle, transport: Rc<dyn Transport>, request: TransferRequest) -> Self {
        let (session, reporter, events) = Self::channel(request.url.clone());

        debug!(url = %request.url, "Opening transfer session");

        tokio::task::spawn_local(async move {
            transport.fetch(request, reporter).await;
        });
        tokio::task::spawn_local(pump(
            Rc::downgrade(handle),
            session.slots.clone(),
            events,
        ));

        session
    }

    /// Session plus its reporter and raw event stream, without spawning anything
    pub(crate) fn channel(
        url: String,
    ) -> (Self, TransferReporter, mpsc::UnboundedReceiver<TransferEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let slots = Rc::new(RefCell::new(SessionSlots::connected(tx)));
        let reporter = TransferReporter {
            slots: slots.clone(),
        };
        (Self { url, slots }, reporter, rx)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Detach all handlers; later transport reports become no-ops
    pub fn reset_transport(&self) {
        let mut slots = self.slots.borrow_mut();
        slots.clear();
        slots.reset = true;
    }

    pub fn is_detached(&self) -> bool {
        self.slots.borrow().is_empty()
    }

    /// Which of the complete, error and progress slots are still attached
    pub fn attached_slots(&self) -> [bool; 3] {
        let slots = self.slots.borrow();
        [
            slots.on_complete.is_some(),
            slots.on_error.is_some(),
            slots.on_progress.is_some(),
        ]
    }
}

async fn pump(
    handle: Weak<RefCell<ResourceHandle>>,
    slots: Rc<RefCell<SessionSlots>>,
    mut events: mpsc::UnboundedReceiver<TransferEvent>,
) {
    while let Some(event) = events.recv().await {
        if slots.borrow().reset {
            trace!("Dropping transfer event after reset");
            break;
        }

        let terminal = event.is_terminal();

        let Some(handle) = handle.upgrade() else {
            trace!("Handle dropped, ending session pump");
            break;
        };

        ResourceHandle::on_transfer_event(&handle, event);

        if terminal {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_response() -> TransferResponse {
        TransferResponse {
            status: 200,
            body: Bytes::from_static(b"ok"),
            media_type: None,
        }
    }

    #[tokio::test]
    async fn test_progress_then_complete() {
        let (session, reporter, mut rx) = TransferSession::channel("http://test/a".to_string());

        assert!(reporter.progress(1, 4, true));
        assert!(reporter.progress(4, 4, true));
        assert!(reporter.complete(ok_response()));

        assert!(matches!(rx.recv().await, Some(TransferEvent::Progress(p)) if p.loaded == 1));
        assert!(matches!(rx.recv().await, Some(TransferEvent::Progress(p)) if p.loaded == 4));
        assert!(matches!(rx.recv().await, Some(TransferEvent::Complete(r)) if r.status == 200));

        // every sender is gone after the terminal report
        assert!(rx.recv().await.is_none());
        assert!(session.is_detached());
    }

    #[tokio::test]
    async fn test_only_one_terminal_event() {
        let (_session, reporter, mut rx) = TransferSession::channel("http://test/a".to_string());

        assert!(reporter.fail(TransferError::Timeout));
        assert!(!reporter.complete(ok_response()));
        assert!(!reporter.fail(TransferError::Timeout));
        assert!(!reporter.progress(1, 1, true));

        assert!(matches!(rx.recv().await, Some(TransferEvent::Failed(TransferError::Timeout))));
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_reset_transport_clears_all_slots() {
        let (session, reporter, _rx) = TransferSession::channel("http://test/a".to_string());
        assert_eq!(session.attached_slots(), [true, true, true]);

        session.reset_transport();

        assert_eq!(session.attached_slots(), [false, false, false]);
        assert!(reporter.is_detached());
        assert!(!reporter.progress(1, 2, true));
        assert!(!reporter.complete(ok_response()));
        assert!(!reporter.fail(TransferError::Timeout));
    }

    #[test]
    fn test_response_success_range() {
        let mut response = ok_response();
        assert!(response.is_success());
        response.status = 204;
        assert!(response.is_success());
        response.status = 304;
        assert!(!response.is_success());
        response.status = 404;
        assert!(!response.is_success());
    }
}
