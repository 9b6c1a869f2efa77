use std::rc::Rc;

use super::SharedHandle;
use crate::transfer::{CrossOrigin, TransportConfig, Transport};

/// The component driving a set of handles.
///
/// Handles call back into their orchestrator from transfer events. They never
/// hold a borrow of themselves while doing so, so implementations may borrow
/// the handle they are given.
pub trait Orchestrator {
    /// Base address joined onto relative handle locations
    fn base_address(&self) -> Option<String>;

    /// Cross-origin policy for handles that do not set their own
    fn default_cross_origin(&self) -> Option<CrossOrigin>;

    /// Shared transport configuration, layered under each handle's own
    fn transport_defaults(&self) -> TransportConfig;

    fn transport(&self) -> Rc<dyn Transport>;

    /// Hand control back after a transfer attempt finished. Called exactly
    /// once per attempt.
    fn advance(&self, handle: &SharedHandle, success: bool);

    /// Best-effort progress notification
    fn notify_progress(&self, handle: &SharedHandle, fraction: f64);
}
