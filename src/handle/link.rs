//! Pairing of two handles and the finalize rendezvous
//!
//! Whichever member of a pair finishes processing second completes both. The
//! first one parks in `WaitingOnLink`. Everything runs on one thread inside
//! synchronous callbacks, so two finalize steps never interleave.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use tracing::{debug, warn};

use super::{HandleError, HandleState, ResourceHandle, Result, SharedHandle};

/// Back-reference to the partner handle
#[derive(Debug, Clone)]
pub struct Link {
    pub(super) partner: Weak<RefCell<ResourceHandle>>,
    pub(super) role: String,
}

impl Link {
    pub fn role(&self) -> &str {
        &self.role
    }
}

/// Outcome of a finalize step
#[derive(Debug, Clone)]
pub enum Finalized {
    /// No partner, the handle completed on its own
    Complete,
    /// Partner has not finished processing yet
    WaitingOnLink,
    /// Partner was waiting; both handles completed in this step
    JointComplete { partner: SharedHandle },
}

impl ResourceHandle {
    /// Pair `a` and `b` symmetrically. A link is fixed once set.
    pub fn link_pair(a: &SharedHandle, b: &SharedHandle, role: impl Into<String>) -> Result<()> {
        if Rc::ptr_eq(a, b) {
            let handle = a.borrow();
            return Err(HandleError::SelfLink {
                kind: handle.kind.clone(),
                key: handle.key.clone(),
            });
        }

        let mut first = a.borrow_mut();
        let mut second = b.borrow_mut();

        for handle in [&*first, &*second] {
            if handle.link.is_some() {
                return Err(HandleError::AlreadyLinked {
                    kind: handle.kind.clone(),
                    key: handle.key.clone(),
                });
            }
        }

        let role = role.into();
        first.link = Some(Link {
            partner: Rc::downgrade(b),
            role: role.clone(),
        });
        second.link = Some(Link {
            partner: Rc::downgrade(a),
            role,
        });

        debug!(
            primary = %format!("{}/{}", first.kind, first.key),
            partner = %format!("{}/{}", second.kind, second.key),
            "Handles linked"
        );

        Ok(())
    }

    pub fn link(&self) -> Option<&Link> {
        self.link.as_ref()
    }

    pub fn link_role(&self) -> Option<&str> {
        self.link.as_ref().map(Link::role)
    }

    pub fn partner(&self) -> Option<SharedHandle> {
        self.link.as_ref().and_then(|link| link.partner.upgrade())
    }

    /// Decide between `Complete` and `WaitingOnLink` at the end of processing.
    ///
    /// Only valid from `Processing` or `Populated`.
    pub fn finalize(this: &SharedHandle) -> Result<Finalized> {
        let mut handle = this.borrow_mut();

        if !matches!(handle.state, HandleState::Processing | HandleState::Populated) {
            return Err(HandleError::InvalidTransition {
                kind: handle.kind.clone(),
                key: handle.key.clone(),
                from: handle.state,
                to: HandleState::Complete,
            });
        }

        let Some(link) = handle.link.clone() else {
            handle.transition(HandleState::Complete)?;
            return Ok(Finalized::Complete);
        };

        let Some(partner) = link.partner.upgrade() else {
            warn!(kind = %handle.kind, key = %handle.key, "Linked partner dropped before rendezvous");
            handle.transition(HandleState::WaitingOnLink)?;
            return Ok(Finalized::WaitingOnLink);
        };

        let mut other = partner.borrow_mut();

        if other.state == HandleState::WaitingOnLink {
            handle.transition(HandleState::Complete)?;
            other.transition(HandleState::Complete)?;

            debug!(
                kind = %handle.kind,
                key = %handle.key,
                partner_kind = %other.kind,
                partner_key = %other.key,
                role = %link.role,
                "Linked pair completed"
            );

            drop(other);
            return Ok(Finalized::JointComplete { partner });
        }

        handle.transition(HandleState::WaitingOnLink)?;
        Ok(Finalized::WaitingOnLink)
    }
}
