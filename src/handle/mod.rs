//! Hybrid handle - exclusive ownership of one foreign resource
//!
//! Design: a single pointer-width atomic holds the foreign reference, with
//! zero as the "nothing owned" sentinel.
//! 1. Attach stores a reference before the handle is shared (`&mut self`)
//! 2. Dispose swaps in the sentinel; only the thread that gets the old
//!    non-zero value back runs the destructor
//! 3. Every foreign call goes through `access_reference`, which fails fast
//!    once the sentinel is in place
//!
//! ```text
//!   Empty ──attach──▶ Attached ──dispose (destructor runs)──▶ Disposed
//!                                                                │
//!                                          dispose: no-op ◀──────┘
//!
//!   Attached ──release (no destructor)──▶ Released
//! ```

mod destructor;
mod reference;


pub use destructor::{CDestructor, Destructor};
pub use reference::ForeignRef;

use crate::errors::{panic_message, HandleError, Result};
use crate::logging::{log_attach, log_destructor_failure, log_dispose, trace};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

const SENTINEL: usize = 0;

/// Observable lifecycle state of a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Empty,
    Attached,
    Disposed,
    /// Ownership was handed back with `release`; the destructor never ran
    Released,
}

pub struct HybridHandle<D: Destructor> {
    reference: AtomicUsize,
    /// Set once by attach; distinguishes Disposed from Empty. Never drives
    /// destruction.
    attached: AtomicBool,
    /// Set by a successful `release`. Diagnostic only, like `attached`.
    released: AtomicBool,
    destructor: D,
}

impl<D: Destructor> HybridHandle<D> {
    /// Create a handle that owns nothing yet
    pub fn empty(destructor: D) -> Self {
        Self {
            reference: AtomicUsize::new(SENTINEL),
            attached: AtomicBool::new(false),
            released: AtomicBool::new(false),
            destructor,
        }
    }

    /// Create a handle that already owns `reference`
    pub fn new(reference: ForeignRef, destructor: D) -> Self {
        log_attach(reference);
        Self {
            reference: AtomicUsize::new(reference.addr()),
            attached: AtomicBool::new(true),
            released: AtomicBool::new(false),
            destructor,
        }
    }

    /// Take ownership of `reference`.
    ///
    /// `&mut self` keeps attach single-threaded: the handle cannot have been
    /// shared yet. Fails if the handle already owns a resource or has
    /// already been disposed.
    pub fn attach(&mut self, reference: ForeignRef) -> Result<()> {
        if let Some(current) = ForeignRef::new(*self.reference.get_mut()) {
            return Err(HandleError::AlreadyAttached { current });
        }
        if *self.attached.get_mut() {
            return Err(HandleError::AlreadyDisposed);
        }

        self.attached.store(true, Ordering::Release);
        self.reference.store(reference.addr(), Ordering::Release);
        log_attach(reference);
        Ok(())
    }

    /// Attach from a raw address as handed over by a foreign factory
    pub fn attach_raw(&mut self, addr: usize) -> Result<()> {
        let reference = ForeignRef::new(addr).ok_or(HandleError::NullReference)?;
        self.attach(reference)
    }

    /// Whether a resource is currently owned.
    ///
    /// Advisory only while a dispose may be in flight; use
    /// [`access_reference`](Self::access_reference) before doing real work.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.reference.load(Ordering::Acquire) != SENTINEL
    }

    /// Lifecycle state for diagnostics. A `release` racing with this call
    /// may briefly show as `Disposed` before `Released`.
    pub fn state(&self) -> HandleState {
        if self.is_valid() {
            HandleState::Attached
        } else if self.released.load(Ordering::Acquire) {
            HandleState::Released
        } else if self.attached.load(Ordering::Acquire) {
            HandleState::Disposed
        } else {
            HandleState::Empty
        }
    }

    /// Read the owned reference for a foreign call, or fail with
    /// `InvalidHandle` if nothing is owned.
    #[inline]
    pub fn access_reference(&self) -> Result<ForeignRef> {
        let reference = ForeignRef::new(self.reference.load(Ordering::Acquire))
            .ok_or(HandleError::InvalidHandle)?;
        trace!(event = "access", reference = %reference);
        Ok(reference)
    }

    /// Destroy the owned resource, at most once.
    ///
    /// Idempotent and callable from any thread. The destructor runs on the
    /// calling thread of whichever call claims the reference; every other
    /// call returns `Ok(())` without doing anything.
    pub fn dispose(&self) -> Result<()> {
        match self.claim() {
            Some(reference) => self.destroy(reference),
            None => Ok(()),
        }
    }

    /// `dispose` for paths with nobody to unwind into (drop, finalizer): a
    /// panicking destructor is reported as `DestructorFailure`.
    pub(crate) fn dispose_catching(&self) -> Result<()> {
        let Some(reference) = self.claim() else {
            return Ok(());
        };

        panic::catch_unwind(AssertUnwindSafe(|| self.destroy(reference))).unwrap_or_else(|payload| {
            Err(HandleError::DestructorFailure {
                reference,
                message: panic_message(payload.as_ref()),
            })
        })
    }

    /// Give up ownership without destroying. The caller becomes responsible
    /// for the returned reference. Returns `None` if nothing was owned.
    ///
    /// The handle then reports [`HandleState::Released`] and is as unusable
    /// as a disposed one.
    pub fn release(&self) -> Option<ForeignRef> {
        let reference = self.claim()?;
        self.released.store(true, Ordering::Release);
        trace!(event = "release", reference = %reference);
        Some(reference)
    }

    /// Swap in the sentinel. Only one caller ever gets `Some` back.
    #[inline]
    fn claim(&self) -> Option<ForeignRef> {
        ForeignRef::new(self.reference.swap(SENTINEL, Ordering::AcqRel))
    }

    fn destroy(&self, reference: ForeignRef) -> Result<()> {
        log_dispose(reference);
        self.destructor
            .destroy(reference)
            .map_err(|err| HandleError::destructor_failure(reference, err))
    }
}

impl<D: Destructor> Drop for HybridHandle<D> {
    fn drop(&mut self) {
        if let Err(err) = self.dispose_catching() {
            log_destructor_failure(&err, "drop");
        }
    }
}

impl<D: Destructor> fmt::Debug for HybridHandle<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HybridHandle")
            .field("reference", &ForeignRef::new(self.reference.load(Ordering::Acquire)))
            .field("state", &self.state())
            .finish()
    }
}
