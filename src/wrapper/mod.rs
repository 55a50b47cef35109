//! Managed wrapper - the user-facing owner of a hybrid handle
//!
//! Every foreign operation is routed through [`ManagedWrapper::with_reference`],
//! which fails with `InvalidHandle` once the resource is gone. Disposal
//! happens on explicit `dispose()`, or on drop: inline, or on a
//! [`Finalizer`] thread if the wrapper was registered with one. A destructor
//! that panics during drop is logged like one that returns an error.


use crate::errors::{HandleError, Result};
use crate::finalizer::{Finalize, Finalizer};
use crate::handle::{Destructor, ForeignRef, HandleState, HybridHandle};
use crate::logging::{debug, log_destructor_failure};
use std::fmt;
use std::sync::Arc;

pub struct ManagedWrapper<D: Destructor + 'static> {
    /// Never shared outside this wrapper. The `Arc` exists only so the
    /// handle can outlive the wrapper on the finalizer queue.
    handle: Arc<HybridHandle<D>>,
    finalizer: Option<Finalizer>,
}

impl<D: Destructor + 'static> ManagedWrapper<D> {
    pub fn new(reference: ForeignRef, destructor: D) -> Self {
        Self::from_handle(HybridHandle::new(reference, destructor))
    }

    /// Wrap a raw address returned by a foreign factory
    pub fn from_raw(addr: usize, destructor: D) -> Result<Self> {
        let reference = ForeignRef::new(addr).ok_or(HandleError::NullReference)?;
        Ok(Self::new(reference, destructor))
    }

    pub fn from_handle(handle: HybridHandle<D>) -> Self {
        Self {
            handle: Arc::new(handle),
            finalizer: None,
        }
    }

    /// Wrap `reference` and dispose it on `finalizer`'s thread when dropped
    pub fn with_finalizer(reference: ForeignRef, destructor: D, finalizer: &Finalizer) -> Self {
        let mut wrapper = Self::new(reference, destructor);
        wrapper.register(finalizer);
        wrapper
    }

    /// Route drop-time disposal through `finalizer`
    pub fn register(&mut self, finalizer: &Finalizer) {
        self.finalizer = Some(finalizer.clone());
    }

    /// Run a foreign operation against the owned reference, or fail fast if
    /// the resource has been disposed
    #[inline]
    pub fn with_reference<R, F>(&self, op: F) -> Result<R>
    where
        F: FnOnce(ForeignRef) -> R,
    {
        let reference = self.handle.access_reference()?;
        Ok(op(reference))
    }

    /// Like `with_reference`, for operations that can fail themselves
    pub fn try_with_reference<R, F>(&self, op: F) -> Result<R>
    where
        F: FnOnce(ForeignRef) -> Result<R>,
    {
        let reference = self.handle.access_reference()?;
        op(reference)
    }

    #[inline]
    pub fn reference(&self) -> Result<ForeignRef> {
        self.handle.access_reference()
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.handle.is_valid()
    }

    pub fn state(&self) -> HandleState {
        self.handle.state()
    }

    /// Destroy the foreign resource now, on this thread. Idempotent.
    pub fn dispose(&self) -> Result<()> {
        self.handle.dispose()
    }

    /// Take the reference back out without destroying it
    pub fn into_raw(self) -> Option<ForeignRef> {
        self.handle.release()
    }

    pub fn is_registered(&self) -> bool {
        self.finalizer.is_some()
    }
}

impl<D: Destructor + 'static> Drop for ManagedWrapper<D> {
    fn drop(&mut self) {
        if let Some(finalizer) = self.finalizer.take() {
            if !self.handle.is_valid() {
                return;
            }
            let item: Arc<dyn Finalize> = self.handle.clone();
            if finalizer.enqueue(item) {
                return;
            }
            debug!(event = "finalizer_unavailable", "Disposing inline on drop");
        }

        if let Err(err) = self.handle.dispose_catching() {
            log_destructor_failure(&err, "drop");
        }
    }
}

impl<D: Destructor + 'static> fmt::Debug for ManagedWrapper<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedWrapper")
            .field("handle", &self.handle)
            .field("registered", &self.is_registered())
            .finish()
    }
}

/// Implemented by user types that embed a `ManagedWrapper`
pub trait HybridObject {
    type Destructor: Destructor + 'static;

    fn wrapper(&self) -> &ManagedWrapper<Self::Destructor>;

    fn is_valid(&self) -> bool {
        self.wrapper().is_valid()
    }

    fn dispose(&self) -> Result<()> {
        self.wrapper().dispose()
    }

    fn native_reference(&self) -> Result<ForeignRef> {
        self.wrapper().reference()
    }

    fn with_reference<R, F>(&self, op: F) -> Result<R>
    where
        F: FnOnce(ForeignRef) -> R,
    {
        self.wrapper().with_reference(op)
    }
}
