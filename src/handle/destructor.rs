//! Destructor seam - the foreign side's release function

use super::ForeignRef;
use crate::errors::DestroyError;

/// Releases the foreign resource identified by a reference.
///
/// Called at most once per attached reference, synchronously, on whichever
/// thread wins the dispose exchange. Implementations must not assume any
/// particular thread.
pub trait Destructor: Send + Sync {
    fn destroy(&self, reference: ForeignRef) -> Result<(), DestroyError>;
}

impl<F> Destructor for F
where
    F: Fn(ForeignRef) -> Result<(), DestroyError> + Send + Sync,
{
    #[inline]
    fn destroy(&self, reference: ForeignRef) -> Result<(), DestroyError> {
        self(reference)
    }
}

/// Destructor backed by a C function pointer
#[derive(Clone, Copy)]
pub struct CDestructor(pub extern "C" fn(usize));

impl Destructor for CDestructor {
    #[inline]
    fn destroy(&self, reference: ForeignRef) -> Result<(), DestroyError> {
        (self.0)(reference.addr());
        Ok(())
    }
}

impl core::fmt::Debug for CDestructor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "CDestructor({:p})", self.0 as *const ())
    }
}
