//! Opaque foreign reference
//!
//! Pointer-width and never zero. Only construction and readout are exposed,
//! no arithmetic.

use core::fmt;
use core::num::NonZeroUsize;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ForeignRef(NonZeroUsize);

impl ForeignRef {
    /// Wrap a raw address. Returns `None` for the zero sentinel.
    #[inline]
    pub const fn new(addr: usize) -> Option<Self> {
        match NonZeroUsize::new(addr) {
            Some(n) => Some(Self(n)),
            None => None,
        }
    }

    #[inline]
    pub fn from_ptr<T>(ptr: *mut T) -> Option<Self> {
        Self::new(ptr as usize)
    }

    #[inline]
    pub const fn addr(self) -> usize {
        self.0.get()
    }

    /// Reinterpret as a pointer for handing back across the boundary.
    /// Dereferencing it is the foreign side's business.
    #[inline]
    pub fn as_ptr<T>(self) -> *mut T {
        self.0.get() as *mut T
    }
}

impl fmt::Debug for ForeignRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ForeignRef({:#x})", self.addr())
    }
}

impl fmt::Display for ForeignRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.addr())
    }
}
