//! Handle lifecycle - C API for attach, access and dispose

use super::{set_status, status_of, HYBRID_ERR_NULL_ARGUMENT, HYBRID_OK};
use crate::handle::{CDestructor, HybridHandle};
use crate::logging::trace;

/// Opaque handle owned by the foreign side
pub struct HybridHandleFfi {
    handle: HybridHandle<CDestructor>,
}

/// Create an empty handle that will release resources with `destroy`
///
/// Returns null if `destroy` is null. Free with `hybrid_handle_free`.
#[no_mangle]
pub extern "C" fn hybrid_handle_new(destroy: Option<extern "C" fn(usize)>) -> *mut HybridHandleFfi {
    let Some(destroy) = destroy else {
        set_status(HYBRID_ERR_NULL_ARGUMENT);
        return std::ptr::null_mut();
    };

    let ffi = Box::new(HybridHandleFfi {
        handle: HybridHandle::empty(CDestructor(destroy)),
    });
    trace!(event = "ffi_new", address = ?(&*ffi as *const HybridHandleFfi));
    set_status(HYBRID_OK);
    Box::into_raw(ffi)
}

/// Attach a foreign reference to an empty handle
///
/// # Safety
/// - `handle` must be null or come from `hybrid_handle_new` and not be freed
/// - Must be called before the handle is shared with other threads
#[no_mangle]
pub unsafe extern "C" fn hybrid_handle_attach(handle: *mut HybridHandleFfi, reference: usize) -> i32 {
    let Some(ffi) = handle.as_mut() else {
        return set_status(HYBRID_ERR_NULL_ARGUMENT);
    };
    status_of("hybrid_handle_attach", ffi.handle.attach_raw(reference))
}

/// Whether the handle currently owns a resource. False for null.
///
/// # Safety
/// - `handle` must be null or a live handle from `hybrid_handle_new`
#[no_mangle]
pub unsafe extern "C" fn hybrid_handle_is_valid(handle: *const HybridHandleFfi) -> bool {
    handle.as_ref().map_or(false, |ffi| ffi.handle.is_valid())
}

/// Read the owned reference into `out`
///
/// # Safety
/// - `handle` must be null or a live handle from `hybrid_handle_new`
/// - `out` must be null or valid for a `usize` write
/// - `out` is left untouched on error
#[no_mangle]
pub unsafe extern "C" fn hybrid_handle_get(handle: *const HybridHandleFfi, out: *mut usize) -> i32 {
    let (Some(ffi), false) = (handle.as_ref(), out.is_null()) else {
        return set_status(HYBRID_ERR_NULL_ARGUMENT);
    };

    let result = ffi.handle.access_reference().map(|reference| {
        out.write(reference.addr());
    });
    status_of("hybrid_handle_get", result)
}

/// Destroy the owned resource. Idempotent and thread-safe.
///
/// # Safety
/// - `handle` must be null or a live handle from `hybrid_handle_new`
#[no_mangle]
pub unsafe extern "C" fn hybrid_handle_dispose(handle: *const HybridHandleFfi) -> i32 {
    let Some(ffi) = handle.as_ref() else {
        return set_status(HYBRID_ERR_NULL_ARGUMENT);
    };
    status_of("hybrid_handle_dispose", ffi.handle.dispose())
}

/// Dispose (if still attached) and free the handle. Null-safe.
///
/// # Safety
/// - `handle` must be null or a live handle from `hybrid_handle_new`
/// - No other thread may use `handle` during or after this call
#[no_mangle]
pub unsafe extern "C" fn hybrid_handle_free(handle: *mut HybridHandleFfi) {
    if handle.is_null() {
        return;
    }
    trace!(event = "ffi_free", address = ?handle);
    drop(Box::from_raw(handle));
}
