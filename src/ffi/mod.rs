//! C FFI - Stable ABI for foreign factories
//!
//! Design: the foreign side creates its resource, then:
//! 1. `hybrid_handle_new` with its destroy function
//! 2. `hybrid_handle_attach` before the handle is shared with other threads
//! 3. `hybrid_handle_get` to read the reference before each foreign call
//! 4. `hybrid_handle_dispose` / `hybrid_handle_free` to release
//!
//! Errors are reported as status codes, with the last one kept per thread.

mod handle;


pub use handle::{
    hybrid_handle_attach, hybrid_handle_dispose, hybrid_handle_free, hybrid_handle_get,
    hybrid_handle_is_valid, hybrid_handle_new, HybridHandleFfi,
};

use crate::errors::Result;
use crate::logging::debug;
use std::cell::Cell;

pub const HYBRID_OK: i32 = 0;
pub const HYBRID_ERR_NULL_ARGUMENT: i32 = -1;

thread_local! {
    static LAST_STATUS: Cell<i32> = Cell::new(HYBRID_OK);
}

/// Status code of the most recent call on this thread
#[no_mangle]
pub extern "C" fn hybrid_handle_last_error() -> i32 {
    LAST_STATUS.with(Cell::get)
}

#[inline]
pub(crate) fn set_status(code: i32) -> i32 {
    LAST_STATUS.with(|status| status.set(code));
    code
}

/// Convert a result into a status code, recording it as the last error
pub(crate) fn status_of(function: &str, result: Result<()>) -> i32 {
    match result {
        Ok(()) => set_status(HYBRID_OK),
        Err(err) => {
            debug!(
                event = "ffi_error",
                function = function,
                error = %err,
                "FFI call failed"
            );
            set_status(err.code())
        }
    }
}
