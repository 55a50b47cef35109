//! Hybrid handles - Rust-owned wrappers for foreign resources
//!
//! A [`HybridHandle`] owns one reference into a foreign, manually managed
//! memory domain and guarantees its destructor runs at most once, whether
//! disposal comes from explicit `dispose()`, from drop, or from a background
//! [`Finalizer`] thread, and however many threads race to trigger it.
//!
//! Without a finalizer, drop is the release path: a wrapper that is leaked
//! with `std::mem::forget` leaks its foreign resource too.

pub mod config;
pub mod errors;
pub mod ffi;
pub mod finalizer;
pub mod handle;
pub mod logging;
pub mod wrapper;

// Re-export core types
pub use config::{FinalizerConfig, HybridConfig};
pub use errors::{DestroyError, HandleError};
pub use finalizer::{Finalize, Finalizer, FinalizerStats};
pub use handle::{CDestructor, Destructor, ForeignRef, HandleState, HybridHandle};
pub use wrapper::{HybridObject, ManagedWrapper};

/// Library initialization: logging from the environment
#[no_mangle]
pub extern "C" fn hybrid_handle_init() {
    logging::init();
}
