//! Error taxonomy for handle operations
//!
//! Use-after-dispose is always surfaced as `InvalidHandle`. Double dispose is
//! not an error and never produces one.

use crate::handle::ForeignRef;
use std::any::Any;
use std::fmt;

/// Failure reported by a foreign destructor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestroyError {
    pub message: String,
}

impl DestroyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl fmt::Display for DestroyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for DestroyError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleError {
    /// Handle was never attached or has already been disposed
    InvalidHandle,
    /// Attach called on a handle that already owns a resource
    AlreadyAttached { current: ForeignRef },
    /// Attach called on a handle whose resource was already destroyed
    AlreadyDisposed,
    /// Zero was passed where a foreign reference was expected
    NullReference,
    /// The foreign destructor itself failed
    DestructorFailure { reference: ForeignRef, message: String },
    FinalizerUnavailable(String),
    Config(String),
}

impl HandleError {
    pub(crate) fn destructor_failure(reference: ForeignRef, err: DestroyError) -> Self {
        Self::DestructorFailure {
            reference,
            message: err.message,
        }
    }

    /// Status code used by the C ABI
    pub fn code(&self) -> i32 {
        match self {
            Self::InvalidHandle => 1,
            Self::AlreadyAttached { .. } => 2,
            Self::NullReference => 3,
            Self::DestructorFailure { .. } => 4,
            Self::AlreadyDisposed => 5,
            Self::FinalizerUnavailable(_) => 6,
            Self::Config(_) => 7,
        }
    }
}

impl fmt::Display for HandleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidHandle => {
                write!(f, "Invalid handle: foreign resource is not attached or already disposed")
            }
            Self::AlreadyAttached { current } => {
                write!(f, "Handle already owns foreign resource {}", current)
            }
            Self::AlreadyDisposed => {
                write!(f, "Handle has been disposed and cannot be re-attached")
            }
            Self::NullReference => {
                write!(f, "Foreign reference must be non-zero")
            }
            Self::DestructorFailure { reference, message } => {
                write!(f, "Destructor failed for {}: {}", reference, message)
            }
            Self::FinalizerUnavailable(reason) => {
                write!(f, "Finalizer unavailable: {}", reason)
            }
            Self::Config(msg) => {
                write!(f, "Configuration error: {}", msg)
            }
        }
    }
}

impl std::error::Error for HandleError {}

pub type Result<T> = std::result::Result<T, HandleError>;

/// Best-effort text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "destructor panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let r = ForeignRef::new(0x10).unwrap();
        let codes = [
            HandleError::InvalidHandle.code(),
            HandleError::AlreadyAttached { current: r }.code(),
            HandleError::NullReference.code(),
            HandleError::destructor_failure(r, DestroyError::new("x")).code(),
            HandleError::AlreadyDisposed.code(),
            HandleError::FinalizerUnavailable(String::new()).code(),
            HandleError::Config(String::new()).code(),
        ];
        let mut sorted = codes.to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
    }

    #[test]
    fn test_panic_message() {
        let payload = std::panic::catch_unwind(|| panic!("native abort")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "native abort");

        let payload = std::panic::catch_unwind(|| panic!("code {}", 7)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "code 7");
    }

    #[test]
    fn test_display_mentions_reference() {
        let r = ForeignRef::new(0xabcd).unwrap();
        let err = HandleError::destructor_failure(r, DestroyError::new("boom"));
        assert_eq!(err.to_string(), "Destructor failed for 0xabcd: boom");
    }
}
