//! Logging infrastructure - structured tracing for handle lifecycles
//!
//! Design: Uses `tracing` for structured, contextual logging with:
//! - Configurable level from the environment
//! - Zero-cost when disabled
//! - Console output, or daily-rotated file output via `tracing-appender`
//! - Optional JSON format

use once_cell::sync::OnceCell;
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::errors::HandleError;
use crate::handle::ForeignRef;

mod macros;
pub use macros::*;

/// Global logging state. Holds the file writer guard so buffered lines are
/// flushed for the life of the process.
static LOGGER_INITIALIZED: OnceCell<Option<WorkerGuard>> = OnceCell::new();

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default log level
    pub level: Level,
    /// Enable file logging
    pub file_output: bool,
    /// Log file path (if file_output enabled)
    pub log_path: Option<String>,
    /// Enable JSON format (vs human-readable)
    pub json_format: bool,
    /// Show span events (enter/exit)
    pub show_spans: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            file_output: false,
            log_path: None,
            json_format: false,
            show_spans: false,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // HYBRID_LOG_LEVEL: trace, debug, info, warn, error
        if let Ok(level_str) = std::env::var("HYBRID_LOG_LEVEL") {
            config.level = parse_level(&level_str).unwrap_or(Level::INFO);
        }

        // HYBRID_LOG_FILE: path to log file
        if let Ok(path) = std::env::var("HYBRID_LOG_FILE") {
            config.file_output = true;
            config.log_path = Some(path);
        }

        config.json_format = std::env::var("HYBRID_LOG_JSON").is_ok();
        config.show_spans = std::env::var("HYBRID_LOG_SPANS").is_ok();

        config
    }

    /// Verbose config for chasing lifecycle bugs
    pub fn debug() -> Self {
        Self {
            level: Level::TRACE,
            file_output: false,
            log_path: None,
            json_format: false,
            show_spans: true,
        }
    }
}

pub(crate) fn parse_level(level: &str) -> Option<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Initialize logging with configuration from the environment
pub fn init() {
    init_with_config(LogConfig::from_env());
}

/// Initialize logging with custom configuration. Only the first call has
/// any effect.
pub fn init_with_config(config: LogConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "hybrid_handle={}",
                config.level.as_str().to_lowercase()
            ))
        });

        let span_events = if config.show_spans {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let (writer, guard) = match config.log_path.as_deref().filter(|_| config.file_output) {
            Some(path) => {
                let path = Path::new(path);
                let directory = path.parent().unwrap_or_else(|| Path::new("."));
                let prefix = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "hybrid_handle.log".to_string());
                let appender = tracing_appender::rolling::daily(directory, prefix);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                (tracing_subscriber::fmt::writer::BoxMakeWriter::new(writer), Some(guard))
            }
            None => (tracing_subscriber::fmt::writer::BoxMakeWriter::new(io::stderr), None),
        };

        let layer = fmt::layer()
            .with_writer(writer)
            .with_span_events(span_events)
            .with_target(true)
            .with_thread_names(true)
            .with_line_number(cfg!(debug_assertions));

        let layer = if config.json_format {
            layer.json().boxed()
        } else {
            layer.boxed()
        };

        // Another subscriber may already be installed by the host application
        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(layer)
            .try_init();

        guard
    });
}

/// Check if logging is initialized
pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}

// ============================================================================
// Handle lifecycle events
// ============================================================================

#[inline]
pub fn log_attach(reference: ForeignRef) {
    trace!(
        event = "attach",
        reference = %reference,
        "Foreign resource attached"
    );
}

#[inline]
pub fn log_dispose(reference: ForeignRef) {
    let current = std::thread::current();
    debug!(
        event = "dispose",
        reference = %reference,
        thread = current.name().unwrap_or("<unnamed>"),
        "Destroying foreign resource"
    );
}

/// Report a destructor failure that cannot be returned to a caller
pub fn log_destructor_failure(err: &HandleError, path: &str) {
    error!(
        event = "destructor_failure",
        path = path,
        error = %err,
        "Foreign destructor failed outside an explicit dispose"
    );
}

/// Report a resource that will never be destroyed
pub fn log_leak(reference: ForeignRef, reason: &str) {
    warn!(
        event = "leak",
        reference = %reference,
        reason = reason,
        "Foreign resource leaked"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = LogConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert!(!config.file_output);

        let debug_config = LogConfig::debug();
        assert_eq!(debug_config.level, Level::TRACE);
        assert!(debug_config.show_spans);
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("WARN"), Some(Level::WARN));
        assert_eq!(parse_level("trace"), Some(Level::TRACE));
        assert_eq!(parse_level("loud"), None);
    }

    #[test]
    fn test_init_idempotent() {
        init();
        init(); // Should not panic
        assert!(is_initialized());
    }
}
