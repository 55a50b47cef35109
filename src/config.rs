//! Configuration - finalizer and logging settings
//!
//! Read from a `.hybridrc` TOML file, with environment overrides on top.

use crate::errors::{HandleError, Result};
use crate::logging::{parse_level, LogConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = ".hybridrc";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HybridConfig {
    #[serde(default)]
    pub finalizer: FinalizerConfig,

    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizerConfig {
    /// Name of the background finalizer thread
    #[serde(default = "default_thread_name")]
    pub thread_name: String,

    /// Bounded queue size. `None` means unbounded; when bounded, a wrapper
    /// dropped while the queue is full disposes inline instead.
    #[serde(default)]
    pub queue_capacity: Option<usize>,

    /// Finalize queued handles on shutdown instead of leaking them
    #[serde(default = "default_true")]
    pub drain_on_shutdown: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub file: Option<String>,

    #[serde(default)]
    pub json: bool,

    #[serde(default)]
    pub spans: bool,
}

impl Default for FinalizerConfig {
    fn default() -> Self {
        Self {
            thread_name: default_thread_name(),
            queue_capacity: None,
            drain_on_shutdown: true,
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_level(),
            file: None,
            json: false,
            spans: false,
        }
    }
}

fn default_true() -> bool { true }
fn default_thread_name() -> String { "hybrid-finalizer".to_string() }
fn default_level() -> String { "info".to_string() }

impl FinalizerConfig {
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    pub fn with_drain_on_shutdown(mut self, drain: bool) -> Self {
        self.drain_on_shutdown = drain;
        self
    }
}

impl LoggingSection {
    pub fn to_log_config(&self) -> Result<LogConfig> {
        let level = parse_level(&self.level)
            .ok_or_else(|| HandleError::Config(format!("Unknown log level '{}'", self.level)))?;

        Ok(LogConfig {
            level,
            file_output: self.file.is_some(),
            log_path: self.file.clone(),
            json_format: self.json,
            show_spans: self.spans,
        })
    }
}

impl HybridConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| HandleError::Config(format!("Failed to read config: {}", e)))?;

        Self::parse(&content)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| HandleError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Find `.hybridrc` in the current directory or its parents, then
    /// apply environment overrides. Falls back to defaults.
    pub fn discover() -> Self {
        match std::env::current_dir() {
            Ok(dir) => Self::discover_from(&dir, |key| std::env::var(key).ok()),
            Err(_) => Self::default().apply_env(),
        }
    }

    /// Search `start` and its parents for `.hybridrc`, then apply overrides
    /// from `lookup`. An unreadable or malformed file is skipped.
    pub(crate) fn discover_from<F>(start: &Path, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let found = start
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .filter(|path| path.exists())
            .find_map(|path| Self::load(&path).ok());

        found.unwrap_or_default().apply_env_with(lookup)
    }

    /// Apply `HYBRID_*` environment overrides
    pub fn apply_env(self) -> Self {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    pub(crate) fn apply_env_with<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup("HYBRID_FINALIZER_THREAD") {
            self.finalizer.thread_name = name;
        }
        if let Some(drain) = lookup("HYBRID_FINALIZER_DRAIN") {
            self.finalizer.drain_on_shutdown = !matches!(
                drain.to_lowercase().as_str(),
                "0" | "false" | "no" | "off"
            );
        }
        if let Some(level) = lookup("HYBRID_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(file) = lookup("HYBRID_LOG_FILE") {
            self.logging.file = Some(file);
        }
        self
    }

    /// Install the tracing subscriber described by the `[logging]` section
    pub fn init_logging(&self) -> Result<()> {
        crate::logging::init_with_config(self.logging.to_log_config()?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = HybridConfig::default();
        assert_eq!(config.finalizer.thread_name, "hybrid-finalizer");
        assert_eq!(config.finalizer.queue_capacity, None);
        assert!(config.finalizer.drain_on_shutdown);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_partial() {
        let config = HybridConfig::parse(
            r#"
            [finalizer]
            queue_capacity = 64
            drain_on_shutdown = false
            "#,
        )
        .unwrap();

        assert_eq!(config.finalizer.queue_capacity, Some(64));
        assert!(!config.finalizer.drain_on_shutdown);
        assert_eq!(config.finalizer.thread_name, "hybrid-finalizer");
        assert_eq!(config.logging, LoggingSection::default());
    }

    #[test]
    fn test_parse_invalid() {
        let err = HybridConfig::parse("[finalizer\nthread_name = 3").unwrap_err();
        assert!(matches!(err, HandleError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\nlevel = \"debug\"\njson = true").unwrap();

        let config = HybridConfig::load(file.path()).unwrap();
        let log = config.logging.to_log_config().unwrap();
        assert_eq!(log.level, tracing::Level::DEBUG);
        assert!(log.json_format);
        assert!(!log.file_output);
    }

    #[test]
    fn test_load_missing_file() {
        let err = HybridConfig::load(Path::new("/nonexistent/.hybridrc")).unwrap_err();
        assert!(matches!(err, HandleError::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("HYBRID_FINALIZER_THREAD", "gc-finalizer"),
            ("HYBRID_FINALIZER_DRAIN", "off"),
            ("HYBRID_LOG_LEVEL", "trace"),
        ]
        .into_iter()
        .collect();

        let config = HybridConfig::default()
            .apply_env_with(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.finalizer.thread_name, "gc-finalizer");
        assert!(!config.finalizer.drain_on_shutdown);
        assert_eq!(config.logging.level, "trace");
    }

    #[test]
    fn test_discover_walks_parents() {
        let root = tempfile::tempdir().unwrap();
        fs::write(
            root.path().join(CONFIG_FILE_NAME),
            "[finalizer]\nthread_name = \"from-file\"\nqueue_capacity = 8\n",
        )
        .unwrap();
        let child = root.path().join("crate").join("src");
        fs::create_dir_all(&child).unwrap();

        let env: HashMap<&str, &str> = [("HYBRID_FINALIZER_DRAIN", "0")].into_iter().collect();
        let config = HybridConfig::discover_from(&child, |key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.finalizer.thread_name, "from-file");
        assert_eq!(config.finalizer.queue_capacity, Some(8));
        assert!(!config.finalizer.drain_on_shutdown);
    }

    #[test]
    fn test_discover_skips_malformed_file() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join(CONFIG_FILE_NAME), "[finalizer\n").unwrap();

        let config = HybridConfig::discover_from(root.path(), |_| None);
        assert_eq!(config.finalizer, FinalizerConfig::default());
    }

    #[test]
    fn test_init_logging_rejects_bad_level() {
        let mut config = HybridConfig::default();
        config.logging.level = "chatty".to_string();
        assert!(matches!(config.init_logging(), Err(HandleError::Config(_))));
    }

    #[test]
    fn test_unknown_level_rejected() {
        let section = LoggingSection {
            level: "chatty".to_string(),
            ..LoggingSection::default()
        };
        assert!(matches!(section.to_log_config(), Err(HandleError::Config(_))));
    }
}
