//! Configuration for pipeline construction
//!
//! A [`PipelineConfig`] controls how stages are wired and how they behave when
//! blocked. It is plain data: every field has a default, so a config file only
//! needs to mention what it changes.
//!
//! # File formats
//!
//! [`PipelineConfig::load`] picks the format from the file extension:
//!
//! - `.toml` - parsed with `toml`
//! - `.json` - parsed with `serde_json`
//!
//! ```toml
//! channel_capacity = 0
//! cancelable_source = true
//! send_timeout_ms = 250
//! thread_name_prefix = "ingest"
//! ```

use crate::error::{PipelineError, Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default prefix for stage thread names
pub const DEFAULT_THREAD_NAME_PREFIX: &str = "stagepipe";

/// Settings applied to every stage of a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Capacity of each inter-stage channel.
    ///
    /// `0` is a rendezvous: a send completes only when the next stage receives.
    /// With capacity `c`, up to `c` values may queue on each stage's output on
    /// top of the one value the stage is holding.
    pub channel_capacity: usize,

    /// Whether the source stops emitting when the cancel token fires.
    /// Ignored when no token is attached.
    pub cancelable_source: bool,

    /// Upper bound on how long a stage waits to hand off one value.
    /// `None` blocks until the consumer is ready or the pipeline is cancelled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_timeout_ms: Option<u64>,

    /// Prefix for stage thread names (`<prefix>-<index>-<name>`)
    pub thread_name_prefix: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 0,
            cancelable_source: true,
            send_timeout_ms: None,
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Create a config with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the inter-stage channel capacity
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Enable or disable cancellation awareness in the source
    pub fn with_cancelable_source(mut self, cancelable: bool) -> Self {
        self.cancelable_source = cancelable;
        self
    }

    /// Bound each send by `timeout`.
    ///
    /// The deadline is stored in whole milliseconds, rounded up, so any
    /// non-zero `timeout` stays non-zero. A zero `timeout` is kept as `0` and
    /// rejected by [`validate`](Self::validate).
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout_ms = Some(duration_to_millis_ceil(timeout));
        self
    }

    /// Set the thread name prefix
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Send deadline as a `Duration`, if configured
    pub fn send_timeout(&self) -> Option<Duration> {
        self.send_timeout_ms.map(Duration::from_millis)
    }

    /// Check the settings for values that cannot produce a working pipeline
    pub fn validate(&self) -> Result<()> {
        if self.thread_name_prefix.trim().is_empty() {
            return Err(PipelineError::Config(
                "thread_name_prefix must not be empty".to_string(),
            ));
        }
        if self.send_timeout_ms == Some(0) {
            return Err(PipelineError::Config(
                "send_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| PipelineError::Config(format!("Failed to parse TOML config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| PipelineError::Config(format!("Failed to parse JSON config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file from disk, choosing the format from its extension
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(PipelineError::Io)
            .with_context(|| format!("Failed to read config file {:?}", path))?;

        match ConfigFormat::from_path(path)? {
            ConfigFormat::Toml => Self::from_toml_str(&content),
            ConfigFormat::Json => Self::from_json_str(&content),
        }
    }

    /// Load a config file, returning defaults if any error occurs
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Using default pipeline config: {}", e);
                Self::default()
            }
        }
    }

    /// Save the config to disk in the format implied by the extension
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(PipelineError::Io)
                    .with_context(|| format!("Failed to create config directory {:?}", parent))?;
            }
        }

        let content = match ConfigFormat::from_path(path)? {
            ConfigFormat::Toml => toml::to_string_pretty(self)
                .map_err(|e| PipelineError::Config(format!("Failed to serialize config: {}", e)))?,
            ConfigFormat::Json => serde_json::to_string_pretty(self)
                .map_err(|e| PipelineError::Config(format!("Failed to serialize config: {}", e)))?,
        };

        std::fs::write(path, content)
            .map_err(PipelineError::Io)
            .with_context(|| format!("Failed to write config file {:?}", path))
    }
}

/// Whole milliseconds in `d`, rounded up and saturating at `u64::MAX`.
fn duration_to_millis_ceil(d: Duration) -> u64 {
    let millis = d.as_nanos().div_ceil(1_000_000);
    u64::try_from(millis).unwrap_or(u64::MAX)
}

/// On-disk config formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Ok(ConfigFormat::Toml),
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(ConfigFormat::Json),
            _ => Err(PipelineError::Config(format!(
                "Unsupported config file extension: {:?}",
                path
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_rendezvous() {
        let config = PipelineConfig::default();
        assert_eq!(config.channel_capacity, 0);
        assert!(config.cancelable_source);
        assert_eq!(config.send_timeout(), None);
        assert_eq!(config.thread_name_prefix, "stagepipe");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = PipelineConfig::from_toml_str("send_timeout_ms = 250").unwrap();
        assert_eq!(config.send_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.channel_capacity, 0);
        assert_eq!(config.thread_name_prefix, DEFAULT_THREAD_NAME_PREFIX);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = PipelineConfig::new().with_thread_name_prefix("  ");
        assert!(config.validate().is_err());

        let err = PipelineConfig::from_toml_str("send_timeout_ms = 0").unwrap_err();
        assert!(err.to_string().contains("send_timeout_ms"));
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        let err = PipelineConfig::from_json_str("{ channel_capacity: }").unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_unknown_extension_rejected() {
        assert!(ConfigFormat::from_path(Path::new("pipeline.yaml")).is_err());
        assert_eq!(
            ConfigFormat::from_path(Path::new("pipeline.TOML")).unwrap(),
            ConfigFormat::Toml
        );
    }

    #[test]
    fn test_sub_millisecond_timeout_rounds_up() {
        let config = PipelineConfig::new().with_send_timeout(Duration::from_micros(500));
        assert_eq!(config.send_timeout_ms, Some(1));
        assert!(config.validate().is_ok());

        let config = PipelineConfig::new().with_send_timeout(Duration::from_micros(1500));
        assert_eq!(config.send_timeout_ms, Some(2));

        let config = PipelineConfig::new().with_send_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_huge_timeout_saturates() {
        let config = PipelineConfig::new().with_send_timeout(Duration::MAX);
        assert_eq!(config.send_timeout_ms, Some(u64::MAX));
    }

    #[test]
    fn test_builder_methods() {
        let config = PipelineConfig::new()
            .with_channel_capacity(4)
            .with_cancelable_source(false)
            .with_send_timeout(Duration::from_millis(30))
            .with_thread_name_prefix("demo");
        assert_eq!(config.channel_capacity, 4);
        assert!(!config.cancelable_source);
        assert_eq!(config.send_timeout_ms, Some(30));
        assert_eq!(config.thread_name_prefix, "demo");
    }
}
