//! Error handling for stagepipe-rs
//!
//! Building and joining a pipeline can fail (the OS may refuse a thread, a
//! stage may panic, a config file may be malformed). Values flowing through a
//! plain pipeline never carry errors; see [`crate::pipeline::fallible`] for
//! transform-level failures.

use thiserror::Error;

/// Main error type for stagepipe-rs operations
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A stage worker thread could not be started
    #[error("Failed to spawn stage '{stage}': {source}")]
    Spawn {
        stage: String,
        #[source]
        source: std::io::Error,
    },

    /// A stage worker panicked while running its transform
    #[error("Stage '{stage}' panicked: {message}")]
    StagePanicked { stage: String, message: String },

    /// Errors related to configuration loading/saving/validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PipelineError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Build a `StagePanicked` error from a `JoinHandle::join` payload
    pub fn from_panic(stage: impl Into<String>, payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        PipelineError::StagePanicked {
            stage: stage.into(),
            message,
        }
    }
}

/// Result type alias for stagepipe-rs operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
