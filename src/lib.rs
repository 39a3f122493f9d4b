//! # stagepipe-rs: concurrent stage pipelines
//!
//! Compose an ordered list of transform functions over a source into a chain
//! of concurrently running stages. Each stage runs on its own thread, reads
//! from the previous stage and writes to the next over a rendezvous channel.
//! A broadcast [`CancelToken`] stops every stage promptly.
//!
//! ## Architecture
//!
//! - **Source**: emits a finite list of values, optionally cancellation-aware
//! - **Transform stages**: apply one function each, preserving order
//! - **Builder**: wires stages left to right and returns the terminal endpoint
//! - **Communication**: crossbeam channels (`bounded(0)` by default)
//!
//! ## Example
//!
//! ```
//! use stagepipe_rs::{build_pipeline, build_source, transform, Value};
//!
//! let source = build_source(vec![2, 3]).unwrap();
//! let output = build_pipeline(
//!     source,
//!     vec![transform(|x: Value| x * x), transform(|x: Value| x + 1)],
//! )
//! .unwrap();
//!
//! assert_eq!(output.collect::<Vec<_>>(), vec![5, 10]);
//! ```
//!
//! ## Cancellation
//!
//! ```
//! use stagepipe_rs::{build_pipeline_cancelable, build_source_cancelable, transform, CancelToken};
//!
//! let cancel = CancelToken::new();
//! let source = build_source_cancelable(&cancel, 0..).unwrap();
//! let output = build_pipeline_cancelable(&cancel, source, vec![transform(|x: i64| x * 2)]).unwrap();
//!
//! assert_eq!(output.recv(), Some(0));
//! cancel.fire();
//! // At most one more value can slip through before the output closes.
//! assert!(output.count() <= 1);
//! ```

pub mod config;
pub mod error;
pub mod pipeline;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use error::{PipelineError, Result, ResultExt};
pub use pipeline::{
    build_pipeline, build_pipeline_cancelable, build_pipeline_fallible, build_source,
    build_source_cancelable, transform, try_transform, CancelToken, Pipeline, PipelineBuilder,
    ReadEndpoint, StageOutcome, StageReport, Transform, TransformError, Value,
};
