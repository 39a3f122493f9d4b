//! Linear, thread-per-stage pipelines.
//!
//! Values flow from a source through an ordered list of transforms to a single
//! terminal endpoint. Stages run on dedicated threads and hand values to each
//! other over crossbeam channels.
//!
//! # Architecture
//!
//! ```text
//! [Source] ──► [Transform 1] ──► … ──► [Transform n] ──► terminal endpoint
//!     ▲              ▲                       ▲
//!     └──────────────┴────── CancelToken ────┘
//! ```
//!
//! # Design
//!
//! - **Rendezvous by default**: a send completes only when the next stage
//!   receives, so back-pressure is built in.
//! - **Single writer per conduit**: each stage owns its output and closes it
//!   by returning.
//! - **Cooperative cancellation**: `CancelToken` is a select arm next to every
//!   send and receive; a value computed but not sent is counted as dropped.
//! - **Eager start**: building a pipeline starts every stage immediately.

pub mod builder;
pub mod cancel;
pub mod endpoint;
pub mod fallible;
pub mod id;
pub mod source;
pub mod stage;

pub use builder::{
    build_pipeline, build_pipeline_cancelable, join_all, transform, Pipeline, PipelineBuilder,
    Transform, DEFAULT_STAGE_NAME,
};
pub use cancel::CancelToken;
pub use endpoint::{endpoint, ReadEndpoint, WriteEndpoint};
pub use fallible::{
    build_pipeline_fallible, build_pipeline_fallible_with, try_transform, Fallible, StageFailure,
    TransformError, TryTransform,
};
pub use id::StageId;
pub use source::{build_source, build_source_cancelable, spawn_source, SOURCE_STAGE_NAME};
pub use stage::{StageHandle, StageOutcome, StageReport};

/// Integer value carried by the pipelines the demo builds.
pub type Value = i64;
