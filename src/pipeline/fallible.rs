//! Pipelines whose transforms may fail.
//!
//! Each value travels as a [`Fallible<T>`]. A stage applies its transform only
//! to `Ok` values; a failure is forwarded untouched so the caller sees which
//! stage rejected which input, in source order, without the pipeline stopping.
//! Ordering, cancellation and closure follow the plain pipeline.

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::pipeline::builder::Pipeline;
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::endpoint::{endpoint, ReadEndpoint};
use crate::pipeline::id::StageId;
use crate::pipeline::stage::{spawn_transform, StageContext};
use std::fmt;
use thiserror::Error;

/// Stage name for fallible transforms.
pub const TRY_STAGE_NAME: &str = "try_map";
/// Stage name for the stage that wraps values in `Ok` when no transform is given.
pub const LIFT_STAGE_NAME: &str = "lift";

/// Domain error reported by a transform.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TransformError {
    pub message: String,
}

impl TransformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A value rejected by a stage, with the input that was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("stage {stage} rejected {value:?}: {error}")]
pub struct StageFailure<T: fmt::Debug> {
    pub stage: StageId,
    pub value: T,
    #[source]
    pub error: TransformError,
}

/// Value carried by a fallible pipeline.
pub type Fallible<T> = std::result::Result<T, StageFailure<T>>;

/// A boxed transform that may reject its input.
pub type TryTransform<T> =
    Box<dyn Fn(T) -> std::result::Result<T, TransformError> + Send + 'static>;

/// Box a closure as a [`TryTransform`].
pub fn try_transform<T, F>(f: F) -> TryTransform<T>
where
    F: Fn(T) -> std::result::Result<T, TransformError> + Send + 'static,
{
    Box::new(f)
}

fn attempt<T>(stage: StageId, f: &TryTransform<T>, value: T) -> Fallible<T>
where
    T: Clone + fmt::Debug,
{
    f(value.clone()).map_err(|error| {
        tracing::debug!("Stage {} rejected {:?}: {}", stage, value, error);
        StageFailure {
            stage,
            value,
            error,
        }
    })
}

/// Compose fallible `transforms` over `source` without cancellation.
pub fn build_pipeline_fallible<T, I>(
    source: ReadEndpoint<T>,
    transforms: I,
) -> Result<ReadEndpoint<Fallible<T>>>
where
    T: Clone + fmt::Debug + Send + 'static,
    I: IntoIterator<Item = TryTransform<T>>,
{
    let pipeline =
        build_pipeline_fallible_with(&PipelineConfig::default(), None, source, transforms)?;
    Ok(pipeline.into_output())
}

/// Compose fallible `transforms` over `source` with explicit settings.
///
/// The first stage turns `T` into `Fallible<T>`; with no transforms a single
/// lifting stage does only that.
pub fn build_pipeline_fallible_with<T, I>(
    config: &PipelineConfig,
    cancel: Option<&CancelToken>,
    source: ReadEndpoint<T>,
    transforms: I,
) -> Result<Pipeline<Fallible<T>>>
where
    T: Clone + fmt::Debug + Send + 'static,
    I: IntoIterator<Item = TryTransform<T>>,
{
    config.validate()?;
    let mut transforms = transforms.into_iter().enumerate();
    let mut handles = Vec::new();

    let first_id = StageId::transform(0)?;
    let (write, read) = endpoint::<Fallible<T>>(config.channel_capacity);
    let first = match transforms.next() {
        Some((_, f)) => {
            let ctx = StageContext::new(first_id, TRY_STAGE_NAME, config, cancel);
            spawn_transform(ctx, source, write, move |value: T| attempt(first_id, &f, value))?
        }
        None => {
            let ctx = StageContext::new(first_id, LIFT_STAGE_NAME, config, cancel);
            spawn_transform(ctx, source, write, |value: T| Ok(value))?
        }
    };
    handles.push(first);
    let mut current = read;

    for (offset, f) in transforms {
        let id = StageId::transform(offset)?;
        let ctx = StageContext::new(id, TRY_STAGE_NAME, config, cancel);
        let (write, read) = endpoint(config.channel_capacity);
        let stage = spawn_transform(ctx, current, write, move |item: Fallible<T>| {
            item.and_then(|value| attempt(id, &f, value))
        })?;
        handles.push(stage);
        current = read;
    }

    tracing::info!("Fallible pipeline built: {} stage(s)", handles.len());

    Ok(Pipeline::from_parts(current, handles, cancel.cloned()))
}
