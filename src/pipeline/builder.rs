//! Pipeline construction.
//!
//! A chain `f₁ … fₙ` over a source becomes `n` transform stages wired left to
//! right. Construction is a loop: the endpoint produced by stage *i-1* is
//! moved into stage *i*, so a stage is only ever wired to a stage that is
//! already running. With no transforms, the source endpoint is returned as is.
//!
//! ```text
//! source ──► stage 1 ──► stage 2 ──► … ──► stage n ──► terminal endpoint
//!    ▲           ▲           ▲                 ▲
//!    └───────────┴─── CancelToken ─────────────┘
//! ```

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::endpoint::{endpoint, ReadEndpoint};
use crate::pipeline::id::StageId;
use crate::pipeline::source::spawn_source;
use crate::pipeline::stage::{spawn_transform, StageContext, StageHandle, StageReport};

/// A boxed element-wise transform.
pub type Transform<T> = Box<dyn Fn(T) -> T + Send + 'static>;

/// Default stage name for transforms added without one.
pub const DEFAULT_STAGE_NAME: &str = "map";

/// Box a closure as a [`Transform`].
pub fn transform<T, F>(f: F) -> Transform<T>
where
    F: Fn(T) -> T + Send + 'static,
{
    Box::new(f)
}

struct NamedTransform<T> {
    name: String,
    f: Transform<T>,
}

/// Fluent builder for a linear pipeline.
///
/// ```
/// use stagepipe_rs::pipeline::PipelineBuilder;
///
/// let pipeline = PipelineBuilder::new()
///     .stage("square", |x: i64| x * x)
///     .stage("increment", |x| x + 1)
///     .build_from_values(vec![2, 3])
///     .unwrap();
///
/// let values: Vec<i64> = pipeline.into_output().collect();
/// assert_eq!(values, vec![5, 10]);
/// ```
pub struct PipelineBuilder<T> {
    config: PipelineConfig,
    cancel: Option<CancelToken>,
    stages: Vec<NamedTransform<T>>,
}

impl<T: Send + 'static> PipelineBuilder<T> {
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    pub fn with_config(config: PipelineConfig) -> Self {
        Self {
            config,
            cancel: None,
            stages: Vec::new(),
        }
    }

    /// Make every stage observe `token`.
    pub fn cancel_with(mut self, token: &CancelToken) -> Self {
        self.cancel = Some(token.clone());
        self
    }

    /// Append a named transform.
    pub fn stage<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(T) -> T + Send + 'static,
    {
        self.stages.push(NamedTransform {
            name: name.into(),
            f: Box::new(f),
        });
        self
    }

    /// Append already boxed transforms under the default stage name.
    pub fn transforms<I>(mut self, transforms: I) -> Self
    where
        I: IntoIterator<Item = Transform<T>>,
    {
        self.stages
            .extend(transforms.into_iter().map(|f| NamedTransform {
                name: DEFAULT_STAGE_NAME.to_string(),
                f,
            }));
        self
    }

    /// Number of transform stages that `build` will start.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Wire the transforms over an existing source endpoint.
    pub fn build(self, source: ReadEndpoint<T>) -> Result<Pipeline<T>> {
        self.config.validate()?;
        let stage_count = self.stages.len();
        let mut handles = Vec::with_capacity(stage_count);
        let mut current = source;

        for (offset, stage) in self.stages.into_iter().enumerate() {
            let ctx = StageContext::new(
                StageId::transform(offset)?,
                stage.name,
                &self.config,
                self.cancel.as_ref(),
            );
            let (write, read) = endpoint(self.config.channel_capacity);
            handles.push(spawn_transform(ctx, current, write, stage.f)?);
            current = read;
        }

        tracing::info!(
            "Pipeline built: {} stage(s), capacity {}, cancelable: {}",
            stage_count,
            self.config.channel_capacity,
            self.cancel.is_some()
        );

        Ok(Pipeline::from_parts(current, handles, self.cancel))
    }

    /// Start a source over `values` and wire the transforms over it.
    ///
    /// The source handle becomes the first entry of [`Pipeline::stages`].
    pub fn build_from_values<I>(self, values: I) -> Result<Pipeline<T>>
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        self.config.validate()?;
        let (source, source_handle) = spawn_source(values, self.cancel.as_ref(), &self.config)?;
        let mut pipeline = self.build(source)?;
        pipeline.stages.insert(0, source_handle);
        Ok(pipeline)
    }
}

impl<T: Send + 'static> Default for PipelineBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A running pipeline: the terminal endpoint plus every stage it started.
///
/// Stages run whether or not the terminal endpoint is read. If it is neither
/// drained, dropped nor cancelled (and no send timeout is set), the stages
/// block on their sends indefinitely.
#[derive(Debug)]
pub struct Pipeline<T> {
    output: ReadEndpoint<T>,
    stages: Vec<StageHandle>,
    cancel: Option<CancelToken>,
}

impl<T> Pipeline<T> {
    pub(crate) fn from_parts(
        output: ReadEndpoint<T>,
        stages: Vec<StageHandle>,
        cancel: Option<CancelToken>,
    ) -> Self {
        Self {
            output,
            stages,
            cancel,
        }
    }

    /// Terminal endpoint.
    pub fn output(&self) -> &ReadEndpoint<T> {
        &self.output
    }

    /// Stage handles in wiring order.
    pub fn stages(&self) -> &[StageHandle] {
        &self.stages
    }

    /// Fire the attached token, if any. Returns whether a token was attached.
    pub fn cancel(&self) -> bool {
        match &self.cancel {
            Some(token) => {
                token.fire();
                true
            }
            None => false,
        }
    }

    /// Whether every stage thread has returned.
    pub fn is_finished(&self) -> bool {
        self.stages.iter().all(StageHandle::is_finished)
    }

    /// Detach the stages and keep only the terminal endpoint.
    pub fn into_output(self) -> ReadEndpoint<T> {
        self.output
    }

    /// Split into the terminal endpoint and the stage handles.
    pub fn into_parts(self) -> (ReadEndpoint<T>, Vec<StageHandle>) {
        (self.output, self.stages)
    }

    /// Drop the terminal endpoint and wait for every stage.
    ///
    /// Dropping the endpoint makes the last stage's next send fail, which
    /// cascades upstream. An undrained pipeline therefore still joins, unless
    /// a caller-owned source neither sends nor closes.
    pub fn join(self) -> Result<Vec<StageReport>> {
        drop(self.output);
        join_all(self.stages)
    }
}

/// Join stages in order, returning the first panic as an error.
pub fn join_all(stages: Vec<StageHandle>) -> Result<Vec<StageReport>> {
    let mut reports = Vec::with_capacity(stages.len());
    let mut first_err = None;
    for stage in stages {
        match stage.join() {
            Ok(report) => reports.push(report),
            Err(e) => {
                tracing::error!("{}", e);
                first_err.get_or_insert(e);
            }
        }
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(reports),
    }
}

/// Compose `transforms` over `source` without cancellation.
pub fn build_pipeline<T, I>(source: ReadEndpoint<T>, transforms: I) -> Result<ReadEndpoint<T>>
where
    T: Send + 'static,
    I: IntoIterator<Item = Transform<T>>,
{
    let pipeline = PipelineBuilder::new().transforms(transforms).build(source)?;
    Ok(pipeline.into_output())
}

/// Compose `transforms` over `source`; every stage stops once `cancel` fires.
pub fn build_pipeline_cancelable<T, I>(
    cancel: &CancelToken,
    source: ReadEndpoint<T>,
    transforms: I,
) -> Result<ReadEndpoint<T>>
where
    T: Send + 'static,
    I: IntoIterator<Item = Transform<T>>,
{
    let pipeline = PipelineBuilder::new()
        .cancel_with(cancel)
        .transforms(transforms)
        .build(source)?;
    Ok(pipeline.into_output())
}
