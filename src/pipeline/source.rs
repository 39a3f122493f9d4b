//! Source stage: emits a finite list of values, then closes its output.

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::pipeline::cancel::{signal_or_never, CancelToken};
use crate::pipeline::endpoint::{endpoint, ReadEndpoint, WriteEndpoint};
use crate::pipeline::id::StageId;
use crate::pipeline::stage::{
    deliver, spawn_worker, stop_reason, StageContext, StageHandle, StageReport,
};

/// Name used for the source stage in reports and thread names.
pub const SOURCE_STAGE_NAME: &str = "source";

/// Start a source that ignores cancellation and runs until the list is
/// exhausted or its reader goes away.
pub fn build_source<T, I>(values: I) -> Result<ReadEndpoint<T>>
where
    T: Send + 'static,
    I: IntoIterator<Item = T>,
    I::IntoIter: Send + 'static,
{
    let (output, _handle) = spawn_source(values, None, &PipelineConfig::default())?;
    Ok(output)
}

/// Start a source that abandons the remaining values once `cancel` fires.
pub fn build_source_cancelable<T, I>(cancel: &CancelToken, values: I) -> Result<ReadEndpoint<T>>
where
    T: Send + 'static,
    I: IntoIterator<Item = T>,
    I::IntoIter: Send + 'static,
{
    let (output, _handle) = spawn_source(values, Some(cancel), &PipelineConfig::default())?;
    Ok(output)
}

/// Start a source with explicit settings and keep its join handle.
///
/// The token is observed only when `config.cancelable_source` is set.
pub fn spawn_source<T, I>(
    values: I,
    cancel: Option<&CancelToken>,
    config: &PipelineConfig,
) -> Result<(ReadEndpoint<T>, StageHandle)>
where
    T: Send + 'static,
    I: IntoIterator<Item = T>,
    I::IntoIter: Send + 'static,
{
    let cancel = cancel.filter(|_| config.cancelable_source);
    let ctx = StageContext::new(StageId::SOURCE, SOURCE_STAGE_NAME, config, cancel);
    let (write, read) = endpoint(config.channel_capacity);
    let values = values.into_iter();

    let worker_ctx = ctx.clone();
    let handle = spawn_worker(&ctx, move || run_source(worker_ctx, values, write))?;
    Ok((read, handle))
}

fn run_source<T, I>(ctx: StageContext, values: I, output: WriteEndpoint<T>) -> StageReport
where
    I: Iterator<Item = T>,
{
    let signal = signal_or_never(ctx.cancel.as_ref());
    let mut report = StageReport::new(&ctx);

    tracing::debug!("Source started (cancelable: {})", ctx.cancel.is_some());

    for value in values {
        report.received += 1;
        let delivery = deliver(output.sender(), value, &signal, ctx.send_timeout);
        match stop_reason(delivery) {
            None => report.forwarded += 1,
            Some(outcome) => {
                report.dropped += 1;
                report.outcome = outcome;
                break;
            }
        }
    }

    tracing::debug!(
        "Source stopped: {:?} ({} emitted)",
        report.outcome,
        report.forwarded
    );
    report
}
