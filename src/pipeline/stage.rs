//! Stage workers.
//!
//! Every stage runs on its own named thread and owns the write side of its
//! output conduit. The thread returns a [`StageReport`] when it stops; the
//! output conduit closes as the worker's `Sender` is dropped on return (or on
//! unwind, if the transform panics).
//!
//! Per-iteration flow of a transform stage:
//!
//! ```text
//! recv(upstream) | recv(cancel) ──► cancelled? ──► f(value) ──► send(out) | recv(cancel) | timeout
//! ```
//!
//! When cancellation and a ready receiver race, `select!` picks one at random.
//! A value computed but not sent is counted in [`StageReport::dropped`].

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::pipeline::cancel::{signal_or_never, CancelToken, Fired};
use crate::pipeline::endpoint::{ReadEndpoint, WriteEndpoint};
use crate::pipeline::id::StageId;
use crossbeam_channel::{after, never, select, Receiver, Sender};
use serde::Serialize;
use std::thread::JoinHandle;
use std::time::Duration;

/// Why a stage stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    /// Upstream (or the source list) ran out.
    Exhausted,
    /// The cancel token fired.
    Cancelled,
    /// The reader of this stage's output went away.
    DownstreamClosed,
    /// A send did not complete within the configured deadline.
    TimedOut,
}

/// Counters and terminal outcome of one stage.
///
/// `received == forwarded + dropped` once the stage has stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub id: StageId,
    pub name: String,
    pub received: u64,
    pub forwarded: u64,
    pub dropped: u64,
    pub outcome: StageOutcome,
}

impl StageReport {
    pub(crate) fn new(ctx: &StageContext) -> Self {
        Self {
            id: ctx.id,
            name: ctx.name.clone(),
            received: 0,
            forwarded: 0,
            dropped: 0,
            outcome: StageOutcome::Exhausted,
        }
    }
}

/// Per-stage settings captured at spawn time.
#[derive(Debug, Clone)]
pub(crate) struct StageContext {
    pub id: StageId,
    pub name: String,
    pub thread_name: String,
    pub cancel: Option<CancelToken>,
    pub send_timeout: Option<Duration>,
}

impl StageContext {
    pub fn new(
        id: StageId,
        name: impl Into<String>,
        config: &PipelineConfig,
        cancel: Option<&CancelToken>,
    ) -> Self {
        let name = name.into();
        Self {
            id,
            thread_name: format!("{}-{}-{}", config.thread_name_prefix, id, name),
            name,
            cancel: cancel.cloned(),
            send_timeout: config.send_timeout(),
        }
    }

    #[inline]
    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    fn signal(&self) -> Receiver<Fired> {
        signal_or_never(self.cancel.as_ref())
    }
}

/// Join handle for a running stage.
#[derive(Debug)]
pub struct StageHandle {
    id: StageId,
    name: String,
    handle: JoinHandle<StageReport>,
}

impl StageHandle {
    pub fn id(&self) -> StageId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the stage thread has returned.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the stage to stop and collect its report.
    pub fn join(self) -> Result<StageReport> {
        let name = self.name;
        self.handle
            .join()
            .map_err(|payload| PipelineError::from_panic(name, payload))
    }
}

/// Result of handing one value downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Sent,
    Cancelled,
    Disconnected,
    TimedOut,
}

/// Send `value`, giving up on cancellation or after `timeout`.
pub(crate) fn deliver<T>(
    out: &Sender<T>,
    value: T,
    signal: &Receiver<Fired>,
    timeout: Option<Duration>,
) -> Delivery {
    let deadline = timeout.map_or_else(never, after);
    select! {
        send(out, value) -> res => match res {
            Ok(()) => Delivery::Sent,
            Err(_) => Delivery::Disconnected,
        },
        recv(signal) -> _ => Delivery::Cancelled,
        recv(deadline) -> _ => Delivery::TimedOut,
    }
}

/// Map a failed delivery to the outcome it ends the stage with.
pub(crate) fn stop_reason(delivery: Delivery) -> Option<StageOutcome> {
    match delivery {
        Delivery::Sent => None,
        Delivery::Cancelled => Some(StageOutcome::Cancelled),
        Delivery::Disconnected => Some(StageOutcome::DownstreamClosed),
        Delivery::TimedOut => Some(StageOutcome::TimedOut),
    }
}

/// Spawn `body` on a named thread and wrap its handle.
pub(crate) fn spawn_worker<F>(ctx: &StageContext, body: F) -> Result<StageHandle>
where
    F: FnOnce() -> StageReport + Send + 'static,
{
    let handle = std::thread::Builder::new()
        .name(ctx.thread_name.clone())
        .spawn(body)
        .map_err(|source| PipelineError::Spawn {
            stage: ctx.name.clone(),
            source,
        })?;

    Ok(StageHandle {
        id: ctx.id,
        name: ctx.name.clone(),
        handle,
    })
}

/// Start a transform stage reading `upstream` and writing `downstream`.
///
/// If the thread cannot be spawned, both endpoints are dropped, which
/// unblocks the stages on either side.
pub(crate) fn spawn_transform<I, O, F>(
    ctx: StageContext,
    upstream: ReadEndpoint<I>,
    downstream: WriteEndpoint<O>,
    transform: F,
) -> Result<StageHandle>
where
    I: Send + 'static,
    O: Send + 'static,
    F: FnMut(I) -> O + Send + 'static,
{
    let worker_ctx = ctx.clone();
    spawn_worker(&ctx, move || {
        run_transform(worker_ctx, upstream, downstream, transform)
    })
}

fn run_transform<I, O, F>(
    ctx: StageContext,
    upstream: ReadEndpoint<I>,
    downstream: WriteEndpoint<O>,
    mut transform: F,
) -> StageReport
where
    F: FnMut(I) -> O,
{
    let mut report = StageReport::new(&ctx);
    let signal = ctx.signal();
    let input = upstream.receiver();
    let output = downstream.sender();

    tracing::debug!("Stage {} '{}' started", ctx.id, ctx.name);

    report.outcome = loop {
        let value = select! {
            recv(input) -> msg => match msg {
                Ok(value) => value,
                Err(_) => break StageOutcome::Exhausted,
            },
            recv(signal) -> _ => break StageOutcome::Cancelled,
        };
        report.received += 1;

        if ctx.is_cancelled() {
            report.dropped += 1;
            break StageOutcome::Cancelled;
        }

        let result = transform(value);
        let delivery = deliver(output, result, &signal, ctx.send_timeout);
        match stop_reason(delivery) {
            None => {
                report.forwarded += 1;
                tracing::trace!("Stage {} forwarded value #{}", ctx.id, report.forwarded);
            }
            Some(outcome) => {
                report.dropped += 1;
                if outcome == StageOutcome::TimedOut {
                    tracing::warn!(
                        "Stage {} '{}' gave up after {:?} waiting for downstream",
                        ctx.id,
                        ctx.name,
                        ctx.send_timeout.unwrap_or_default()
                    );
                }
                break outcome;
            }
        }
    };

    if report.dropped > 0 {
        tracing::debug!(
            "Stage {} '{}' dropped {} computed value(s)",
            ctx.id,
            ctx.name,
            report.dropped
        );
    }
    tracing::debug!(
        "Stage {} '{}' stopped: {:?} ({} in, {} out)",
        ctx.id,
        ctx.name,
        report.outcome,
        report.received,
        report.forwarded
    );

    report
}
