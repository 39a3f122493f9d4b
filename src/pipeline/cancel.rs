//! Broadcast cancellation for running pipelines.
//!
//! A [`CancelToken`] is fired at most once and observed by any number of
//! stages. Firing drops the only sender of an internal channel, which makes
//! every clone of its receiver permanently ready. Stages use that receiver as
//! a `select!` arm next to their send/receive, so they never poll.
//!
//! The disconnected signal channel is the only record of having fired:
//! [`CancelToken::is_cancelled`] reads it without taking the trigger lock.

use crossbeam_channel::{bounded, never, Receiver, Sender, TryRecvError};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Uninhabited message type; the signal channel only ever disconnects.
#[derive(Debug)]
pub enum Fired {}

struct Inner {
    trigger: Mutex<Option<Sender<Fired>>>,
    signal: Receiver<Fired>,
}

/// Single-fire, idempotent stop signal shared by every stage of a pipeline.
///
/// Cloning yields another handle to the same signal.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (trigger, signal) = bounded(0);
        Self {
            inner: Arc::new(Inner {
                trigger: Mutex::new(Some(trigger)),
                signal,
            }),
        }
    }

    /// Fire the token. Calling this more than once has no further effect.
    pub fn fire(&self) {
        let trigger = self
            .inner
            .trigger
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(trigger) = trigger {
            drop(trigger);
            tracing::debug!("Cancellation token fired");
        }
    }

    /// Non-blocking check.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.inner.signal.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Block until the token fires.
    pub fn wait(&self) {
        let _ = self.inner.signal.recv();
    }

    /// Block until the token fires or `timeout` elapses. Returns whether it fired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match self.inner.signal.recv_timeout(timeout) {
            Ok(never) => match never {},
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => true,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => self.is_cancelled(),
        }
    }

    /// Receiver that becomes ready (disconnected) once the token fires.
    pub fn signal(&self) -> Receiver<Fired> {
        self.inner.signal.clone()
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Select arm for an optional token: a receiver that never fires when absent.
pub(crate) fn signal_or_never(token: Option<&CancelToken>) -> Receiver<Fired> {
    match token {
        Some(token) => token.signal(),
        None => never(),
    }
}
