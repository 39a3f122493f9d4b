//! Endpoints of the single-producer/single-consumer conduits between stages.
//!
//! A conduit is a `crossbeam_channel::bounded(capacity)` channel; capacity `0`
//! is a rendezvous. The write side is owned by exactly one stage and the
//! conduit closes when that side is dropped.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// Create a conduit and return both of its ends.
pub fn endpoint<T>(capacity: usize) -> (WriteEndpoint<T>, ReadEndpoint<T>) {
    let (tx, rx) = bounded(capacity);
    (WriteEndpoint { tx }, ReadEndpoint { rx })
}

/// Read side of a conduit.
///
/// Iterating yields values in the order they were written and ends once the
/// writer has closed the conduit and every buffered value has been taken.
#[derive(Debug)]
pub struct ReadEndpoint<T> {
    rx: Receiver<T>,
}

impl<T> ReadEndpoint<T> {
    /// Block for the next value. `None` means the conduit is closed and drained.
    pub fn recv(&self) -> Option<T> {
        self.rx.recv().ok()
    }

    /// Take a value if one is ready right now.
    pub fn try_recv(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Block for at most `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    /// Blocking iterator over the remaining values, without consuming the endpoint.
    pub fn iter(&self) -> crossbeam_channel::Iter<'_, T> {
        self.rx.iter()
    }

    /// Number of buffered values (always 0 for a rendezvous).
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub(crate) fn receiver(&self) -> &Receiver<T> {
        &self.rx
    }
}

impl<T> Iterator for ReadEndpoint<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.rx.recv().ok()
    }
}

/// Write side of a conduit. Dropping it closes the conduit.
#[derive(Debug)]
pub struct WriteEndpoint<T> {
    tx: Sender<T>,
}

impl<T> WriteEndpoint<T> {
    /// Blocking send. Returns the value back if the reader is gone.
    pub fn send(&self, value: T) -> Result<(), T> {
        self.tx.send(value).map_err(|e| e.into_inner())
    }

    /// Explicitly close the conduit.
    pub fn close(self) {}

    pub(crate) fn sender(&self) -> &Sender<T> {
        &self.tx
    }
}
