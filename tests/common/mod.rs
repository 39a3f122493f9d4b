//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod transforms;

use crossbeam_channel::RecvTimeoutError;
use stagepipe_rs::ReadEndpoint;
use std::time::{Duration, Instant};

/// Upper bound for anything a test waits on
pub fn test_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Read until the endpoint closes. Returns `None` if it is still open after `timeout`.
pub fn drain_within<T>(output: &ReadEndpoint<T>, timeout: Duration) -> Option<Vec<T>> {
    let deadline = Instant::now() + timeout;
    let mut values = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match output.recv_timeout(remaining) {
            Ok(value) => values.push(value),
            Err(RecvTimeoutError::Disconnected) => return Some(values),
            Err(RecvTimeoutError::Timeout) => return None,
        }
    }
}

/// Poll `condition` every millisecond until it holds or `timeout` elapses
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}
