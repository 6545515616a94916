//! Sleep primitives for the poll loop.
//!
//! Polling suspends only between status checks. Cancellation is cooperative:
//! a [`Sleeper`] reports that it was interrupted and the loop stops before
//! the next check.

use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

pub trait Sleeper {
    /// Wait for `duration`. Returns `false` if the wait was cancelled.
    fn sleep(&self, duration: Duration) -> bool;
}

/// Plain thread sleep, never cancelled.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) -> bool {
        std::thread::sleep(duration);
        true
    }
}

/// Sleeps on a channel; any message cancels the wait.
///
/// When every sender is gone the sleeper falls back to a plain sleep.
pub struct ChannelSleeper {
    cancel: Receiver<()>,
}

impl ChannelSleeper {
    pub fn new(cancel: Receiver<()>) -> Self {
        Self { cancel }
    }
}

impl Sleeper for ChannelSleeper {
    fn sleep(&self, duration: Duration) -> bool {
        match self.cancel.recv_timeout(duration) {
            Ok(()) => false,
            Err(RecvTimeoutError::Timeout) => true,
            Err(RecvTimeoutError::Disconnected) => {
                std::thread::sleep(duration);
                true
            }
        }
    }
}

/// Receives the status seen at each poll, e.g. to drive a spinner.
pub trait PollObserver {
    fn on_status(&self, _stack_name: &str, _status: &str) {}

    fn on_finish(&self, _stack_name: &str) {}
}

/// Observer that ignores everything.
impl PollObserver for () {}
