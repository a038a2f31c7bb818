//! The OS event queue handle.

use crate::error::MultiplexerError;
use crate::net::socket::Descriptor;
use crate::reactor::event::{Events, Interest};
use crate::reactor::sys;

use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

/// Owns one OS readiness queue.
///
/// Dropping the poller closes the queue, which implicitly drops every registration.
#[derive(Debug)]
pub struct Poller {
    queue: RawFd,
}

impl Poller {
    /// Allocates a new readiness queue.
    pub fn new() -> Result<Self, MultiplexerError> {
        let queue = sys::create().map_err(MultiplexerError::CreationFailed)?;

        Ok(Self { queue })
    }

    /// Adds or updates interest for `descriptor`.
    ///
    /// A failed registration leaves the handle unmonitored; callers decide whether
    /// that matters.
    pub fn register(&self, descriptor: Descriptor, interest: Interest) -> io::Result<()> {
        sys::register(self.queue, descriptor.as_raw(), interest)
    }

    /// Removes every interest for `descriptor`. Unknown handles are ignored.
    pub fn deregister(&self, descriptor: Descriptor) -> io::Result<()> {
        sys::deregister(self.queue, descriptor.as_raw())
    }

    /// Blocks until at least one registered handle is ready or `timeout` elapses.
    ///
    /// `None` waits indefinitely. Fills `events` with at most its capacity of OS
    /// events and returns the number of decoded [`Event`](crate::reactor::Event)s.
    /// An interrupted wait reports zero events.
    pub fn poll(&self, events: &mut Events, timeout: Option<Duration>) -> io::Result<usize> {
        events.clear();

        let count = sys::wait(self.queue, events.raw_mut(), timeout)?;
        events.decode(count);

        Ok(events.len())
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.queue);
        }
    }
}
