//! Readiness multiplexer.
//!
//! Wraps the OS event queue (epoll on Linux, kqueue on macOS and the BSDs) behind a
//! "register interest, then block until something is ready" contract.

pub mod event;
pub mod poller;
pub(crate) mod sys;

pub use event::{Event, EventKind, Events, Interest};
pub use poller::Poller;
