//! Readiness events and the reusable buffer they are collected into.

use crate::net::socket::Descriptor;
use crate::reactor::sys::{self, RawEvent};

/// What a readiness event reports about its handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Readable,
    Writable,
}

/// The readiness a handle is registered for.
///
/// Listening sockets only ever need [`Interest::Read`]; connections that may also
/// send unsolicited output use [`Interest::ReadWrite`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    Read,
    ReadWrite,
}

impl Interest {
    pub fn from_read_only(read_only: bool) -> Self {
        if read_only {
            Interest::Read
        } else {
            Interest::ReadWrite
        }
    }

    pub fn is_writable(self) -> bool {
        matches!(self, Interest::ReadWrite)
    }
}

/// One ready handle as reported by a poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    descriptor: Descriptor,
    kind: EventKind,
    data_hint: usize,
}

impl Event {
    pub(crate) fn new(descriptor: Descriptor, kind: EventKind, data_hint: usize) -> Self {
        Self {
            descriptor,
            kind,
            data_hint,
        }
    }

    pub fn descriptor(&self) -> Descriptor {
        self.descriptor
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Bytes available to read (or room to write) as estimated by the OS.
    ///
    /// Zero on a readable event means the peer shut the connection down.
    pub fn data_hint(&self) -> usize {
        self.data_hint
    }

    pub fn is_readable(&self) -> bool {
        self.kind == EventKind::Readable
    }
}

/// Fixed-capacity event storage reused across poll cycles.
///
/// `capacity` bounds how many OS events a single poll may return. One OS event can
/// report both read and write readiness, so the decoded list may hold up to twice
/// that many entries. Neither buffer grows after construction.
pub struct Events {
    raw: Vec<RawEvent>,
    ready: Vec<Event>,
}

impl Events {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);

        Self {
            raw: vec![sys::empty_event(); capacity],
            ready: Vec::with_capacity(capacity.saturating_mul(2)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.raw.len()
    }

    pub fn len(&self) -> usize {
        self.ready.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ready.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Event> {
        self.ready.get(index).copied()
    }

    pub(crate) fn raw_mut(&mut self) -> &mut [RawEvent] {
        &mut self.raw
    }

    /// Replaces the decoded list with the first `count` raw events.
    pub(crate) fn decode(&mut self, count: usize) {
        self.ready.clear();
        for raw in &self.raw[..count] {
            sys::expand(raw, &mut self.ready);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.ready.clear();
    }
}
