//! Server construction knobs.
//!
//! The event buffer size and the listen backlog are fixed once the server exists,
//! so they are chosen here, before the first endpoint is bound.

use crate::error::Result;
use crate::net::endpoint::Endpoint;
use crate::server::Server;

/// Events returned by a single poll cycle, at most.
pub const DEFAULT_EVENT_CAPACITY: usize = 100;

/// Upper bound for [`ServerBuilder::event_capacity`].
pub const MAX_EVENT_CAPACITY: usize = 1 << 16;

/// Pending connections the OS queues per listening socket.
pub const DEFAULT_BACKLOG: i32 = 128;

/// Tunables fixed for the lifetime of a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    pub event_capacity: usize,
    pub backlog: i32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            event_capacity: DEFAULT_EVENT_CAPACITY,
            backlog: DEFAULT_BACKLOG,
        }
    }
}

/// Builder for constructing Server instances with fluent API.
///
/// # Example
/// ```ignore
/// let server = ServerBuilder::new()
///     .event_capacity(256)
///     .backlog(64)
///     .build(endpoint)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ServerBuilder {
    config: ServerConfig,
}

impl ServerBuilder {
    /// Creates a new server builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how many OS events one poll cycle may return.
    ///
    /// The event buffer is allocated once with this capacity and reused for every
    /// cycle. Values are clamped to `1..=MAX_EVENT_CAPACITY`.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity.clamp(1, MAX_EVENT_CAPACITY);
        self
    }

    /// Sets the listen backlog used for every endpoint added to the server.
    pub fn backlog(mut self, backlog: i32) -> Self {
        self.config.backlog = backlog;
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Builds a server listening on `endpoint`.
    ///
    /// Consumes the builder, creates the readiness multiplexer and adds `endpoint`
    /// as the first listening endpoint.
    ///
    /// # Errors
    /// `UnableToCreateMultiplexer` if the OS queue cannot be allocated,
    /// `UnableToCreateSocket` if `endpoint` cannot be bound.
    pub fn build(self, endpoint: Endpoint) -> Result<Server> {
        Server::with_config(self.config, endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_constants() {
        let builder = ServerBuilder::new();

        assert_eq!(builder.config().event_capacity, DEFAULT_EVENT_CAPACITY);
        assert_eq!(builder.config().backlog, DEFAULT_BACKLOG);
    }

    #[test]
    fn event_capacity_never_drops_to_zero() {
        let builder = ServerBuilder::new().event_capacity(0).backlog(16);

        assert_eq!(builder.config().event_capacity, 1);
        assert_eq!(builder.config().backlog, 16);
    }

    #[test]
    fn huge_event_capacity_is_clamped() {
        let builder = ServerBuilder::new().event_capacity(usize::MAX);

        assert_eq!(builder.config().event_capacity, MAX_EVENT_CAPACITY);
    }
}
