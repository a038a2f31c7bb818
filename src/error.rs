//! Error types for the readiness multiplexer and the server core.
//!
//! Every failure is reported once to the immediate caller, which decides policy.
//! Nothing in the core retries.

use crate::net::endpoint::Endpoint;

use std::io;
use thiserror::Error;

/// Failure of the OS readiness facility itself.
#[derive(Debug, Error)]
pub enum MultiplexerError {
    #[error("unable to allocate readiness queue: {0}")]
    CreationFailed(#[source] io::Error),
}

/// Errors surfaced by [`Server`](crate::server::Server).
#[derive(Debug, Error)]
pub enum ServerError {
    /// Fatal at construction; the host must abort startup.
    #[error("unable to create multiplexer: {0}")]
    UnableToCreateMultiplexer(#[from] MultiplexerError),

    /// Raised by `add_local_endpoint`; the host decides whether losing one endpoint is fatal.
    #[error("unable to create listening socket for {endpoint}: {source}")]
    UnableToCreateSocket {
        endpoint: Endpoint,
        #[source]
        source: io::Error,
    },

    /// Raised by `handle_events` when accepting on a listening endpoint fails.
    #[error("unable to accept connection on {endpoint}: {source}")]
    UnableToAcceptConnection {
        endpoint: Endpoint,
        #[source]
        source: io::Error,
    },

    #[error("readiness poll failed: {0}")]
    Poll(#[source] io::Error),
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;
