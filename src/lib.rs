//! Minimal single-threaded, readiness-driven TCP server core.
//!
//! One OS readiness queue multiplexes every listening endpoint and every accepted
//! connection. The host calls [`Server::handle_events`] in a loop and receives
//! lifecycle and I/O readiness notifications through a [`ServerDelegate`].
//!
//! ```ignore
//! use tcp_reactor::{Endpoint, Server, chat::ChatRoom};
//!
//! let mut server = Server::new(Endpoint::new("127.0.0.1".parse()?, 12345))?;
//! server.set_delegate(ChatRoom::new());
//! loop {
//!     server.handle_events()?;
//! }
//! ```

pub mod builder;
pub mod chat;
pub mod error;
pub mod net;
pub mod reactor;
pub mod server;

pub use builder::{ServerBuilder, ServerConfig};
pub use error::{MultiplexerError, Result, ServerError};
pub use net::{Descriptor, Endpoint};
pub use server::{Connection, ConnectionHandle, Server, ServerDelegate};
