//! Single-threaded readiness-driven TCP server.
//!
//! The server owns the readiness multiplexer, a map from listening descriptor to the
//! endpoint it was bound for, and a map from connection descriptor to [`Connection`].
//! Every descriptor in either map is registered with the multiplexer.
//!
//! # Main Event Loop
//!
//! Each call to [`Server::handle_events`] performs exactly one poll and dispatches
//! every event of that batch before returning:
//! 1. Readiness on a listening descriptor accepts a new connection
//! 2. A zero-byte read closes the connection (peer shut down)
//! 3. Any other read is delivered to the delegate, then `should_close` is honored
//! 4. Write readiness is forwarded to the delegate
//! 5. Events for unknown descriptors are ignored
//!
//! # Usage
//!
//! ```ignore
//! let mut server = Server::new(Endpoint::new("127.0.0.1".parse()?, 12345))?;
//! server.set_delegate(MyDelegate::default());
//!
//! loop {
//!     server.handle_events()?;
//! }
//! ```

pub mod connection;
pub mod delegate;

pub use connection::{Connection, ConnectionHandle};
pub use delegate::ServerDelegate;

use crate::builder::{ServerBuilder, ServerConfig};
use crate::error::{Result, ServerError};
use crate::net::endpoint::Endpoint;
use crate::net::socket::{Descriptor, Socket};
use crate::reactor::{Event, EventKind, Events, Interest, Poller};

use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// A bound, listening socket and the endpoint it was created for.
struct Listener {
    socket: Socket,
    endpoint: Endpoint,
}

/// Readiness-driven TCP server.
///
/// Not thread-safe by construction: the multiplexer, both maps and every connection
/// belong to the thread calling [`handle_events`](Self::handle_events).
pub struct Server {
    delegate: Option<Box<dyn ServerDelegate>>,
    poller: Poller,
    events: Events,
    local_endpoints: HashMap<Descriptor, Listener>,
    connections: HashMap<Descriptor, Connection>,
    config: ServerConfig,
    cycle: u64,
}

impl Server {
    /// Creates a server with default settings listening on `endpoint`.
    ///
    /// # Errors
    /// `UnableToCreateMultiplexer` or `UnableToCreateSocket`.
    pub fn new(endpoint: Endpoint) -> Result<Self> {
        ServerBuilder::new().build(endpoint)
    }

    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub(crate) fn with_config(config: ServerConfig, endpoint: Endpoint) -> Result<Self> {
        let poller = Poller::new()?;

        let mut server = Self {
            delegate: None,
            poller,
            events: Events::with_capacity(config.event_capacity),
            local_endpoints: HashMap::new(),
            connections: HashMap::new(),
            config,
            cycle: 0,
        };
        server.add_local_endpoint(endpoint)?;

        Ok(server)
    }

    /// Creates, binds and listens on a new socket for `endpoint`.
    ///
    /// The listening descriptor is registered for read readiness only and polled
    /// together with every other endpoint.
    ///
    /// # Returns
    /// The endpoint actually bound. It differs from `endpoint` only when port 0 asked
    /// the OS to pick a port.
    ///
    /// # Errors
    /// `UnableToCreateSocket` if the socket cannot be created, bound, or monitored.
    pub fn add_local_endpoint(&mut self, endpoint: Endpoint) -> Result<Endpoint> {
        let unable = |source| ServerError::UnableToCreateSocket { endpoint, source };

        let socket = Socket::listen(&endpoint, self.config.backlog).map_err(unable)?;
        let endpoint = if endpoint.port() == 0 {
            Endpoint::from(socket.local_addr().map_err(unable)?)
        } else {
            endpoint
        };

        let descriptor = socket.descriptor();
        self.poller
            .register(descriptor, Interest::Read)
            .map_err(unable)?;

        info!(%endpoint, %descriptor, "listening");
        self.local_endpoints
            .insert(descriptor, Listener { socket, endpoint });

        Ok(endpoint)
    }

    /// Installs the delegate, replacing any previous one.
    pub fn set_delegate<D: ServerDelegate + 'static>(&mut self, delegate: D) {
        self.delegate = Some(Box::new(delegate));
    }

    pub fn clear_delegate(&mut self) -> Option<Box<dyn ServerDelegate>> {
        self.delegate.take()
    }

    pub fn has_delegate(&self) -> bool {
        self.delegate.is_some()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Listening descriptors and the endpoints they were bound for.
    pub fn local_endpoints(&self) -> impl Iterator<Item = (Descriptor, Endpoint)> + '_ {
        self.local_endpoints
            .iter()
            .map(|(descriptor, listener)| (*descriptor, listener.endpoint))
    }

    pub fn connection(&self, descriptor: Descriptor) -> Option<&Connection> {
        self.connections.get(&descriptor)
    }

    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Blocks until something is ready, then dispatches the whole batch.
    ///
    /// Call repeatedly from the host's loop. Must not be called re-entrantly.
    ///
    /// # Errors
    /// `UnableToAcceptConnection` if any accept in the batch failed (the remaining
    /// events of the batch are still dispatched), `Poll` if the wait itself failed.
    pub fn handle_events(&mut self) -> Result<()> {
        self.run_cycle(None)
    }

    /// Like [`handle_events`](Self::handle_events), but gives up waiting after `timeout`.
    pub fn handle_events_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.run_cycle(Some(timeout))
    }

    fn run_cycle(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.cycle = self.cycle.wrapping_add(1);

        let count = self
            .poller
            .poll(&mut self.events, timeout)
            .map_err(ServerError::Poll)?;
        trace!(cycle = self.cycle, count, "poll cycle");

        let mut failure = None;
        for index in 0..count {
            let Some(event) = self.events.get(index) else {
                break;
            };

            if let Err(error) = self.dispatch(event) {
                warn!(%error, "event dispatch failed");
                failure.get_or_insert(error);
            }
        }

        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn dispatch(&mut self, event: Event) -> Result<()> {
        let descriptor = event.descriptor();
        trace!(%descriptor, kind = ?event.kind(), hint = event.data_hint(), "event");

        if self.local_endpoints.contains_key(&descriptor) {
            if event.is_readable() {
                return self.accept_connection(descriptor);
            }

            return Ok(());
        }

        let Some(connection) = self.connections.get(&descriptor) else {
            trace!(%descriptor, "ignoring event for unknown descriptor");
            return Ok(());
        };

        // Accepted during this cycle: the batch predates it and describes whatever
        // previously held the descriptor number.
        if connection.accepted_in_cycle() == self.cycle {
            trace!(%descriptor, "ignoring stale event");
            return Ok(());
        }

        match event.kind() {
            EventKind::Readable => self.handle_read(descriptor, event.data_hint()),
            EventKind::Writable => self.handle_write(descriptor, event.data_hint()),
        }

        Ok(())
    }

    fn accept_connection(&mut self, listening: Descriptor) -> Result<()> {
        let Some(listener) = self.local_endpoints.get(&listening) else {
            return Ok(());
        };
        let local_endpoint = listener.endpoint;

        let accepted = listener.socket.accept().map_err(|source| {
            ServerError::UnableToAcceptConnection {
                endpoint: local_endpoint,
                source,
            }
        })?;

        let Some((socket, remote)) = accepted else {
            trace!(endpoint = %local_endpoint, "nothing left to accept");
            return Ok(());
        };

        let connection = Connection::new(socket, local_endpoint, Endpoint::from(remote), self.cycle);
        let descriptor = connection.descriptor();

        if let Err(error) = self.poller.register(descriptor, Interest::ReadWrite) {
            // Dropping the connection closes the socket; it was never announced.
            warn!(%connection, %error, "unable to monitor accepted connection, dropping it");
            return Ok(());
        }

        debug!(%connection, "connection opened");
        self.connections.insert(descriptor, connection);

        if let (Some(delegate), Some(connection)) =
            (self.delegate.as_mut(), self.connections.get_mut(&descriptor))
        {
            delegate.connection_opened(connection);
        }

        Ok(())
    }

    fn handle_read(&mut self, descriptor: Descriptor, byte_count: usize) {
        if byte_count == 0 {
            self.close_connection(descriptor);
            return;
        }

        let Some(connection) = self.connections.get_mut(&descriptor) else {
            return;
        };

        if let Some(delegate) = self.delegate.as_mut() {
            delegate.data_received(connection, byte_count);
        }

        if connection.should_close() {
            self.close_connection(descriptor);
        }
    }

    fn handle_write(&mut self, descriptor: Descriptor, byte_count: usize) {
        if let (Some(delegate), Some(connection)) =
            (self.delegate.as_mut(), self.connections.get_mut(&descriptor))
        {
            delegate.can_send_data(connection, byte_count);
        }
    }

    /// Removes, deregisters and finally closes a connection.
    ///
    /// The map entry goes first, so the descriptor number can only be recycled by
    /// the OS once nothing refers to it anymore.
    fn close_connection(&mut self, descriptor: Descriptor) {
        let Some(connection) = self.connections.remove(&descriptor) else {
            return;
        };

        if let Err(error) = self.poller.deregister(descriptor) {
            debug!(%connection, %error, "deregistration failed");
        }

        debug!(%connection, "connection closed");
        if let Some(delegate) = self.delegate.as_mut() {
            delegate.connection_closed(&connection);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::RefCell;
    use std::net::{Ipv4Addr, TcpStream};
    use std::rc::Rc;
    use std::time::Instant;

    #[derive(Default)]
    struct Writes {
        opened: Vec<Descriptor>,
        can_send: Vec<(u64, Descriptor)>,
        cycle: u64,
    }

    impl ServerDelegate for Writes {
        fn connection_opened(&mut self, connection: &mut Connection) {
            self.opened.push(connection.descriptor());
        }

        fn can_send_data(&mut self, connection: &mut Connection, _byte_count: usize) {
            self.can_send.push((self.cycle, connection.descriptor()));
        }
    }

    fn pump_until(server: &mut Server, mut done: impl FnMut(&Server) -> bool) -> bool {
        let started = Instant::now();
        while started.elapsed() < Duration::from_secs(5) {
            if done(server) {
                return true;
            }
            server
                .handle_events_timeout(Duration::from_millis(20))
                .unwrap();
        }

        done(server)
    }

    #[test]
    fn events_batched_before_an_accept_never_reach_the_new_connection() {
        let mut server = Server::new(Endpoint::new(Ipv4Addr::LOCALHOST.into(), 0)).unwrap();
        let (listening, endpoint) = server.local_endpoints().next().unwrap();
        let writes = Rc::new(RefCell::new(Writes::default()));
        server.set_delegate(writes.clone());

        let first = TcpStream::connect(endpoint.to_socket_addr()).unwrap();
        assert!(pump_until(&mut server, |server| server.connection_count() == 1));
        let reused = writes.borrow().opened[0];

        drop(first);
        let _second = TcpStream::connect(endpoint.to_socket_addr()).unwrap();

        // One batch: the old owner hangs up, the listener hands the number out
        // again, then a write event collected before the accept shows up.
        server.cycle += 1;
        let cycle = server.cycle;
        writes.borrow_mut().cycle = cycle;

        server
            .dispatch(Event::new(reused, EventKind::Readable, 0))
            .unwrap();
        assert_eq!(server.connection_count(), 0);

        server
            .dispatch(Event::new(listening, EventKind::Readable, 1))
            .unwrap();
        assert_eq!(server.connection_count(), 1);
        let accepted = writes.borrow().opened[1];

        server
            .dispatch(Event::new(reused, EventKind::Writable, 1))
            .unwrap();
        server
            .dispatch(Event::new(accepted, EventKind::Writable, 1))
            .unwrap();
        assert!(writes.borrow().can_send.iter().all(|(at, _)| *at != cycle));

        writes.borrow_mut().cycle = cycle + 1;
        assert!(pump_until(&mut server, |_| {
            writes
                .borrow()
                .can_send
                .iter()
                .any(|(at, descriptor)| *at > cycle && *descriptor == accepted)
        }));
    }
}
