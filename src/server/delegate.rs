//! Application callbacks.

use crate::server::connection::Connection;

use std::cell::RefCell;
use std::rc::Rc;

/// The extension point host applications implement to build protocols on top of the server.
///
/// All callbacks run synchronously on the thread calling
/// [`Server::handle_events`](crate::server::Server::handle_events).
/// Every method has an empty default, so a delegate only implements what it reacts to.
pub trait ServerDelegate {
    /// A peer was accepted and registered for read and write readiness.
    fn connection_opened(&mut self, _connection: &mut Connection) {}

    /// The connection left the server, either because the peer shut down or because
    /// `should_close` was set. Its socket closes right after this returns.
    fn connection_closed(&mut self, _connection: &Connection) {}

    /// `byte_count` bytes (as hinted by the OS) are ready to be read.
    fn data_received(&mut self, _connection: &mut Connection, _byte_count: usize) {}

    /// About `byte_count` bytes can be written without blocking.
    fn can_send_data(&mut self, _connection: &mut Connection, _byte_count: usize) {}
}

/// Lets a host keep its own reference to the delegate it installs.
impl<D: ServerDelegate + ?Sized> ServerDelegate for Rc<RefCell<D>> {
    fn connection_opened(&mut self, connection: &mut Connection) {
        self.borrow_mut().connection_opened(connection);
    }

    fn connection_closed(&mut self, connection: &Connection) {
        self.borrow_mut().connection_closed(connection);
    }

    fn data_received(&mut self, connection: &mut Connection, byte_count: usize) {
        self.borrow_mut().data_received(connection, byte_count);
    }

    fn can_send_data(&mut self, connection: &mut Connection, byte_count: usize) {
        self.borrow_mut().can_send_data(connection, byte_count);
    }
}
