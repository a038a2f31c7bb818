//! A line-based chat room built on the server delegate.
//!
//! The first message a connection sends becomes its user name; every later message
//! is broadcast as `<name> message` to every named user, the sender included.

use crate::net::Descriptor;
use crate::server::{Connection, ConnectionHandle, ServerDelegate};

use std::collections::HashMap;
use tracing::{debug, info, trace, warn};

pub const GREETING: &str = "Greetings! What's your name?";

/// Trims spaces, tabs, carriage returns and line feeds from both ends.
pub fn trim_whitespace(text: &str) -> &str {
    text.trim_matches(|c: char| matches!(c, ' ' | '\t' | '\r' | '\n'))
}

struct User {
    connection: ConnectionHandle,
    name: String,
}

#[derive(Default)]
pub struct ChatRoom {
    users: HashMap<Descriptor, User>,
}

impl ChatRoom {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_name(&self, descriptor: Descriptor) -> Option<&str> {
        self.users.get(&descriptor).map(|user| user.name.as_str())
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    fn broadcast(&self, message: &str) {
        for user in self.users.values() {
            if let Err(error) = user.connection.send_line(message) {
                warn!(user = %user.name, %error, "broadcast failed");
            }
        }
    }
}

impl ServerDelegate for ChatRoom {
    fn connection_opened(&mut self, connection: &mut Connection) {
        info!("{connection} opened");

        if let Err(error) = connection.send_line(GREETING) {
            warn!(%connection, %error, "unable to greet");
        }
    }

    fn connection_closed(&mut self, connection: &Connection) {
        info!("{connection} closed");
        self.users.remove(&connection.descriptor());
    }

    fn data_received(&mut self, connection: &mut Connection, byte_count: usize) {
        let data = match connection.read_string() {
            Ok(data) => data,
            Err(error) => {
                warn!(%connection, %error, "read failed");
                return;
            }
        };

        let message = trim_whitespace(&data);
        if message.is_empty() {
            return;
        }

        debug!("received {byte_count} bytes over {connection}: {message}");

        match self.users.get(&connection.descriptor()) {
            Some(user) => self.broadcast(&format!("<{}> {}", user.name, message)),
            None => {
                self.users.insert(
                    connection.descriptor(),
                    User {
                        connection: connection.handle(),
                        name: message.to_string(),
                    },
                );
                self.broadcast(&format!("{message} joined the chat"));
            }
        }
    }

    fn can_send_data(&mut self, connection: &mut Connection, byte_count: usize) {
        trace!("can send {byte_count} bytes over {connection}");
    }
}
