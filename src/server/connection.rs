//! Accepted peers.

use crate::net::endpoint::Endpoint;
use crate::net::socket::{Descriptor, Socket};

use std::fmt;
use std::io;
use std::rc::{Rc, Weak};

const READ_CHUNK: usize = 4096;

/// One accepted peer, owned by the server's connection map until it is closed.
///
/// The delegate receives `&mut Connection` in its callbacks. Setting
/// [`should_close`](Self::set_should_close) during `data_received` makes the server
/// tear the connection down right after the callback returns.
pub struct Connection {
    socket: Rc<Socket>,
    local_endpoint: Endpoint,
    remote_endpoint: Endpoint,
    should_close: bool,
    accepted_in_cycle: u64,
}

impl Connection {
    pub(crate) fn new(
        socket: Socket,
        local_endpoint: Endpoint,
        remote_endpoint: Endpoint,
        accepted_in_cycle: u64,
    ) -> Self {
        Self {
            socket: Rc::new(socket),
            local_endpoint,
            remote_endpoint,
            should_close: false,
            accepted_in_cycle,
        }
    }

    pub fn descriptor(&self) -> Descriptor {
        self.socket.descriptor()
    }

    /// The listening endpoint this connection was accepted on.
    pub fn local_endpoint(&self) -> Endpoint {
        self.local_endpoint
    }

    pub fn remote_endpoint(&self) -> Endpoint {
        self.remote_endpoint
    }

    pub fn should_close(&self) -> bool {
        self.should_close
    }

    pub fn set_should_close(&mut self, should_close: bool) {
        self.should_close = should_close;
    }

    /// Shorthand for `set_should_close(true)`.
    pub fn request_close(&mut self) {
        self.should_close = true;
    }

    /// A weak handle for sending to this connection outside of its own callbacks.
    pub fn handle(&self) -> ConnectionHandle {
        ConnectionHandle {
            descriptor: self.descriptor(),
            socket: Rc::downgrade(&self.socket),
        }
    }

    pub(crate) fn accepted_in_cycle(&self) -> u64 {
        self.accepted_in_cycle
    }

    /// Drains every byte currently available and decodes it as UTF-8.
    ///
    /// Invalid sequences are replaced rather than rejected.
    pub fn read_string(&mut self) -> io::Result<String> {
        let mut data = Vec::new();
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            match self.socket.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => data.extend_from_slice(&chunk[..n]),
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => break,
                Err(error) if data.is_empty() => return Err(error),
                Err(_) => break,
            }
        }

        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    pub fn send(&self, data: &[u8]) -> io::Result<()> {
        write_all(&self.socket, data)
    }

    /// Writes `text` followed by a newline.
    pub fn send_line(&self, text: &str) -> io::Result<()> {
        write_all(&self.socket, line(text).as_bytes())
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("descriptor", &self.descriptor())
            .field("local_endpoint", &self.local_endpoint)
            .field("remote_endpoint", &self.remote_endpoint)
            .field("should_close", &self.should_close)
            .finish()
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "connection {} ({} -> {})",
            self.descriptor().as_raw(),
            self.remote_endpoint,
            self.local_endpoint
        )
    }
}

/// A weak reference to a live connection.
///
/// Holding a handle never keeps the socket open: once the server closes the
/// connection, sends through the handle fail with `NotConnected`, even if the OS
/// has since handed the same descriptor number to a new peer.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    descriptor: Descriptor,
    socket: Weak<Socket>,
}

impl ConnectionHandle {
    pub fn descriptor(&self) -> Descriptor {
        self.descriptor
    }

    pub fn is_open(&self) -> bool {
        self.socket.strong_count() > 0
    }

    pub fn send(&self, data: &[u8]) -> io::Result<()> {
        let socket = self.upgrade()?;
        write_all(&socket, data)
    }

    pub fn send_line(&self, text: &str) -> io::Result<()> {
        let socket = self.upgrade()?;
        write_all(&socket, line(text).as_bytes())
    }

    fn upgrade(&self) -> io::Result<Rc<Socket>> {
        self.socket.upgrade().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotConnected,
                format!("connection on {} is closed", self.descriptor),
            )
        })
    }
}

fn line(text: &str) -> String {
    let mut line = String::with_capacity(text.len() + 1);
    line.push_str(text);
    line.push('\n');

    line
}

/// Writes until `data` is fully handed to the kernel.
///
/// There is no output buffering: a full send buffer surfaces as `WouldBlock`.
fn write_all(socket: &Socket, mut data: &[u8]) -> io::Result<()> {
    while !data.is_empty() {
        match socket.send(data) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "send returned zero bytes",
                ));
            }
            Ok(n) => data = &data[n..],
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        }
    }

    Ok(())
}
