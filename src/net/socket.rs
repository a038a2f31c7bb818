//! Owning wrapper around TCP socket descriptors.
//!
//! A [`Socket`] closes its descriptor when dropped, so removing a listener or a
//! connection from the server's maps is what releases the OS handle.

use crate::net::endpoint::Endpoint;
use crate::net::utils::{socketaddr_to_storage, storage_to_socketaddr};

use libc::{c_int, c_void, sockaddr, sockaddr_storage, socklen_t};
use std::fmt;
use std::io;
use std::mem;
use std::net::SocketAddr;
use std::os::fd::RawFd;

#[cfg(any(target_os = "linux", target_os = "android"))]
const SEND_FLAGS: c_int = libc::MSG_NOSIGNAL;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const SEND_FLAGS: c_int = 0;

/// Opaque OS handle for a socket, used as the key of the server's maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Descriptor(RawFd);

impl Descriptor {
    pub(crate) fn from_raw(file_descriptor: RawFd) -> Self {
        Self(file_descriptor)
    }

    pub fn as_raw(self) -> RawFd {
        self.0
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fd {}", self.0)
    }
}

/// A nonblocking TCP socket that owns its descriptor.
#[derive(Debug)]
pub(crate) struct Socket {
    descriptor: Descriptor,
}

impl Socket {
    /// Takes ownership of `file_descriptor`; it is closed when the socket drops.
    fn from_raw(file_descriptor: RawFd) -> Self {
        Self {
            descriptor: Descriptor::from_raw(file_descriptor),
        }
    }

    /// Creates, binds and sets listening mode on a new socket for `endpoint`.
    ///
    /// IPv6 sockets are restricted to IPv6 traffic so the same port can also be
    /// bound on IPv4.
    pub(crate) fn listen(endpoint: &Endpoint, backlog: i32) -> io::Result<Self> {
        let domain = if endpoint.is_ipv6() {
            libc::AF_INET6
        } else {
            libc::AF_INET
        };

        let file_descriptor = cvt(unsafe { libc::socket(domain, libc::SOCK_STREAM, 0) })?;
        let socket = Self::from_raw(file_descriptor);

        socket.prepare()?;
        socket.set_option(libc::SOL_SOCKET, libc::SO_REUSEADDR, 1)?;
        if endpoint.is_ipv6() {
            socket.set_option(libc::IPPROTO_IPV6, libc::IPV6_V6ONLY, 1)?;
        }

        let (storage, length) = socketaddr_to_storage(&endpoint.to_socket_addr());
        cvt(unsafe {
            libc::bind(
                file_descriptor,
                &storage as *const sockaddr_storage as *const sockaddr,
                length,
            )
        })?;
        cvt(unsafe { libc::listen(file_descriptor, backlog) })?;

        Ok(socket)
    }

    /// Accepts one pending connection.
    ///
    /// # Returns
    /// `Ok(None)` when nothing is pending anymore (the peer went away between the
    /// readiness report and the accept).
    pub(crate) fn accept(&self) -> io::Result<Option<(Socket, SocketAddr)>> {
        loop {
            let mut storage: sockaddr_storage = unsafe { mem::zeroed() };
            let mut length = mem::size_of::<sockaddr_storage>() as socklen_t;

            let result = unsafe {
                libc::accept(
                    self.descriptor.as_raw(),
                    &mut storage as *mut sockaddr_storage as *mut sockaddr,
                    &mut length,
                )
            };

            if result >= 0 {
                let socket = Self::from_raw(result);
                socket.prepare()?;
                #[cfg(any(target_os = "macos", target_os = "ios"))]
                socket.set_option(libc::SOL_SOCKET, libc::SO_NOSIGPIPE, 1)?;

                let remote = storage_to_socketaddr(&storage)?;
                return Ok(Some((socket, remote)));
            }

            let error = io::Error::last_os_error();
            match error.kind() {
                io::ErrorKind::Interrupted => continue,
                io::ErrorKind::WouldBlock | io::ErrorKind::ConnectionAborted => return Ok(None),
                _ => return Err(error),
            }
        }
    }

    pub(crate) fn read(&self, buffer: &mut [u8]) -> io::Result<usize> {
        let result = unsafe {
            libc::read(
                self.descriptor.as_raw(),
                buffer.as_mut_ptr() as *mut c_void,
                buffer.len(),
            )
        };

        if result < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(result as usize)
    }

    pub(crate) fn send(&self, buffer: &[u8]) -> io::Result<usize> {
        let result = unsafe {
            libc::send(
                self.descriptor.as_raw(),
                buffer.as_ptr() as *const c_void,
                buffer.len(),
                SEND_FLAGS,
            )
        };

        if result < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(result as usize)
    }

    pub(crate) fn local_addr(&self) -> io::Result<SocketAddr> {
        let mut storage: sockaddr_storage = unsafe { mem::zeroed() };
        let mut length = mem::size_of::<sockaddr_storage>() as socklen_t;

        cvt(unsafe {
            libc::getsockname(
                self.descriptor.as_raw(),
                &mut storage as *mut sockaddr_storage as *mut sockaddr,
                &mut length,
            )
        })?;

        storage_to_socketaddr(&storage)
    }

    pub(crate) fn descriptor(&self) -> Descriptor {
        self.descriptor
    }

    /// Switches to nonblocking mode and keeps the descriptor out of child processes.
    fn prepare(&self) -> io::Result<()> {
        let file_descriptor = self.descriptor.as_raw();

        let flags = cvt(unsafe { libc::fcntl(file_descriptor, libc::F_GETFL) })?;
        cvt(unsafe { libc::fcntl(file_descriptor, libc::F_SETFL, flags | libc::O_NONBLOCK) })?;

        let flags = cvt(unsafe { libc::fcntl(file_descriptor, libc::F_GETFD) })?;
        cvt(unsafe { libc::fcntl(file_descriptor, libc::F_SETFD, flags | libc::FD_CLOEXEC) })?;

        Ok(())
    }

    fn set_option(&self, level: c_int, name: c_int, value: c_int) -> io::Result<()> {
        cvt(unsafe {
            libc::setsockopt(
                self.descriptor.as_raw(),
                level,
                name,
                &value as *const c_int as *const c_void,
                mem::size_of::<c_int>() as socklen_t,
            )
        })?;

        Ok(())
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.descriptor.as_raw());
        }
    }
}

pub(crate) fn cvt(result: c_int) -> io::Result<c_int> {
    if result == -1 {
        return Err(io::Error::last_os_error());
    }

    Ok(result)
}
