//! Bind targets: an address and a port.

use std::fmt;
use std::io;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};

/// An (address, port) pair identifying a bind target or a peer.
///
/// The core stores endpoints but never interprets them beyond handing them to the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    address: IpAddr,
    port: u16,
}

impl Endpoint {
    pub fn new(address: IpAddr, port: u16) -> Self {
        Self { address, port }
    }

    /// Resolves `host` through the OS resolver and pairs every result with `port`.
    ///
    /// # Example
    /// ```ignore
    /// let endpoints = Endpoint::resolve("localhost", 12345)?;
    /// ```
    pub fn resolve(host: &str, port: u16) -> io::Result<Vec<Endpoint>> {
        let endpoints: Vec<Endpoint> = (host, port).to_socket_addrs()?.map(Endpoint::from).collect();

        if endpoints.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no addresses found for {host}"),
            ));
        }

        Ok(endpoints)
    }

    pub fn address(&self) -> IpAddr {
        self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_ipv6(&self) -> bool {
        self.address.is_ipv6()
    }

    pub fn to_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(address: SocketAddr) -> Self {
        Self::new(address.ip(), address.port())
    }
}

impl From<Endpoint> for SocketAddr {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.to_socket_addr()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_socket_addr(), f)
    }
}
