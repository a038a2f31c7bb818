//! Socket address conversion between `std::net` and the C `sockaddr` family.

use libc::{AF_INET, AF_INET6, sa_family_t, sockaddr_in, sockaddr_in6, sockaddr_storage, socklen_t};
use std::io;
use std::mem;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

/// Encodes a `SocketAddr` as a `sockaddr_storage` suitable for `bind`.
///
/// # Returns
/// The storage together with the length of the concrete address inside it.
pub(crate) fn socketaddr_to_storage(address: &SocketAddr) -> (sockaddr_storage, socklen_t) {
    let mut storage: sockaddr_storage = unsafe { mem::zeroed() };

    let length = match address {
        SocketAddr::V4(v4) => {
            let mut sin: sockaddr_in = unsafe { mem::zeroed() };
            sin.sin_family = AF_INET as sa_family_t;
            sin.sin_port = v4.port().to_be();
            sin.sin_addr.s_addr = u32::from(*v4.ip()).to_be();
            #[cfg(any(
                target_os = "macos",
                target_os = "ios",
                target_os = "freebsd",
                target_os = "dragonfly",
                target_os = "openbsd"
            ))]
            {
                sin.sin_len = mem::size_of::<sockaddr_in>() as u8;
            }

            unsafe { *(&mut storage as *mut sockaddr_storage as *mut sockaddr_in) = sin };
            mem::size_of::<sockaddr_in>()
        }
        SocketAddr::V6(v6) => {
            let mut sin6: sockaddr_in6 = unsafe { mem::zeroed() };
            sin6.sin6_family = AF_INET6 as sa_family_t;
            sin6.sin6_port = v6.port().to_be();
            sin6.sin6_flowinfo = v6.flowinfo();
            sin6.sin6_addr.s6_addr = v6.ip().octets();
            sin6.sin6_scope_id = v6.scope_id();
            #[cfg(any(
                target_os = "macos",
                target_os = "ios",
                target_os = "freebsd",
                target_os = "dragonfly",
                target_os = "openbsd"
            ))]
            {
                sin6.sin6_len = mem::size_of::<sockaddr_in6>() as u8;
            }

            unsafe { *(&mut storage as *mut sockaddr_storage as *mut sockaddr_in6) = sin6 };
            mem::size_of::<sockaddr_in6>()
        }
    };

    (storage, length as socklen_t)
}

/// Decodes a `sockaddr_storage` filled in by `accept`.
pub(crate) fn storage_to_socketaddr(storage: &sockaddr_storage) -> io::Result<SocketAddr> {
    match storage.ss_family as i32 {
        AF_INET => {
            let sin = unsafe { &*(storage as *const sockaddr_storage as *const sockaddr_in) };
            let ip = Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr));

            Ok(SocketAddr::V4(SocketAddrV4::new(ip, u16::from_be(sin.sin_port))))
        }
        AF_INET6 => {
            let sin6 = unsafe { &*(storage as *const sockaddr_storage as *const sockaddr_in6) };
            let ip = Ipv6Addr::from(sin6.sin6_addr.s6_addr);

            Ok(SocketAddr::V6(SocketAddrV6::new(
                ip,
                u16::from_be(sin6.sin6_port),
                sin6.sin6_flowinfo,
                sin6.sin6_scope_id,
            )))
        }
        family => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("unsupported address family {family}"),
        )),
    }
}
