//! Level-triggered epoll backend.
//!
//! epoll reports read and write readiness in one event and carries no byte count,
//! so the hints are queried from the socket when the batch is decoded.

use crate::net::socket::{Descriptor, cvt};
use crate::reactor::event::{Event, EventKind, Interest};

use libc::{EPOLLERR, EPOLLHUP, EPOLLIN, EPOLLOUT, EPOLLRDHUP, c_int, c_void, epoll_event, socklen_t};
use std::io;
use std::mem;
use std::os::fd::RawFd;
use std::time::Duration;

pub(crate) type RawEvent = epoll_event;

const READ_FLAGS: c_int = EPOLLIN | EPOLLRDHUP;
const HANGUP_FLAGS: c_int = EPOLLIN | EPOLLRDHUP | EPOLLHUP | EPOLLERR;

pub(crate) fn empty_event() -> RawEvent {
    epoll_event { events: 0, u64: 0 }
}

pub(crate) fn create() -> io::Result<RawFd> {
    cvt(unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) })
}

pub(crate) fn register(queue: RawFd, file_descriptor: RawFd, interest: Interest) -> io::Result<()> {
    let flags = match interest {
        Interest::Read => READ_FLAGS,
        Interest::ReadWrite => READ_FLAGS | EPOLLOUT,
    };

    let mut event = epoll_event {
        events: flags as u32,
        u64: file_descriptor as u64,
    };

    let added = unsafe { libc::epoll_ctl(queue, libc::EPOLL_CTL_ADD, file_descriptor, &mut event) };
    if added == 0 {
        return Ok(());
    }

    let error = io::Error::last_os_error();
    if error.raw_os_error() != Some(libc::EEXIST) {
        return Err(error);
    }

    cvt(unsafe { libc::epoll_ctl(queue, libc::EPOLL_CTL_MOD, file_descriptor, &mut event) })?;

    Ok(())
}

pub(crate) fn deregister(queue: RawFd, file_descriptor: RawFd) -> io::Result<()> {
    let mut event = empty_event();

    let result = unsafe { libc::epoll_ctl(queue, libc::EPOLL_CTL_DEL, file_descriptor, &mut event) };
    if result == 0 {
        return Ok(());
    }

    let error = io::Error::last_os_error();
    if error.raw_os_error() == Some(libc::ENOENT) {
        return Ok(());
    }

    Err(error)
}

pub(crate) fn wait(queue: RawFd, buffer: &mut [RawEvent], timeout: Option<Duration>) -> io::Result<usize> {
    let timeout_ms = match timeout {
        None => -1,
        Some(duration) => {
            let millis = duration.as_nanos().div_ceil(1_000_000);
            millis.min(c_int::MAX as u128) as c_int
        }
    };

    let count = unsafe {
        libc::epoll_wait(
            queue,
            buffer.as_mut_ptr(),
            buffer.len().min(c_int::MAX as usize) as c_int,
            timeout_ms,
        )
    };

    if count < 0 {
        let error = io::Error::last_os_error();
        if error.kind() == io::ErrorKind::Interrupted {
            return Ok(0);
        }

        return Err(error);
    }

    Ok(count as usize)
}

pub(crate) fn expand(raw: &RawEvent, ready: &mut Vec<Event>) {
    let flags = raw.events as c_int;
    let file_descriptor = raw.u64 as RawFd;
    let descriptor = Descriptor::from_raw(file_descriptor);

    if flags & HANGUP_FLAGS != 0 {
        ready.push(Event::new(
            descriptor,
            EventKind::Readable,
            bytes_readable(file_descriptor),
        ));
    }

    if flags & EPOLLOUT != 0 {
        ready.push(Event::new(
            descriptor,
            EventKind::Writable,
            send_space(file_descriptor),
        ));
    }
}

/// Bytes queued for reading; zero when the peer has shut down or the query fails.
fn bytes_readable(file_descriptor: RawFd) -> usize {
    let mut available: c_int = 0;

    let result = unsafe { libc::ioctl(file_descriptor, libc::FIONREAD, &mut available) };
    if result < 0 {
        return 0;
    }

    available.max(0) as usize
}

/// Free room in the send buffer.
fn send_space(file_descriptor: RawFd) -> usize {
    let mut size: c_int = 0;
    let mut length = mem::size_of::<c_int>() as socklen_t;

    let result = unsafe {
        libc::getsockopt(
            file_descriptor,
            libc::SOL_SOCKET,
            libc::SO_SNDBUF,
            &mut size as *mut c_int as *mut c_void,
            &mut length,
        )
    };
    if result < 0 {
        return 0;
    }

    let mut queued: c_int = 0;
    if unsafe { libc::ioctl(file_descriptor, libc::TIOCOUTQ, &mut queued) } < 0 {
        queued = 0;
    }

    (size.max(0) as usize).saturating_sub(queued.max(0) as usize)
}
