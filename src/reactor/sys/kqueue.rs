//! kqueue backend.
//!
//! kqueue filters are level-triggered by default and report the byte count for
//! `EVFILT_READ` / `EVFILT_WRITE` in the event's `data` field, so events map one-to-one.

use crate::net::socket::{Descriptor, cvt};
use crate::reactor::event::{Event, EventKind, Interest};

use libc::{EV_ADD, EV_DELETE, EV_ENABLE, EV_ERROR, EVFILT_READ, EVFILT_WRITE, c_int, kevent, timespec};
use std::io;
use std::mem;
use std::os::fd::RawFd;
use std::ptr;
use std::time::Duration;

pub(crate) type RawEvent = kevent;

pub(crate) fn empty_event() -> RawEvent {
    unsafe { mem::zeroed() }
}

fn change(file_descriptor: RawFd, filter: i16, flags: u16) -> RawEvent {
    let mut event = empty_event();
    event.ident = file_descriptor as libc::uintptr_t;
    event.filter = filter as _;
    event.flags = flags as _;

    event
}

fn apply(queue: RawFd, changes: &[RawEvent]) -> io::Result<()> {
    cvt(unsafe {
        libc::kevent(
            queue,
            changes.as_ptr(),
            changes.len() as c_int,
            ptr::null_mut(),
            0,
            ptr::null(),
        )
    })?;

    Ok(())
}

fn delete(queue: RawFd, file_descriptor: RawFd, filter: i16) -> io::Result<()> {
    match apply(queue, &[change(file_descriptor, filter, EV_DELETE as u16)]) {
        Err(error) if error.raw_os_error() == Some(libc::ENOENT) => Ok(()),
        result => result,
    }
}

pub(crate) fn create() -> io::Result<RawFd> {
    let queue = cvt(unsafe { libc::kqueue() })?;
    if let Err(error) = cvt(unsafe { libc::fcntl(queue, libc::F_SETFD, libc::FD_CLOEXEC) }) {
        unsafe { libc::close(queue) };
        return Err(error);
    }

    Ok(queue)
}

pub(crate) fn register(queue: RawFd, file_descriptor: RawFd, interest: Interest) -> io::Result<()> {
    let add = (EV_ADD | EV_ENABLE) as u16;

    match interest {
        Interest::Read => {
            apply(queue, &[change(file_descriptor, EVFILT_READ as i16, add)])?;
            delete(queue, file_descriptor, EVFILT_WRITE as i16)
        }
        Interest::ReadWrite => apply(
            queue,
            &[
                change(file_descriptor, EVFILT_READ as i16, add),
                change(file_descriptor, EVFILT_WRITE as i16, add),
            ],
        ),
    }
}

pub(crate) fn deregister(queue: RawFd, file_descriptor: RawFd) -> io::Result<()> {
    delete(queue, file_descriptor, EVFILT_READ as i16)?;
    delete(queue, file_descriptor, EVFILT_WRITE as i16)
}

pub(crate) fn wait(queue: RawFd, buffer: &mut [RawEvent], timeout: Option<Duration>) -> io::Result<usize> {
    let timeout = timeout.map(|duration| timespec {
        tv_sec: duration.as_secs().min(libc::time_t::MAX as u64) as libc::time_t,
        tv_nsec: duration.subsec_nanos() as _,
    });
    let timeout_ptr = timeout
        .as_ref()
        .map_or(ptr::null(), |timeout| timeout as *const timespec);

    let count = unsafe {
        libc::kevent(
            queue,
            ptr::null(),
            0,
            buffer.as_mut_ptr(),
            buffer.len().min(c_int::MAX as usize) as c_int,
            timeout_ptr,
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
    if raw.flags as u32 & EV_ERROR as u32 != 0 {
        return;
    }

    let kind = match raw.filter as i16 {
        filter if filter == EVFILT_READ as i16 => EventKind::Readable,
        filter if filter == EVFILT_WRITE as i16 => EventKind::Writable,
        _ => return,
    };

    let descriptor = Descriptor::from_raw(raw.ident as RawFd);
    ready.push(Event::new(descriptor, kind, raw.data.max(0) as usize));
}
