use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use std::{cmp, i32, io};

use libc::{self, c_int};
use libc::{EPOLLERR, EPOLLHUP, EPOLLIN, EPOLLOUT, EPOLLPRI, EPOLLRDHUP};

use crate::driver::sys::event::Ready;
use crate::driver::sys::linux::cvt;
use crate::driver::sys::UnixReady;

/// Each Selector has a globally unique(ish) ID associated with it. This ID
/// gets tracked by the poller so a registry can tell which epoll instance
/// it belongs to in log output.
static NEXT_ID: AtomicUsize = AtomicUsize::new(1);

#[derive(Debug)]
pub struct Selector {
    id: usize,
    epfd: RawFd,
}

impl Selector {
    pub fn new() -> io::Result<Selector> {
        let epfd = unsafe { cvt(libc::epoll_create1(libc::EPOLL_CLOEXEC))? };

        // offset by 1 to avoid choosing 0 as the id of a selector
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed) + 1;

        Ok(Selector { id, epfd })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Wait for events from the OS
    ///
    /// A single `epoll_wait`; the caller owns retry and deadline handling.
    pub fn select(&self, evts: &mut Events, timeout: Option<Duration>) -> io::Result<usize> {
        let timeout_ms = timeout.map(millis_round_up).unwrap_or(-1);

        // Wait for epoll events for at most timeout_ms milliseconds
        evts.events.clear();
        unsafe {
            let cnt = cvt(libc::epoll_wait(
                self.epfd,
                evts.events.as_mut_ptr(),
                evts.events.capacity() as c_int,
                timeout_ms,
            ))?;
            let cnt = cnt as usize;
            evts.events.set_len(cnt);
            Ok(cnt)
        }
    }

    /// Register event interests for the given descriptor
    pub fn register(&self, fd: RawFd, interests: Ready) -> io::Result<()> {
        self.ctl(libc::EPOLL_CTL_ADD, fd, interests)
    }

    /// Change the interests of an already registered descriptor
    pub fn reregister(&self, fd: RawFd, interests: Ready) -> io::Result<()> {
        self.ctl(libc::EPOLL_CTL_MOD, fd, interests)
    }

    /// Deregister event interests for the given descriptor
    pub fn deregister(&self, fd: RawFd) -> io::Result<()> {
        // The &info argument should be ignored by the system,
        // but linux < 2.6.9 required it to be not null.
        // For compatibility, we provide a dummy EpollEvent.
        let mut info = libc::epoll_event { events: 0, u64: 0 };

        unsafe {
            cvt(libc::epoll_ctl(
                self.epfd,
                libc::EPOLL_CTL_DEL,
                fd,
                &mut info,
            ))?;
        }

        Ok(())
    }

    fn ctl(&self, op: c_int, fd: RawFd, interests: Ready) -> io::Result<()> {
        let mut info = libc::epoll_event {
            events: ioevent_to_epoll(interests),
            u64: fd as u64,
        };

        unsafe {
            cvt(libc::epoll_ctl(self.epfd, op, fd, &mut info))?;
        }

        Ok(())
    }
}

fn millis_round_up(timeout: Duration) -> c_int {
    let ms = timeout
        .as_secs()
        .saturating_mul(1_000)
        .saturating_add((u64::from(timeout.subsec_nanos()) + 999_999) / 1_000_000);
    cmp::min(ms, i32::MAX as u64) as c_int
}

fn ioevent_to_epoll(interest: Ready) -> u32 {
    let mut kind = 0;

    if interest.is_readable() {
        kind |= EPOLLIN;
    }

    if interest.is_writable() {
        kind |= EPOLLOUT;
    }

    if UnixReady::from(interest).is_priority() {
        kind |= EPOLLPRI;
    }

    if UnixReady::from(interest).is_hup() {
        kind |= EPOLLRDHUP;
    }

    kind as u32
}

fn epoll_to_ready(epoll: c_int) -> Ready {
    let mut kind = Ready::empty();

    if (epoll & EPOLLIN) != 0 {
        kind |= Ready::readable();
    }

    if (epoll & EPOLLPRI) != 0 {
        kind |= UnixReady::priority();
    }

    if (epoll & EPOLLOUT) != 0 {
        kind |= Ready::writable();
    }

    if (epoll & EPOLLERR) != 0 {
        kind |= UnixReady::error();
    }

    if (epoll & EPOLLRDHUP) != 0 || (epoll & EPOLLHUP) != 0 {
        kind |= UnixReady::hup();
    }

    kind
}

impl AsRawFd for Selector {
    fn as_raw_fd(&self) -> RawFd {
        self.epfd
    }
}

impl Drop for Selector {
    fn drop(&mut self) {
        unsafe {
            let _ = libc::close(self.epfd);
        }
    }
}

/// Raw storage for one `epoll_wait` call.
pub struct Events {
    events: Vec<libc::epoll_event>,
}

impl Events {
    pub fn with_capacity(u: usize) -> Events {
        Events {
            events: Vec::with_capacity(u),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.events.capacity()
    }

    /// Returns the descriptor and readiness of the event at `idx`.
    #[inline]
    pub fn get(&self, idx: usize) -> Option<(RawFd, Ready)> {
        self.events.get(idx).map(|event| {
            let epoll = event.events as c_int;
            let fd = event.u64 as RawFd;
            (fd, epoll_to_ready(epoll))
        })
    }
}

impl std::fmt::Debug for Events {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Events")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_rounds_up() {
        assert_eq!(millis_round_up(Duration::from_millis(0)), 0);
        assert_eq!(millis_round_up(Duration::from_micros(1)), 1);
        assert_eq!(millis_round_up(Duration::from_millis(50)), 50);
        assert_eq!(millis_round_up(Duration::from_micros(50_001)), 51);
        assert_eq!(millis_round_up(Duration::from_secs(u64::MAX)), i32::MAX);
    }

    #[test]
    fn interest_round_trip() {
        let interest = Ready::readable() | Ready::writable() | UnixReady::hup();
        let epoll = ioevent_to_epoll(interest);
        assert_eq!(epoll_to_ready(epoll as c_int), interest);
    }

    #[test]
    fn observed_only_reports_known_bits() {
        let ready = epoll_to_ready(-1);
        assert_eq!(ready, Ready::all());
    }
}
