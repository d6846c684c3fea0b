use std::collections::HashMap;
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::{Duration, Instant};
use std::{fmt, io, slice};

use log::{debug, trace};
use parking_lot::{Mutex, MutexGuard};

use crate::driver::sys::event::{Event, Ready};
use crate::driver::sys::linux::{self, Awakener};
use crate::error::{Error, Result};

/// Default number of events a batch can hold.
const DEFAULT_CAPACITY: usize = 64;

/// Polls for readiness events on all registered descriptors.
///
/// `Poll` owns an epoll instance and a registry of the descriptors it
/// watches together with the interest each was registered with. Watches
/// are level-triggered: a descriptor that still has unread data is
/// reported again by the next wait.
///
/// Individual calls are safe from any thread. Sequences of calls, such as
/// registering a descriptor and then waiting for it, must be ordered by
/// the caller.
///
/// # Examples
///
/// ```
/// use netlink_poller::driver::sys::{Events, Poll};
/// use netlink_poller::driver::sys::event::Ready;
/// use std::io::Write;
/// use std::os::unix::io::AsRawFd;
/// use std::os::unix::net::UnixStream;
/// use std::time::Duration;
///
/// let poll = Poll::new()?;
/// let mut events = Events::with_capacity(8);
/// let (rx, mut tx) = UnixStream::pair()?;
///
/// poll.register(rx.as_raw_fd(), Ready::readable())?;
/// tx.write_all(b"ping")?;
///
/// poll.wait(&mut events, Some(Duration::from_secs(1)))?;
/// let event = events.iter().next().unwrap();
/// assert_eq!(event.fd(), rx.as_raw_fd());
/// assert!(event.readiness().is_readable());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Poll {
    selector: linux::Selector,
    registry: Mutex<HashMap<RawFd, Ready>>,
}

/// A batch of readiness events filled by a wait call.
///
/// The storage is reused across calls; events are only meaningful until
/// the next wait overwrites them.
pub struct Events {
    inner: linux::epoll::Events,
    batch: Vec<Event>,
}

/// [`Events`] iterator.
///
/// [`Events`]: struct.Events.html
pub type Iter<'a> = slice::Iter<'a, Event>;

impl Poll {
    /// Return a new `Poll` handle.
    pub fn new() -> Result<Poll> {
        let selector = linux::Selector::new().map_err(|e| Error::sys("epoll_create1", e))?;
        debug!("created poll selector {}", selector.id());

        Ok(Poll {
            selector,
            registry: Mutex::new(HashMap::new()),
        })
    }

    /// Watch `fd` for the readiness in `interest`.
    ///
    /// Registering a descriptor that is already watched replaces its
    /// interest. Error and hang-up readiness are always reported.
    ///
    /// A descriptor number that was closed while watched and then reused
    /// for a new descriptor is watched afresh.
    pub fn register(&self, fd: RawFd, interest: Ready) -> Result<()> {
        if fd < 0 {
            return Err(Error::InvalidDescriptor(fd));
        }

        let mut registry = self.registry.lock();
        let res = if registry.contains_key(&fd) {
            match self.selector.reregister(fd, interest) {
                // closed since the last registration, the number now names
                // a descriptor the epoll set has never seen
                Err(ref e) if e.raw_os_error() == Some(libc::ENOENT) => {
                    debug!("fd={} was reused, adding it again", fd);
                    self.selector.register(fd, interest)
                }
                res => res,
            }
        } else {
            match self.selector.register(fd, interest) {
                // registered behind our back, e.g. a reused descriptor number
                Err(ref e) if e.raw_os_error() == Some(libc::EEXIST) => {
                    self.selector.reregister(fd, interest)
                }
                res => res,
            }
        };

        match res {
            Ok(()) => {
                trace!("selector {}: watch fd={} {:?}", self.selector.id(), fd, interest);
                registry.insert(fd, interest);
                Ok(())
            }
            Err(e) => {
                registry.remove(&fd);
                Err(ctl_error(fd, e))
            }
        }
    }

    /// Stop watching `fd`.
    ///
    /// Unknown descriptors are ignored. A descriptor that was closed while
    /// registered has already left the epoll set and is simply forgotten.
    pub fn unregister(&self, fd: RawFd) -> Result<()> {
        let mut registry = self.registry.lock();
        if registry.remove(&fd).is_none() {
            return Ok(());
        }

        match self.selector.deregister(fd) {
            Ok(()) => Ok(()),
            // EPERM: the number was reused by a descriptor epoll cannot watch
            Err(ref e)
                if e.raw_os_error() == Some(libc::EBADF)
                    || e.raw_os_error() == Some(libc::ENOENT)
                    || e.raw_os_error() == Some(libc::EPERM) =>
            {
                debug!("fd={} was closed before unregister", fd);
                Ok(())
            }
            Err(e) => Err(Error::sys("epoll_ctl", e)),
        }
    }

    /// Returns true if `fd` is currently watched.
    pub fn is_registered(&self, fd: RawFd) -> bool {
        self.registry.lock().contains_key(&fd)
    }

    /// Returns the interest `fd` was registered with.
    pub fn interest(&self, fd: RawFd) -> Option<Ready> {
        self.registry.lock().get(&fd).copied()
    }

    /// Wait for readiness events
    ///
    /// Blocks until at least one watched descriptor is ready or `timeout`
    /// elapses. `None` waits forever and a zero timeout polls without
    /// blocking. `events` is cleared first; the number of events placed in
    /// it is returned and zero means the timeout elapsed.
    ///
    /// Signal interruptions are retried with the remaining time.
    pub fn wait(&self, events: &mut Events, timeout: Option<Duration>) -> Result<usize> {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        self.wait_inner(events, timeout, deadline)
    }

    /// Like [`wait`], with an absolute deadline.
    ///
    /// [`wait`]: #method.wait
    pub fn wait_until(&self, events: &mut Events, deadline: Instant) -> Result<usize> {
        let timeout = deadline.saturating_duration_since(Instant::now());
        self.wait_inner(events, Some(timeout), Some(deadline))
    }

    /// Wait for readiness events or a signal on `awakener`.
    ///
    /// The awakener is (re)registered on every call and stays watched.
    /// Returns true if it was signalled, in which case the batch may be
    /// empty or partial. The awakener's own event never appears in
    /// `events`, and its pending signals are consumed.
    ///
    /// A signal raised before this call starts still ends it early, even
    /// when the awakener reuses the descriptor number of a dropped one.
    pub fn wait_with_external_wake(
        &self,
        events: &mut Events,
        awakener: &Awakener,
        timeout: Option<Duration>,
    ) -> Result<bool> {
        let fd = awakener.fd();
        self.register(fd, Ready::readable())?;

        self.wait(events, timeout)?;

        let before = events.batch.len();
        events.batch.retain(|event| event.fd() != fd);
        let woken = events.batch.len() != before;
        if woken {
            trace!("selector {}: woken by awakener", self.selector.id());
            awakener.cleanup();
        }

        Ok(woken)
    }

    /// [`wait_with_external_wake`] with `guard` released while blocked.
    ///
    /// The mutex behind `guard` is unlocked for the blocking part of the
    /// wait and locked again before returning. Producers update the shared
    /// state under the lock and then signal `awakener`, which makes the
    /// pair behave like a condition variable that cannot miss a
    /// notification.
    ///
    /// [`wait_with_external_wake`]: #method.wait_with_external_wake
    pub fn wait_guarded<T>(
        &self,
        events: &mut Events,
        guard: &mut MutexGuard<'_, T>,
        awakener: &Awakener,
        timeout: Option<Duration>,
    ) -> Result<bool> {
        MutexGuard::unlocked(guard, || {
            self.wait_with_external_wake(events, awakener, timeout)
        })
    }

    fn wait_inner(
        &self,
        events: &mut Events,
        mut timeout: Option<Duration>,
        deadline: Option<Instant>,
    ) -> Result<usize> {
        events.batch.clear();

        loop {
            trace!("selector {}: wait timeout={:?}", self.selector.id(), timeout);

            match self.selector.select(&mut events.inner, timeout) {
                Ok(cnt) if cnt > 0 => break,
                Ok(_) => {}
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(Error::sys("epoll_wait", e)),
            }

            // Woken early by a signal or timer slack; wait out the rest.
            timeout = match (timeout, deadline) {
                (Some(_), Some(deadline)) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(0);
                    }
                    Some(deadline - now)
                }
                (Some(_), None) => return Ok(0),
                (None, _) => None,
            };
        }

        let registry = self.registry.lock();
        for i in 0..events.inner.len() {
            if let Some((fd, observed)) = events.inner.get(i) {
                let requested = registry.get(&fd).copied().unwrap_or_else(Ready::empty);
                events.batch.push(Event::new(fd, requested, observed));
            }
        }

        Ok(events.batch.len())
    }
}

fn ctl_error(fd: RawFd, err: io::Error) -> Error {
    match err.raw_os_error() {
        Some(libc::EBADF) | Some(libc::EPERM) => Error::InvalidDescriptor(fd),
        _ => Error::sys("epoll_ctl", err),
    }
}

impl fmt::Debug for Poll {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("Poll")
            .field("selector", &self.selector.id())
            .field("registered", &self.registry.lock().len())
            .finish()
    }
}

impl AsRawFd for Poll {
    fn as_raw_fd(&self) -> RawFd {
        self.selector.as_raw_fd()
    }
}

impl Events {
    /// Return a new `Events` capable of holding up to `capacity` events.
    ///
    /// A zero capacity is raised to one.
    pub fn with_capacity(capacity: usize) -> Events {
        let capacity = capacity.max(1);
        Events {
            inner: linux::epoll::Events::with_capacity(capacity),
            batch: Vec::with_capacity(capacity),
        }
    }

    /// Returns the number of events the batch can hold.
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    /// Returns the number of events in the batch.
    pub fn len(&self) -> usize {
        self.batch.len()
    }

    /// Returns true if the last wait produced no events.
    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    /// Returns the event at `idx`.
    pub fn get(&self, idx: usize) -> Option<Event> {
        self.batch.get(idx).copied()
    }

    /// Returns an iterator over the events of the last wait.
    pub fn iter(&self) -> Iter<'_> {
        self.batch.iter()
    }

    /// Clears all `Event` values from the batch.
    pub fn clear(&mut self) {
        self.batch.clear();
    }
}

impl Default for Events {
    fn default() -> Events {
        Events::with_capacity(DEFAULT_CAPACITY)
    }
}

impl<'a> IntoIterator for &'a Events {
    type Item = &'a Event;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Debug for Events {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_list().entries(self.batch.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::net::UnixStream;

    #[test]
    fn register_is_idempotent() {
        let poll = Poll::new().unwrap();
        let (rx, _tx) = UnixStream::pair().unwrap();

        poll.register(rx.as_raw_fd(), Ready::readable()).unwrap();
        poll.register(rx.as_raw_fd(), Ready::readable()).unwrap();
        poll.register(rx.as_raw_fd(), Ready::readable() | Ready::writable())
            .unwrap();

        assert_eq!(
            poll.interest(rx.as_raw_fd()),
            Some(Ready::readable() | Ready::writable())
        );
    }

    #[test]
    fn unregister_unknown_is_noop() {
        let poll = Poll::new().unwrap();
        poll.unregister(12345).unwrap();
        poll.unregister(-1).unwrap();
    }

    #[test]
    fn zero_timeout_polls() {
        let poll = Poll::new().unwrap();
        let mut events = Events::with_capacity(4);
        let (rx, _tx) = UnixStream::pair().unwrap();
        poll.register(rx.as_raw_fd(), Ready::readable()).unwrap();

        let start = Instant::now();
        let n = poll.wait(&mut events, Some(Duration::from_millis(0))).unwrap();
        assert_eq!(n, 0);
        assert!(events.is_empty());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn event_carries_requested_interest() {
        let poll = Poll::new().unwrap();
        let mut events = Events::with_capacity(4);
        let (rx, mut tx) = UnixStream::pair().unwrap();
        poll.register(rx.as_raw_fd(), Ready::readable()).unwrap();
        tx.write_all(&[0]).unwrap();

        poll.wait(&mut events, Some(Duration::from_secs(1))).unwrap();
        let event = events.get(0).unwrap();
        assert_eq!(event.interest(), Ready::readable());
        assert!(event.readiness().is_readable());
    }

    #[test]
    fn awakener_on_stale_entry_is_watched() {
        let poll = Poll::new().unwrap();
        let mut events = Events::with_capacity(4);
        let awakener = Awakener::new().unwrap();

        // left behind by a dropped awakener with the same descriptor number
        poll.registry.lock().insert(awakener.fd(), Ready::readable());
        awakener.wakeup().unwrap();

        let start = Instant::now();
        let woken = poll
            .wait_with_external_wake(&mut events, &awakener, Some(Duration::from_secs(5)))
            .unwrap();
        assert!(woken);
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn register_over_stale_entry() {
        let poll = Poll::new().unwrap();
        let mut events = Events::with_capacity(4);
        let (rx, mut tx) = UnixStream::pair().unwrap();
        poll.registry.lock().insert(rx.as_raw_fd(), Ready::writable());

        poll.register(rx.as_raw_fd(), Ready::readable()).unwrap();
        assert_eq!(poll.interest(rx.as_raw_fd()), Some(Ready::readable()));

        tx.write_all(&[0]).unwrap();
        assert_eq!(poll.wait(&mut events, Some(Duration::from_secs(1))).unwrap(), 1);
        assert_eq!(events.get(0).unwrap().fd(), rx.as_raw_fd());
    }

    #[test]
    fn level_triggered_until_drained() {
        let poll = Poll::new().unwrap();
        let mut events = Events::with_capacity(4);
        let (rx, mut tx) = UnixStream::pair().unwrap();
        poll.register(rx.as_raw_fd(), Ready::readable()).unwrap();
        tx.write_all(b"abc").unwrap();

        for _ in 0..3 {
            let n = poll.wait(&mut events, Some(Duration::from_secs(1))).unwrap();
            assert_eq!(n, 1);
        }
    }
}
