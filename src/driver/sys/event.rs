//! Readiness event types and Utility

use std::os::unix::io::RawFd;
use std::{fmt, ops};

use super::linux;
use super::UnixReady;

/// A set of readiness event kinds
///
/// `Ready` is a set of operation descriptors indicating which kind of an
/// operation is ready to be performed. For example, `Ready::readable()`
/// indicates that the associated descriptor is ready to perform a `read`
/// operation.
///
/// This struct only carries the readable and writable kinds directly. The
/// hang-up, error and priority kinds live on [`UnixReady`], which converts to
/// and from `Ready`.
///
/// `Ready` values can be combined together using the various bitwise operators.
///
/// # Examples
///
/// ```
/// use netlink_poller::driver::sys::event::Ready;
///
/// let ready = Ready::readable() | Ready::writable();
///
/// assert!(ready.is_readable());
/// assert!(ready.is_writable());
/// ```
///
/// [`UnixReady`]: ../struct.UnixReady.html
#[derive(Copy, PartialEq, Eq, Clone, PartialOrd, Ord, Hash)]
pub struct Ready(usize);

const READABLE: usize = 0b00001;
const WRITABLE: usize = 0b00010;

impl Ready {
    /// Returns the empty `Ready` set.
    ///
    /// # Examples
    ///
    /// ```
    /// use netlink_poller::driver::sys::event::Ready;
    ///
    /// let ready = Ready::empty();
    ///
    /// assert!(!ready.is_readable());
    /// ```
    pub fn empty() -> Ready {
        Ready(0)
    }

    /// Returns a `Ready` representing readable readiness.
    #[inline]
    pub fn readable() -> Ready {
        Ready(READABLE)
    }

    /// Returns a `Ready` representing writable readiness.
    #[inline]
    pub fn writable() -> Ready {
        Ready(WRITABLE)
    }

    /// Returns a `Ready` representing every kind the poller can report,
    /// including the unix specific ones (`hup`, `error`, `priority`).
    ///
    /// # Examples
    ///
    /// ```
    /// use netlink_poller::driver::sys::event::Ready;
    /// use netlink_poller::driver::sys::UnixReady;
    ///
    /// let ready = Ready::all();
    ///
    /// assert!(ready.is_readable());
    /// assert!(ready.is_writable());
    /// assert!(UnixReady::from(ready).is_hup());
    /// ```
    #[inline]
    pub fn all() -> Ready {
        Ready(READABLE | WRITABLE | linux::READY_ALL)
    }

    /// Returns true if `Ready` is the empty set
    #[inline]
    pub fn is_empty(&self) -> bool {
        *self == Ready::empty()
    }

    /// Returns true if the value includes readable readiness
    #[inline]
    pub fn is_readable(&self) -> bool {
        self.contains(Ready::readable())
    }

    /// Returns true if the value includes writable readiness
    #[inline]
    pub fn is_writable(&self) -> bool {
        self.contains(Ready::writable())
    }

    /// Adds all readiness represented by `other` into `self`.
    ///
    /// This is equivalent to `*self = *self | other`.
    #[inline]
    pub fn insert<T: Into<Self>>(&mut self, other: T) {
        let other = other.into();
        self.0 |= other.0;
    }

    /// Removes all options represented by `other` from `self`.
    ///
    /// This is equivalent to `*self = *self & !other`.
    #[inline]
    pub fn remove<T: Into<Self>>(&mut self, other: T) {
        let other = other.into();
        self.0 &= !other.0;
    }

    /// Returns true if `self` is a superset of `other`.
    ///
    /// `other` may represent more than one readiness operations, in which case
    /// the function only returns true if `self` contains all readiness
    /// specified in `other`.
    ///
    /// # Examples
    ///
    /// ```
    /// use netlink_poller::driver::sys::event::Ready;
    ///
    /// let readiness = Ready::readable() | Ready::writable();
    ///
    /// assert!(readiness.contains(Ready::readable()));
    /// assert!(!Ready::readable().contains(readiness));
    /// ```
    #[inline]
    pub fn contains<T: Into<Self>>(&self, other: T) -> bool {
        let other = other.into();
        (*self & other) == other
    }

    #[doc(hidden)]
    #[inline]
    pub fn bits(&self) -> usize {
        self.0
    }
}

impl<T: Into<Ready>> ops::BitOr<T> for Ready {
    type Output = Ready;

    #[inline]
    fn bitor(self, other: T) -> Ready {
        Ready(self.0 | other.into().0)
    }
}

impl<T: Into<Ready>> ops::BitOrAssign<T> for Ready {
    #[inline]
    fn bitor_assign(&mut self, other: T) {
        self.0 |= other.into().0;
    }
}

impl<T: Into<Ready>> ops::BitAnd<T> for Ready {
    type Output = Ready;

    #[inline]
    fn bitand(self, other: T) -> Ready {
        Ready(self.0 & other.into().0)
    }
}

impl<T: Into<Ready>> ops::Sub<T> for Ready {
    type Output = Ready;

    #[inline]
    fn sub(self, other: T) -> Ready {
        Ready(self.0 & !other.into().0)
    }
}

impl fmt::Debug for Ready {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&UnixReady::from(*self), fmt)
    }
}

#[test]
fn test_debug_ready() {
    assert_eq!("(empty)", format!("{:?}", Ready::empty()));
    assert_eq!("Readable", format!("{:?}", Ready::readable()));
    assert_eq!("Writable", format!("{:?}", Ready::writable()));
    assert_eq!(
        "Readable | Writable",
        format!("{:?}", Ready::readable() | Ready::writable())
    );
}

/// A readiness event returned by [`Poll::wait`].
///
/// `Event` pairs the descriptor that became ready with the interest it was
/// registered with and the readiness the kernel observed. Events live in an
/// [`Events`] batch and are only meaningful until the next wait call
/// overwrites that batch.
///
/// # Examples
///
/// ```
/// use netlink_poller::driver::sys::event::{Event, Ready};
///
/// let event = Event::new(3, Ready::readable(), Ready::readable());
///
/// assert_eq!(event.fd(), 3);
/// assert!(event.readiness().is_readable());
/// assert_eq!(event.to_string(), "{fd=3,ev=r---}");
/// ```
///
/// [`Poll::wait`]: ../struct.Poll.html#method.wait
/// [`Events`]: ../struct.Events.html
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Event {
    fd: RawFd,
    requested: Ready,
    observed: Ready,
}

impl Event {
    /// Creates a new `Event` for `fd`.
    pub fn new(fd: RawFd, requested: Ready, observed: Ready) -> Event {
        Event {
            fd,
            requested,
            observed,
        }
    }

    /// Returns the descriptor this event refers to.
    pub fn fd(&self) -> RawFd {
        self.fd
    }

    /// Returns the interest the descriptor was registered with.
    pub fn interest(&self) -> Ready {
        self.requested
    }

    /// Returns the readiness observed by the kernel.
    pub fn readiness(&self) -> Ready {
        self.observed
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ready = UnixReady::from(self.observed);
        let flag = |set: bool, c: char| if set { c } else { '-' };
        write!(
            f,
            "{{fd={},ev={}{}{}{}}}",
            self.fd,
            flag(ready.is_readable(), 'r'),
            flag(ready.is_writable(), 'w'),
            flag(ready.is_hup(), 'c'),
            flag(ready.is_error(), 'e'),
        )
    }
}

/*
 *
 * ===== internal helpers =====
 *
 */

pub(crate) fn ready_as_usize(events: Ready) -> usize {
    events.0
}

pub(crate) fn ready_from_usize(events: usize) -> Ready {
    Ready(events)
}
