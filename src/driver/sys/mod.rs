//! Linux system api.
//!
//! # Features
//!
//! * Level-triggered I/O readiness queue backed by epoll
//! * Cross-thread wakeups that cannot be lost
//! * No allocation per wait once the event batch is sized
//!
//! # Usage
//!
//! Create a [`Poll`], register descriptors with it, and let it fill an
//! [`Events`] batch on every wait. An [`Awakener`] shared with other threads
//! interrupts a wait before its timeout.
//!
//! [`Poll`]: struct.Poll.html
//! [`Events`]: struct.Events.html
//! [`Awakener`]: struct.Awakener.html

pub mod event;

mod linux;
mod poll;

pub use self::linux::{Awakener, UnixReady};
pub use self::poll::{Events, Iter, Poll};

pub(crate) use self::linux::{cvt, Io};
