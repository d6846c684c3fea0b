//! Readiness driver: the epoll multiplexer and its wake primitive.

pub mod sys;

#[doc(inline)]
pub use self::sys::event::{Event, Ready};
#[doc(inline)]
pub use self::sys::{Awakener, Events, Poll, UnixReady};
