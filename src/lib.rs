//! # Interface address monitor over epoll and rtnetlink
//!
//! A small readiness multiplexer (`driver`) built on `epoll`, a decoder for
//! the rtnetlink address notifications the kernel multicasts (`netlink`),
//! and a monitor that joins the two and reports every IPv4 address that is
//! added to or removed from an interface (`monitor`).
//!
//! # Examples
//! __Print address changes__
//! ```rust,no_run
//! use netlink_poller::{AddressChange, IfaddrMonitor};
//!
//! fn main() -> Result<(), netlink_poller::Error> {
//!     let mut monitor = IfaddrMonitor::builder().dump_on_start(true).build()?;
//!     let handle = monitor.handle();
//!
//!     // stop from another thread with `handle.shutdown()`
//!     # handle.shutdown()?;
//!     monitor.run(&mut |change: AddressChange| println!("{}", change))
//! }
//! ```
//! __Wait on a descriptor__
//! ```rust,no_run
//! use netlink_poller::{Events, Poll, Ready};
//! use std::os::unix::io::AsRawFd;
//! use std::time::Duration;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error + 'static>> {
//!     let poll = Poll::new()?;
//!     let mut events = Events::with_capacity(16);
//!     let stdin = std::io::stdin();
//!
//!     poll.register(stdin.as_raw_fd(), Ready::readable())?;
//!     poll.wait(&mut events, Some(Duration::from_secs(5)))?;
//!     for event in &events {
//!         println!("{}", event);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(rust_2018_idioms, unreachable_pub, missing_debug_implementations)]
#![allow(
    clippy::new_without_default,
    clippy::needless_doctest_main,
    clippy::len_without_is_empty
)]

pub mod driver;
mod error;
pub mod monitor;
pub mod netlink;

#[doc(inline)]
pub use crate::driver::{Awakener, Event, Events, Poll, Ready, UnixReady};
pub use crate::error::{Error, Result};
#[doc(inline)]
pub use crate::monitor::{
    AddressChange, AddressSink, Builder, ChangeKind, Handle, IfaddrMonitor, MonitorConfig,
    MonitorState, MonitorStats,
};
