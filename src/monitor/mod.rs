//! Interface address monitor.
//!
//! Ties the pieces together: the netlink socket is registered with a
//! [`Poll`], and every time it turns readable one datagram is read, framed
//! and decoded into [`AddressChange`]s for the caller's sink.
//!
//! [`Poll`]: ../driver/sys/struct.Poll.html
//! [`AddressChange`]: struct.AddressChange.html

mod config;
mod sink;

pub use self::config::{Builder, MonitorConfig, DEFAULT_EVENTS_CAPACITY};
pub use self::sink::{AddressChange, AddressSink, ChangeKind};

use std::net::Ipv4Addr;
use std::os::unix::io::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, trace, warn};

use crate::driver::sys::event::Ready;
use crate::driver::sys::{Awakener, Events, Poll};
use crate::error::{Error, Result};
use crate::netlink::{
    IfaddrAttribute, IfaddrMessage, Message, Messages, NetlinkSocket, NLMSG_ERROR, NLMSG_NOOP,
    NLMSG_OVERRUN,
};

/// Where the monitor is in its cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MonitorState {
    /// Waiting on the multiplexer.
    Idle,
    /// Processing one readiness batch.
    Draining,
}

/// Counters kept across drain cycles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MonitorStats {
    /// Datagrams read from the socket.
    pub reads: u64,
    /// Messages framed out of those datagrams.
    pub messages: u64,
    pub added: u64,
    pub removed: u64,
    /// Messages that carried no IPv4 address change.
    pub skipped: u64,
    /// Malformed messages, bodies and attributes.
    pub decode_faults: u64,
    /// Notifications the kernel dropped because the socket queue was full.
    pub overruns: u64,
    /// `NLMSG_ERROR` messages with a non-zero code.
    pub errors: u64,
}

/// Interrupts or stops a monitor from another thread.
#[derive(Clone, Debug)]
pub struct Handle {
    awakener: Arc<Awakener>,
    shutdown: Arc<AtomicBool>,
}

impl Handle {
    /// Ends the monitor's current wait early.
    pub fn wake(&self) -> Result<()> {
        self.awakener
            .wakeup()
            .map_err(|e| Error::sys("write", e))
    }

    /// Makes [`IfaddrMonitor::run`] return after its current cycle.
    ///
    /// [`IfaddrMonitor::run`]: struct.IfaddrMonitor.html#method.run
    pub fn shutdown(&self) -> Result<()> {
        self.shutdown.store(true, Ordering::Release);
        self.wake()
    }
}

/// Watches the kernel for interface address changes.
///
/// # Examples
///
/// ```no_run
/// use netlink_poller::{AddressChange, IfaddrMonitor};
/// use std::time::Duration;
///
/// let mut monitor = IfaddrMonitor::new()?;
/// let mut sink = |change: AddressChange| println!("{}", change);
///
/// loop {
///     monitor.run_once(&mut sink, Some(Duration::from_secs(1)))?;
/// }
/// # Ok::<(), netlink_poller::Error>(())
/// ```
#[derive(Debug)]
pub struct IfaddrMonitor {
    poll: Poll,
    events: Events,
    socket: NetlinkSocket,
    awakener: Arc<Awakener>,
    shutdown: Arc<AtomicBool>,
    state: MonitorState,
    stats: MonitorStats,
}

impl IfaddrMonitor {
    /// Monitors IPv4 address changes with the default settings.
    pub fn new() -> Result<IfaddrMonitor> {
        Builder::new().build()
    }

    pub fn builder() -> Builder {
        Builder::new()
    }

    fn with_config(config: MonitorConfig) -> Result<IfaddrMonitor> {
        let socket = NetlinkSocket::with_buffer_len(config.groups, config.recv_buffer_len)?;
        if let Some(size) = config.socket_recv_buffer {
            socket.set_recv_buffer_size(size)?;
        }
        if config.no_enobufs {
            socket.set_no_enobufs(true)?;
        }

        let poll = Poll::new()?;
        poll.register(socket.as_raw_fd(), Ready::readable())?;

        let awakener = Awakener::new().map_err(|e| Error::sys("pipe2", e))?;

        let mut monitor = IfaddrMonitor {
            poll,
            events: Events::with_capacity(config.events_capacity),
            socket,
            awakener: Arc::new(awakener),
            shutdown: Arc::new(AtomicBool::new(false)),
            state: MonitorState::Idle,
            stats: MonitorStats::default(),
        };

        if config.dump_on_start {
            monitor.request_dump()?;
        }

        Ok(monitor)
    }

    /// Returns a handle that can wake or stop this monitor.
    pub fn handle(&self) -> Handle {
        Handle {
            awakener: self.awakener.clone(),
            shutdown: self.shutdown.clone(),
        }
    }

    /// Asks the kernel to report every existing IPv4 address as added.
    pub fn request_dump(&mut self) -> Result<u32> {
        self.socket.request_dump(libc::AF_INET as u8)
    }

    /// Waits once for the socket to become readable and drains it.
    ///
    /// Returns the number of changes delivered to `sink`, zero when the
    /// timeout elapsed or the wait was interrupted through a [`Handle`].
    ///
    /// [`Handle`]: struct.Handle.html
    pub fn run_once<S>(&mut self, sink: &mut S, timeout: Option<Duration>) -> Result<usize>
    where
        S: AddressSink + ?Sized,
    {
        let woken = self
            .poll
            .wait_with_external_wake(&mut self.events, &self.awakener, timeout)?;
        if woken {
            trace!("monitor woken");
        }

        let fd = self.socket.as_raw_fd();
        let readable = self
            .events
            .iter()
            .any(|event| event.fd() == fd && !event.readiness().is_empty());
        if !readable {
            return Ok(0);
        }

        self.drain(sink)
    }

    /// Runs until [`Handle::shutdown`] is called.
    ///
    /// [`Handle::shutdown`]: struct.Handle.html#method.shutdown
    pub fn run<S>(&mut self, sink: &mut S) -> Result<()>
    where
        S: AddressSink + ?Sized,
    {
        while !self.shutdown.load(Ordering::Acquire) {
            self.run_once(sink, None)?;
        }
        debug!("monitor stopped: {:?}", self.stats);
        Ok(())
    }

    /// Reads one datagram and delivers the changes it holds.
    ///
    /// A single read may return only part of the kernel backlog; the socket
    /// stays readable and the next wait reports it again.
    pub fn drain<S>(&mut self, sink: &mut S) -> Result<usize>
    where
        S: AddressSink + ?Sized,
    {
        self.state = MonitorState::Draining;

        let res = match self.socket.recv() {
            Ok(Some(buf)) => {
                self.stats.reads += 1;
                Ok(decode(buf, sink, &mut self.stats))
            }
            Ok(None) => Ok(0),
            Err(ref e) if e.raw_os_error() == Some(libc::ENOBUFS) => {
                warn!("kernel dropped address notifications: socket queue overrun");
                self.stats.overruns += 1;
                Ok(0)
            }
            Err(e) => Err(e),
        };

        self.state = MonitorState::Idle;
        res
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn stats(&self) -> MonitorStats {
        self.stats
    }

    pub fn socket(&self) -> &NetlinkSocket {
        &self.socket
    }
}

/// Decodes one receive buffer and hands every address change to `sink`.
///
/// Decode faults are logged and counted in `stats`; changes decoded before
/// a fault are still delivered. Returns the number of delivered changes.
pub fn decode<S>(buf: &[u8], sink: &mut S, stats: &mut MonitorStats) -> usize
where
    S: AddressSink + ?Sized,
{
    let mut delivered = 0;

    for item in Messages::new(buf) {
        let message = match item {
            Ok(message) => message,
            Err(e) => {
                warn!("discarding rest of netlink buffer: {}", e);
                stats.decode_faults += 1;
                break;
            }
        };
        stats.messages += 1;

        let kind = match ChangeKind::from_message_type(message.message_type()) {
            Some(kind) => kind,
            None => {
                control_message(&message, stats);
                continue;
            }
        };

        if let Some(change) = address_change(kind, &message, stats) {
            match kind {
                ChangeKind::Added => stats.added += 1,
                ChangeKind::Removed => stats.removed += 1,
            }
            trace!("{}", change);
            sink.on_address_change(change);
            delivered += 1;
        }
    }

    delivered
}

fn control_message(message: &Message<'_>, stats: &mut MonitorStats) {
    match message.message_type() {
        NLMSG_ERROR => match message.error_code() {
            Some(0) => debug!("netlink ack seq={}", message.header().sequence),
            Some(code) => {
                warn!(
                    "netlink error seq={}: {}",
                    message.header().sequence,
                    std::io::Error::from_raw_os_error(-code)
                );
                stats.errors += 1;
            }
            None => {
                warn!("truncated netlink error message");
                stats.decode_faults += 1;
            }
        },
        NLMSG_OVERRUN => {
            warn!("netlink overrun reported");
            stats.overruns += 1;
        }
        NLMSG_NOOP => {}
        other => {
            trace!("skipping netlink message type {}", other);
            stats.skipped += 1;
        }
    }
}

fn address_change(
    kind: ChangeKind,
    message: &Message<'_>,
    stats: &mut MonitorStats,
) -> Option<AddressChange> {
    let payload = message.payload();
    let body = match IfaddrMessage::parse(payload) {
        Some(body) => body,
        None => {
            warn!(
                "address message with {} byte body, need {}",
                payload.len(),
                crate::netlink::ifaddr::IFADDR_MESSAGE_LEN
            );
            stats.decode_faults += 1;
            return None;
        }
    };

    if i32::from(body.family) != libc::AF_INET {
        trace!("skipping address family {}", body.family);
        stats.skipped += 1;
        return None;
    }

    let mut address = None;
    let mut local = None;
    let mut label = None;
    for attr in IfaddrMessage::attributes(payload) {
        let attr = match attr {
            Ok(attr) => attr,
            Err(e) => {
                warn!("truncating attributes of index {}: {}", body.index, e);
                stats.decode_faults += 1;
                break;
            }
        };
        match IfaddrAttribute::from(attr.kind()) {
            IfaddrAttribute::Address => address = ipv4(attr.payload()),
            IfaddrAttribute::LocalAddress => local = ipv4(attr.payload()),
            IfaddrAttribute::InterfaceName => label = interface_name(attr.payload()),
            _ => {}
        }
    }

    match address.or(local) {
        Some(address) => Some(AddressChange {
            kind,
            interface_index: body.index,
            address,
            prefix_len: body.prefix_len,
            label,
        }),
        None => {
            debug!("{} message for index {} without an address", kind, body.index);
            stats.skipped += 1;
            None
        }
    }
}

/// A NUL terminated label; empty labels are dropped.
fn interface_name(payload: &[u8]) -> Option<String> {
    let end = payload.iter().position(|&b| b == 0).unwrap_or(payload.len());
    if end == 0 {
        return None;
    }
    Some(String::from_utf8_lossy(&payload[..end]).into_owned())
}

fn ipv4(payload: &[u8]) -> Option<Ipv4Addr> {
    if payload.len() != 4 {
        return None;
    }
    Some(Ipv4Addr::new(payload[0], payload[1], payload[2], payload[3]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::{MessageHeader, NLMSG_OVERRUN};

    #[test]
    fn ipv4_needs_four_bytes() {
        assert_eq!(ipv4(&[10, 0, 0, 1]), Some(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(ipv4(&[10, 0, 0]), None);
        assert_eq!(ipv4(&[0; 16]), None);
    }

    #[test]
    fn label_stops_at_nul() {
        assert_eq!(interface_name(b"eth0\0\0\0\0"), Some("eth0".to_string()));
        assert_eq!(interface_name(b"lo"), Some("lo".to_string()));
        assert_eq!(interface_name(b"\0"), None);
        assert_eq!(interface_name(b""), None);
    }

    #[test]
    fn overrun_message_is_counted() {
        let header = MessageHeader {
            length: 16,
            message_type: NLMSG_OVERRUN,
            ..MessageHeader::default()
        };
        let mut stats = MonitorStats::default();
        let mut sink = |_: AddressChange| panic!("no change expected");
        assert_eq!(decode(&header.to_bytes(), &mut sink, &mut stats), 0);
        assert_eq!(stats.overruns, 1);
        assert_eq!(stats.messages, 1);
    }
}
