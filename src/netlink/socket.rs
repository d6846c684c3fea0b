use std::io::{self, Read};
use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};
use std::{fmt, mem};

use libc::{c_int, c_void, sockaddr, sockaddr_nl, socklen_t};
use log::{debug, trace, warn};

use super::ifaddr::{IfaddrMessage, IFADDR_MESSAGE_LEN};
use super::message::{MessageHeader, HEADER_LEN};
use super::{NLM_F_DUMP, NLM_F_REQUEST, RTM_GETADDR};
use crate::driver::sys::{cvt, Io};
use crate::error::{Error, Result};

/// Default size of the receive buffer.
pub const DEFAULT_BUFFER_LEN: usize = 64 * 1024;

/// Non-blocking `NETLINK_ROUTE` socket subscribed to multicast groups.
///
/// Owns the receive buffer that every [`recv`] reuses. The slice handed out
/// by `recv` borrows that buffer, so it has to be dropped before the next
/// receive.
///
/// [`recv`]: #method.recv
pub struct NetlinkSocket {
    io: Io,
    buffer: Vec<u8>,
    groups: u32,
    port: u32,
    sequence: u32,
}

impl NetlinkSocket {
    /// Opens a socket and subscribes it to the `groups` bitmask
    /// (`RTMGRP_*`).
    pub fn bind(groups: u32) -> Result<NetlinkSocket> {
        NetlinkSocket::with_buffer_len(groups, DEFAULT_BUFFER_LEN)
    }

    /// Like [`bind`], with a receive buffer of `len` bytes.
    ///
    /// [`bind`]: #method.bind
    pub fn with_buffer_len(groups: u32, len: usize) -> Result<NetlinkSocket> {
        let io = unsafe {
            let fd = cvt(libc::socket(
                libc::AF_NETLINK,
                libc::SOCK_RAW | libc::SOCK_CLOEXEC | libc::SOCK_NONBLOCK,
                libc::NETLINK_ROUTE,
            ))
            .map_err(|e| Error::sys("socket", e))?;
            Io::from_raw_fd(fd)
        };

        let mut addr = netlink_addr();
        addr.nl_groups = groups;
        unsafe {
            cvt(libc::bind(
                io.as_raw_fd(),
                &addr as *const sockaddr_nl as *const sockaddr,
                mem::size_of::<sockaddr_nl>() as socklen_t,
            ))
            .map_err(|e| Error::sys("bind", e))?;
        }

        let port = local_port(io.as_raw_fd()).map_err(|e| Error::sys("getsockname", e))?;
        debug!("netlink socket bound: port={} groups={:#x}", port, groups);

        Ok(NetlinkSocket {
            io,
            buffer: vec![0u8; len],
            groups,
            port,
            sequence: 0,
        })
    }

    /// Sets `SO_RCVBUF` so bursts of notifications fit in the kernel queue.
    pub fn set_recv_buffer_size(&self, size: usize) -> Result<()> {
        let size = size.min(c_int::max_value() as usize) as c_int;
        self.setsockopt(libc::SOL_SOCKET, libc::SO_RCVBUF, size)
            .map_err(|e| Error::sys("setsockopt(SO_RCVBUF)", e))
    }

    /// Sets `NETLINK_NO_ENOBUFS`: the kernel stops reporting queue
    /// overruns as `ENOBUFS` on the next receive.
    pub fn set_no_enobufs(&self, enable: bool) -> Result<()> {
        self.setsockopt(libc::SOL_NETLINK, libc::NETLINK_NO_ENOBUFS, enable as c_int)
            .map_err(|e| Error::sys("setsockopt(NETLINK_NO_ENOBUFS)", e))
    }

    /// Reads one datagram into the receive buffer.
    ///
    /// Returns `Ok(None)` when nothing is queued. A datagram may hold any
    /// number of complete messages, and one larger than the buffer arrives
    /// truncated; the framer treats the cut-off tail as the end of the
    /// stream.
    pub fn recv(&mut self) -> Result<Option<&[u8]>> {
        let n = loop {
            match (&self.io).read(&mut self.buffer) {
                Ok(n) => break n,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                Err(e) => return Err(Error::sys("recv", e)),
            }
        };

        trace!("netlink port={} received {} bytes", self.port, n);
        if n == self.buffer.len() {
            warn!(
                "netlink datagram filled the {} byte receive buffer and may be truncated",
                n
            );
        }
        Ok(Some(&self.buffer[..n]))
    }

    /// Asks the kernel for every address of `family` (`AF_INET`, `AF_INET6`
    /// or `AF_UNSPEC`).
    ///
    /// The replies are `RTM_NEWADDR` messages carrying the returned
    /// sequence number and end with `NLMSG_DONE`.
    pub fn request_dump(&mut self, family: u8) -> Result<u32> {
        self.sequence = self.sequence.wrapping_add(1);

        let header = MessageHeader {
            length: (HEADER_LEN + IFADDR_MESSAGE_LEN) as u32,
            message_type: RTM_GETADDR,
            flags: NLM_F_REQUEST | NLM_F_DUMP,
            sequence: self.sequence,
            port: self.port,
        };
        let body = IfaddrMessage {
            family,
            ..IfaddrMessage::default()
        };

        let mut request = [0u8; HEADER_LEN + IFADDR_MESSAGE_LEN];
        request[..HEADER_LEN].copy_from_slice(&header.to_bytes());
        request[HEADER_LEN..].copy_from_slice(&body.to_bytes());

        let kernel = netlink_addr();
        loop {
            let rc = unsafe {
                libc::sendto(
                    self.io.as_raw_fd(),
                    request.as_ptr() as *const c_void,
                    request.len(),
                    0,
                    &kernel as *const sockaddr_nl as *const sockaddr,
                    mem::size_of::<sockaddr_nl>() as socklen_t,
                )
            };
            match cvt(rc) {
                Ok(_) => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(Error::sys("sendto", e)),
            }
        }

        debug!("requested address dump: family={} seq={}", family, self.sequence);
        Ok(self.sequence)
    }

    /// The multicast groups this socket is subscribed to.
    pub fn groups(&self) -> u32 {
        self.groups
    }

    /// The port id the kernel assigned to this socket.
    pub fn port(&self) -> u32 {
        self.port
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    fn setsockopt(&self, level: c_int, name: c_int, value: c_int) -> io::Result<()> {
        unsafe {
            cvt(libc::setsockopt(
                self.io.as_raw_fd(),
                level,
                name,
                &value as *const c_int as *const c_void,
                mem::size_of::<c_int>() as socklen_t,
            ))?;
        }
        Ok(())
    }
}

fn netlink_addr() -> sockaddr_nl {
    let mut addr: sockaddr_nl = unsafe { mem::zeroed() };
    addr.nl_family = libc::AF_NETLINK as libc::sa_family_t;
    addr
}

fn local_port(fd: RawFd) -> io::Result<u32> {
    let mut addr = netlink_addr();
    let mut len = mem::size_of::<sockaddr_nl>() as socklen_t;
    unsafe {
        cvt(libc::getsockname(
            fd,
            &mut addr as *mut sockaddr_nl as *mut sockaddr,
            &mut len,
        ))?;
    }
    Ok(addr.nl_pid)
}

impl AsRawFd for NetlinkSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.io.as_raw_fd()
    }
}

impl fmt::Debug for NetlinkSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetlinkSocket")
            .field("fd", &self.io.as_raw_fd())
            .field("groups", &self.groups)
            .field("port", &self.port)
            .field("buffer_len", &self.buffer.len())
            .finish()
    }
}
