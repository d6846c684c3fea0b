use crate::error::{Error, Result};
use crate::netlink::{message, DEFAULT_BUFFER_LEN, RTMGRP_IPV4_IFADDR};

use super::IfaddrMonitor;

/// Default number of readiness events one wait can return.
pub const DEFAULT_EVENTS_CAPACITY: usize = 16;

/// Settings of an [`IfaddrMonitor`].
///
/// [`IfaddrMonitor`]: struct.IfaddrMonitor.html
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Multicast groups to subscribe to (`RTMGRP_*` bits).
    pub groups: u32,
    /// Size of the reusable receive buffer.
    pub recv_buffer_len: usize,
    /// Kernel socket queue size (`SO_RCVBUF`); the system default if unset.
    pub socket_recv_buffer: Option<usize>,
    /// Capacity of the readiness event batch.
    pub events_capacity: usize,
    /// Ask the kernel not to report queue overruns (`NETLINK_NO_ENOBUFS`).
    pub no_enobufs: bool,
    /// Request a dump of the existing addresses once the socket is bound.
    pub dump_on_start: bool,
}

impl Default for MonitorConfig {
    fn default() -> MonitorConfig {
        MonitorConfig {
            groups: RTMGRP_IPV4_IFADDR,
            recv_buffer_len: DEFAULT_BUFFER_LEN,
            socket_recv_buffer: None,
            events_capacity: DEFAULT_EVENTS_CAPACITY,
            no_enobufs: false,
            dump_on_start: false,
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.groups == 0 {
            return Err(Error::Config("no multicast group selected".into()));
        }
        if self.recv_buffer_len < message::HEADER_LEN {
            return Err(Error::Config(format!(
                "receive buffer of {} bytes cannot hold a message header",
                self.recv_buffer_len
            )));
        }
        if self.events_capacity == 0 {
            return Err(Error::Config("events capacity must be positive".into()));
        }
        Ok(())
    }
}

/// Builds an [`IfaddrMonitor`].
///
/// # Examples
///
/// ```no_run
/// use netlink_poller::IfaddrMonitor;
/// use netlink_poller::netlink::{RTMGRP_IPV4_IFADDR, RTMGRP_IPV6_IFADDR};
///
/// let monitor = IfaddrMonitor::builder()
///     .groups(RTMGRP_IPV4_IFADDR | RTMGRP_IPV6_IFADDR)
///     .socket_recv_buffer(1 << 20)
///     .dump_on_start(true)
///     .build()?;
/// # Ok::<(), netlink_poller::Error>(())
/// ```
///
/// [`IfaddrMonitor`]: struct.IfaddrMonitor.html
#[derive(Clone, Debug, Default)]
pub struct Builder {
    config: MonitorConfig,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    pub fn groups(mut self, groups: u32) -> Builder {
        self.config.groups = groups;
        self
    }

    pub fn recv_buffer_len(mut self, len: usize) -> Builder {
        self.config.recv_buffer_len = len;
        self
    }

    pub fn socket_recv_buffer(mut self, size: usize) -> Builder {
        self.config.socket_recv_buffer = Some(size);
        self
    }

    pub fn events_capacity(mut self, capacity: usize) -> Builder {
        self.config.events_capacity = capacity;
        self
    }

    pub fn no_enobufs(mut self, enable: bool) -> Builder {
        self.config.no_enobufs = enable;
        self
    }

    pub fn dump_on_start(mut self, enable: bool) -> Builder {
        self.config.dump_on_start = enable;
        self
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Validates the settings, opens the socket and registers it.
    pub fn build(self) -> Result<IfaddrMonitor> {
        self.config.validate()?;
        IfaddrMonitor::with_config(self.config)
    }
}

impl From<MonitorConfig> for Builder {
    fn from(config: MonitorConfig) -> Builder {
        Builder { config }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = MonitorConfig::default();
        assert_eq!(config.groups, RTMGRP_IPV4_IFADDR);
        assert_eq!(config.recv_buffer_len, 64 * 1024);
        config.validate().unwrap();
    }

    #[test]
    fn builder_sets_fields() {
        let builder = Builder::new()
            .groups(0x110)
            .recv_buffer_len(4096)
            .socket_recv_buffer(1 << 20)
            .events_capacity(4)
            .no_enobufs(true)
            .dump_on_start(true);
        let config = builder.config();
        assert_eq!(config.groups, 0x110);
        assert_eq!(config.recv_buffer_len, 4096);
        assert_eq!(config.socket_recv_buffer, Some(1 << 20));
        assert_eq!(config.events_capacity, 4);
        assert!(config.no_enobufs);
        assert!(config.dump_on_start);
    }

    #[test]
    fn rejects_tiny_buffer() {
        let err = Builder::new().recv_buffer_len(8).build().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn rejects_zero_capacity_and_groups() {
        let config = MonitorConfig {
            events_capacity: 0,
            ..MonitorConfig::default()
        };
        assert!(config.validate().is_err());

        let config = MonitorConfig {
            groups: 0,
            ..MonitorConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
