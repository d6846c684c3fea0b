//! Error types for the poller and the netlink decoder

use std::io;
use std::os::unix::io::RawFd;

use thiserror::Error;

/// Errors raised by the multiplexer, the netlink channel and the decoders.
///
/// `SystemCall` and `InvalidDescriptor` are fatal to the call that produced
/// them. `MalformedMessage` and `MalformedAttribute` are decode faults: they
/// end decoding of the current buffer but leave the caller usable.
#[derive(Debug, Error)]
pub enum Error {
    /// A system call failed; `source` carries the errno.
    #[error("{call} failed: {source}")]
    SystemCall {
        call: &'static str,
        #[source]
        source: io::Error,
    },

    /// The descriptor is closed, negative or cannot be polled.
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(RawFd),

    /// A message header declared a length shorter than the header or
    /// longer than the bytes left in the buffer.
    #[error("malformed netlink message at offset {offset}: length {length}, {available} bytes available")]
    MalformedMessage {
        offset: usize,
        length: u32,
        available: usize,
    },

    /// An attribute header declared an impossible length.
    #[error("malformed netlink attribute at offset {offset}: length {length}, {available} bytes available")]
    MalformedAttribute {
        offset: usize,
        length: u16,
        available: usize,
    },

    /// Monitor settings that cannot work.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn sys(call: &'static str, source: io::Error) -> Error {
        Error::SystemCall { call, source }
    }

    /// Returns true for buffer decode faults, which are recoverable.
    pub fn is_decode_fault(&self) -> bool {
        match self {
            Error::MalformedMessage { .. } | Error::MalformedAttribute { .. } => true,
            _ => false,
        }
    }

    /// The errno behind a `SystemCall` failure.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Error::SystemCall { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}

/// Result type for poller and netlink operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::MalformedMessage {
            offset: 32,
            length: 4096,
            available: 20,
        };
        assert_eq!(
            err.to_string(),
            "malformed netlink message at offset 32: length 4096, 20 bytes available"
        );
        assert!(err.is_decode_fault());
    }

    #[test]
    fn test_system_call_errno() {
        let err = Error::sys("epoll_ctl", io::Error::from_raw_os_error(libc::EBADF));
        assert_eq!(err.raw_os_error(), Some(libc::EBADF));
        assert!(!err.is_decode_fault());
        assert!(err.to_string().starts_with("epoll_ctl failed"));
    }

    #[test]
    fn test_invalid_descriptor() {
        let err = Error::InvalidDescriptor(-1);
        assert_eq!(err.to_string(), "invalid descriptor: -1");
        assert_eq!(err.raw_os_error(), None);
    }
}
