//! rtnetlink notification channel and its wire decoders.
//!
//! Messages and attributes are decoded straight out of the receive buffer:
//! every header field is read at a fixed offset after the remaining length
//! has been checked, and every payload is a sub-slice of the input. A length
//! declared by the kernel is never trusted to stay inside the buffer.

pub mod attr;
pub mod ifaddr;
pub mod message;
mod socket;

pub use self::attr::{Attribute, AttributeHeader, Attributes};
pub use self::ifaddr::{IfaddrAttribute, IfaddrMessage};
pub use self::message::{Message, MessageHeader, Messages};
pub use self::socket::{NetlinkSocket, DEFAULT_BUFFER_LEN};

/// Alignment of netlink messages.
pub const NLMSG_ALIGNTO: usize = 4;
/// Alignment of route attributes.
pub const RTA_ALIGNTO: usize = 4;

/// Nothing, ignore.
pub const NLMSG_NOOP: u16 = 1;
/// Error report or acknowledgement; the payload starts with an errno.
pub const NLMSG_ERROR: u16 = 2;
/// End of a multipart dump.
pub const NLMSG_DONE: u16 = 3;
/// Data was lost.
pub const NLMSG_OVERRUN: u16 = 4;

/// The message is a request.
pub const NLM_F_REQUEST: u16 = 0x01;
/// Part of a multipart reply ended by `NLMSG_DONE`.
pub const NLM_F_MULTI: u16 = 0x02;
/// Ask for an acknowledgement.
pub const NLM_F_ACK: u16 = 0x04;
/// Return the whole table instead of one entry.
pub const NLM_F_ROOT: u16 = 0x100;
/// Return every entry that matches the request.
pub const NLM_F_MATCH: u16 = 0x200;
/// A full dump: `NLM_F_ROOT | NLM_F_MATCH`.
pub const NLM_F_DUMP: u16 = NLM_F_ROOT | NLM_F_MATCH;

pub const RTM_NEWADDR: u16 = 20;
pub const RTM_DELADDR: u16 = 21;
pub const RTM_GETADDR: u16 = 22;

/// Multicast group bit for IPv4 address changes.
pub const RTMGRP_IPV4_IFADDR: u32 = 0x10;
/// Multicast group bit for IPv6 address changes.
pub const RTMGRP_IPV6_IFADDR: u32 = 0x100;

/// Rounds `len` up to the next multiple of `stride`, a power of two.
///
/// Saturates instead of overflowing so that a hostile length can only push
/// the cursor past the end of the buffer.
#[inline]
pub fn align_to(len: usize, stride: usize) -> usize {
    debug_assert!(stride.is_power_of_two());
    len.saturating_add(stride - 1) & !(stride - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align() {
        assert_eq!(align_to(0, 4), 0);
        assert_eq!(align_to(1, 4), 4);
        assert_eq!(align_to(4, 4), 4);
        assert_eq!(align_to(21, 4), 24);
        assert_eq!(align_to(21, 8), 24);
        assert_eq!(align_to(25, 8), 32);
        assert_eq!(align_to(5, 1), 5);
    }

    #[test]
    fn align_saturates() {
        assert!(align_to(usize::MAX, 4) >= usize::MAX - 3);
    }
}
