//! Netlink message framing.

use std::iter::FusedIterator;

use byteorder::{ByteOrder, NativeEndian};

use super::{align_to, NLMSG_ALIGNTO, NLMSG_DONE, NLMSG_ERROR};
use crate::error::{Error, Result};

/// Size of `struct nlmsghdr`.
pub const HEADER_LEN: usize = 16;

/// Fixed header in front of every netlink message.
///
/// Fields are in host byte order, as the kernel writes them on a local
/// socket.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MessageHeader {
    /// Length of the message including this header.
    pub length: u32,
    pub message_type: u16,
    pub flags: u16,
    pub sequence: u32,
    /// Port id of the sender; zero for the kernel.
    pub port: u32,
}

impl MessageHeader {
    /// Reads a header from the start of `buf`.
    ///
    /// Returns `None` if `buf` is shorter than a header.
    pub fn parse(buf: &[u8]) -> Option<MessageHeader> {
        if buf.len() < HEADER_LEN {
            return None;
        }

        Some(MessageHeader {
            length: NativeEndian::read_u32(&buf[0..4]),
            message_type: NativeEndian::read_u16(&buf[4..6]),
            flags: NativeEndian::read_u16(&buf[6..8]),
            sequence: NativeEndian::read_u32(&buf[8..12]),
            port: NativeEndian::read_u32(&buf[12..16]),
        })
    }

    /// Encodes the header in wire format.
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        NativeEndian::write_u32(&mut buf[0..4], self.length);
        NativeEndian::write_u16(&mut buf[4..6], self.message_type);
        NativeEndian::write_u16(&mut buf[6..8], self.flags);
        NativeEndian::write_u32(&mut buf[8..12], self.sequence);
        NativeEndian::write_u32(&mut buf[12..16], self.port);
        buf
    }
}

/// One framed message borrowed from a receive buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Message<'a> {
    header: MessageHeader,
    payload: &'a [u8],
}

impl<'a> Message<'a> {
    pub fn header(&self) -> &MessageHeader {
        &self.header
    }

    pub fn message_type(&self) -> u16 {
        self.header.message_type
    }

    /// The `length - HEADER_LEN` bytes following the header.
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// The signed error code carried by an `NLMSG_ERROR` message.
    ///
    /// Zero is an acknowledgement, negative values are `-errno`.
    pub fn error_code(&self) -> Option<i32> {
        if self.header.message_type != NLMSG_ERROR || self.payload.len() < 4 {
            return None;
        }
        Some(NativeEndian::read_i32(&self.payload[0..4]))
    }
}

/// Iterator over the messages packed into one receive buffer.
///
/// Yields messages until the buffer is exhausted, a truncated trailing
/// header is reached, or an `NLMSG_DONE` marker is read. A header whose
/// declared length is impossible produces a single `MalformedMessage` error
/// and ends the iteration; messages yielded before it stay valid.
///
/// # Examples
///
/// ```
/// use netlink_poller::netlink::Messages;
///
/// assert_eq!(Messages::new(&[]).count(), 0);
/// ```
#[derive(Clone, Debug)]
pub struct Messages<'a> {
    buf: &'a [u8],
    offset: usize,
    alignment: usize,
    done: bool,
}

impl<'a> Messages<'a> {
    /// Frames `buf` with the kernel's 4 byte message alignment.
    pub fn new(buf: &'a [u8]) -> Messages<'a> {
        Messages::with_alignment(buf, NLMSG_ALIGNTO)
    }

    /// Frames `buf`, starting each message on a multiple of `alignment`.
    ///
    /// `alignment` must be a power of two.
    pub fn with_alignment(buf: &'a [u8], alignment: usize) -> Messages<'a> {
        debug_assert!(alignment.is_power_of_two());
        Messages {
            buf,
            offset: 0,
            alignment,
            done: false,
        }
    }

    /// Byte offset of the next message within the buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    fn finish(&mut self) {
        self.done = true;
        self.offset = self.buf.len();
    }
}

impl<'a> Iterator for Messages<'a> {
    type Item = Result<Message<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let rest = &self.buf[self.offset..];
        let header = match MessageHeader::parse(rest) {
            Some(header) => header,
            None => {
                self.finish();
                return None;
            }
        };

        let length = header.length as usize;
        if length < HEADER_LEN || length > rest.len() {
            let offset = self.offset;
            self.finish();
            return Some(Err(Error::MalformedMessage {
                offset,
                length: header.length,
                available: rest.len(),
            }));
        }

        if header.message_type == NLMSG_DONE {
            self.finish();
            return None;
        }

        let payload = &rest[HEADER_LEN..length];
        let advance = align_to(length, self.alignment);
        if advance >= rest.len() {
            self.finish();
        } else {
            self.offset += advance;
        }

        Some(Ok(Message { header, payload }))
    }
}

impl<'a> FusedIterator for Messages<'a> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(message_type: u16, payload: &[u8]) -> Vec<u8> {
        let header = MessageHeader {
            length: (HEADER_LEN + payload.len()) as u32,
            message_type,
            flags: 0,
            sequence: 7,
            port: 0,
        };
        let mut buf = header.to_bytes().to_vec();
        buf.extend_from_slice(payload);
        buf.resize(align_to(buf.len(), NLMSG_ALIGNTO), 0);
        buf
    }

    #[test]
    fn header_round_trips_at_fixed_offsets() {
        let header = MessageHeader {
            length: 0x0102_0304,
            message_type: 20,
            flags: 0x0300,
            sequence: 42,
            port: 99,
        };
        let bytes = header.to_bytes();
        assert_eq!(NativeEndian::read_u16(&bytes[4..6]), 20);
        assert_eq!(MessageHeader::parse(&bytes), Some(header));
        assert_eq!(MessageHeader::parse(&bytes[..15]), None);
    }

    #[test]
    fn empty_buffer_is_empty_sequence() {
        let mut messages = Messages::new(&[]);
        assert!(messages.next().is_none());
        assert!(messages.next().is_none());
    }

    #[test]
    fn truncated_trailing_header_ends_quietly() {
        let mut buf = message(20, &[1, 2, 3, 4]);
        buf.extend_from_slice(&[0u8; 10]);
        let items: Vec<_> = Messages::new(&buf).collect();
        assert_eq!(items.len(), 1);
        assert!(items[0].is_ok());
    }

    #[test]
    fn done_marker_stops_iteration() {
        let mut buf = message(20, &[0; 8]);
        buf.extend(message(NLMSG_DONE, &[0; 4]));
        buf.extend(message(21, &[0; 8]));
        let types: Vec<u16> = Messages::new(&buf)
            .map(|m| m.unwrap().message_type())
            .collect();
        assert_eq!(types, vec![20]);
    }

    #[test]
    fn length_shorter_than_header_is_malformed() {
        let mut buf = message(20, &[]);
        NativeEndian::write_u32(&mut buf[0..4], 8);
        let mut messages = Messages::new(&buf);
        match messages.next() {
            Some(Err(Error::MalformedMessage { offset, length, .. })) => {
                assert_eq!(offset, 0);
                assert_eq!(length, 8);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(messages.next().is_none());
    }

    #[test]
    fn unpadded_final_message_is_accepted() {
        // 16 byte header + 5 byte payload, no padding after it
        let header = MessageHeader {
            length: 21,
            message_type: 20,
            ..MessageHeader::default()
        };
        let mut buf = header.to_bytes().to_vec();
        buf.extend_from_slice(b"hello");
        let items: Vec<_> = Messages::new(&buf).collect();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap().payload(), b"hello");
    }

    #[test]
    fn error_code() {
        let buf = message(NLMSG_ERROR, &(-(libc::EPERM)).to_ne_bytes());
        let msg = Messages::new(&buf).next().unwrap().unwrap();
        assert_eq!(msg.error_code(), Some(-libc::EPERM));

        let buf = message(20, &[0; 4]);
        let msg = Messages::new(&buf).next().unwrap().unwrap();
        assert_eq!(msg.error_code(), None);
    }

    #[test]
    fn wider_alignment() {
        let mut buf = Vec::new();
        for _ in 0..3 {
            let header = MessageHeader {
                length: 18,
                message_type: 20,
                ..MessageHeader::default()
            };
            buf.extend_from_slice(&header.to_bytes());
            buf.extend_from_slice(&[0xaa, 0xbb]);
            buf.resize(align_to(buf.len(), 8), 0);
        }
        let payloads: Vec<_> = Messages::with_alignment(&buf, 8)
            .map(|m| m.unwrap().payload().to_vec())
            .collect();
        assert_eq!(payloads, vec![vec![0xaa, 0xbb]; 3]);
    }
}
