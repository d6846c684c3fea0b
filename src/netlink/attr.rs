//! Route attribute (TLV) decoding.

use std::iter::FusedIterator;

use byteorder::{ByteOrder, NativeEndian};

use super::{align_to, RTA_ALIGNTO};
use crate::error::{Error, Result};

/// Size of `struct rtattr`.
pub const HEADER_LEN: usize = 4;

/// Type-length header in front of every attribute.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AttributeHeader {
    /// Length of the attribute including this header.
    pub length: u16,
    pub kind: u16,
}

impl AttributeHeader {
    pub fn parse(buf: &[u8]) -> Option<AttributeHeader> {
        if buf.len() < HEADER_LEN {
            return None;
        }

        Some(AttributeHeader {
            length: NativeEndian::read_u16(&buf[0..2]),
            kind: NativeEndian::read_u16(&buf[2..4]),
        })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        NativeEndian::write_u16(&mut buf[0..2], self.length);
        NativeEndian::write_u16(&mut buf[2..4], self.kind);
        buf
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Attribute<'a> {
    header: AttributeHeader,
    payload: &'a [u8],
}

impl<'a> Attribute<'a> {
    pub fn kind(&self) -> u16 {
        self.header.kind
    }

    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }
}

/// Iterator over the attributes of one message payload.
///
/// Follows the same rules as [`Messages`] with a 4 byte header and a 16 bit
/// length. A malformed length yields one `MalformedAttribute` error and ends
/// the iteration; the attributes before it stay valid.
///
/// [`Messages`]: ../message/struct.Messages.html
#[derive(Clone, Debug)]
pub struct Attributes<'a> {
    buf: &'a [u8],
    offset: usize,
    alignment: usize,
    done: bool,
}

impl<'a> Attributes<'a> {
    pub fn new(buf: &'a [u8]) -> Attributes<'a> {
        Attributes::with_alignment(buf, RTA_ALIGNTO)
    }

    /// `alignment` must be a power of two.
    pub fn with_alignment(buf: &'a [u8], alignment: usize) -> Attributes<'a> {
        debug_assert!(alignment.is_power_of_two());
        Attributes {
            buf,
            offset: 0,
            alignment,
            done: false,
        }
    }

    /// Returns the payload of the first attribute of type `kind`.
    ///
    /// Stops at the first malformed attribute.
    pub fn find_payload(self, kind: u16) -> Option<&'a [u8]> {
        self.map_while(|attr| attr.ok())
            .find(|attr| attr.kind() == kind)
            .map(|attr| attr.payload())
    }

    fn finish(&mut self) {
        self.done = true;
        self.offset = self.buf.len();
    }
}

impl<'a> Iterator for Attributes<'a> {
    type Item = Result<Attribute<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let rest = &self.buf[self.offset..];
        let header = match AttributeHeader::parse(rest) {
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
            return Some(Err(Error::MalformedAttribute {
                offset,
                length: header.length,
                available: rest.len(),
            }));
        }

        let payload = &rest[HEADER_LEN..length];
        let advance = align_to(length, self.alignment);
        if advance >= rest.len() {
            self.finish();
        } else {
            self.offset += advance;
        }

        Some(Ok(Attribute { header, payload }))
    }
}

impl<'a> FusedIterator for Attributes<'a> {}
