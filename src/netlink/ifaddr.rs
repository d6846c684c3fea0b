//! Interface address messages (`RTM_NEWADDR`, `RTM_DELADDR`).

use std::fmt;

use byteorder::{ByteOrder, NativeEndian};

use super::attr::Attributes;
use super::{align_to, NLMSG_ALIGNTO};

/// Size of `struct ifaddrmsg`.
pub const IFADDR_MESSAGE_LEN: usize = 8;

/// Body of an interface address message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IfaddrMessage {
    pub family: u8,
    pub prefix_len: u8,
    pub flags: u8,
    pub scope: u8,
    pub index: u32,
}

impl IfaddrMessage {
    /// Reads the body at the start of a message payload.
    pub fn parse(payload: &[u8]) -> Option<IfaddrMessage> {
        if payload.len() < IFADDR_MESSAGE_LEN {
            return None;
        }

        Some(IfaddrMessage {
            family: payload[0],
            prefix_len: payload[1],
            flags: payload[2],
            scope: payload[3],
            index: NativeEndian::read_u32(&payload[4..8]),
        })
    }

    pub fn to_bytes(&self) -> [u8; IFADDR_MESSAGE_LEN] {
        let mut buf = [0u8; IFADDR_MESSAGE_LEN];
        buf[0] = self.family;
        buf[1] = self.prefix_len;
        buf[2] = self.flags;
        buf[3] = self.scope;
        NativeEndian::write_u32(&mut buf[4..8], self.index);
        buf
    }

    /// The attributes following the body in `payload`.
    pub fn attributes(payload: &[u8]) -> Attributes<'_> {
        let start = align_to(IFADDR_MESSAGE_LEN, NLMSG_ALIGNTO).min(payload.len());
        Attributes::new(&payload[start..])
    }
}

/// Attribute types of an interface address message (`IFA_*`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IfaddrAttribute {
    Unspecified,
    Address,
    LocalAddress,
    InterfaceName,
    BroadcastAddress,
    AnycastAddress,
    AddressInfo,
    MulticastAddress,
    Flags,
    Other(u16),
}

impl IfaddrAttribute {
    pub fn as_str(&self) -> &'static str {
        match self {
            IfaddrAttribute::Unspecified => "unspecified",
            IfaddrAttribute::Address => "interface_address",
            IfaddrAttribute::LocalAddress => "local_address",
            IfaddrAttribute::InterfaceName => "interface_name",
            IfaddrAttribute::BroadcastAddress => "broadcast_address",
            IfaddrAttribute::AnycastAddress => "anycast_address",
            IfaddrAttribute::AddressInfo => "address_info",
            IfaddrAttribute::MulticastAddress => "multicast_address",
            IfaddrAttribute::Flags => "flags",
            IfaddrAttribute::Other(_) => "unknown",
        }
    }
}

impl From<u16> for IfaddrAttribute {
    fn from(kind: u16) -> IfaddrAttribute {
        match kind {
            0 => IfaddrAttribute::Unspecified,
            1 => IfaddrAttribute::Address,
            2 => IfaddrAttribute::LocalAddress,
            3 => IfaddrAttribute::InterfaceName,
            4 => IfaddrAttribute::BroadcastAddress,
            5 => IfaddrAttribute::AnycastAddress,
            6 => IfaddrAttribute::AddressInfo,
            7 => IfaddrAttribute::MulticastAddress,
            8 => IfaddrAttribute::Flags,
            other => IfaddrAttribute::Other(other),
        }
    }
}

impl From<IfaddrAttribute> for u16 {
    fn from(attr: IfaddrAttribute) -> u16 {
        match attr {
            IfaddrAttribute::Unspecified => 0,
            IfaddrAttribute::Address => 1,
            IfaddrAttribute::LocalAddress => 2,
            IfaddrAttribute::InterfaceName => 3,
            IfaddrAttribute::BroadcastAddress => 4,
            IfaddrAttribute::AnycastAddress => 5,
            IfaddrAttribute::AddressInfo => 6,
            IfaddrAttribute::MulticastAddress => 7,
            IfaddrAttribute::Flags => 8,
            IfaddrAttribute::Other(kind) => kind,
        }
    }
}

impl fmt::Display for IfaddrAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_names() {
        assert_eq!(IfaddrAttribute::Address.to_string(), "interface_address");
        assert_eq!(IfaddrAttribute::from(7).to_string(), "multicast_address");
        assert_eq!(IfaddrAttribute::from(5).to_string(), "anycast_address");
        assert_eq!(IfaddrAttribute::from(1111).to_string(), "unknown");
    }

    #[test]
    fn attribute_codes_round_trip() {
        for code in 0..12u16 {
            assert_eq!(u16::from(IfaddrAttribute::from(code)), code);
        }
    }

    #[test]
    fn body_fields() {
        let body = IfaddrMessage {
            family: libc::AF_INET as u8,
            prefix_len: 24,
            flags: 0x80,
            scope: 0,
            index: 3,
        };
        let parsed = IfaddrMessage::parse(&body.to_bytes()).unwrap();
        assert_eq!(parsed, body);
        assert!(IfaddrMessage::parse(&[0; 7]).is_none());
    }

    #[test]
    fn attributes_of_body_only_payload() {
        let body = IfaddrMessage::default().to_bytes();
        assert_eq!(IfaddrMessage::attributes(&body).count(), 0);
        assert_eq!(IfaddrMessage::attributes(&body[..3]).count(), 0);
    }
}
