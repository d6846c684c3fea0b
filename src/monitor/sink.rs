use std::fmt;
use std::net::Ipv4Addr;

use crate::netlink::{RTM_DELADDR, RTM_NEWADDR};

/// Whether an address appeared or went away.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Added,
    Removed,
}

impl ChangeKind {
    /// Maps `RTM_NEWADDR` and `RTM_DELADDR`; every other type is `None`.
    pub fn from_message_type(message_type: u16) -> Option<ChangeKind> {
        match message_type {
            RTM_NEWADDR => Some(ChangeKind::Added),
            RTM_DELADDR => Some(ChangeKind::Removed),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Added => f.write_str("add"),
            ChangeKind::Removed => f.write_str("del"),
        }
    }
}

/// An interface address change decoded from one kernel message.
///
/// Owns all of its data, so it can outlive the receive buffer it came from.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AddressChange {
    pub kind: ChangeKind,
    pub interface_index: u32,
    pub address: Ipv4Addr,
    pub prefix_len: u8,
    /// Interface label (`IFA_LABEL`), such as `eth0` or `eth0:1`.
    pub label: Option<String>,
}

impl fmt::Display for AddressChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}/{} index {}",
            self.kind, self.address, self.prefix_len, self.interface_index
        )?;
        if let Some(ref label) = self.label {
            write!(f, " ({})", label)?;
        }
        Ok(())
    }
}

/// Receives the address changes a monitor decodes.
///
/// Implemented for every `FnMut(AddressChange)` closure; collect into a
/// `Vec` with `|change| changes.push(change)`.
pub trait AddressSink {
    fn on_address_change(&mut self, change: AddressChange);
}

impl<F> AddressSink for F
where
    F: FnMut(AddressChange),
{
    fn on_address_change(&mut self, change: AddressChange) {
        self(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_message_type() {
        assert_eq!(ChangeKind::from_message_type(20), Some(ChangeKind::Added));
        assert_eq!(ChangeKind::from_message_type(21), Some(ChangeKind::Removed));
        assert_eq!(ChangeKind::from_message_type(16), None);
        assert_eq!(ChangeKind::from_message_type(22), None);
    }

    #[test]
    fn display() {
        let change = AddressChange {
            kind: ChangeKind::Removed,
            interface_index: 2,
            address: Ipv4Addr::new(192, 168, 1, 10),
            prefix_len: 24,
            label: None,
        };
        assert_eq!(change.to_string(), "del 192.168.1.10/24 index 2");

        let change = AddressChange {
            label: Some("eth0".to_string()),
            ..change
        };
        assert_eq!(change.to_string(), "del 192.168.1.10/24 index 2 (eth0)");
    }

    #[test]
    fn closures_are_sinks() {
        let mut seen = Vec::new();
        {
            let mut sink = |change: AddressChange| seen.push(change.address);
            sink.on_address_change(AddressChange {
                kind: ChangeKind::Added,
                interface_index: 1,
                address: Ipv4Addr::LOCALHOST,
                prefix_len: 8,
                label: None,
            });
        }
        assert_eq!(seen, vec![Ipv4Addr::LOCALHOST]);
    }

    struct Counter {
        added: usize,
        removed: usize,
    }

    impl AddressSink for Counter {
        fn on_address_change(&mut self, change: AddressChange) {
            match change.kind {
                ChangeKind::Added => self.added += 1,
                ChangeKind::Removed => self.removed += 1,
            }
        }
    }

    #[test]
    fn sinks_are_object_safe() {
        let change = AddressChange {
            kind: ChangeKind::Removed,
            interface_index: 1,
            address: Ipv4Addr::LOCALHOST,
            prefix_len: 8,
            label: Some("lo".to_string()),
        };

        let mut counter = Counter {
            added: 0,
            removed: 0,
        };
        let mut collected = Vec::new();
        {
            let mut collect = |change: AddressChange| collected.push(change);
            let sinks: [&mut dyn AddressSink; 2] = [&mut counter, &mut collect];
            for sink in sinks {
                sink.on_address_change(change.clone());
            }
        }
        assert_eq!((counter.added, counter.removed), (0, 1));
        assert_eq!(collected, vec![change]);
    }
}
