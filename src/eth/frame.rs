// Licensed under the Apache-2.0 license

//! Zero-copy views of the Ethernet II header.

use core::fmt;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// A 48-bit IEEE 802 MAC address.
#[derive(
    FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Clone, Copy, PartialEq, Eq, Default,
)]
#[repr(transparent)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    pub const BROADCAST: Self = Self([0xff; 6]);

    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Group addresses have the I/G bit of the first octet set. Broadcast is
    /// a group address too.
    #[must_use]
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }
}

impl fmt::Debug for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Ethernet II header as it sits at the start of a frame buffer.
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Clone, Copy, Debug)]
#[repr(C)]
pub struct EthernetHeader {
    pub destination: MacAddress,
    pub source: MacAddress,
    ethertype: [u8; 2],
}

impl EthernetHeader {
    pub const LEN: usize = 14;

    #[must_use]
    pub fn new(destination: MacAddress, source: MacAddress, ethertype: u16) -> Self {
        Self {
            destination,
            source,
            ethertype: ethertype.to_be_bytes(),
        }
    }

    /// Borrows the header at the front of `bytes`, if there is room for one.
    #[must_use]
    pub fn parse(bytes: &[u8]) -> Option<&Self> {
        Self::ref_from_prefix(bytes).ok().map(|(header, _)| header)
    }

    #[must_use]
    pub fn ethertype(&self) -> u16 {
        u16::from_be_bytes(self.ethertype)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_parse_header() {
        let bytes = hex!("ffffffffffff 020000123456 0806 0001");
        let header = EthernetHeader::parse(&bytes).unwrap();
        assert!(header.destination.is_broadcast());
        assert_eq!(header.source, MacAddress(hex!("020000123456")));
        assert_eq!(header.ethertype(), 0x0806);
    }

    #[test]
    fn test_parse_short_buffer() {
        assert!(EthernetHeader::parse(&[0u8; 13]).is_none());
    }

    #[test]
    fn test_header_bytes_layout() {
        let header = EthernetHeader::new(
            MacAddress(hex!("01005e000001")),
            MacAddress(hex!("020000000001")),
            0x0800,
        );
        assert_eq!(header.as_bytes(), &hex!("01005e000001 020000000001 0800"));
        assert!(header.destination.is_multicast());
        assert!(!header.destination.is_broadcast());
    }

    #[test]
    fn test_mac_debug_format() {
        let mac = MacAddress(hex!("020000abcdef"));
        assert_eq!(format!("{mac:?}"), "02:00:00:ab:cd:ef");
    }
}
