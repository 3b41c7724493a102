//! A minimal, mutable IPv6 header view over a byte buffer.
//!
//! IPv6 has no header checksum of its own; upper-layer checksums (ICMPv6,
//! UDP) must fold in the pseudo-header, see [`crate::udp`] and
//! [`crate::icmp`].

use crate::{IpProtocol, PacketError, PacketResult};
use std::net::Ipv6Addr;

pub const HEADER_LEN: usize = 40;

pub struct Ipv6Packet<'a> {
    buf: &'a mut [u8],
}

impl<'a> Ipv6Packet<'a> {
    pub fn new(buf: &'a mut [u8]) -> PacketResult<Self> {
        if buf.len() < HEADER_LEN {
            return Err(PacketError::BufferTooSmall {
                need: HEADER_LEN,
                have: buf.len(),
            });
        }
        let mut packet = Self { buf };
        packet.buf[0] = 0x60; // version 6
        Ok(packet)
    }

    pub fn set_payload_length(&mut self, len: u16) {
        self.buf[4..6].copy_from_slice(&len.to_be_bytes());
    }

    pub fn set_next_header(&mut self, protocol: IpProtocol) {
        self.buf[6] = protocol as u8;
    }

    pub fn set_hop_limit(&mut self, hop_limit: u8) {
        self.buf[7] = hop_limit;
    }

    pub fn hop_limit(&self) -> u8 {
        self.buf[7]
    }

    pub fn set_src_addr(&mut self, addr: Ipv6Addr) {
        self.buf[8..24].copy_from_slice(&addr.octets());
    }

    pub fn src_addr(&self) -> Ipv6Addr {
        let mut octets = [0u8; 16];
        octets.copy_from_slice(&self.buf[8..24]);
        Ipv6Addr::from(octets)
    }

    pub fn set_dst_addr(&mut self, addr: Ipv6Addr) {
        self.buf[24..40].copy_from_slice(&addr.octets());
    }

    pub fn dst_addr(&self) -> Ipv6Addr {
        let mut octets = [0u8; 16];
        octets.copy_from_slice(&self.buf[24..40]);
        Ipv6Addr::from(octets)
    }

    pub fn payload(&self) -> &[u8] {
        &self.buf[HEADER_LEN..]
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Ipv6View<'a> {
    buf: &'a [u8],
}

impl<'a> Ipv6View<'a> {
    pub fn new(buf: &'a [u8]) -> PacketResult<Self> {
        if buf.len() < HEADER_LEN {
            return Err(PacketError::BufferTooSmall {
                need: HEADER_LEN,
                have: buf.len(),
            });
        }
        Ok(Self { buf })
    }

    pub fn next_header(&self) -> u8 {
        self.buf[6]
    }

    pub fn src_addr(&self) -> Ipv6Addr {
        let mut octets = [0u8; 16];
        octets.copy_from_slice(&self.buf[8..24]);
        Ipv6Addr::from(octets)
    }

    pub fn dst_addr(&self) -> Ipv6Addr {
        let mut octets = [0u8; 16];
        octets.copy_from_slice(&self.buf[24..40]);
        Ipv6Addr::from(octets)
    }

    pub fn payload(&self) -> &'a [u8] {
        &self.buf[HEADER_LEN..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_addresses_and_hop_limit() {
        let mut buf = [0u8; HEADER_LEN];
        let mut pkt = Ipv6Packet::new(&mut buf).unwrap();
        pkt.set_hop_limit(9);
        pkt.set_src_addr(Ipv6Addr::LOCALHOST);
        pkt.set_dst_addr(Ipv6Addr::LOCALHOST);
        assert_eq!(pkt.hop_limit(), 9);
        assert_eq!(pkt.src_addr(), Ipv6Addr::LOCALHOST);
    }
}
