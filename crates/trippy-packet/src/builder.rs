//! A field-addressable probe builder.
//!
//! Per spec §4.A, the dispatcher needs to set `src_ip`, `dst_ip`,
//! `src_port`, `dst_port`, `ttl`/`hop_limit`, `checksum` and `payload` by
//! name, with each setter keeping any dependent checksum in sync, and to
//! read back a serialised buffer plus its size. `ProbeBuilder` is the
//! narrow trait that the concrete ICMP/UDP, IPv4/IPv6 packet types below
//! implement; `trippy-core`'s network layer is generic over it.

use std::net::IpAddr;

/// A named, settable field on a probe packet.
#[derive(Debug, Clone)]
pub enum Field {
    SrcIp(IpAddr),
    DstIp(IpAddr),
    SrcPort(u16),
    DstPort(u16),
    Ttl(u8),
    Payload(Vec<u8>),
}

/// A mutable, serialisable probe packet addressable by named field.
pub trait ProbeBuilder {
    /// Apply a single field update, recomputing any dependent checksum.
    fn set_field(&mut self, field: Field);

    /// Apply `src_port`, `dst_port` and `payload` together while holding
    /// the UDP checksum at `checksum_target` -- the ECMP-stability
    /// prerequisite of spec §4.A. A no-op for non-UDP builders.
    fn fix_flow_fields(&mut self, src_port: u16, dst_port: u16, payload: &[u8], checksum_target: Option<u16>);

    /// The serialised packet ready for transmission.
    fn to_bytes(&self) -> Vec<u8>;

    /// The size, in bytes, of the serialised packet.
    fn size(&self) -> usize {
        self.to_bytes().len()
    }
}

/// A [`ProbeBuilder`] over a UDP probe, owning its own buffer plus the
/// source/destination addresses the checksum's pseudo-header needs.
///
/// `ttl`/`hop_limit` is tracked here rather than applied to the buffer --
/// IPv4/IPv6 headers are left to the kernel on the raw socket path (spec
/// §4.B), so `Field::Ttl` instead feeds the socket option the network layer
/// reads via [`UdpProbeBuilder::ttl`].
pub struct UdpProbeBuilder {
    buf: Vec<u8>,
    src_addr: IpAddr,
    dst_addr: IpAddr,
    ttl: u8,
}

impl UdpProbeBuilder {
    #[must_use]
    pub fn new(src_addr: IpAddr, dst_addr: IpAddr) -> Self {
        Self {
            buf: vec![0_u8; crate::udp::HEADER_LEN],
            src_addr,
            dst_addr,
            ttl: 1,
        }
    }

    #[must_use]
    pub fn ttl(&self) -> u8 {
        self.ttl
    }

    fn view_mut(&mut self) -> crate::udp::UdpPacket<'_> {
        crate::udp::UdpPacket::new(&mut self.buf).expect("buffer always at least HEADER_LEN")
    }
}

impl ProbeBuilder for UdpProbeBuilder {
    fn set_field(&mut self, field: Field) {
        match field {
            Field::SrcIp(addr) => self.src_addr = addr,
            Field::DstIp(addr) => self.dst_addr = addr,
            Field::SrcPort(port) => self.view_mut().set_src_port(port),
            Field::DstPort(port) => self.view_mut().set_dst_port(port),
            Field::Ttl(ttl) => self.ttl = ttl,
            Field::Payload(payload) => {
                self.buf.resize(crate::udp::HEADER_LEN + payload.len(), 0);
                let len = self.buf.len() as u16;
                let mut view = self.view_mut();
                view.set_payload(&payload);
                view.set_length(len);
            }
        }
        let (src, dst) = (self.src_addr, self.dst_addr);
        self.view_mut().update_checksum(src, dst);
    }

    fn fix_flow_fields(&mut self, src_port: u16, dst_port: u16, payload: &[u8], checksum_target: Option<u16>) {
        self.buf.resize(crate::udp::HEADER_LEN + payload.len(), 0);
        let len = self.buf.len() as u16;
        let (src, dst) = (self.src_addr, self.dst_addr);
        let mut view = self.view_mut();
        view.set_src_port(src_port);
        view.set_dst_port(dst_port);
        view.set_length(len);
        match checksum_target {
            Some(target) => {
                let _ = view.set_payload_for_checksum(payload, target, src, dst);
            }
            None => {
                view.set_payload(payload);
                view.update_checksum(src, dst);
            }
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.buf.clone()
    }
}

/// A [`ProbeBuilder`] over an ICMP echo-request probe. `fix_flow_fields` is
/// a no-op here: ICMP has no ports, so ECMP stability under ICMP comes from
/// holding the identifier constant and varying the sequence instead (spec
/// §3 `FlowId`), which the dispatcher does directly via `set_field`.
pub struct IcmpProbeBuilder {
    buf: Vec<u8>,
    ttl: u8,
}

impl IcmpProbeBuilder {
    #[must_use]
    pub fn new() -> Self {
        let mut buf = vec![0_u8; crate::icmp::ECHO_HEADER_LEN];
        buf[0] = crate::icmp::icmp_type::ECHO_REQUEST_V4;
        Self { buf, ttl: 1 }
    }

    #[must_use]
    pub fn ttl(&self) -> u8 {
        self.ttl
    }

    fn view_mut(&mut self) -> crate::icmp::MutableEchoRequestPacket<'_> {
        crate::icmp::MutableEchoRequestPacket::new(&mut self.buf).expect("buffer always at least ECHO_HEADER_LEN")
    }
}

impl Default for IcmpProbeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProbeBuilder for IcmpProbeBuilder {
    /// ICMP has no ports; `SrcPort` is repurposed as the echo identifier and
    /// `DstPort` as the sequence number, the two fields ECMP stability
    /// under ICMP actually varies (spec §3 `FlowId`'s ICMP case).
    fn set_field(&mut self, field: Field) {
        match field {
            Field::SrcIp(_) | Field::DstIp(_) => {}
            Field::SrcPort(identifier) => self.view_mut().set_identifier(identifier),
            Field::DstPort(sequence) => self.view_mut().set_sequence(sequence),
            Field::Ttl(ttl) => self.ttl = ttl,
            Field::Payload(payload) => {
                self.buf.resize(crate::icmp::ECHO_HEADER_LEN + payload.len(), 0);
                self.view_mut().set_payload(&payload);
            }
        }
        self.view_mut().update_checksum_v4();
    }

    fn fix_flow_fields(&mut self, _src_port: u16, _dst_port: u16, _payload: &[u8], _checksum_target: Option<u16>) {}

    fn to_bytes(&self) -> Vec<u8> {
        self.buf.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internet_checksum;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn udp_builder_keeps_checksum_in_sync_across_field_updates() {
        let src = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let dst = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));
        let mut builder = UdpProbeBuilder::new(src, dst);
        builder.set_field(Field::SrcPort(33456));
        builder.set_field(Field::DstPort(33457));
        builder.set_field(Field::Ttl(5));
        assert_eq!(builder.ttl(), 5);
        let bytes = builder.to_bytes();
        let pseudo_len = bytes.len();
        let mut pseudo = Vec::with_capacity(12 + pseudo_len);
        if let (IpAddr::V4(s), IpAddr::V4(d)) = (src, dst) {
            pseudo.extend_from_slice(&s.octets());
            pseudo.extend_from_slice(&d.octets());
            pseudo.push(0);
            pseudo.push(17);
            pseudo.extend_from_slice(&(pseudo_len as u16).to_be_bytes());
        }
        pseudo.extend_from_slice(&bytes);
        assert_eq!(internet_checksum(&pseudo, None), 0);
    }

    #[test]
    fn udp_builder_fix_flow_fields_holds_checksum_constant() {
        let src = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let dst = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));
        let mut a = UdpProbeBuilder::new(src, dst);
        a.fix_flow_fields(33456, 33457, &[0], Some(0xBEEF));
        let mut b = UdpProbeBuilder::new(src, dst);
        b.fix_flow_fields(33456, 33458, &[0], Some(0xBEEF));
        let checksum_of = |bytes: &[u8]| u16::from_be_bytes([bytes[6], bytes[7]]);
        assert_eq!(checksum_of(&a.to_bytes()), 0xBEEF);
        assert_eq!(checksum_of(&b.to_bytes()), 0xBEEF);
    }

    #[test]
    fn icmp_builder_produces_a_self_consistent_checksum() {
        let mut builder = IcmpProbeBuilder::new();
        builder.set_field(Field::SrcPort(1234)); // identifier
        builder.set_field(Field::Payload(vec![1, 2, 3, 4]));
        let bytes = builder.to_bytes();
        assert_eq!(internet_checksum(&bytes, None), 0);
    }
}
