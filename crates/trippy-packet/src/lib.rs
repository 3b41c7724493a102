//! Field-addressable mutable packet builders.
//!
//! This crate gives the dispatcher (`trippy-core`) a way to build outgoing
//! probes by name (`src_ip`, `dst_ip`, `src_port`, `dst_port`, `ttl`,
//! `checksum`, `payload`) without hand-rolling byte offsets at every call
//! site, and to parse the handful of inbound packet shapes the correlator
//! needs to recognise (ICMP `TimeExceeded` / `DestinationUnreachable` /
//! `EchoReply`, with their quoted inner packet).
//!
//! Setting a field always keeps any dependent checksum in sync; there is no
//! separate "recompute checksum" step a caller can forget.

pub mod builder;
pub mod icmp;
pub mod ipv4;
pub mod ipv6;
pub mod udp;

pub use builder::{Field, IcmpProbeBuilder, ProbeBuilder, UdpProbeBuilder};

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PacketError {
    #[error("buffer too small: need {need} bytes, have {have}")]
    BufferTooSmall { need: usize, have: usize },
    #[error("malformed packet: {0}")]
    Malformed(&'static str),
}

pub type PacketResult<T> = Result<T, PacketError>;

/// IP protocol numbers relevant to probe construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IpProtocol {
    Icmp = 1,
    Udp = 17,
    IcmpV6 = 58,
}

/// The internet checksum (RFC 1071) over a buffer, treated as a sequence of
/// big-endian 16-bit words. `skip_word` is an index (in 16-bit words) whose
/// contents are treated as zero while summing -- used to recompute a
/// checksum field in place without first zeroing it.
#[must_use]
pub fn internet_checksum(data: &[u8], skip_word: Option<usize>) -> u16 {
    let mut sum: u32 = 0;
    for (i, chunk) in data.chunks(2).enumerate() {
        if Some(i) == skip_word {
            continue;
        }
        let word = if chunk.len() == 2 {
            u16::from_be_bytes([chunk[0], chunk[1]])
        } else {
            u16::from_be_bytes([chunk[0], 0])
        };
        sum += u32::from(word);
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_of_known_vector_is_correct() {
        // RFC 1071 worked example.
        let data = [0x00, 0x01, 0xF2, 0x03, 0xF4, 0xF5, 0xF6, 0xF7];
        assert_eq!(internet_checksum(&data, None), 0x220D);
    }

    #[test]
    fn checksum_is_zero_over_self_inclusive_field() {
        let mut data = [0x00, 0x01, 0xF2, 0x03, 0xF4, 0xF5, 0xF6, 0xF7, 0x00, 0x00];
        let sum = internet_checksum(&data, Some(4));
        data[8] = (sum >> 8) as u8;
        data[9] = (sum & 0xFF) as u8;
        assert_eq!(internet_checksum(&data, None), 0);
    }
}
