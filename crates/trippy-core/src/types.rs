//! Small newtype wrappers used throughout the dispatcher and algorithms.
//!
//! Grounded in `icmp::tracer`'s newtype style: arithmetic is derived rather
//! than hand-written so a `Sequence` and a `u16` can never be silently
//! swapped at a call site.

use derive_more::{Add, AddAssign, From, Rem, Sub};
use std::net::IpAddr;

/// A round of probing within a single algorithm instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Ord, PartialOrd, Hash, From, AddAssign)]
pub struct Round(pub usize);

/// Time-to-live / hop-limit.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Ord, PartialOrd, Hash, From, Add, Sub, AddAssign,
)]
pub struct TimeToLive(pub u8);

impl TimeToLive {
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// A probe sequence number, unique within an algorithm instance's lifetime
/// modulo wraparound.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Ord, PartialOrd, Hash, From, Add, AddAssign, Rem,
)]
pub struct Sequence(pub u16);

/// The ICMP identifier (or equivalent) used to recognise this process's own
/// probes among all ICMP traffic observed on the raw socket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Ord, PartialOrd, Hash, From)]
pub struct TraceId(pub u16);

/// A UDP/TCP port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Ord, PartialOrd, Hash, From)]
pub struct Port(pub u16);

/// A per-probe tag, unique among all outstanding probes in the event loop
/// (spec §3 `Probe` invariant).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Ord, PartialOrd, Hash, From)]
pub struct Tag(pub u64);

/// The transport used to build and send probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Udp,
    Icmp,
}

/// A single-flow, single-round probe target: the invariant tuple minus the
/// varying TTL (spec §3 `FlowId`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowId {
    pub src_addr: IpAddr,
    pub dst_addr: IpAddr,
    pub protocol: Protocol,
    pub identity: FlowIdentity,
}

/// The part of the invariant tuple that ECMP hashes on besides the address
/// pair and protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowIdentity {
    Icmp { identifier: u16 },
    Udp { src_port: u16, dst_port: u16 },
}

impl From<Sequence> for usize {
    fn from(sequence: Sequence) -> Self {
        sequence.0 as Self
    }
}

impl From<TimeToLive> for usize {
    fn from(ttl: TimeToLive) -> Self {
        ttl.0 as Self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_ordering_is_numeric() {
        assert!(TimeToLive(1) < TimeToLive(2));
        assert_eq!(TimeToLive(1).next(), TimeToLive(2));
    }

    #[test]
    fn sequence_wraps_under_rem() {
        assert_eq!(Sequence(10) % Sequence(4), Sequence(2));
    }
}
