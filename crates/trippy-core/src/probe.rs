//! [`Probe`] and the events the correlator raises about it.
//!
//! Grounded in `nc7s-trippy`'s `trippy_core::probe` module: a retired probe
//! ([`ProbeComplete`]) carries its own reply inline rather than requiring a
//! second lookup by tag.

use crate::types::{FlowId, Round, Sequence, Tag, TimeToLive};
use std::net::IpAddr;
use std::time::{Duration, SystemTime};

/// An in-flight probe (spec §3 `Probe`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub tag: Tag,
    pub sequence: Sequence,
    pub flow: FlowId,
    pub ttl: TimeToLive,
    pub round: Round,
    pub sent: SystemTime,
}

impl Probe {
    #[must_use]
    pub fn new(tag: Tag, sequence: Sequence, flow: FlowId, ttl: TimeToLive, round: Round, sent: SystemTime) -> Self {
        Self {
            tag,
            sequence,
            flow,
            ttl,
            round,
            sent,
        }
    }

    #[must_use]
    pub fn complete(self, host: IpAddr, received: SystemTime, icmp_packet_type: IcmpPacketType) -> ProbeComplete {
        ProbeComplete {
            tag: self.tag,
            sequence: self.sequence,
            flow: self.flow,
            ttl: self.ttl,
            round: self.round,
            sent: self.sent,
            host,
            received,
            icmp_packet_type,
        }
    }
}

/// A retired probe for which a reply was received (spec §3 `EnrichedReply`
/// folds `delay` on top of this at the output boundary).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeComplete {
    pub tag: Tag,
    pub sequence: Sequence,
    pub flow: FlowId,
    pub ttl: TimeToLive,
    pub round: Round,
    pub sent: SystemTime,
    pub host: IpAddr,
    pub received: SystemTime,
    pub icmp_packet_type: IcmpPacketType,
}

impl ProbeComplete {
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.received.duration_since(self.sent).unwrap_or_default()
    }
}

/// The ICMP message type that completed a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcmpPacketType {
    TimeExceeded,
    EchoReply,
    Unreachable,
}

/// A (reply, delay) pair, spec §3 `EnrichedReply`. Constructed once per
/// output event and consumed immediately by the output sink; never stored.
#[derive(Debug, Clone)]
pub struct EnrichedReply {
    pub reply: ProbeComplete,
    pub delay: Duration,
}

impl From<ProbeComplete> for EnrichedReply {
    fn from(reply: ProbeComplete) -> Self {
        let delay = reply.delay();
        Self { reply, delay }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FlowIdentity, Protocol};
    use std::net::Ipv4Addr;
    use std::time::Duration;

    fn flow() -> FlowId {
        FlowId {
            src_addr: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            dst_addr: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
            protocol: Protocol::Udp,
            identity: FlowIdentity::Udp {
                src_port: 33456,
                dst_port: 33457,
            },
        }
    }

    #[test]
    fn complete_carries_forward_probe_fields() {
        let sent = SystemTime::now();
        let probe = Probe::new(Tag(1), Sequence(1), flow(), TimeToLive(3), Round(0), sent);
        let received = sent + Duration::from_millis(20);
        let complete = probe.complete(
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 3)),
            received,
            IcmpPacketType::TimeExceeded,
        );
        assert_eq!(complete.ttl, TimeToLive(3));
        assert_eq!(complete.delay(), Duration::from_millis(20));
    }

    #[test]
    fn enriched_reply_computes_delay_on_construction() {
        let sent = SystemTime::now();
        let probe = Probe::new(Tag(1), Sequence(1), flow(), TimeToLive(1), Round(0), sent);
        let received = sent + Duration::from_millis(5);
        let complete = probe.complete(
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 3)),
            received,
            IcmpPacketType::EchoReply,
        );
        let enriched = EnrichedReply::from(complete);
        assert_eq!(enriched.delay, Duration::from_millis(5));
    }
}
