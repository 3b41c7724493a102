//! Component D: matches inbound responses back to outstanding probes.
//!
//! Grounded in `icmp::tracer::IcmpTracer::recv_response`'s matching logic
//! (trace identifier plus `TracerState::in_round` against the sequence) but
//! generalised to the full invariant tuple from spec §4.D (source/dest
//! address, protocol, identifier-or-ports) and explicitly excluding the TTL,
//! with ties broken by the smallest outstanding `sent` timestamp rather than
//! by sequence order.

use crate::net::ProbeResponse;
use crate::probe::Probe;
use crate::types::{FlowIdentity, Tag};
use indexmap::IndexMap;

/// The part of a [`Probe`] the correlator keys its lookup table on: the
/// invariant tuple minus the TTL (spec §4.D).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct InvariantKey {
    protocol: crate::types::Protocol,
    identity: FlowIdentity,
}

impl From<&Probe> for InvariantKey {
    fn from(probe: &Probe) -> Self {
        Self {
            protocol: probe.flow.protocol,
            identity: probe.flow.identity,
        }
    }
}

/// Tracks outstanding probes and matches inbound responses against them.
#[derive(Debug, Default)]
pub struct Correlator {
    outstanding: IndexMap<InvariantKey, Vec<Probe>>,
    unmatched: usize,
}

impl Correlator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly sent probe as outstanding.
    pub fn track(&mut self, probe: Probe) {
        self.outstanding.entry(InvariantKey::from(&probe)).or_default().push(probe);
    }

    /// Remove and return the outstanding probe with `tag`, if any -- used
    /// when a timer fires rather than a response arriving.
    pub fn take_by_tag(&mut self, tag: Tag) -> Option<Probe> {
        for probes in self.outstanding.values_mut() {
            if let Some(pos) = probes.iter().position(|p| p.tag == tag) {
                return Some(probes.remove(pos));
            }
        }
        None
    }

    /// Match `response` against the outstanding table.
    ///
    /// When more than one outstanding probe shares the same invariant tuple
    /// (possible across overlapping rounds), the one with the smallest
    /// `sent` timestamp is preferred -- the response is assumed to answer
    /// whichever probe has been waiting longest (spec §4.D tie-break).
    pub fn resolve(&mut self, response: &ProbeResponse) -> Option<Probe> {
        let key = InvariantKey {
            protocol: response.matched_flow.protocol,
            identity: response.matched_flow.identity,
        };
        let probes = self.outstanding.get_mut(&key)?;
        let (idx, _) = probes
            .iter()
            .enumerate()
            .min_by_key(|(_, p)| p.sent)?;
        let probe = probes.remove(idx);
        if probes.is_empty() {
            self.outstanding.shift_remove(&key);
        }
        Some(probe)
    }

    /// Record that a response could not be matched to anything outstanding
    /// (spec §7 `Diagnostic::UnmatchedReply`), without treating it as fatal.
    pub fn note_unmatched(&mut self) {
        self.unmatched += 1;
    }

    #[must_use]
    pub fn unmatched_count(&self) -> usize {
        self.unmatched
    }

    #[must_use]
    pub fn outstanding_count(&self) -> usize {
        self.outstanding.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FlowId, Protocol, Round, Sequence, TimeToLive};
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::{Duration, SystemTime};

    fn probe(tag: u64, sent: SystemTime) -> Probe {
        Probe::new(
            Tag(tag),
            Sequence(1),
            FlowId {
                src_addr: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
                dst_addr: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
                protocol: Protocol::Icmp,
                identity: FlowIdentity::Icmp { identifier: 42 },
            },
            TimeToLive(3),
            Round(0),
            sent,
        )
    }

    fn response() -> ProbeResponse {
        ProbeResponse {
            kind: crate::probe::IcmpPacketType::TimeExceeded,
            responder: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9)),
            received: SystemTime::now(),
            matched_flow: FlowId {
                src_addr: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9)),
                dst_addr: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9)),
                protocol: Protocol::Icmp,
                identity: FlowIdentity::Icmp { identifier: 42 },
            },
            matched_sequence: Sequence(1),
        }
    }

    #[test]
    fn resolves_to_the_oldest_matching_probe() {
        let mut c = Correlator::new();
        let now = SystemTime::now();
        c.track(probe(1, now + Duration::from_millis(10)));
        c.track(probe(2, now));
        let matched = c.resolve(&response()).unwrap();
        assert_eq!(matched.tag, Tag(2));
        assert_eq!(c.outstanding_count(), 1);
    }

    #[test]
    fn take_by_tag_removes_regardless_of_age() {
        let mut c = Correlator::new();
        c.track(probe(1, SystemTime::now()));
        let taken = c.take_by_tag(Tag(1));
        assert_eq!(taken.map(|p| p.tag), Some(Tag(1)));
        assert_eq!(c.outstanding_count(), 0);
    }

    #[test]
    fn unmatched_reply_does_not_panic() {
        let mut c = Correlator::new();
        assert!(c.resolve(&response()).is_none());
        c.note_unmatched();
        assert_eq!(c.unmatched_count(), 1);
    }
}
