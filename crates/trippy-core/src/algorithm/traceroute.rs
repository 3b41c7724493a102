//! Component E: classical hop-by-hop ("Paris") traceroute.
//!
//! Grounded in `icmp::tracer::IcmpTracer`/`TracerState`'s round-advancing
//! shape, generalised from ICMP-only continuous rounds to the UDP/ICMP dual
//! protocol and the terminating single pass spec §4.E calls for (early exit
//! on destination match or on a run of silent hops, rather than looping
//! forever).

use super::{AlgorithmEvent, AlgorithmInstance, ProbeRequest};
use crate::config::TracerouteOptions;
use crate::probe::EnrichedReply;
use crate::types::{FlowId, Round, Sequence, TimeToLive};
use indexmap::IndexMap;
use std::net::IpAddr;

/// One hop's worth of results: `None` is a star (timeout).
pub type HopReplies = Vec<Option<EnrichedReply>>;

/// Dense from `min_ttl` to whichever hop the run terminated at (spec §3
/// `PerHopReplies`).
pub type PerHopReplies = IndexMap<TimeToLive, HopReplies>;

/// The classical traceroute state machine, `Idle -> Probing(ttl) -> Done`.
pub struct Traceroute {
    dst_addr: IpAddr,
    flow: FlowId,
    options: TracerouteOptions,
    ttl: TimeToLive,
    round: Round,
    next_sequence: u16,
    completed_in_hop: usize,
    hop_started: bool,
    per_hop: PerHopReplies,
    silent_streak: usize,
    terminated: bool,
}

impl Traceroute {
    #[must_use]
    pub fn new(dst_addr: IpAddr, flow: FlowId, options: TracerouteOptions) -> Self {
        let ttl = options.min_ttl;
        Self {
            dst_addr,
            flow,
            options,
            ttl,
            round: Round(0),
            next_sequence: 0,
            completed_in_hop: 0,
            hop_started: false,
            per_hop: PerHopReplies::new(),
            silent_streak: 0,
            terminated: false,
        }
    }

    fn next_request(&mut self) -> ProbeRequest {
        let sequence = Sequence(self.next_sequence);
        self.next_sequence = self.next_sequence.wrapping_add(1);
        ProbeRequest {
            flow: self.flow,
            ttl: self.ttl,
            sequence,
            round: self.round,
        }
    }

    fn record(&mut self, reply: Option<EnrichedReply>) {
        self.per_hop.entry(self.ttl).or_default().push(reply);
        self.completed_in_hop += 1;
        if self.completed_in_hop == self.options.num_probes {
            self.close_hop();
        }
    }

    fn close_hop(&mut self) {
        let hop = &self.per_hop[&self.ttl];
        let any_reply = hop.iter().any(Option::is_some);
        let destination_reached = hop.iter().flatten().any(|r| r.reply.host == self.dst_addr);
        self.silent_streak = if any_reply { 0 } else { self.silent_streak + 1 };

        if destination_reached || self.ttl >= self.options.max_ttl || self.silent_streak >= self.options.max_undiscovered {
            self.terminated = true;
            return;
        }

        self.ttl = self.ttl.next();
        self.round += Round(1);
        self.completed_in_hop = 0;
        self.hop_started = false;
    }
}

impl AlgorithmInstance for Traceroute {
    type Output = PerHopReplies;

    fn advance(&mut self) -> Vec<ProbeRequest> {
        if self.terminated || self.hop_started {
            return Vec::new();
        }
        self.hop_started = true;
        (0..self.options.num_probes).map(|_| self.next_request()).collect()
    }

    fn on_event(&mut self, event: AlgorithmEvent) {
        if self.terminated {
            return;
        }
        match event {
            AlgorithmEvent::ProbeReply { probe, response } => {
                debug_assert_eq!(probe.ttl, self.ttl, "reply delivered out of hop order");
                let complete = probe.complete(response.responder, response.received, response.kind);
                self.record(Some(EnrichedReply::from(complete)));
            }
            AlgorithmEvent::ProbeTimeout { .. } => {
                self.record(None);
            }
        }
    }

    fn is_terminated(&self) -> bool {
        self.terminated
    }

    fn terminated_value(self) -> Self::Output {
        self.per_hop
    }
}
