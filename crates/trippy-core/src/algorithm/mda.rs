//! Component F: the Multipath Detection Algorithm.
//!
//! No direct teacher analogue (the teacher only ships classical
//! traceroute); built in its idiom instead -- same `AlgorithmInstance`
//! shape as [`super::traceroute::Traceroute`], reusing the dispatcher,
//! correlator and lattice rather than inventing a parallel event path.

use super::{AlgorithmEvent, AlgorithmInstance, ProbeRequest};
use crate::config::MdaOptions;
use crate::error::FlowExhaustion;
use crate::lattice::Lattice;
use crate::types::{FlowId, FlowIdentity, Round, Sequence, TimeToLive};
use indexmap::IndexMap;
use std::net::IpAddr;

/// Retries a flow is given at a single hop before the hop gives up on it
/// and mints a replacement (spec §4.F "Collisions are retried up to a
/// small constant").
const RETRY_BUDGET: u32 = 4;

/// The minimum number of next-hop candidates MDA starts a hop with before
/// the stopping rule has anything to reason about (spec §4.F n(0)).
const MIN_INITIAL_FLOWS: u32 = 2;

/// The minimum number of distinct flows that must be probed through a hop
/// to conclude, with probability ≥ `1 - bound`, that no `(k+1)`-th
/// next-hop exists once `k` distinct next-hops have been observed (spec
/// §4.F).
#[must_use]
pub fn stopping_rule(k: u32, bound: f64) -> u32 {
    if k == 0 {
        return MIN_INITIAL_FLOWS;
    }
    let ratio = f64::from(k) / f64::from(k + 1);
    (bound.ln() / ratio.ln()).ceil() as u32
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    /// Learning the predecessor interface for a freshly minted flow, one
    /// hop behind the hop currently being closed out.
    Predecessor,
    /// The probe at the hop currently being closed out.
    Hop,
}

#[derive(Debug, Clone, Copy, Default)]
struct FlowRecord {
    /// The interface this flow was observed at, one hop behind whichever
    /// hop is currently being closed out.
    predecessor: Option<IpAddr>,
    tried_at_hop: bool,
}

/// Multipath discovery: grows the number of flows probed through each hop
/// until the stopping rule closes it, then advances, carrying forward the
/// flows that succeeded as candidates for the next hop.
pub struct Mda {
    src_addr: IpAddr,
    src_port: u16,
    dst_addr: IpAddr,
    options: MdaOptions,
    ttl: TimeToLive,
    lattice: Lattice,
    /// Every flow minted so far, with the interface it was last seen at.
    flows: IndexMap<FlowId, FlowRecord>,
    /// Flows successfully exercised at the current hop (spec §4.F
    /// `Flows[h]`), mapped to the interface observed there.
    closed_at_hop: IndexMap<FlowId, IpAddr>,
    pending: IndexMap<FlowId, Stage>,
    retries: IndexMap<FlowId, u32>,
    next_port_offset: u16,
    terminated: bool,
    flow_exhausted: Option<FlowExhaustion>,
}

impl Mda {
    #[must_use]
    pub fn new(dst_addr: IpAddr, src_addr: IpAddr, src_port: u16, options: MdaOptions) -> Self {
        let ttl = options.traceroute.min_ttl;
        Self {
            src_addr,
            src_port,
            dst_addr,
            options,
            ttl,
            lattice: Lattice::new(),
            flows: IndexMap::new(),
            closed_at_hop: IndexMap::new(),
            pending: IndexMap::new(),
            retries: IndexMap::new(),
            next_port_offset: 0,
            terminated: false,
            flow_exhausted: None,
        }
    }

    #[must_use]
    pub fn flow_exhausted(&self) -> Option<FlowExhaustion> {
        self.flow_exhausted
    }

    fn mint_flow(&mut self) -> FlowId {
        let dst_port = 33457_u16.wrapping_add(self.next_port_offset);
        self.next_port_offset += 1;
        let flow = FlowId {
            src_addr: self.src_addr,
            dst_addr: self.dst_addr,
            protocol: crate::types::Protocol::Udp,
            identity: FlowIdentity::Udp {
                src_port: self.src_port,
                dst_port,
            },
        };
        self.flows.insert(flow, FlowRecord::default());
        flow
    }

    fn distinct_interfaces(&self) -> u32 {
        let mut seen: Vec<IpAddr> = self.closed_at_hop.values().copied().collect();
        seen.sort_unstable();
        seen.dedup();
        seen.len() as u32
    }

    /// The stopping rule's target flow count, capped at `max_branch` (spec
    /// §4.F/§5): a pathological hop with many next-hops must not make the
    /// algorithm mint an unbounded number of flows.
    fn required_flows(&self) -> u32 {
        let target = stopping_rule(self.distinct_interfaces(), self.options.bound);
        target.min(self.options.max_branch as u32)
    }

    /// Materialises the interfaces and links observed at the current hop
    /// into the lattice, then either terminates or rolls the state
    /// forward to `ttl + 1` (spec §4.F steps 3-5).
    fn close_hop(&mut self) {
        for (&flow, &addr) in &self.closed_at_hop {
            let here = self.lattice.add_interface(self.ttl, addr);
            if let Some(predecessor) = self.flows.get(&flow).and_then(|r| r.predecessor) {
                let prev_hop = TimeToLive(self.ttl.0.saturating_sub(1));
                let there = self.lattice.add_interface(prev_hop, predecessor);
                let _ = self.lattice.add_link(there, here);
            }
        }

        let destination_reached = !self.closed_at_hop.is_empty() && self.closed_at_hop.values().all(|&addr| addr == self.dst_addr);
        if destination_reached || self.ttl >= self.options.traceroute.max_ttl {
            self.terminated = true;
            return;
        }

        for (&flow, &addr) in &self.closed_at_hop {
            if let Some(record) = self.flows.get_mut(&flow) {
                record.predecessor = Some(addr);
                record.tried_at_hop = false;
            }
        }
        self.ttl = self.ttl.next();
        self.closed_at_hop.clear();
    }

    fn schedule(&mut self, flow: FlowId, requests: &mut Vec<ProbeRequest>) {
        let has_predecessor = self.flows[&flow].predecessor.is_some();
        let stage = if has_predecessor || self.ttl == self.options.traceroute.min_ttl {
            Stage::Hop
        } else {
            Stage::Predecessor
        };
        self.pending.insert(flow, stage);
        let probe_ttl = match stage {
            Stage::Hop => self.ttl,
            Stage::Predecessor => TimeToLive(self.ttl.0.saturating_sub(1)),
        };
        requests.push(ProbeRequest {
            flow,
            ttl: probe_ttl,
            sequence: Sequence(0),
            round: Round(usize::from(self.ttl)),
        });
    }
}

impl AlgorithmInstance for Mda {
    type Output = Lattice;

    fn advance(&mut self) -> Vec<ProbeRequest> {
        if self.terminated {
            return Vec::new();
        }
        let have = self.closed_at_hop.len() as u32 + self.pending.len() as u32;
        let target = self.required_flows();
        if have >= target {
            return Vec::new();
        }
        let mut needed = target - have;
        let mut requests = Vec::new();

        let reusable: Vec<FlowId> = self
            .flows
            .iter()
            .filter(|(flow, record)| !record.tried_at_hop && !self.pending.contains_key(*flow))
            .map(|(flow, _)| *flow)
            .collect();
        for flow in reusable {
            if needed == 0 {
                break;
            }
            self.schedule(flow, &mut requests);
            needed -= 1;
        }
        for _ in 0..needed {
            let flow = self.mint_flow();
            self.schedule(flow, &mut requests);
        }
        requests
    }

    fn on_event(&mut self, event: AlgorithmEvent) {
        if self.terminated {
            return;
        }
        match event {
            AlgorithmEvent::ProbeReply { probe, response } => {
                let Some(stage) = self.pending.shift_remove(&probe.flow) else {
                    return;
                };
                match stage {
                    Stage::Predecessor => {
                        if let Some(record) = self.flows.get_mut(&probe.flow) {
                            record.predecessor = Some(response.responder);
                        }
                    }
                    Stage::Hop => {
                        self.closed_at_hop.insert(probe.flow, response.responder);
                        if let Some(record) = self.flows.get_mut(&probe.flow) {
                            record.tried_at_hop = true;
                            if self.ttl == self.options.traceroute.min_ttl {
                                record.predecessor = Some(self.src_addr);
                            }
                        }
                    }
                }
                if self.closed_at_hop.len() as u32 >= self.required_flows() && self.pending.is_empty() {
                    self.close_hop();
                }
            }
            AlgorithmEvent::ProbeTimeout { probe } => {
                self.pending.shift_remove(&probe.flow);
                let retries = self.retries.entry(probe.flow).or_insert(0);
                *retries += 1;
                if *retries > RETRY_BUDGET {
                    self.flow_exhausted = Some(FlowExhaustion {
                        ttl: self.ttl,
                        round: Round(usize::from(self.ttl)),
                    });
                    tracing::warn!(ttl = ?self.ttl, "giving up on a flow after retry budget exhausted");
                }
            }
        }
    }

    fn is_terminated(&self) -> bool {
        self.terminated
    }

    fn terminated_value(self) -> Self::Output {
        self.lattice
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0, 0.05 => 2)]
    #[test_case(1, 0.05 => 5)]
    #[test_case(2, 0.05 => 8)]
    #[test_case(3, 0.05 => 11)]
    fn stopping_rule_matches_worked_table(k: u32, bound: f64) -> u32 {
        stopping_rule(k, bound)
    }

    #[test]
    fn three_way_fan_requires_at_least_eleven_flows() {
        // spec §8 scenario 5: a 3-way fan at bound=0.05 must close only
        // after >= ceil(ln 0.05 / ln(3/4)) = 11 flows have been probed.
        assert!(stopping_rule(3, 0.05) >= 11);
    }
}
