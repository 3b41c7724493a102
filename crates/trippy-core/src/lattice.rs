//! Component G: the discovered topology.
//!
//! A DAG of interfaces keyed by hop, grounded in `petgraph::graph::DiGraph`
//! the way `zarkdav-trippy::backend::Trace` accumulates `Hop`s, but
//! generalised from a flat per-hop list to a proper graph since MDA needs
//! to represent multiple interfaces per hop and the links between them
//! (spec §4.G).

use crate::error::CrossHopViolation;
use crate::types::TimeToLive;
use indexmap::IndexMap;
use petgraph::graph::{DiGraph, NodeIndex};
use std::net::IpAddr;

/// One discovered interface at a given hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interface {
    pub hop: TimeToLive,
    pub addr: IpAddr,
}

/// A DAG of discovered interfaces, built incrementally as probes complete.
///
/// Nodes are [`Interface`]s; an edge from `a` to `b` records that `b` was
/// observed to follow `a` by exactly one hop along some flow.
#[derive(Debug, Default)]
pub struct Lattice {
    graph: DiGraph<Interface, ()>,
    by_hop: IndexMap<TimeToLive, Vec<NodeIndex>>,
    by_addr: IndexMap<(TimeToLive, IpAddr), NodeIndex>,
}

impl Lattice {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `addr` as an interface at `hop`, returning its node index.
    /// Idempotent: re-adding the same `(hop, addr)` pair returns the
    /// existing node.
    pub fn add_interface(&mut self, hop: TimeToLive, addr: IpAddr) -> NodeIndex {
        if let Some(&idx) = self.by_addr.get(&(hop, addr)) {
            return idx;
        }
        let idx = self.graph.add_node(Interface { hop, addr });
        self.by_addr.insert((hop, addr), idx);
        self.by_hop.entry(hop).or_default().push(idx);
        idx
    }

    /// Record a link between an interface at hop `h` and one at hop `h+1`.
    ///
    /// Rejects a link whose second endpoint is not exactly one hop past the
    /// first (spec §4.G invariant); adding the same link twice is a no-op
    /// rather than a duplicate edge.
    pub fn add_link(&mut self, from: NodeIndex, to: NodeIndex) -> Result<(), CrossHopViolation> {
        let from_hop = self.graph[from].hop;
        let to_hop = self.graph[to].hop;
        if to_hop != from_hop.next() {
            return Err(CrossHopViolation {
                expected: from_hop.next(),
                actual: to_hop,
            });
        }
        if !self.graph.contains_edge(from, to) {
            self.graph.add_edge(from, to, ());
        }
        Ok(())
    }

    #[must_use]
    pub fn interfaces_at(&self, hop: TimeToLive) -> Vec<Interface> {
        self.by_hop
            .get(&hop)
            .map(|nodes| nodes.iter().map(|&n| self.graph[n]).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn successors(&self, node: NodeIndex) -> Vec<Interface> {
        self.graph.neighbors(node).map(|n| self.graph[n]).collect()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn max_hop(&self) -> Option<TimeToLive> {
        self.by_hop.keys().copied().max()
    }

    /// Visit every interface in hop order, lowest first, then by discovery
    /// order within a hop -- the shape an output sink walks to print a
    /// human-readable or structured trace.
    pub fn dump(&self) -> Vec<(TimeToLive, Vec<Interface>)> {
        let mut hops: Vec<_> = self.by_hop.keys().copied().collect();
        hops.sort_unstable();
        hops.into_iter().map(|hop| (hop, self.interfaces_at(hop))).collect()
    }

    /// The interfaces one hop past `(hop, addr)`, addressed by value rather
    /// than by `NodeIndex` -- the lookup an output sink needs when it is
    /// only holding what [`Self::dump`] handed back.
    #[must_use]
    pub fn successors_of(&self, hop: TimeToLive, addr: IpAddr) -> Vec<Interface> {
        self.by_addr
            .get(&(hop, addr))
            .map(|&idx| self.successors(idx))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn addr(n: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, n))
    }

    #[test]
    fn adding_the_same_interface_twice_is_idempotent() {
        let mut lattice = Lattice::new();
        let a = lattice.add_interface(TimeToLive(1), addr(1));
        let b = lattice.add_interface(TimeToLive(1), addr(1));
        assert_eq!(a, b);
        assert_eq!(lattice.node_count(), 1);
    }

    #[test]
    fn link_across_more_than_one_hop_is_rejected() {
        let mut lattice = Lattice::new();
        let a = lattice.add_interface(TimeToLive(1), addr(1));
        let c = lattice.add_interface(TimeToLive(3), addr(3));
        assert!(lattice.add_link(a, c).is_err());
    }

    #[test]
    fn diamond_topology_records_two_interfaces_per_hop() {
        let mut lattice = Lattice::new();
        let root = lattice.add_interface(TimeToLive(1), addr(1));
        let left = lattice.add_interface(TimeToLive(2), addr(2));
        let right = lattice.add_interface(TimeToLive(2), addr(3));
        let join = lattice.add_interface(TimeToLive(3), addr(4));
        lattice.add_link(root, left).unwrap();
        lattice.add_link(root, right).unwrap();
        lattice.add_link(left, join).unwrap();
        lattice.add_link(right, join).unwrap();
        assert_eq!(lattice.interfaces_at(TimeToLive(2)).len(), 2);
        assert_eq!(lattice.successors(root).len(), 2);
    }
}
