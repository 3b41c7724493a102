//! Deterministic end-to-end scenarios (spec §8) driving a real
//! [`Dispatcher`] against [`MockNetwork`], a `mockall`-generated fake over
//! [`Network`] that answers each sent probe according to a pure function of
//! its hop and flow rather than a real socket. Scenario 5 (the 3-way fan's
//! flow-count lower bound) is covered directly against the stopping-rule
//! table in `algorithm::mda`'s unit tests; scenario 6 (`-U` without `-d`) is
//! a CLI concern covered in `trippy-cli::options`'s tests.

#![cfg(feature = "sim-tests")]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr};
use std::rc::Rc;
use std::time::{Duration, SystemTime};

use trippy_core::algorithm::mda::Mda;
use trippy_core::algorithm::traceroute::Traceroute;
use trippy_core::algorithm::Dispatcher;
use trippy_core::config::{MdaOptions, TracerouteOptions};
use trippy_core::net::{MockNetwork, ProbeResponse};
use trippy_core::probe::{IcmpPacketType, Probe};
use trippy_core::types::{FlowId, FlowIdentity, Protocol, TimeToLive};

fn ip(n: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(10, 0, 0, n))
}

fn flow_udp(src_addr: IpAddr, dst_addr: IpAddr, src_port: u16, dst_port: u16) -> FlowId {
    FlowId {
        src_addr,
        dst_addr,
        protocol: Protocol::Udp,
        identity: FlowIdentity::Udp { src_port, dst_port },
    }
}

fn flow_icmp(src_addr: IpAddr, dst_addr: IpAddr, identifier: u16) -> FlowId {
    FlowId {
        src_addr,
        dst_addr,
        protocol: Protocol::Icmp,
        identity: FlowIdentity::Icmp { identifier },
    }
}

/// Builds a [`MockNetwork`] whose `send` immediately decides, via
/// `responder`, whether the probe is answered (and by whom) or silently
/// dropped (a timeout the real [`trippy_core::event_loop::EventLoop`] timer
/// will eventually raise). `responder` must be a pure function of the probe
/// -- nothing here simulates reordering or delay, since the scenarios in
/// spec §8 only assert on the final per-hop/lattice shape, not on timing.
fn scripted_network(
    responder: impl Fn(&Probe) -> Option<(IpAddr, IcmpPacketType)> + 'static,
) -> MockNetwork {
    let ready: Rc<RefCell<VecDeque<ProbeResponse>>> = Rc::new(RefCell::new(VecDeque::new()));

    let mut net = MockNetwork::new();

    let ready_send = Rc::clone(&ready);
    net.expect_send().times(..).returning(move |probe: &Probe| {
        if let Some((responder_addr, kind)) = responder(probe) {
            ready_send.borrow_mut().push_back(ProbeResponse {
                kind,
                responder: responder_addr,
                received: SystemTime::now(),
                matched_flow: probe.flow,
                matched_sequence: probe.sequence,
            });
        }
        Ok(())
    });

    let ready_poll = Rc::clone(&ready);
    net.expect_poll()
        .times(..)
        .returning(move |_timeout| ready_poll.borrow_mut().pop_front());

    net.expect_set_timeout().times(..).returning(|_| {});
    net.expect_set_verbose().times(..).returning(|_| {});
    net
}

#[test]
fn linear_path_classical_traceroute_ends_at_the_destination() {
    let src = ip(1);
    let hop1 = ip(2);
    let hop2 = ip(3);
    let dst = ip(4);

    let net = scripted_network(move |probe| {
        let addr = match probe.ttl.0 {
            1 => hop1,
            2 => hop2,
            _ => dst,
        };
        let kind = if addr == dst { IcmpPacketType::Unreachable } else { IcmpPacketType::TimeExceeded };
        Some((addr, kind))
    });

    let flow = flow_udp(src, dst, 33456, 33457);
    let options = TracerouteOptions {
        min_ttl: TimeToLive(1),
        max_ttl: TimeToLive(5),
        num_probes: 3,
        max_undiscovered: 3,
        do_resolv: false,
    };
    let mut dispatcher = Dispatcher::new(net, Duration::from_millis(20));
    let per_hop = dispatcher.run(Traceroute::new(dst, flow, options));

    assert_eq!(per_hop.len(), 3);
    let last_ttl = *per_hop.keys().max().unwrap();
    assert_eq!(last_ttl, TimeToLive(3));
    let last_row = &per_hop[&last_ttl];
    assert_eq!(last_row.len(), 3);
    assert!(last_row.iter().all(|r| r.as_ref().is_some_and(|r| r.reply.host == dst)));
}

#[test]
fn a_single_silent_hop_is_reported_as_stars_and_the_path_continues() {
    let src = ip(1);
    let hop1 = ip(2);
    let dst = ip(3);

    let net = scripted_network(move |probe| match probe.ttl.0 {
        1 => Some((hop1, IcmpPacketType::TimeExceeded)),
        2 => None, // every probe at this hop times out
        _ => Some((dst, IcmpPacketType::Unreachable)),
    });

    let flow = flow_udp(src, dst, 33456, 33457);
    let options = TracerouteOptions {
        min_ttl: TimeToLive(1),
        max_ttl: TimeToLive(5),
        num_probes: 3,
        max_undiscovered: 3,
        do_resolv: false,
    };
    let mut dispatcher = Dispatcher::new(net, Duration::from_millis(15));
    let per_hop = dispatcher.run(Traceroute::new(dst, flow, options));

    assert_eq!(per_hop.len(), 3);
    let silent_hop = &per_hop[&TimeToLive(2)];
    assert!(silent_hop.iter().all(Option::is_none), "ttl 2 must be all stars");
    let last_row = &per_hop[&TimeToLive(3)];
    assert!(last_row.iter().all(|r| r.as_ref().is_some_and(|r| r.reply.host == dst)));
}

#[test]
fn icmp_echo_reply_from_the_destination_terminates_classical_traceroute_immediately() {
    let src = ip(1);
    let dst = ip(9);
    let identifier = 4242_u16;

    let net = scripted_network(move |probe| {
        let addr = match probe.ttl.0 {
            1 => ip(2),
            2 => ip(3),
            3 => ip(4),
            _ => dst,
        };
        let kind = if addr == dst { IcmpPacketType::EchoReply } else { IcmpPacketType::TimeExceeded };
        Some((addr, kind))
    });

    let flow = flow_icmp(src, dst, identifier);
    let options = TracerouteOptions {
        min_ttl: TimeToLive(1),
        max_ttl: TimeToLive(10),
        num_probes: 3,
        max_undiscovered: 3,
        do_resolv: false,
    };
    let mut dispatcher = Dispatcher::new(net, Duration::from_millis(20));
    let per_hop = dispatcher.run(Traceroute::new(dst, flow, options));

    assert_eq!(per_hop.len(), 4);
    assert_eq!(*per_hop.keys().max().unwrap(), TimeToLive(4));
    let final_row = &per_hop[&TimeToLive(4)];
    assert!(final_row.iter().all(|r| r.as_ref().is_some_and(|r| r.reply.host == dst)));
}

/// Scenario 3 (spec §8): a symmetric diamond `src -> A -> {B, C} -> D`, `D`
/// being the destination. Every flow is routed to `A` at hop 1 and to `D` at
/// hop 3; at hop 2 a flow lands on `B` or `C` depending on the parity of the
/// minted destination port, standing in for an ECMP hash that a real router
/// would apply.
#[test]
fn symmetric_diamond_mda_discovers_both_branches_and_their_join() {
    let src = ip(1);
    let a = ip(2);
    let b = ip(3);
    let c = ip(4);
    let dst = ip(5);

    let net = scripted_network(move |probe| {
        let addr = match probe.ttl.0 {
            1 => a,
            2 => {
                let dst_port = match probe.flow.identity {
                    FlowIdentity::Udp { dst_port, .. } => dst_port,
                    FlowIdentity::Icmp { .. } => 0,
                };
                if dst_port % 2 == 0 {
                    b
                } else {
                    c
                }
            }
            _ => dst,
        };
        let kind = if addr == dst { IcmpPacketType::Unreachable } else { IcmpPacketType::TimeExceeded };
        Some((addr, kind))
    });

    let traceroute = TracerouteOptions {
        min_ttl: TimeToLive(1),
        max_ttl: TimeToLive(6),
        num_probes: 3,
        max_undiscovered: 3,
        do_resolv: false,
    };
    let mda_options = MdaOptions { traceroute, bound: 0.05, max_branch: 16 };
    let mut dispatcher = Dispatcher::new(net, Duration::from_millis(20));
    let lattice = dispatcher.run(Mda::new(dst, src, 33456, mda_options));

    let hop1: Vec<_> = lattice.interfaces_at(TimeToLive(1)).into_iter().map(|i| i.addr).collect();
    assert_eq!(hop1, vec![a]);

    let mut hop2: Vec<_> = lattice.interfaces_at(TimeToLive(2)).into_iter().map(|i| i.addr).collect();
    hop2.sort();
    let mut expected_hop2 = vec![b, c];
    expected_hop2.sort();
    assert_eq!(hop2, expected_hop2, "both branches of the diamond must be discovered");

    let hop3: Vec<_> = lattice.interfaces_at(TimeToLive(3)).into_iter().map(|i| i.addr).collect();
    assert_eq!(hop3, vec![dst]);

    let mut a_successors: Vec<_> = lattice.successors_of(TimeToLive(1), a).into_iter().map(|i| i.addr).collect();
    a_successors.sort();
    assert_eq!(a_successors, expected_hop2, "A must link to both B and C");

    for branch in [b, c] {
        let successors: Vec<_> = lattice.successors_of(TimeToLive(2), branch).into_iter().map(|i| i.addr).collect();
        assert_eq!(successors, vec![dst], "{branch} must join back at the destination");
    }
}
