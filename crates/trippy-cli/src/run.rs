//! Wires the resolved options, privilege check, network layer and selected
//! algorithm together and drives them to completion against an
//! [`OutputSink`] (spec §9 "Cyclic event structure": the CLI owns the
//! `Dispatcher`, algorithms never see the output stage directly).

use crate::args::Algorithm;
use crate::error::{AddressError, CliError};
use crate::options::ResolvedOptions;
use crate::output::{HopOutcome, LinkRow, OutputSink};
use std::net::{IpAddr, SocketAddr, UdpSocket};
use trippy_core::algorithm::mda::Mda;
use trippy_core::algorithm::traceroute::Traceroute;
use trippy_core::algorithm::{AlgorithmInstance, Dispatcher};
use trippy_core::net::channel::TracerChannel;
use trippy_core::net::{Network, NetworkConfig};
use trippy_core::types::{FlowId, FlowIdentity, Protocol};
use trippy_dns::Resolver;

/// Resolve `host` to a concrete address honouring `-4`/`-6`/auto-guess
/// (spec §6, supplemented from `original_source/`'s `address_guess_family`).
fn resolve_target(host: &str, force_v4: bool, force_v6: bool) -> Result<IpAddr, AddressError> {
    if let Ok(literal) = host.parse::<IpAddr>() {
        if (force_v4 && literal.is_ipv6()) || (force_v6 && literal.is_ipv4()) {
            return Err(AddressError::BadLiteral(host.to_string()));
        }
        return Ok(literal);
    }
    let resolved = trippy_dns::resolve_host(host, force_v6).map_err(|e| AddressError::ResolveFailed(host.to_string(), e))?;
    if (force_v4 && resolved.is_ipv6()) || (force_v6 && resolved.is_ipv4()) {
        return Err(AddressError::NoFamilyGuess(host.to_string()));
    }
    Ok(resolved)
}

/// Discover the local source address the kernel would pick to reach `dst`,
/// via the standard UDP-connect trick (no packet is actually sent: `connect`
/// on a UDP socket only consults the routing table).
fn local_source_addr(dst: IpAddr) -> IpAddr {
    let bind_addr = if dst.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
    UdpSocket::bind(bind_addr)
        .and_then(|socket| {
            socket.connect(SocketAddr::new(dst, 9))?;
            socket.local_addr()
        })
        .map(|addr| addr.ip())
        .unwrap_or(dst)
}

/// Run the selected algorithm against `opts` and render its result through
/// `sink`. Returns once the algorithm reports `ALGORITHM_TERMINATED`.
pub fn run(host: &str, opts: &ResolvedOptions, sink: &mut dyn OutputSink) -> Result<(), CliError> {
    trippy_privilege::discover()?.require()?;

    let dst_addr = resolve_target(host, opts.force_ipv4, opts.force_ipv6)?;
    let src_addr = local_source_addr(dst_addr);

    let config = NetworkConfig {
        src_addr,
        dst_addr,
        protocol: opts.protocol,
        identifier: opts.identifier,
        src_port: opts.src_port,
        dst_port: opts.dst_port,
        read_timeout: opts.timeout,
    };
    let mut channel = TracerChannel::connect(config)?;
    channel.set_timeout(opts.timeout);
    channel.set_verbose(opts.verbose);

    // The one-shot CLI path renders each hop exactly once, so a lazy
    // (poll-and-return-`None`-until-ready) resolver would never have a
    // hostname by the time it's needed; block instead (trippy_dns::Resolver).
    let resolver = opts.do_resolv.then_some(Resolver::Blocking);
    sink.on_start(dst_addr, opts.traceroute.max_ttl, trippy_packet::udp::HEADER_LEN);

    let mut dispatcher = Dispatcher::new(channel, opts.timeout);
    match opts.algorithm {
        Algorithm::ParisTraceroute => {
            let flow = FlowId {
                src_addr,
                dst_addr,
                protocol: opts.protocol,
                identity: match opts.protocol {
                    Protocol::Udp => FlowIdentity::Udp {
                        src_port: opts.src_port.0,
                        dst_port: opts.dst_port.0,
                    },
                    Protocol::Icmp => FlowIdentity::Icmp {
                        identifier: opts.identifier.0,
                    },
                },
            };
            let algorithm = Traceroute::new(dst_addr, flow, opts.traceroute);
            let per_hop = dispatcher.run(algorithm);
            for (ttl, replies) in per_hop {
                let outcomes: Vec<HopOutcome> = replies
                    .into_iter()
                    .map(|reply| match reply {
                        Some(enriched) => {
                            let hostname = resolver
                                .as_ref()
                                .and_then(|r| r.lookup(enriched.reply.host).ok().flatten());
                            HopOutcome::Reply {
                                addr: enriched.reply.host,
                                hostname,
                                delay: enriched.delay,
                            }
                        }
                        None => HopOutcome::Star,
                    })
                    .collect();
                sink.on_hop_reply(ttl, &outcomes);
            }
        }
        Algorithm::Mda => {
            let algorithm = Mda::new(dst_addr, src_addr, opts.src_port.0, opts.mda);
            let lattice = dispatcher.run(algorithm);
            for (ttl, interfaces) in lattice.dump() {
                let links: Vec<LinkRow> = interfaces
                    .iter()
                    .flat_map(|iface| {
                        lattice
                            .successors_of(ttl, iface.addr)
                            .into_iter()
                            .map(|to| LinkRow { from: *iface, to })
                    })
                    .collect();
                sink.on_mda_hop(ttl, &interfaces, &links);
            }
        }
    }
    sink.on_end();
    Ok(())
}
