//! Turns parsed [`Args`] into the explicit option values spec §9 calls for:
//! a `TracerouteOptions`/`MdaOptions` pair built once and passed by
//! reference into each algorithm instance, replacing the original's
//! process-wide `options_traceroute_get_*` accessors.

use crate::args::{Algorithm, Args, Protocol as ArgProtocol};
use crate::error::OptionError;
use std::time::Duration;
use trippy_core::config::{MdaOptions, TracerouteOptions};
use trippy_core::types::{Port, Protocol, TimeToLive, TraceId};

/// Everything the run loop needs, resolved once from [`Args`] (spec §9
/// "Global options").
#[derive(Debug, Clone)]
pub struct ResolvedOptions {
    pub algorithm: Algorithm,
    pub protocol: Protocol,
    pub force_ipv4: bool,
    pub force_ipv6: bool,
    pub src_port: Port,
    pub dst_port: Port,
    pub identifier: TraceId,
    pub traceroute: TracerouteOptions,
    pub mda: MdaOptions,
    pub timeout: Duration,
    pub verbose: bool,
    pub do_resolv: bool,
}

/// Validate and resolve `args` into [`ResolvedOptions`], or a fatal
/// `OptionError` (spec §6: "Passing MDA options while the selected
/// algorithm is not `mda` is a fatal option error"; §9 resolves the
/// `-I`/`-U` ambiguity the original left unchecked as fatal too).
pub fn build(args: &Args) -> Result<ResolvedOptions, OptionError> {
    if args.icmp && args.udp {
        return Err(OptionError::ConflictingProtocol);
    }
    if (args.mda_bound.is_some() || args.mda_max_branch.is_some()) && args.algorithm != Algorithm::Mda {
        return Err(OptionError::MdaOptionsWithoutMda);
    }
    if let Some(bound) = args.mda_bound {
        if !(bound > 0.0 && bound < 1.0) {
            return Err(OptionError::BoundOutOfRange(bound));
        }
    }
    if args.min_ttl == 0 || args.min_ttl > args.max_ttl {
        return Err(OptionError::TtlRangeInverted {
            min: args.min_ttl,
            max: args.max_ttl,
        });
    }

    let protocol = resolve_protocol(args);
    let dst_port = args.dst_port.unwrap_or(match protocol {
        // spec §8 scenario 6: `-U` without `-d` targets port 53.
        Protocol::Udp if args.udp => 53,
        _ => 33457,
    });

    let traceroute = TracerouteOptions {
        min_ttl: TimeToLive(args.min_ttl),
        max_ttl: TimeToLive(args.max_ttl),
        num_probes: args.num_queries,
        max_undiscovered: args.max_undiscovered,
        do_resolv: args.do_resolv,
    };
    let mda = MdaOptions {
        traceroute,
        bound: args.mda_bound.unwrap_or(0.05),
        max_branch: args.mda_max_branch.unwrap_or(16),
    };

    let timeout =
        humantime::parse_duration(&args.timeout).map_err(|_| OptionError::InvalidTimeout(args.timeout.clone()))?;

    Ok(ResolvedOptions {
        algorithm: args.algorithm,
        protocol,
        force_ipv4: args.ipv4,
        force_ipv6: args.ipv6,
        src_port: Port(args.src_port),
        dst_port: Port(dst_port),
        identifier: TraceId(std::process::id() as u16),
        traceroute,
        mda,
        timeout,
        verbose: args.verbose,
        do_resolv: args.do_resolv,
    })
}

fn resolve_protocol(args: &Args) -> Protocol {
    if args.icmp {
        return Protocol::Icmp;
    }
    if args.udp {
        return Protocol::Udp;
    }
    match args.protocol {
        Some(ArgProtocol::Icmp) => Protocol::Icmp,
        Some(ArgProtocol::Udp) | None => Protocol::Udp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(argv: &[&str]) -> Args {
        Args::parse_from(std::iter::once("trip").chain(argv.iter().copied()))
    }

    #[test]
    fn icmp_and_udp_together_is_a_fatal_option_error() {
        let args = parse(&["-I", "-U", "example.test"]);
        assert!(matches!(build(&args), Err(OptionError::ConflictingProtocol)));
    }

    #[test]
    fn mda_options_without_mda_algorithm_is_fatal() {
        let args = parse(&["--mda-bound", "0.1", "example.test"]);
        assert!(matches!(build(&args), Err(OptionError::MdaOptionsWithoutMda)));
    }

    #[test]
    fn udp_without_explicit_dst_port_defaults_to_53() {
        let args = parse(&["-U", "example.test"]);
        let resolved = build(&args).unwrap();
        assert_eq!(resolved.dst_port, Port(53));
        assert_eq!(resolved.src_port, Port(33456));
        assert_eq!(resolved.protocol, Protocol::Udp);
        assert_eq!(resolved.algorithm, Algorithm::ParisTraceroute);
    }

    #[test]
    fn plain_udp_with_explicit_dst_port_is_honoured() {
        let args = parse(&["-U", "-d", "80", "example.test"]);
        let resolved = build(&args).unwrap();
        assert_eq!(resolved.dst_port, Port(80));
    }

    #[test]
    fn inverted_ttl_range_is_rejected() {
        let args = parse(&["--min-ttl", "10", "--max-ttl", "5", "example.test"]);
        assert!(matches!(
            build(&args),
            Err(OptionError::TtlRangeInverted { min: 10, max: 5 })
        ));
    }
}
