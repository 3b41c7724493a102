//! Command-line surface (spec §6).
//!
//! A thin `clap` derive struct; all validation beyond what `clap` can
//! express declaratively (the `-I`/`-U` conflict, MDA options paired with a
//! non-MDA algorithm) happens in [`crate::options::build`] once parsing has
//! succeeded, so a single `OptionError` taxonomy covers both.

use clap::{Parser, ValueEnum};

/// Algorithm selection (spec §6 `-a, --algorithm`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum Algorithm {
    ParisTraceroute,
    Mda,
}

/// Probe transport (spec §6 `-P, --protocol`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum Protocol {
    Udp,
    Icmp,
}

/// Output format (spec §6/§9): `Default` human-readable, `Json` streaming
/// array with header/footer, `Xml` reserved and always a stderr stub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
    Xml,
}

/// Structured log rendering (ambient, ties into `tracing-subscriber`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// A topology-discovery traceroute: classical hop-by-hop probing or
/// multipath discovery (MDA).
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// The host to trace, as an IP literal or a hostname to resolve.
    pub host: String,

    /// Force IPv4.
    #[arg(short = '4', long, conflicts_with = "ipv6")]
    pub ipv4: bool,

    /// Force IPv6.
    #[arg(short = '6', long, conflicts_with = "ipv4")]
    pub ipv6: bool,

    /// Algorithm to run.
    #[arg(short = 'a', long, value_enum, default_value_t = Algorithm::ParisTraceroute)]
    pub algorithm: Algorithm,

    /// UDP source port.
    #[arg(short = 's', long, default_value_t = 33456)]
    pub src_port: u16,

    /// UDP destination port (default 33457, or 53 under `-U` without an
    /// explicit `-d`).
    #[arg(short = 'd', long)]
    pub dst_port: Option<u16>,

    /// Transport used to build probes.
    #[arg(short = 'P', long, value_enum)]
    pub protocol: Option<Protocol>,

    /// Shortcut for `-P udp`.
    #[arg(short = 'U', long)]
    pub udp: bool,

    /// Shortcut for `-P icmp`.
    #[arg(short = 'I', long)]
    pub icmp: bool,

    /// Enable dispatcher diagnostics.
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// First hop to probe.
    #[arg(long, default_value_t = 1)]
    pub min_ttl: u8,

    /// Last hop to probe.
    #[arg(long, default_value_t = 30)]
    pub max_ttl: u8,

    /// Queries sent per hop (classical traceroute only).
    #[arg(long, default_value_t = 3)]
    pub num_queries: usize,

    /// Consecutive silent hops before giving up.
    #[arg(long, default_value_t = 3)]
    pub max_undiscovered: usize,

    /// Resolve each discovered interface's hostname.
    #[arg(long)]
    pub do_resolv: bool,

    /// MDA stopping-rule failure probability bound. Fatal `OptionError` if
    /// the selected algorithm is not `mda`.
    #[arg(long)]
    pub mda_bound: Option<f64>,

    /// MDA cap on hypothesised next-hops per interface. Fatal `OptionError`
    /// if the selected algorithm is not `mda`.
    #[arg(long)]
    pub mda_max_branch: Option<usize>,

    /// Per-probe network timeout.
    #[arg(long, default_value = "1s")]
    pub timeout: String,

    /// Output rendering.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Structured log rendering.
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}
