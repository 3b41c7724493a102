//! Explicit, once-constructed option structs (spec §9 "Global options").
//!
//! Replaces the original's process-wide `options_traceroute_get_*`
//! accessors with plain values built once from the CLI and passed by
//! reference into each algorithm instance.

use crate::types::TimeToLive;

/// Options shared by classical traceroute and, minus `num_probes`, by MDA.
#[derive(Debug, Clone, Copy)]
pub struct TracerouteOptions {
    pub min_ttl: TimeToLive,
    pub max_ttl: TimeToLive,
    pub num_probes: usize,
    pub max_undiscovered: usize,
    pub do_resolv: bool,
}

impl Default for TracerouteOptions {
    fn default() -> Self {
        Self {
            min_ttl: TimeToLive(1),
            max_ttl: TimeToLive(30),
            num_probes: 3,
            max_undiscovered: 3,
            do_resolv: false,
        }
    }
}

/// MDA-specific options layered on top of the shared traceroute bounds
/// (spec §4.F); `traceroute.num_probes` is ignored by MDA, which instead
/// grows its per-hop flow count per the stopping rule.
#[derive(Debug, Clone, Copy)]
pub struct MdaOptions {
    pub traceroute: TracerouteOptions,
    pub bound: f64,
    pub max_branch: usize,
}

impl Default for MdaOptions {
    fn default() -> Self {
        Self {
            traceroute: TracerouteOptions::default(),
            bound: 0.05,
            max_branch: 16,
        }
    }
}
