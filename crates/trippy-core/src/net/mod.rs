//! Component B: the network layer.
//!
//! [`Network`] is the seam the event loop (component C) drives and the one
//! the dispatcher's tests swap out for a deterministic fake (spec §8 "Round
//! trip" and the end-to-end scenarios) -- grounded in
//! `zarkdav-trippy::tracing::net::Network`.

pub mod channel;

use crate::error::SendError;
use crate::probe::{IcmpPacketType, Probe};
use crate::types::{FlowId, Protocol};
use std::net::IpAddr;
use std::time::{Duration, SystemTime};

/// A parsed inbound probe response, already correlated to nothing yet --
/// the correlator (component D) is what maps this back to an outstanding
/// [`Probe`].
#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub kind: IcmpPacketType,
    pub responder: IpAddr,
    pub received: SystemTime,
    /// The subset of the quoted original packet's invariant tuple this
    /// response lets us read back (spec §4.D): enough to look the probe up
    /// in the correlator's table without the TTL, which is deliberately not
    /// part of the match.
    pub matched_flow: FlowId,
    pub matched_sequence: crate::types::Sequence,
}

/// Sends probes and receives their responses. One implementation talks to
/// real raw sockets ([`channel::TracerChannel`]); tests use a fake that
/// plays back a scripted sequence of responses.
///
/// `sim-tests` generates [`MockNetwork`] off this trait (`mockall`) so the
/// end-to-end scenarios of spec §8 can drive a real [`crate::algorithm::Dispatcher`]
/// against scripted, deterministic responses instead of a live socket.
#[cfg_attr(feature = "sim-tests", mockall::automock)]
pub trait Network {
    /// Send `probe`, stamping it with a send timestamp on success (spec
    /// §4.B).
    fn send(&mut self, probe: &Probe) -> Result<(), SendError>;

    /// Non-blocking poll for the next available response, if any.
    fn poll(&mut self, timeout: Duration) -> Option<ProbeResponse>;

    fn set_timeout(&mut self, timeout: Duration);

    fn set_verbose(&mut self, verbose: bool);
}

/// Protocol-specific parameters the network layer needs in order to build
/// and match probes, but which are set once per `AlgorithmInstance` rather
/// than per probe.
#[derive(Debug, Clone, Copy)]
pub struct NetworkConfig {
    pub src_addr: IpAddr,
    pub dst_addr: IpAddr,
    pub protocol: Protocol,
    pub identifier: crate::types::TraceId,
    pub src_port: crate::types::Port,
    pub dst_port: crate::types::Port,
    pub read_timeout: Duration,
}
