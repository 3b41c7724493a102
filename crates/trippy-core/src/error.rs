//! Error taxonomy (spec §7).

use crate::types::{Round, Tag, TimeToLive};
use std::net::IpAddr;
use thiserror::Error;

/// Errors raised opening or configuring the raw sockets.
#[derive(Debug, Error)]
pub enum SocketError {
    #[error("permission denied opening raw socket: {0}")]
    PermissionDenied(#[source] std::io::Error),
    #[error("raw sockets are not supported on this platform: {0}")]
    Unsupported(String),
    #[error("transient socket error: {0}")]
    Transient(#[source] std::io::Error),
}

/// Errors raised sending a single probe (spec §4.B).
#[derive(Debug, Error)]
pub enum SendError {
    #[error("no route to host")]
    NoRoute,
    #[error("permission denied")]
    PermissionDenied,
    #[error("send would block")]
    WouldBlock,
    #[error("transient send failure: {0}")]
    Transient(#[source] std::io::Error),
}

impl SendError {
    /// Whether the dispatcher should retry this send once (spec §7).
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::WouldBlock)
    }
}

/// `add_link` rejects a link whose second endpoint is not at `hop + 1`
/// (spec §4.G).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("link endpoint at hop {actual:?} is not hop+1 of {expected:?}")]
pub struct CrossHopViolation {
    pub expected: TimeToLive,
    pub actual: TimeToLive,
}

/// MDA could not mint a fresh, as-yet-unused flow id at a hop after a small
/// constant number of retries (spec §4.F).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("could not mint a fresh flow at ttl {ttl:?} for round {round:?} after retry budget")]
pub struct FlowExhaustion {
    pub ttl: TimeToLive,
    pub round: Round,
}

/// A violation of a §3 data-model invariant. Always a programming bug;
/// never user-triggerable, and therefore fatal rather than recoverable.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("internal invariant violated: {0}")]
pub struct InternalInvariant(pub &'static str);

/// Top-level error returned from running an algorithm instance to
/// completion.
#[derive(Debug, Error)]
pub enum TraceError {
    #[error(transparent)]
    Socket(#[from] SocketError),
    #[error(transparent)]
    Privilege(#[from] trippy_privilege::PrivilegeError),
    #[error(transparent)]
    Invariant(#[from] InternalInvariant),
    #[error("duplicate tag {0:?} observed among outstanding probes")]
    DuplicateTag(Tag),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// A diagnostic note attached to an output event without aborting the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnostic {
    UnmatchedReply { addr: IpAddr },
    FlowExhausted(FlowExhaustion),
}
