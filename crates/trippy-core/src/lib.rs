//! The flow-preserving probe dispatcher, the probe/reply correlator, the
//! classical traceroute and MDA algorithms, and the discovered-topology
//! lattice.
//!
//! This crate knows nothing about the command line, output formats or
//! name resolution; it is driven by [`algorithm::Dispatcher`] against a
//! [`net::Network`] implementation and returns plain data.

pub mod algorithm;
pub mod config;
pub mod correlator;
pub mod error;
pub mod event_loop;
pub mod lattice;
pub mod net;
pub mod probe;
pub mod types;

pub use algorithm::mda::Mda;
pub use algorithm::traceroute::Traceroute;
pub use algorithm::{AlgorithmEvent, AlgorithmInstance, Dispatcher, ProbeRequest};
pub use config::{MdaOptions, TracerouteOptions};
pub use error::{Diagnostic, SendError, SocketError, TraceError};
pub use lattice::{Interface, Lattice};
pub use net::channel::TracerChannel;
pub use net::{Network, NetworkConfig, ProbeResponse};
pub use probe::{EnrichedReply, IcmpPacketType, Probe, ProbeComplete};
pub use types::{FlowId, FlowIdentity, Port, Protocol, Round, Sequence, Tag, TimeToLive, TraceId};
