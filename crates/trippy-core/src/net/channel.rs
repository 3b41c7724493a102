//! A `Network` implementation backed by real raw sockets.
//!
//! Grounded in `zarkdav-trippy::tracing::net::channel::TracerChannel`
//! (per-protocol send sockets, one shared recv socket) and
//! `nc7s-trippy::icmp::net::IcmpChannel` (ICMP response parsing), combined
//! and generalised to also dispatch UDP probes through `trippy-packet`.

use crate::error::SocketError;
use crate::net::{Network, NetworkConfig, ProbeResponse};
use crate::probe::{IcmpPacketType, Probe};
use crate::types::{FlowId, FlowIdentity, Protocol, Sequence};
use socket2::{Domain, Protocol as SockProtocol, SockAddr, Socket, Type};
use std::io::{self, ErrorKind};
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, SystemTime};
use trippy_packet::icmp::{icmp_type, quoted_echo_request_v4, quoted_protocol_v4, quoted_udp_ports_v4, IcmpView};
use trippy_packet::ipv4::Ipv4View;
use trippy_packet::{Field, IcmpProbeBuilder, IpProtocol, ProbeBuilder, UdpProbeBuilder};

/// Generous upper bound on the IP datagrams we read back (spec §4.A/§4.B).
pub const MAX_PACKET_SIZE: usize = 1024;

/// A `Network` implementation that sends real ICMP/UDP probes over raw
/// sockets and parses real ICMP responses.
///
/// IPv6 probing shares the same wire logic at the `trippy-packet` layer but
/// is not wired up here yet; `connect` only opens IPv4 raw sockets.
pub struct TracerChannel {
    config: NetworkConfig,
    icmp_send: Socket,
    udp_send: Socket,
    recv: Socket,
    verbose: bool,
}

impl TracerChannel {
    /// Open the sockets needed for `config`.
    ///
    /// Requires `CAP_NET_RAW` (or administrator, on Windows) -- callers
    /// should check `trippy_privilege::discover()` first so a missing
    /// capability surfaces as `SocketError::PermissionDenied` with a clear
    /// diagnostic rather than a bare OS error from `socket(2)`.
    pub fn connect(config: NetworkConfig) -> Result<Self, SocketError> {
        let icmp_send = make_raw_socket(Domain::IPV4, SockProtocol::ICMPV4)?;
        let udp_send = make_raw_socket(Domain::IPV4, SockProtocol::UDP)?;
        let recv = make_raw_socket(Domain::IPV4, SockProtocol::ICMPV4)?;
        Ok(Self {
            config,
            icmp_send,
            udp_send,
            recv,
            verbose: false,
        })
    }

    fn dispatch_icmp(&mut self, probe: &Probe) -> Result<(), crate::error::SendError> {
        let mut req = IcmpProbeBuilder::new();
        req.set_field(Field::SrcPort(self.config.identifier.0)); // identifier
        req.set_field(Field::DstPort(probe.sequence.0)); // sequence
        req.set_field(Field::Ttl(probe.ttl.0));
        req.set_field(Field::Payload(vec![0; 8]));
        self.icmp_send.set_ttl(u32::from(req.ttl())).map_err(map_send_err)?;
        let dest = SockAddr::from(SocketAddr::new(self.config.dst_addr, 0));
        self.icmp_send.send_to(&req.to_bytes(), &dest).map_err(map_send_err)?;
        Ok(())
    }

    fn dispatch_udp(&mut self, probe: &Probe) -> Result<(), crate::error::SendError> {
        let dst_port = match probe.flow.identity {
            FlowIdentity::Udp { dst_port, .. } => dst_port,
            FlowIdentity::Icmp { .. } => self.config.dst_port.0,
        };
        let src_port = match probe.flow.identity {
            FlowIdentity::Udp { src_port, .. } => src_port,
            FlowIdentity::Icmp { .. } => self.config.src_port.0,
        };
        let mut udp = UdpProbeBuilder::new(self.config.src_addr, self.config.dst_addr);
        udp.fix_flow_fields(src_port, dst_port, &[0], None);
        udp.set_field(Field::Ttl(probe.ttl.0));
        self.udp_send.set_ttl(u32::from(udp.ttl())).map_err(map_send_err)?;
        let dest = SockAddr::from(SocketAddr::new(self.config.dst_addr, dst_port));
        self.udp_send.send_to(&udp.to_bytes(), &dest).map_err(map_send_err)?;
        Ok(())
    }

    /// Blocks on the recv socket for up to `timeout` (the dispatcher's
    /// timer-wheel deadline, spec §9) rather than spinning on a non-blocking
    /// read, so `Dispatcher::run`'s loop actually sleeps between events.
    fn recv_icmp(&mut self, timeout: Duration) -> Option<ProbeResponse> {
        // `SO_RCVTIMEO` of zero means "block forever" on some platforms;
        // round up so a near-expired timer still polls rather than stalls.
        let timeout = timeout.max(Duration::from_millis(1));
        if let Err(e) = self.recv.set_read_timeout(Some(timeout)) {
            if self.verbose {
                tracing::debug!(error = %e, "failed to set recv timeout");
            }
        }
        let mut buf = [0_u8; MAX_PACKET_SIZE];
        match io::Read::read(&mut self.recv, &mut buf) {
            Ok(len) => {
                let received = SystemTime::now();
                parse_icmp_response(&buf[..len], received)
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => None,
            Err(e) => {
                if self.verbose {
                    tracing::debug!(error = %e, "recv failed");
                }
                None
            }
        }
    }
}

/// Parses an inbound IPv4 packet containing an ICMP response of interest.
fn parse_icmp_response(ip_packet: &[u8], received: SystemTime) -> Option<ProbeResponse> {
    let ip_view = Ipv4View::new(ip_packet).ok()?;
    let icmp = IcmpView::new(ip_view.payload()).ok()?;
    let responder = IpAddr::V4(ip_view.src_addr());
    match icmp.icmp_type() {
        t if t == icmp_type::TIME_EXCEEDED_V4 => {
            quoted_response(IcmpPacketType::TimeExceeded, responder, received, icmp.payload())
        }
        t if t == icmp_type::DEST_UNREACHABLE_V4 => {
            quoted_response(IcmpPacketType::Unreachable, responder, received, icmp.payload())
        }
        t if t == icmp_type::ECHO_REPLY_V4 => Some(make_icmp_response(
            IcmpPacketType::EchoReply,
            responder,
            received,
            icmp.identifier(),
            icmp.sequence(),
        )),
        _ => None,
    }
}

/// Dispatches on the protocol of the packet quoted inside a `TimeExceeded` /
/// `DestinationUnreachable` payload: UDP probes need their port pair read
/// back, ICMP probes their identifier/sequence (spec §4.D).
fn quoted_response(kind: IcmpPacketType, responder: IpAddr, received: SystemTime, quoted: &[u8]) -> Option<ProbeResponse> {
    match quoted_protocol_v4(quoted).ok()? {
        p if p == IpProtocol::Udp as u8 => {
            let (src_port, dst_port) = quoted_udp_ports_v4(quoted).ok()?;
            Some(make_udp_response(kind, responder, received, src_port, dst_port))
        }
        p if p == IpProtocol::Icmp as u8 => {
            let (identifier, sequence) = quoted_echo_request_v4(quoted).ok()?;
            Some(make_icmp_response(kind, responder, received, identifier, sequence))
        }
        _ => None,
    }
}

/// Builds a [`ProbeResponse`] from a quoted ICMP echo request.
///
/// `matched_flow`'s address pair is filled in with the responder on both
/// sides as a placeholder; the correlator (component D) only reads
/// `identity` and `protocol` off of it; it rewrites `src_addr`/`dst_addr`
/// from the outstanding probe it matches against before comparing.
fn make_icmp_response(kind: IcmpPacketType, responder: IpAddr, received: SystemTime, identifier: u16, sequence: u16) -> ProbeResponse {
    ProbeResponse {
        kind,
        responder,
        received,
        matched_flow: FlowId {
            src_addr: responder,
            dst_addr: responder,
            protocol: Protocol::Icmp,
            identity: FlowIdentity::Icmp { identifier },
        },
        matched_sequence: Sequence(sequence),
    }
}

/// Builds a [`ProbeResponse`] from a quoted UDP header. UDP probes carry no
/// sequence number of their own; the dispatcher's correlator keys on the
/// port pair alone, so `matched_sequence` is always `0` here.
fn make_udp_response(kind: IcmpPacketType, responder: IpAddr, received: SystemTime, src_port: u16, dst_port: u16) -> ProbeResponse {
    ProbeResponse {
        kind,
        responder,
        received,
        matched_flow: FlowId {
            src_addr: responder,
            dst_addr: responder,
            protocol: Protocol::Udp,
            identity: FlowIdentity::Udp { src_port, dst_port },
        },
        matched_sequence: Sequence(0),
    }
}

impl Network for TracerChannel {
    fn send(&mut self, probe: &Probe) -> Result<(), crate::error::SendError> {
        match self.config.protocol {
            Protocol::Icmp => self.dispatch_icmp(probe),
            Protocol::Udp => self.dispatch_udp(probe),
        }
    }

    fn poll(&mut self, timeout: Duration) -> Option<ProbeResponse> {
        self.recv_icmp(timeout)
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.config.read_timeout = timeout;
    }

    fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }
}

fn make_raw_socket(domain: Domain, protocol: SockProtocol) -> Result<Socket, SocketError> {
    Socket::new(domain, Type::RAW, Some(protocol)).map_err(|e| match e.kind() {
        ErrorKind::PermissionDenied => SocketError::PermissionDenied(e),
        _ => SocketError::Unsupported(e.to_string()),
    })
}

fn map_send_err(e: io::Error) -> crate::error::SendError {
    match e.kind() {
        ErrorKind::PermissionDenied => crate::error::SendError::PermissionDenied,
        ErrorKind::WouldBlock => crate::error::SendError::WouldBlock,
        ErrorKind::NotConnected | ErrorKind::AddrNotAvailable => crate::error::SendError::NoRoute,
        _ => crate::error::SendError::Transient(e),
    }
}
