//! The event loop ↔ algorithm boundary and the dispatcher that ties the
//! network layer, event loop and correlator together behind it.
//!
//! Grounded in spec §9's "cyclic event structure" note: algorithms push
//! probe requests, the dispatcher pushes events back, modelled as
//! message-passing rather than back-pointers so neither side needs shared
//! ownership of the other.

pub mod mda;
pub mod traceroute;

use crate::correlator::Correlator;
use crate::event_loop::{Event, EventLoop};
use crate::net::{Network, ProbeResponse};
use crate::probe::Probe;
use crate::types::{FlowId, Round, Sequence, Tag, TimeToLive};
use std::time::{Duration, SystemTime};

/// What an algorithm asks the dispatcher to send on its behalf. Carries
/// everything the algorithm controls about flow stability; the dispatcher
/// alone assigns the per-probe tag and the send timestamp (spec §4.B), so
/// "every in-flight probe has a unique tag" (spec §3) stays true by
/// construction rather than by algorithm discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeRequest {
    pub flow: FlowId,
    pub ttl: TimeToLive,
    pub sequence: Sequence,
    pub round: Round,
}

/// An event delivered to an algorithm instance (spec §4.D `PROBE_REPLY`,
/// `PROBE_TIMEOUT`).
#[derive(Debug, Clone)]
pub enum AlgorithmEvent {
    ProbeReply { probe: Probe, response: ProbeResponse },
    ProbeTimeout { probe: Probe },
}

/// The `{advance, on_event, terminated_value}` capability set shared by
/// classical traceroute and MDA (spec §9 "Polymorphic algorithm instance").
pub trait AlgorithmInstance {
    type Output;

    /// Requests for probes to send this round, up to whatever outstanding
    /// cap the instance enforces internally (spec §5 backpressure). Called
    /// once before the loop starts and again after each delivered event.
    fn advance(&mut self) -> Vec<ProbeRequest>;

    /// Delivers one event and updates internal state accordingly.
    fn on_event(&mut self, event: AlgorithmEvent);

    fn is_terminated(&self) -> bool;

    /// Consumes the instance for its final result. Only meaningful once
    /// `is_terminated()` holds.
    fn terminated_value(self) -> Self::Output;
}

/// Owns the network layer, event loop and correlator, and drives any
/// [`AlgorithmInstance`] to completion against them.
pub struct Dispatcher<N> {
    net: N,
    timers: EventLoop<()>,
    correlator: Correlator,
    timeout: Duration,
    next_tag: u64,
}

impl<N: Network> Dispatcher<N> {
    #[must_use]
    pub fn new(net: N, timeout: Duration) -> Self {
        Self {
            net,
            timers: EventLoop::new(),
            correlator: Correlator::new(),
            timeout,
            next_tag: 1,
        }
    }

    /// Runs `algorithm` to completion, returning its final output (spec
    /// §4.C `run()`: "No work may outlive `run()`").
    pub fn run<A: AlgorithmInstance>(&mut self, mut algorithm: A) -> A::Output {
        for request in algorithm.advance() {
            self.dispatch(&mut algorithm, request);
        }
        while !algorithm.is_terminated() {
            // Sleep only until the earliest outstanding timer, not the full
            // per-probe timeout, so a reply that arrives well before any
            // probe is due to expire is serviced promptly (spec §9
            // "cooperative event loop").
            let poll_timeout = self.timers.next_deadline().unwrap_or(self.timeout);
            if let Some(response) = self.net.poll(poll_timeout) {
                self.handle_response(&mut algorithm, &response);
            }
            while let Some(Event::TimerExpired(tag)) = self.timers.poll() {
                if let Some(probe) = self.correlator.take_by_tag(tag) {
                    algorithm.on_event(AlgorithmEvent::ProbeTimeout { probe });
                }
            }
            for request in algorithm.advance() {
                self.dispatch(&mut algorithm, request);
            }
        }
        algorithm.terminated_value()
    }

    fn handle_response<A: AlgorithmInstance>(&mut self, algorithm: &mut A, response: &ProbeResponse) {
        match self.correlator.resolve(response) {
            Some(probe) => {
                self.timers.cancel(probe.tag);
                algorithm.on_event(AlgorithmEvent::ProbeReply {
                    probe,
                    response: response.clone(),
                });
            }
            None => self.correlator.note_unmatched(),
        }
    }

    /// Sends `request` and either tracks it as outstanding or, on a
    /// terminal send failure, retires it immediately with a `PROBE_TIMEOUT`
    /// so the algorithm never waits forever on a probe that was never sent
    /// (spec §7: "others retire the probe with `PROBE_TIMEOUT` and a
    /// recorded cause").
    fn dispatch<A: AlgorithmInstance>(&mut self, algorithm: &mut A, request: ProbeRequest) {
        let tag = Tag(self.next_tag);
        self.next_tag += 1;
        let mut probe = Probe::new(tag, request.sequence, request.flow, request.ttl, request.round, SystemTime::now());
        match self.net.send(&probe) {
            Ok(()) => {
                probe.sent = SystemTime::now();
                self.timers.schedule(tag, self.timeout);
                self.correlator.track(probe);
            }
            Err(e) if e.is_retryable() => {
                tracing::debug!(error = %e, ttl = ?probe.ttl, "retrying probe send once");
                match self.net.send(&probe) {
                    Ok(()) => {
                        probe.sent = SystemTime::now();
                        self.timers.schedule(tag, self.timeout);
                        self.correlator.track(probe);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, ttl = ?probe.ttl, "retiring probe after retry failed");
                        algorithm.on_event(AlgorithmEvent::ProbeTimeout { probe });
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, ttl = ?probe.ttl, "retiring probe, send failed");
                algorithm.on_event(AlgorithmEvent::ProbeTimeout { probe });
            }
        }
    }
}
