//! Pluggable output sinks (spec §6/§9): `OutputSink` is the seam so a new
//! format can be added without touching either algorithm. `HumanSink` and
//! `JsonSink` are real; `XmlSink` is the reserved stub spec §6 calls for.

use comfy_table::{presets::UTF8_FULL, Table};
use serde::Serialize;
use std::io::Write;
use std::net::IpAddr;
use std::time::Duration;
use trippy_core::lattice::Interface;
use trippy_core::types::TimeToLive;

/// One outcome for a single query within a hop.
#[derive(Debug, Clone)]
pub enum HopOutcome {
    Reply { addr: IpAddr, hostname: Option<String>, delay: Duration },
    Star,
}

/// A discovered link between two interfaces one hop apart, as MDA's lattice
/// dumps it (spec §4.G `dump`).
#[derive(Debug, Clone, Copy)]
pub struct LinkRow {
    pub from: Interface,
    pub to: Interface,
}

/// The callback seam every rendering format implements.
pub trait OutputSink {
    /// Called once, before the first hop: spec §10's "Traceroute to HOST
    /// (IP), N hops max, SIZE bytes packets" banner, reshaped per format.
    fn on_start(&mut self, target: IpAddr, max_ttl: TimeToLive, packet_size: usize);

    /// One classical-traceroute row: `num_probes` outcomes for a single
    /// `ttl` (spec §4.E, monotonically increasing `ttl` per §8 invariant 4).
    fn on_hop_reply(&mut self, ttl: TimeToLive, outcomes: &[HopOutcome]);

    /// One MDA hop: every interface observed at `ttl` and the links leading
    /// to the next hop (spec §4.F `visitor` / §4.G `dump`).
    fn on_mda_hop(&mut self, ttl: TimeToLive, interfaces: &[Interface], links: &[LinkRow]);

    /// Called once after the run terminates (spec §9 `MDA_ENDS`/
    /// `ALGORITHM_TERMINATED` triggers the JSON footer here, cleanly, with
    /// no fallthrough into a default case).
    fn on_end(&mut self);
}

/// Human-readable `ttl  addr  rtt  rtt  rtt` rows (spec §6 default format).
pub struct HumanSink {
    table: Table,
}

impl HumanSink {
    #[must_use]
    pub fn new() -> Self {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        Self { table }
    }
}

impl Default for HumanSink {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputSink for HumanSink {
    fn on_start(&mut self, target: IpAddr, max_ttl: TimeToLive, packet_size: usize) {
        println!("traceroute to {target} ({target}), {} hops max, {packet_size} byte packets", max_ttl.0);
    }

    fn on_hop_reply(&mut self, ttl: TimeToLive, outcomes: &[HopOutcome]) {
        let mut row = vec![ttl.0.to_string()];
        let mut last_addr = None;
        for outcome in outcomes {
            match outcome {
                HopOutcome::Reply { addr, hostname, delay } => {
                    if last_addr != Some(*addr) {
                        let label = hostname.as_ref().map_or_else(|| addr.to_string(), |h| format!("{h} ({addr})"));
                        row.push(label);
                        last_addr = Some(*addr);
                    }
                    row.push(format!("{:.3} ms", delay.as_secs_f64() * 1000.0));
                }
                HopOutcome::Star => row.push("*".to_string()),
            }
        }
        self.table.add_row(row);
    }

    fn on_mda_hop(&mut self, ttl: TimeToLive, interfaces: &[Interface], links: &[LinkRow]) {
        let addrs: Vec<String> = interfaces.iter().map(|i| i.addr.to_string()).collect();
        let mut row = vec![ttl.0.to_string(), addrs.join(", ")];
        if links.is_empty() {
            row.push(String::new());
        } else {
            row.push(links.iter().map(|l| format!("{}->{}", l.from.addr, l.to.addr)).collect::<Vec<_>>().join(", "));
        }
        self.table.add_row(row);
    }

    fn on_end(&mut self) {
        println!("{}", self.table);
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum JsonRecord {
    Reply { ttl: u8, addr: IpAddr, hostname: Option<String>, rtt_ms: f64 },
    Star { ttl: u8 },
    Hop { ttl: u8, interfaces: Vec<IpAddr>, links: Vec<(IpAddr, IpAddr)> },
}

/// Streaming JSON array, header/footer written at construction/`on_end`
/// (spec §9): `[record, record, ...]`.
pub struct JsonSink<W: Write> {
    out: W,
    wrote_any: bool,
}

impl<W: Write> JsonSink<W> {
    pub fn new(mut out: W) -> Self {
        let _ = write!(out, "[");
        Self { out, wrote_any: false }
    }

    fn write_record(&mut self, record: &JsonRecord) {
        if self.wrote_any {
            let _ = write!(self.out, ",");
        }
        self.wrote_any = true;
        let _ = serde_json::to_writer(&mut self.out, record);
    }
}

impl<W: Write> OutputSink for JsonSink<W> {
    fn on_start(&mut self, _target: IpAddr, _max_ttl: TimeToLive, _packet_size: usize) {}

    fn on_hop_reply(&mut self, ttl: TimeToLive, outcomes: &[HopOutcome]) {
        for outcome in outcomes {
            let record = match outcome {
                HopOutcome::Reply { addr, hostname, delay } => JsonRecord::Reply {
                    ttl: ttl.0,
                    addr: *addr,
                    hostname: hostname.clone(),
                    rtt_ms: delay.as_secs_f64() * 1000.0,
                },
                HopOutcome::Star => JsonRecord::Star { ttl: ttl.0 },
            };
            self.write_record(&record);
        }
    }

    fn on_mda_hop(&mut self, ttl: TimeToLive, interfaces: &[Interface], links: &[LinkRow]) {
        let record = JsonRecord::Hop {
            ttl: ttl.0,
            interfaces: interfaces.iter().map(|i| i.addr).collect(),
            links: links.iter().map(|l| (l.from.addr, l.to.addr)).collect(),
        };
        self.write_record(&record);
    }

    fn on_end(&mut self) {
        let _ = write!(self.out, "]");
        let _ = self.out.flush();
    }
}

/// Reserved per spec §6/§9: accepted on the command line but always emits a
/// stderr notice instead of attempting to render, never silently falling
/// back to another format.
pub struct XmlSink {
    notified: bool,
}

impl XmlSink {
    #[must_use]
    pub fn new() -> Self {
        Self { notified: false }
    }

    fn notify_once(&mut self) {
        if !self.notified {
            eprintln!("trip: --output xml is not yet implemented");
            self.notified = true;
        }
    }
}

impl Default for XmlSink {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputSink for XmlSink {
    fn on_start(&mut self, _target: IpAddr, _max_ttl: TimeToLive, _packet_size: usize) {
        self.notify_once();
    }

    fn on_hop_reply(&mut self, _ttl: TimeToLive, _outcomes: &[HopOutcome]) {
        self.notify_once();
    }

    fn on_mda_hop(&mut self, _ttl: TimeToLive, _interfaces: &[Interface], _links: &[LinkRow]) {
        self.notify_once();
    }

    fn on_end(&mut self) {
        self.notify_once();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn json_sink_emits_a_well_formed_array() {
        let mut buf = Vec::new();
        {
            let mut sink = JsonSink::new(&mut buf);
            sink.on_hop_reply(
                TimeToLive(1),
                &[HopOutcome::Reply {
                    addr: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
                    hostname: None,
                    delay: Duration::from_millis(5),
                }],
            );
            sink.on_hop_reply(TimeToLive(2), &[HopOutcome::Star]);
            sink.on_end();
        }
        let text = String::from_utf8(buf).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 2);
    }

    #[test]
    fn empty_json_array_is_still_valid() {
        let mut buf = Vec::new();
        {
            let mut sink = JsonSink::new(&mut buf);
            sink.on_end();
        }
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "[]");
    }
}
