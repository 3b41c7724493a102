//! Hostname resolution for discovered [`Interface`](trippy_core-equivalent)
//! addresses, used when `--do-resolv` is passed.
//!
//! Two strategies, mirroring how interactive tracers avoid blocking the
//! event loop on DNS:
//!
//! - [`Resolver::Blocking`] performs a synchronous reverse lookup and is
//!   appropriate for the one-shot CLI output path (spec §6 `--do-resolv`).
//! - [`Resolver::Lazy`] kicks off the lookup on a background thread and
//!   returns `None` until it completes, so a long-running embedder (e.g. a
//!   TUI) never stalls its render loop on a slow PTR record.

use dns_lookup::lookup_addr;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::Resolver as HickoryResolver;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum ResolveError {
    #[error("resolution failed for {0}: {1}")]
    Failed(IpAddr, String),
    #[error("could not resolve host {0}: {1}")]
    NoSuchHost(String, String),
}

/// Forward-resolve the `host` CLI positional argument (spec §6) to a
/// concrete address, preferring IPv4 unless `prefer_ipv6` is set.
///
/// This is the one piece of "name resolution" the CLI needs even though
/// spec §1 scopes general name resolution out of the core: without it
/// `trip example.test` would have nothing to probe.
pub fn resolve_host(host: &str, prefer_ipv6: bool) -> Result<IpAddr, ResolveError> {
    if let Ok(addr) = host.parse::<IpAddr>() {
        return Ok(addr);
    }
    let resolver = HickoryResolver::new(ResolverConfig::default(), ResolverOpts::default())
        .map_err(|e| ResolveError::NoSuchHost(host.to_string(), e.to_string()))?;
    let response = resolver
        .lookup_ip(host)
        .map_err(|e| ResolveError::NoSuchHost(host.to_string(), e.to_string()))?;
    let mut addrs = response.iter();
    if prefer_ipv6 {
        addrs
            .clone()
            .find(IpAddr::is_ipv6)
            .or_else(|| addrs.next())
            .ok_or_else(|| ResolveError::NoSuchHost(host.to_string(), "no addresses".into()))
    } else {
        addrs
            .clone()
            .find(IpAddr::is_ipv4)
            .or_else(|| addrs.next())
            .ok_or_else(|| ResolveError::NoSuchHost(host.to_string(), "no addresses".into()))
    }
}

/// A hostname resolution strategy.
#[derive(Clone)]
pub enum Resolver {
    /// Resolve synchronously on the calling thread.
    Blocking,
    /// Resolve in the background; results become available on subsequent
    /// calls to [`Resolver::lookup`].
    Lazy(Arc<LazyResolver>),
}

impl Resolver {
    #[must_use]
    pub fn lazy() -> Self {
        Self::Lazy(Arc::new(LazyResolver::new()))
    }

    /// Look up the hostname for `addr`.
    ///
    /// For `Blocking`, always returns a result (or the underlying error).
    /// For `Lazy`, returns `Ok(None)` if the lookup has not yet completed;
    /// the caller is expected to poll again on a later hop/round.
    pub fn lookup(&self, addr: IpAddr) -> Result<Option<String>, ResolveError> {
        match self {
            Self::Blocking => lookup_addr(&addr)
                .map(Some)
                .map_err(|e| ResolveError::Failed(addr, e.to_string())),
            Self::Lazy(lazy) => Ok(lazy.poll(addr)),
        }
    }
}

/// Background-thread-backed resolver cache.
pub struct LazyResolver {
    cache: Arc<Mutex<HashMap<IpAddr, LookupState>>>,
    tx: Mutex<mpsc::Sender<IpAddr>>,
}

enum LookupState {
    Pending,
    Done(Option<String>),
}

impl LazyResolver {
    #[must_use]
    fn new() -> Self {
        let (tx, rx) = mpsc::channel::<IpAddr>();
        let cache: Arc<Mutex<HashMap<IpAddr, LookupState>>> = Arc::new(Mutex::new(HashMap::new()));
        let cache_worker = Arc::clone(&cache);
        thread::Builder::new()
            .name("trippy-dns-lazy".into())
            .spawn(move || {
                for addr in rx {
                    let name = lookup_addr(&addr).ok();
                    cache_worker.lock().insert(addr, LookupState::Done(name));
                }
            })
            .expect("failed to spawn lazy resolver thread");
        Self {
            cache,
            tx: Mutex::new(tx),
        }
    }

    fn poll(&self, addr: IpAddr) -> Option<String> {
        let mut cache = self.cache.lock();
        match cache.get(&addr) {
            Some(LookupState::Done(name)) => name.clone(),
            Some(LookupState::Pending) => None,
            None => {
                cache.insert(addr, LookupState::Pending);
                let _ = self.tx.lock().send(addr);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn blocking_resolver_returns_a_result() {
        let resolver = Resolver::Blocking;
        // localhost always resolves (or fails deterministically), either way
        // the call must not panic and must return a concrete Result.
        let res = resolver.lookup(IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert!(res.is_ok() || res.is_err());
    }

    #[test]
    fn lazy_resolver_starts_pending() {
        let resolver = Resolver::lazy();
        let first = resolver.lookup(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1))).unwrap();
        assert_eq!(first, None);
    }

    #[test]
    fn resolve_host_short_circuits_ip_literals() {
        let addr = resolve_host("192.0.2.7", false).unwrap();
        assert_eq!(addr, IpAddr::V4(Ipv4Addr::new(192, 0, 2, 7)));
    }
}
