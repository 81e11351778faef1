//! Pool-wide capacity accounting and per-host bookkeeping.
//!
//! Socket-level connection reuse, scheme handling, and stale-socket
//! revalidation all live inside the transport. What the transport does not
//! expose are the caps this utility promises (a bound on requests in flight
//! across the pool and per host) and the keep-alive bookkeeping that decides
//! when a host's idle state is no longer trustworthy. Both are enforced here.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Enforces the pool-wide and per-host in-flight caps.
///
/// A caller must hold a [`Lease`] for the duration of its request; acquiring
/// one waits at most the request's lease timeout before giving up.
pub(crate) struct PoolGate {
    total: Arc<Semaphore>,
    per_host: DashMap<String, Arc<Semaphore>>,
    max_per_host: usize,
    in_flight: Arc<AtomicUsize>,
}

/// A slot in the pool, released back on drop.
pub(crate) struct Lease {
    _total: OwnedSemaphorePermit,
    _host: OwnedSemaphorePermit,
    gauge: Arc<AtomicUsize>,
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.gauge.fetch_sub(1, Ordering::SeqCst);
    }
}

impl PoolGate {
    pub(crate) fn new(max_total: usize, max_per_host: usize) -> Self {
        Self {
            total: Arc::new(Semaphore::new(max_total)),
            per_host: DashMap::new(),
            max_per_host,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of leases currently held across the pool.
    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Acquire a slot for a request to `host`, waiting at most `wait`.
    ///
    /// Returns `None` when the caps stay exhausted for the whole wait; the
    /// caller treats that like any other transport failure.
    pub(crate) async fn lease(&self, host: &str, wait: Duration) -> Option<Lease> {
        let host_sem = self
            .per_host
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.max_per_host)))
            .value()
            .clone();

        let total = self.total.clone();
        let permits = tokio::time::timeout(wait, async move {
            let total = total.acquire_owned().await.ok()?;
            let host = host_sem.acquire_owned().await.ok()?;
            Some((total, host))
        })
        .await
        .ok()
        .flatten()?;

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        Some(Lease {
            _total: permits.0,
            _host: permits.1,
            gauge: self.in_flight.clone(),
        })
    }

    /// Drop semaphores for hosts with no requests in flight and no pending
    /// acquirers, so the map stays bounded over a long process life.
    ///
    /// An outstanding permit keeps its semaphore's `Arc` alive, and the
    /// strong-count check runs under the same shard lock `lease` clones
    /// under, so an entry is only removed when nothing can still be holding
    /// or acquiring a slot for that host. Pruned hosts are recreated on
    /// demand with a full cap.
    pub(crate) fn prune_idle_hosts(&self) {
        let max = self.max_per_host;
        self.per_host
            .retain(|_, sem| Arc::strong_count(sem) > 1 || sem.available_permits() < max);
    }
}

struct HostEntry {
    last_used: Instant,
    keep_alive: Duration,
}

/// Per-host idle bookkeeping fed by the keep-alive strategist.
///
/// Each entry records when a host was last used and how long the server said
/// an idle connection may be kept. Entries whose window has lapsed are pruned
/// by the periodic sweep and dropped lazily before reuse.
pub(crate) struct HostLedger {
    hosts: DashMap<String, HostEntry>,
    validate_after_inactivity: Duration,
}

impl HostLedger {
    pub(crate) fn new(validate_after_inactivity: Duration) -> Self {
        Self {
            hosts: DashMap::new(),
            validate_after_inactivity,
        }
    }

    /// Record the keep-alive advisory from a just-completed response.
    pub(crate) fn note(&self, host: &str, keep_alive: Duration) {
        self.hosts.insert(
            host.to_string(),
            HostEntry {
                last_used: Instant::now(),
                keep_alive,
            },
        );
    }

    /// The advised keep-alive window for `host`, if its entry is still fresh.
    pub(crate) fn advised(&self, host: &str) -> Option<Duration> {
        let entry = self.hosts.get(host)?;
        if Self::is_stale(&entry, self.validate_after_inactivity) {
            return None;
        }
        Some(entry.keep_alive)
    }

    /// Drop `host`'s bookkeeping if its advisory window has lapsed.
    pub(crate) fn evict_if_stale(&self, host: &str) {
        let inactivity = self.validate_after_inactivity;
        self.hosts
            .remove_if(host, |_, entry| Self::is_stale(entry, inactivity));
    }

    /// Drop every entry whose advisory window has lapsed.
    pub(crate) fn prune(&self) {
        let inactivity = self.validate_after_inactivity;
        self.hosts
            .retain(|_, entry| !Self::is_stale(entry, inactivity));
    }

    /// An entry goes stale once it has been idle longer than both the
    /// server's advisory and the inactivity validation threshold.
    fn is_stale(entry: &HostEntry, validate_after_inactivity: Duration) -> bool {
        let window = entry.keep_alive.max(validate_after_inactivity);
        entry.last_used.elapsed() > window
    }
}
