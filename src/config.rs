//! Pool and request configuration.
//!
//! Both structs are plain value objects constructed manually; no config-file
//! parsing dependencies are introduced. [`PoolConfig`] is applied once when a
//! [`FetchPool`](crate::FetchPool) is built and is immutable afterwards;
//! [`Timeouts`] travels with each request.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use fetchpool::{PoolConfig, Timeouts};
//!
//! // The stock configuration: 300 total / 100 per host, 60 s connection TTL.
//! let pool = PoolConfig::default();
//! assert_eq!(pool.max_total, 300);
//!
//! // A tighter timeout triple for a single request.
//! let timeouts = Timeouts::from_millis(1_000, 250, 500);
//! assert_eq!(timeouts.connect, Duration::from_millis(250));
//! ```

use std::time::Duration;

use crate::proxy::ProxySpec;

/// Capacity and staleness limits for a [`FetchPool`](crate::FetchPool).
///
/// Immutable once a pool has been built from it.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of requests in flight across the whole pool.
    pub max_total: usize,
    /// Maximum number of requests in flight to any single host.
    /// Never exceeds `max_total`; violating configs are clamped.
    pub max_per_host: usize,
    /// How long a host's bookkeeping may sit idle without a keep-alive
    /// advisory before it is considered stale.
    pub validate_after_inactivity: Duration,
    /// How long an idle pooled connection is kept before the transport
    /// evicts it.
    pub connection_ttl: Duration,
    /// Interval of the background sweep that prunes stale host bookkeeping.
    pub idle_sweep_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_total: 300,
            max_per_host: 100,
            validate_after_inactivity: Duration::from_millis(4_000),
            connection_ttl: Duration::from_secs(60),
            idle_sweep_interval: Duration::from_secs(60),
        }
    }
}

impl PoolConfig {
    /// Enforce the per-host ≤ total invariant, clamping and logging when a
    /// caller hands in a config that violates it.
    pub(crate) fn normalized(mut self) -> Self {
        if self.max_per_host > self.max_total {
            log::warn!(
                "fetchpool::config: max_per_host {} exceeds max_total {}, clamping",
                self.max_per_host,
                self.max_total
            );
            self.max_per_host = self.max_total;
        }
        self
    }
}

/// The timeout triple bounding a single request.
///
/// There is no cancellation token; these three values are the only way to
/// bound an in-flight call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timeouts {
    /// Total time the request may take from send to last body byte.
    pub socket: Duration,
    /// Time allowed for establishing the TCP (and TLS) connection.
    pub connect: Duration,
    /// How long the caller waits for a free slot in the pool before the
    /// request fails.
    pub lease: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            socket: Duration::from_millis(5_000),
            connect: Duration::from_millis(2_000),
            lease: Duration::from_millis(2_000),
        }
    }
}

impl Timeouts {
    /// Build a timeout triple from millisecond values.
    pub fn from_millis(socket: u64, connect: u64, lease: u64) -> Self {
        Self {
            socket: Duration::from_millis(socket),
            connect: Duration::from_millis(connect),
            lease: Duration::from_millis(lease),
        }
    }
}

/// Default per-request settings a pool is built with.
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    /// Timeouts applied when a request does not override them.
    pub timeouts: Timeouts,
    /// Proxy applied to every request that does not name its own.
    pub proxy: Option<ProxySpec>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pool_limits() {
        let config = PoolConfig::default();
        assert_eq!(config.max_total, 300);
        assert_eq!(config.max_per_host, 100);
        assert_eq!(config.validate_after_inactivity, Duration::from_millis(4_000));
        assert_eq!(config.connection_ttl, Duration::from_secs(60));
        assert_eq!(config.idle_sweep_interval, Duration::from_secs(60));
    }

    #[test]
    fn default_timeouts() {
        let timeouts = Timeouts::default();
        assert_eq!(timeouts.socket, Duration::from_millis(5_000));
        assert_eq!(timeouts.connect, Duration::from_millis(2_000));
        assert_eq!(timeouts.lease, Duration::from_millis(2_000));
    }

    #[test]
    fn per_host_cap_is_clamped_to_total() {
        let config = PoolConfig {
            max_total: 10,
            max_per_host: 50,
            ..PoolConfig::default()
        }
        .normalized();
        assert_eq!(config.max_per_host, 10);
    }

    #[test]
    fn valid_caps_pass_through_unchanged() {
        let config = PoolConfig::default().normalized();
        assert_eq!(config.max_per_host, 100);
        assert_eq!(config.max_total, 300);
    }
}
