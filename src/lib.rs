//! # fetchpool
//!
//! A process-wide, connection-pooled, best-effort HTTP GET client. Many
//! concurrent callers share one pool of keep-alive connections instead of
//! each managing its own sockets.
//!
//! The crate provides:
//!
//! * **A shared client pool**: [`FetchPool::shared`] hands out one
//!   process-wide instance, built exactly once on first use, with pooled
//!   connections for `http` (plain TCP) and `https` (system TLS).
//! * **Best-effort GET**: [`get`] returns either the UTF-8 body of a `200`
//!   response or `None`: transport failures and non-success statuses are
//!   absorbed, never surfaced as errors.
//! * **Proxying**: an optional `"host:port"` forward proxy per request, the
//!   proxy hop always plain HTTP ([`ProxySpec`]).
//! * **Timeout control**: a socket/connect/lease triple per request or from
//!   pool defaults ([`Timeouts`]).
//! * **Keep-alive negotiation**: `Keep-Alive: timeout=<n>` advisories feed
//!   the pool's host bookkeeping ([`keepalive`]).
//! * **Idempotent retry**: one automatic re-issue for transient mid-flight
//!   failures ([`retry`]).
//!
//! ## Quick start
//!
//! ```rust,no_run
//! #[tokio::main]
//! async fn main() {
//!     fetchpool::init_logger();
//!
//!     // Plain GET through the shared pool.
//!     let _ = fetchpool::get(None, "https://example.com/data", None).await;
//!
//!     // Through a proxy, with custom headers.
//!     let headers = vec![("Accept".to_string(), "text/plain".to_string())];
//!     let body = fetchpool::get(
//!         Some("10.0.0.1:8080"),
//!         "https://example.com/data",
//!         Some(&headers),
//!     )
//!     .await;
//!
//!     match body {
//!         Some(text) => println!("{}", text),
//!         None => println!("no data available"),
//!     }
//! }
//! ```
//!
//! ## Owning the lifecycle
//!
//! Applications that prefer explicit resource management over a process-wide
//! instance construct their own pool and close it during shutdown:
//!
//! ```rust,no_run
//! use fetchpool::{FetchPool, PoolConfig, RequestConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = FetchPool::new(PoolConfig::default(), RequestConfig::default())?;
//!
//!     let body = pool.get(None, "https://example.com/data", None).await;
//!
//!     pool.close();
//!     Ok(())
//! }
//! ```
//!
//! Callers that need to distinguish *why* no body came back use
//! [`FetchPool::fetch`], which yields a [`FetchOutcome`] instead of an
//! `Option`.

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Initialise the global [`env_logger`] subscriber exactly once.
///
/// The helper is intentionally lightweight so that applications embedding
/// fetchpool can opt in to simple `RUST_LOG` driven diagnostics without
/// having to choose a logging backend upfront.
///
/// ```rust
/// fetchpool::init_logger();
/// log::info!("Logger is ready");
/// ```
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        env_logger::init();
    });
}

pub mod config;
pub mod fetch;
pub mod keepalive;
mod pool;
pub mod proxy;
pub mod retry;

pub use config::{PoolConfig, RequestConfig, Timeouts};
pub use fetch::{FetchOutcome, FetchPool};
pub use proxy::{ProxyParseError, ProxySpec};

/// Fetch `url` through the shared pool with library-default timeouts.
///
/// Convenience over [`FetchPool::shared`]; see [`FetchPool::get`] for the
/// full contract, including the panic on a malformed `proxy` string.
pub async fn get(
    proxy: Option<&str>,
    url: &str,
    headers: Option<&[(String, String)]>,
) -> Option<String> {
    FetchPool::shared().get(proxy, url, headers).await
}

/// Fetch `url` through the shared pool with an explicit timeout triple.
///
/// See [`FetchPool::get_with_timeouts`].
pub async fn get_with_timeouts(
    proxy: Option<&str>,
    url: &str,
    headers: Option<&[(String, String)]>,
    timeouts: Timeouts,
) -> Option<String> {
    FetchPool::shared()
        .get_with_timeouts(proxy, url, headers, timeouts)
        .await
}
