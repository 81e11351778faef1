//! The pooled fetch client and its GET executor.
//!
//! [`FetchPool`] composes the pooled transport, the capacity gate, the host
//! ledger, and the retry policy into one long-lived client object. Most
//! applications use the process-wide instance behind [`FetchPool::shared`],
//! which is built exactly once on first use; applications that want explicit
//! lifecycle control construct their own pool at the composition root and
//! call [`FetchPool::close`] during shutdown.
//!
//! The fetch contract is best-effort: [`FetchPool::get`] returns either the
//! decoded body of a `200` response or `None`, never an error. Callers that
//! need to know *why* there was no body use [`FetchPool::fetch`], which
//! returns a [`FetchOutcome`] distinguishing a non-success status from a
//! transport failure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use futures_util::StreamExt;
use once_cell::sync::Lazy;
use reqwest::{Client, Method, StatusCode};
use tokio::task::JoinHandle;

use crate::config::{PoolConfig, RequestConfig, Timeouts};
use crate::keepalive;
use crate::pool::{HostLedger, PoolGate};
use crate::proxy::{ProxyParseError, ProxySpec};
use crate::retry;

/// The process-wide shared pool, built once with default configuration.
static SHARED: Lazy<FetchPool> = Lazy::new(|| {
    FetchPool::new(PoolConfig::default(), RequestConfig::default())
        .expect("failed to build shared HTTP client pool")
});

/// Outcome of a typed fetch.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The server answered `200 OK`; carries the UTF-8 decoded body.
    Body(String),
    /// The server answered with any other status. The body was drained and
    /// discarded so the connection could return to the pool.
    Status(u16),
    /// The request never produced a usable response: connect or read
    /// failure, timeout, pool exhaustion, or the pool was already closed.
    Transport,
}

impl FetchOutcome {
    /// Collapse to the best-effort contract: the body on `200`, else `None`.
    pub fn into_body(self) -> Option<String> {
        match self {
            FetchOutcome::Body(body) => Some(body),
            FetchOutcome::Status(_) | FetchOutcome::Transport => None,
        }
    }
}

/// Key for the cache of client variants. The transport fixes the proxy and
/// the connect timeout at client build time, so every distinct combination
/// needs its own client.
#[derive(Clone, PartialEq, Eq, Hash)]
struct VariantKey {
    proxy: Option<ProxySpec>,
    timeouts: Timeouts,
}

/// A connection-pooled, best-effort HTTP GET client.
///
/// Cheap to share by reference; all methods take `&self` and every request
/// borrows a pooled connection concurrently. The only serialization points
/// are first-time construction of the shared instance and the capacity gate.
///
/// # Example
///
/// ```rust,no_run
/// use fetchpool::FetchPool;
///
/// #[tokio::main]
/// async fn main() {
///     fetchpool::init_logger();
///
///     let pool = FetchPool::shared();
///     match pool.get(None, "https://example.com/data", None).await {
///         Some(body) => println!("{}", body),
///         None => println!("no data available"),
///     }
/// }
/// ```
pub struct FetchPool {
    primary: Client,
    variants: DashMap<VariantKey, Client>,
    gate: Arc<PoolGate>,
    ledger: Arc<HostLedger>,
    pool_config: PoolConfig,
    defaults: RequestConfig,
    closed: AtomicBool,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl FetchPool {
    /// Build a pool from explicit configuration.
    ///
    /// This is the dependency-injectable constructor for applications that
    /// own the client's lifecycle themselves; everyone else can use
    /// [`FetchPool::shared`]. The background sweep that prunes stale host
    /// bookkeeping is started only when a tokio runtime is available at
    /// construction time.
    pub fn new(pool: PoolConfig, defaults: RequestConfig) -> Result<Self, reqwest::Error> {
        let pool = pool.normalized();
        let primary = build_client(&pool, &defaults.timeouts, defaults.proxy.as_ref())?;
        let ledger = Arc::new(HostLedger::new(pool.validate_after_inactivity));
        let gate = Arc::new(PoolGate::new(pool.max_total, pool.max_per_host));
        let sweeper = spawn_sweeper(&ledger, &gate, pool.idle_sweep_interval);

        Ok(Self {
            primary,
            variants: DashMap::new(),
            gate,
            ledger,
            pool_config: pool,
            defaults,
            closed: AtomicBool::new(false),
            sweeper: Mutex::new(sweeper),
        })
    }

    /// The process-wide shared pool, created on first use.
    ///
    /// Construction happens exactly once no matter how many threads race the
    /// first call; all callers observe the same fully-constructed instance
    /// for the remainder of the process lifetime. Its connections are
    /// released by process teardown; there is no global shutdown hook.
    pub fn shared() -> &'static FetchPool {
        &SHARED
    }

    /// Fetch `url` with library-default timeouts.
    ///
    /// Headers are applied verbatim in slice order, without deduplication.
    /// Returns the UTF-8 decoded body on `200 OK` and `None` for anything
    /// else, non-success statuses and transport failures alike. Callers
    /// must treat `None` as "no data available".
    ///
    /// # Panics
    ///
    /// Panics when `proxy` is not of the form `"host:port"`: a malformed
    /// proxy string is a configuration defect, not a network condition. Use
    /// [`FetchPool::fetch`] to handle it as an error instead.
    pub async fn get(
        &self,
        proxy: Option<&str>,
        url: &str,
        headers: Option<&[(String, String)]>,
    ) -> Option<String> {
        self.get_with_timeouts(proxy, url, headers, self.defaults.timeouts)
            .await
    }

    /// Fetch `url` with an explicit timeout triple.
    ///
    /// Same contract as [`FetchPool::get`], including the panic on a
    /// malformed proxy string.
    pub async fn get_with_timeouts(
        &self,
        proxy: Option<&str>,
        url: &str,
        headers: Option<&[(String, String)]>,
        timeouts: Timeouts,
    ) -> Option<String> {
        match self.fetch(proxy, url, headers, Some(timeouts)).await {
            Ok(outcome) => outcome.into_body(),
            Err(err) => panic!("fetchpool: {}", err),
        }
    }

    /// Typed fetch: distinguishes why no body came back.
    ///
    /// `timeouts` of `None` means the pool's defaults. The only error is a
    /// malformed proxy string; every network- or protocol-level failure is
    /// absorbed into [`FetchOutcome::Transport`].
    pub async fn fetch(
        &self,
        proxy: Option<&str>,
        url: &str,
        headers: Option<&[(String, String)]>,
        timeouts: Option<Timeouts>,
    ) -> Result<FetchOutcome, ProxyParseError> {
        let proxy = match proxy {
            Some(spec) => Some(spec.parse::<ProxySpec>()?),
            None => None,
        };
        let timeouts = timeouts.unwrap_or(self.defaults.timeouts);
        Ok(self.execute(proxy, url, headers, timeouts).await)
    }

    /// Number of requests currently holding a pool slot.
    pub fn in_flight(&self) -> usize {
        self.gate.in_flight()
    }

    /// The keep-alive window last advertised by `host`, if the bookkeeping
    /// for it is still fresh.
    pub fn advised_keep_alive(&self, host: &str) -> Option<Duration> {
        self.ledger.advised(host)
    }

    /// Stop the background sweep and refuse new requests.
    ///
    /// Idempotent. Requests racing the close fail like any other transport
    /// failure; in-flight requests run to completion and pooled connections
    /// are released when the pool is dropped.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Ok(mut sweeper) = self.sweeper.lock() {
            if let Some(handle) = sweeper.take() {
                handle.abort();
            }
        }
        self.variants.clear();
    }

    /// Whether [`FetchPool::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn execute(
        &self,
        proxy: Option<ProxySpec>,
        url: &str,
        headers: Option<&[(String, String)]>,
        timeouts: Timeouts,
    ) -> FetchOutcome {
        if self.is_closed() {
            return FetchOutcome::Transport;
        }

        let client = match self.client_for(proxy, timeouts) {
            Ok(client) => client,
            Err(err) => {
                log::error!(
                    "fetchpool::fetch::execute: failed to build client variant: {}",
                    err
                );
                return FetchOutcome::Transport;
            }
        };

        let host = host_of(url);
        self.ledger.evict_if_stale(&host);

        // The lease timeout plays the connection-request-timeout role: how
        // long a caller may wait for a free slot before failing.
        let lease = match self.gate.lease(&host, timeouts.lease).await {
            Some(lease) => lease,
            None => return FetchOutcome::Transport,
        };

        let outcome = self.run_request(&client, url, headers, timeouts, &host).await;
        drop(lease);
        outcome
    }

    async fn run_request(
        &self,
        client: &Client,
        url: &str,
        headers: Option<&[(String, String)]>,
        timeouts: Timeouts,
        host: &str,
    ) -> FetchOutcome {
        let mut attempt = 0;
        loop {
            let mut request = client.get(url).timeout(timeouts.socket);
            if let Some(headers) = headers {
                for (name, value) in headers {
                    request = request.header(name.as_str(), value.as_str());
                }
            }

            match request.send().await {
                Ok(response) => {
                    self.ledger
                        .note(host, keepalive::keep_alive_duration(response.headers()));

                    let status = response.status();
                    if status == StatusCode::OK {
                        return match read_body(response).await {
                            Some(body) => FetchOutcome::Body(body),
                            None => FetchOutcome::Transport,
                        };
                    }
                    drain(response).await;
                    return FetchOutcome::Status(status.as_u16());
                }
                Err(err) => {
                    if retry::should_retry(attempt, &Method::GET, &err) {
                        attempt += 1;
                        continue;
                    }
                    return FetchOutcome::Transport;
                }
            }
        }
    }

    /// The client to execute with. The default combination always maps to
    /// the primary client; proxied or timeout-overridden requests use a
    /// lazily-built cached variant. Two racing callers may build the same
    /// variant twice; the spare is dropped, which is harmless.
    fn client_for(
        &self,
        proxy: Option<ProxySpec>,
        timeouts: Timeouts,
    ) -> Result<Client, reqwest::Error> {
        if proxy.is_none() && timeouts == self.defaults.timeouts {
            return Ok(self.primary.clone());
        }

        let key = VariantKey { proxy, timeouts };
        if let Some(client) = self.variants.get(&key) {
            return Ok(client.value().clone());
        }

        let client = build_client(&self.pool_config, &timeouts, key.proxy.as_ref())?;
        self.variants.insert(key, client.clone());
        Ok(client)
    }
}

impl Drop for FetchPool {
    fn drop(&mut self) {
        self.close();
    }
}

fn build_client(
    pool: &PoolConfig,
    timeouts: &Timeouts,
    proxy: Option<&ProxySpec>,
) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .pool_max_idle_per_host(pool.max_per_host)
        .pool_idle_timeout(Some(pool.connection_ttl))
        .tcp_keepalive(Some(pool.connection_ttl))
        .connect_timeout(timeouts.connect)
        .timeout(timeouts.socket);

    if let Some(proxy) = proxy {
        builder = builder.proxy(reqwest::Proxy::all(proxy.url())?);
    }

    builder.build()
}

fn spawn_sweeper(
    ledger: &Arc<HostLedger>,
    gate: &Arc<PoolGate>,
    interval: Duration,
) -> Option<JoinHandle<()>> {
    // No runtime, no sweep: host bookkeeping is still dropped lazily before
    // reuse, the periodic prune is just an optimization.
    let handle = tokio::runtime::Handle::try_current().ok()?;
    let ledger = Arc::clone(ledger);
    let gate = Arc::clone(gate);
    Some(handle.spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // the first tick fires immediately
        loop {
            ticker.tick().await;
            ledger.prune();
            gate.prune_idle_hosts();
        }
    }))
}

/// Host component used for per-host accounting. Falls back to the raw URL
/// when it does not parse, so malformed input still gets consistent
/// bookkeeping before failing in the transport.
fn host_of(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

/// Read the full body and decode it as UTF-8, replacing invalid sequences
/// rather than failing a fetch that already produced a `200`.
///
/// A mid-body transport failure is swallowed like any other execution
/// error; only a failure while draining a discarded body is logged.
async fn read_body(response: reqwest::Response) -> Option<String> {
    let mut stream = response.bytes_stream();
    let mut buf: Vec<u8> = Vec::new();
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) => buf.extend_from_slice(&bytes),
            Err(_) => return None,
        }
    }
    Some(String::from_utf8_lossy(&buf).into_owned())
}

/// Consume and discard the body so the connection can go back to the pool
/// instead of being torn down mid-stream.
async fn drain(response: reqwest::Response) {
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        if let Err(err) = chunk {
            log::error!(
                "fetchpool::fetch::drain: failed to drain response body: {}",
                err
            );
            return;
        }
    }
}
