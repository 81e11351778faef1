//! Keep-Alive header negotiation.
//!
//! Servers advertise how long an idle connection may stay open through the
//! `Keep-Alive` response header, e.g. `Keep-Alive: timeout=30, max=100`.
//! [`keep_alive_duration`] extracts that advisory so the pool's host ledger
//! knows when its bookkeeping for a host goes stale.

use std::time::Duration;

use reqwest::header::HeaderMap;

/// Fallback keep-alive window used when the server sends no usable
/// `timeout` directive: 15 seconds.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(15);

/// Decide how long an idle connection to the responding host may be kept.
///
/// Scans every `Keep-Alive` header line, element by element in order, and
/// returns the first `timeout=<n>` directive whose value parses as a
/// non-negative integer, interpreted as seconds. Directive names are matched
/// case-insensitively. Malformed values are skipped as if absent; this
/// function never fails.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use reqwest::header::HeaderMap;
/// use fetchpool::keepalive::keep_alive_duration;
///
/// let mut headers = HeaderMap::new();
/// headers.insert("Keep-Alive", "timeout=30, max=100".parse().unwrap());
/// assert_eq!(keep_alive_duration(&headers), Duration::from_secs(30));
/// ```
pub fn keep_alive_duration(headers: &HeaderMap) -> Duration {
    for line in headers.get_all("keep-alive") {
        let line = match line.to_str() {
            Ok(line) => line,
            Err(_) => continue,
        };
        for element in line.split(',') {
            let mut parts = element.splitn(2, '=');
            let name = parts.next().unwrap_or("").trim();
            let value = match parts.next() {
                Some(value) => value.trim(),
                None => continue,
            };
            if name.eq_ignore_ascii_case("timeout") {
                if let Ok(secs) = value.parse::<u64>() {
                    return Duration::from_secs(secs);
                }
            }
        }
    }
    DEFAULT_KEEP_ALIVE
}
