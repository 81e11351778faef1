//! Idempotent transient-failure retry policy.
//!
//! A failed request is re-issued automatically at most once, and only when
//! repeating it is safe (the method is idempotent) and the failure looks like
//! a transient mid-flight I/O error, typically a pooled connection that the
//! server closed between staleness validation and the request hitting the
//! wire. Connect failures, timeouts, TLS problems, and anything the server
//! actually answered are never retried.

use reqwest::Method;

/// Maximum number of automatic re-issues per request.
pub const MAX_RETRIES: usize = 1;

/// Whether a method may be repeated without additional side effects.
pub fn is_idempotent(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET
            | Method::HEAD
            | Method::OPTIONS
            | Method::PUT
            | Method::DELETE
            | Method::TRACE
    )
}

/// Decide whether the `attempt`-th failure of `method` may be retried.
///
/// `attempt` is zero-based: the first failure is attempt `0`, and only
/// attempts below [`MAX_RETRIES`] are eligible.
pub fn should_retry(attempt: usize, method: &Method, err: &reqwest::Error) -> bool {
    attempt < MAX_RETRIES && is_idempotent(method) && is_transient(err)
}

/// Transient means the request died in flight without a verdict from the
/// server. Everything with a more specific classification is excluded:
/// timeouts and connect failures mirror the interrupted/connection-refused
/// exclusions of classic idempotent retry handlers, and builder, body,
/// decode, redirect, and status errors would all fail identically on a
/// second attempt.
fn is_transient(err: &reqwest::Error) -> bool {
    err.is_request()
        && !err.is_timeout()
        && !err.is_connect()
        && !err.is_body()
        && !err.is_decode()
        && !err.is_builder()
        && !err.is_redirect()
        && !err.is_status()
}
