//! End-to-end tests for the best-effort GET executor.
//!
//! Covers:
//! - 200 success path (body decoded)
//! - non-200 path (absence, connection returned to the pool)
//! - headers applied verbatim
//! - transport failures and timeout overrides
//! - pool accounting returning to baseline after every outcome
//! - the typed fetch distinguishing status from transport failure
//! - proxy string validation

use std::time::{Duration, Instant};

use fetchpool::{FetchOutcome, FetchPool, PoolConfig, RequestConfig, Timeouts};

fn fresh_pool() -> FetchPool {
    FetchPool::new(PoolConfig::default(), RequestConfig::default())
        .expect("pool should build with default configuration")
}

#[tokio::test]
async fn get_returns_body_on_200() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/hello")
        .with_status(200)
        .with_body("hello")
        .create_async()
        .await;

    let pool = fresh_pool();
    let url = format!("{}/hello", server.url());
    let body = pool.get(None, &url, None).await;

    assert_eq!(body.as_deref(), Some("hello"));
    mock.assert_async().await;
}

#[tokio::test]
async fn get_returns_none_on_404_and_connection_survives() {
    let mut server = mockito::Server::new_async().await;
    let missing = server
        .mock("GET", "/missing")
        .with_status(404)
        .with_body("not here")
        .create_async()
        .await;
    let found = server
        .mock("GET", "/found")
        .with_status(200)
        .with_body("still alive")
        .create_async()
        .await;

    let pool = fresh_pool();
    let body = pool
        .get(None, &format!("{}/missing", server.url()), None)
        .await;
    assert_eq!(body, None);

    // The 404 body was drained, not aborted, so the pool is still healthy
    // and a follow-up request on the same server succeeds.
    let body = pool
        .get(None, &format!("{}/found", server.url()), None)
        .await;
    assert_eq!(body.as_deref(), Some("still alive"));

    missing.assert_async().await;
    found.assert_async().await;
}

#[tokio::test]
async fn non_200_success_statuses_also_yield_absence() {
    let mut server = mockito::Server::new_async().await;
    let created = server
        .mock("GET", "/created")
        .with_status(201)
        .with_body("created")
        .create_async()
        .await;

    let pool = fresh_pool();
    let body = pool
        .get(None, &format!("{}/created", server.url()), None)
        .await;

    // The contract is status 200 exactly, not 2xx.
    assert_eq!(body, None);
    created.assert_async().await;
}

#[tokio::test]
async fn headers_are_applied_verbatim() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/echo")
        .match_header("x-first", "one")
        .match_header("x-second", "two")
        .with_status(200)
        .with_body("ok")
        .create_async()
        .await;

    let headers = vec![
        ("x-first".to_string(), "one".to_string()),
        ("x-second".to_string(), "two".to_string()),
    ];

    let pool = fresh_pool();
    let body = pool
        .get(None, &format!("{}/echo", server.url()), Some(&headers))
        .await;

    assert_eq!(body.as_deref(), Some("ok"));
    mock.assert_async().await;
}

#[tokio::test]
async fn duplicate_header_names_are_sent_unmerged_in_order() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/tags")
        .match_request(|req| {
            let values: Vec<&str> = req
                .header("x-tag")
                .iter()
                .filter_map(|value| value.to_str().ok())
                .collect();
            values == ["one", "two"]
        })
        .with_status(200)
        .with_body("ok")
        .create_async()
        .await;

    // Repeated names are neither deduplicated nor reordered.
    let headers = vec![
        ("x-tag".to_string(), "one".to_string()),
        ("x-tag".to_string(), "two".to_string()),
    ];

    let pool = fresh_pool();
    let body = pool
        .get(None, &format!("{}/tags", server.url()), Some(&headers))
        .await;

    assert_eq!(body.as_deref(), Some("ok"));
    mock.assert_async().await;
}

#[tokio::test]
async fn truncated_body_yields_absence() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    // A server that promises 100 body bytes and hangs up after 7: the
    // request succeeds at the header stage, then fails mid-body. The
    // contract is still a silent absence-of-result.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let _ = socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 100\r\n\r\npartial")
                .await;
        }
    });

    let pool = fresh_pool();
    let body = pool
        .get(None, &format!("http://{}/truncated", addr), None)
        .await;

    assert_eq!(body, None);
    assert_eq!(pool.in_flight(), 0);
}

#[tokio::test]
async fn transport_failure_yields_absence() {
    // Nothing listens on port 1; connect is refused immediately.
    let pool = fresh_pool();
    let body = pool.get(None, "http://127.0.0.1:1/never", None).await;
    assert_eq!(body, None);
}

#[tokio::test]
async fn connect_timeout_override_is_honored() {
    // 10.255.255.1 is unroutable in practice, so the connect attempt hangs
    // until the connect timeout fires. The override must cut the wait far
    // below the 2 s default.
    let pool = fresh_pool();
    let start = Instant::now();
    let body = pool
        .get_with_timeouts(
            None,
            "http://10.255.255.1:81/never",
            None,
            Timeouts::from_millis(1_000, 100, 1_000),
        )
        .await;

    assert_eq!(body, None);
    assert!(
        start.elapsed() < Duration::from_millis(1_900),
        "override should fail well before the 2 s default, took {:?}",
        start.elapsed()
    );
}

#[tokio::test]
async fn in_flight_returns_to_baseline_after_every_outcome() {
    let mut server = mockito::Server::new_async().await;
    let _ok = server
        .mock("GET", "/ok")
        .with_status(200)
        .with_body("ok")
        .create_async()
        .await;
    let _missing = server
        .mock("GET", "/missing")
        .with_status(404)
        .create_async()
        .await;

    let pool = fresh_pool();
    assert_eq!(pool.in_flight(), 0);

    let _ = pool.get(None, &format!("{}/ok", server.url()), None).await;
    assert_eq!(pool.in_flight(), 0, "success must release its lease");

    let _ = pool
        .get(None, &format!("{}/missing", server.url()), None)
        .await;
    assert_eq!(pool.in_flight(), 0, "non-200 must release its lease");

    let _ = pool.get(None, "http://127.0.0.1:1/never", None).await;
    assert_eq!(pool.in_flight(), 0, "transport failure must release its lease");
}

#[tokio::test]
async fn keep_alive_advisory_feeds_host_bookkeeping() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/ka")
        .with_status(200)
        .with_header("Keep-Alive", "timeout=30, max=100")
        .with_body("ok")
        .create_async()
        .await;

    let pool = fresh_pool();
    let _ = pool.get(None, &format!("{}/ka", server.url()), None).await;

    assert_eq!(
        pool.advised_keep_alive("127.0.0.1"),
        Some(Duration::from_secs(30))
    );
}

#[tokio::test]
async fn typed_fetch_distinguishes_status_from_transport() {
    let mut server = mockito::Server::new_async().await;
    let _missing = server
        .mock("GET", "/missing")
        .with_status(404)
        .create_async()
        .await;

    let pool = fresh_pool();

    let outcome = pool
        .fetch(None, &format!("{}/missing", server.url()), None, None)
        .await
        .unwrap();
    assert!(matches!(outcome, FetchOutcome::Status(404)));

    let outcome = pool
        .fetch(None, "http://127.0.0.1:1/never", None, None)
        .await
        .unwrap();
    assert!(matches!(outcome, FetchOutcome::Transport));
}

#[tokio::test]
async fn typed_fetch_reports_malformed_proxy() {
    let pool = fresh_pool();
    let result = pool
        .fetch(Some("badformat"), "http://example.com/", None, None)
        .await;
    assert!(result.is_err());

    let result = pool
        .fetch(Some("host:notanumber"), "http://example.com/", None, None)
        .await;
    assert!(result.is_err());
}

#[tokio::test]
#[should_panic(expected = "invalid proxy specification")]
async fn get_panics_on_malformed_proxy() {
    let pool = fresh_pool();
    let _ = pool.get(Some("badformat"), "http://example.com/", None).await;
}

#[tokio::test]
async fn closed_pool_yields_absence() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/ok")
        .with_status(200)
        .with_body("ok")
        .expect(0)
        .create_async()
        .await;

    let pool = fresh_pool();
    pool.close();

    let body = pool.get(None, &format!("{}/ok", server.url()), None).await;
    assert_eq!(body, None);
    mock.assert_async().await;
}

#[tokio::test]
async fn module_level_get_uses_the_shared_pool() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/shared")
        .with_status(200)
        .with_body("from the shared pool")
        .create_async()
        .await;

    let body = fetchpool::get(None, &format!("{}/shared", server.url()), None).await;
    assert_eq!(body.as_deref(), Some("from the shared pool"));
    assert_eq!(FetchPool::shared().in_flight(), 0);
}

#[tokio::test]
async fn empty_body_on_200_is_some_empty_string() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/empty")
        .with_status(200)
        .create_async()
        .await;

    let pool = fresh_pool();
    let body = pool
        .get(None, &format!("{}/empty", server.url()), None)
        .await;

    // An empty 200 body is still a result, distinct from absence.
    assert_eq!(body.as_deref(), Some(""));
}
