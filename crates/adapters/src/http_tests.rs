// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use yare::parameterized;

#[parameterized(
    plain_http = { "http://127.0.0.1:3000", true },
    https_with_path = { "https://example.test/health", true },
    ftp = { "ftp://127.0.0.1/", false },
    ws = { "ws://127.0.0.1:8080", false },
)]
fn scheme_filter(raw: &str, accepted: bool) {
    assert_eq!(parse_probe_url(raw).is_ok(), accepted);
}

#[test]
fn garbage_url_is_invalid() {
    assert!(matches!(
        parse_probe_url("not a url"),
        Err(ProbeError::InvalidUrl(_))
    ));
}

#[test]
fn unsupported_scheme_names_the_scheme() {
    assert_eq!(
        parse_probe_url("file:///etc/passwd").unwrap_err(),
        ProbeError::UnsupportedScheme("file".to_string())
    );
}

/// Serve a single canned response on an ephemeral port.
async fn serve_once(status_line: &'static str) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 1024];
        let _ = socket.read(&mut buf).await;
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            status_line
        );
        let _ = socket.write_all(response.as_bytes()).await;
    });
    port
}

#[tokio::test]
async fn any_response_is_alive() {
    let port = serve_once("503 Service Unavailable").await;
    let probe = ReqwestHttpProbe::new(Duration::from_secs(5)).unwrap();

    let status = probe.get(&format!("http://127.0.0.1:{}/", port)).await;
    assert_eq!(status, Ok(503));
}

#[tokio::test]
async fn refused_connection_is_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let probe = ReqwestHttpProbe::new(Duration::from_secs(5)).unwrap();
    let result = probe.get(&format!("http://127.0.0.1:{}/", port)).await;
    assert!(matches!(result, Err(ProbeError::Network(_))), "{result:?}");
}

#[tokio::test]
async fn silent_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        // Accept and hold the socket without answering
        let (_socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
    });

    let probe = ReqwestHttpProbe::new(Duration::from_millis(150)).unwrap();
    let result = probe.get(&format!("http://127.0.0.1:{}/", port)).await;
    assert_eq!(result, Err(ProbeError::Timeout(Duration::from_millis(150))));
}

#[tokio::test]
async fn fake_scripts_responses_and_records_requests() {
    let fake = FakeHttpProbe::new();
    fake.respond("http://127.0.0.1:4000", FakeResponse::Fail("refused".into()));

    assert_eq!(fake.get("http://127.0.0.1:3000").await, Ok(200));
    assert!(fake.get("http://127.0.0.1:4000").await.is_err());
    assert!(matches!(
        fake.get("gopher://x").await,
        Err(ProbeError::UnsupportedScheme(_))
    ));
    assert_eq!(
        fake.requests(),
        vec!["http://127.0.0.1:3000", "http://127.0.0.1:4000"]
    );
}

#[tokio::test(start_paused = true)]
async fn fake_hang_never_completes() {
    let fake = FakeHttpProbe::new();
    fake.respond("http://127.0.0.1:5000", FakeResponse::Hang);

    let result =
        tokio::time::timeout(Duration::from_secs(5), fake.get("http://127.0.0.1:5000")).await;
    assert!(result.is_err());
}
