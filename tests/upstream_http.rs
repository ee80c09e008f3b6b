//! HTTP adapter classification against a mock server

use careeros_resilience::upstream::http::send_json;
use careeros_resilience::upstream::UpstreamError;
use careeros_resilience::{Error, ErrorCode};
use mockito::Server;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, PartialEq)]
struct Occupation {
    code: String,
    title: String,
}

#[tokio::test]
async fn test_success_decodes_body() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/occupations/15-2051.00")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"code":"15-2051.00","title":"Data Scientists"}"#)
        .create_async()
        .await;

    let client = reqwest::Client::new();
    let out: Occupation = send_json(client.get(format!("{}/occupations/15-2051.00", server.url())))
        .await
        .unwrap();
    assert_eq!(out.title, "Data Scientists");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_429_carries_retry_after() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/analyze")
        .with_status(429)
        .with_header("retry-after", "3")
        .with_body("slow down")
        .create_async()
        .await;

    let client = reqwest::Client::new();
    let err = send_json::<serde_json::Value>(client.post(format!("{}/analyze", server.url())))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::RateLimited);
    assert!(err.is_retryable());
    assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
}

#[tokio::test]
async fn test_server_error_is_transient_and_not_found_is_permanent() {
    let mut server = Server::new_async().await;
    let _down = server
        .mock("GET", "/down")
        .with_status(503)
        .create_async()
        .await;
    let _missing = server
        .mock("GET", "/missing")
        .with_status(404)
        .with_body("no such occupation")
        .create_async()
        .await;

    let client = reqwest::Client::new();
    let down = send_json::<serde_json::Value>(client.get(format!("{}/down", server.url())))
        .await
        .unwrap_err();
    assert_eq!(down.code(), ErrorCode::ServerError);
    assert!(down.is_retryable());

    let missing = send_json::<serde_json::Value>(client.get(format!("{}/missing", server.url())))
        .await
        .unwrap_err();
    assert!(matches!(
        missing,
        Error::Upstream(UpstreamError::Http { status: 404, ref message }) if message == "no such occupation"
    ));
    assert!(!missing.is_retryable());
}

#[tokio::test]
async fn test_invalid_json_is_malformed_response() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/garbled")
        .with_status(200)
        .with_body("Sure! Here is the analysis you asked for")
        .create_async()
        .await;

    let client = reqwest::Client::new();
    let err = send_json::<Occupation>(client.get(format!("{}/garbled", server.url())))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::MalformedResponse);
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_refused_connection_is_not_retried() {
    // Bind and drop a listener to get a port nothing is serving on.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = reqwest::Client::new();
    let err = send_json::<serde_json::Value>(client.get(format!("http://127.0.0.1:{port}/")))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unknown, "{err:?}");
    assert!(!err.is_retryable());
}
