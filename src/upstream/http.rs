//! reqwest adapter: maps HTTP responses and transport failures to [`UpstreamError`].

use super::UpstreamError;
use crate::{Error, Result};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::de::DeserializeOwned;
use std::error::Error as StdError;
use std::time::Duration;

/// Parse a `Retry-After` header given in whole seconds.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Classify a transport-level reqwest failure.
pub fn classify_reqwest_error(err: &reqwest::Error) -> UpstreamError {
    let message = err.to_string();
    if let Some(status) = err.status() {
        return UpstreamError::from_status(status.as_u16(), message, None);
    }
    if err.is_timeout() {
        return if err.is_connect() {
            UpstreamError::ConnectTimeout(message)
        } else {
            UpstreamError::Aborted(message)
        };
    }
    if let Some(kind) = io_error_kind(err) {
        use std::io::ErrorKind;
        match kind {
            ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe => {
                return UpstreamError::ConnectionReset(message)
            }
            ErrorKind::TimedOut => return UpstreamError::ConnectTimeout(message),
            _ => {}
        }
    }
    // Refused or unresolvable connects stay unclassified.
    if err.is_decode() {
        return UpstreamError::MalformedResponse(message);
    }
    UpstreamError::Other(message)
}

fn io_error_kind(err: &reqwest::Error) -> Option<std::io::ErrorKind> {
    let mut source = err.source();
    while let Some(inner) = source {
        if let Some(io) = inner.downcast_ref::<std::io::Error>() {
            return Some(io.kind());
        }
        source = inner.source();
    }
    None
}

/// Turn a non-success response into a tagged error; pass successes through.
pub async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let retry_after = parse_retry_after(resp.headers());
    let body = resp.text().await.unwrap_or_default();
    let message = if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("upstream error")
            .to_string()
    } else {
        body
    };
    Err(Error::Upstream(UpstreamError::from_status(
        status.as_u16(),
        message,
        retry_after,
    )))
}

/// Send a request and decode a JSON body, classifying every failure.
pub async fn send_json<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> Result<T> {
    let resp = request
        .send()
        .await
        .map_err(|e| Error::Upstream(classify_reqwest_error(&e)))?;
    let resp = check_response(resp).await?;
    resp.json::<T>()
        .await
        .map_err(|e| Error::Upstream(UpstreamError::MalformedResponse(e.to_string())))
}
