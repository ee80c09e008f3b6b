//! 上游调用适配层：将外部服务的失败转换为带标签的错误变体。
//!
//! Upstream adapter layer.
//!
//! Upstream calls (AI inference, occupation-data lookups) fail in many shapes.
//! This module turns those shapes into a small closed set of [`UpstreamError`]
//! variants so classification can match on a tag instead of searching
//! message text.

pub mod http;

use crate::error_code::ErrorCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    #[error("connection reset: {0}")]
    ConnectionReset(String),

    #[error("connect timeout: {0}")]
    ConnectTimeout(String),

    #[error("rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("aborted: {0}")]
    Aborted(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("{0}")]
    Other(String),
}

impl UpstreamError {
    /// Build an error from an HTTP status. 429 becomes `RateLimited`.
    pub fn from_status(status: u16, message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        let message = message.into();
        if status == 429 {
            UpstreamError::RateLimited {
                message,
                retry_after,
            }
        } else {
            UpstreamError::Http { status, message }
        }
    }

    /// Classify an opaque error message from a foreign client.
    ///
    /// This is the only place message text is inspected. Adapters that can
    /// see a status code or an I/O error kind should build a variant directly.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let m = message.to_lowercase();
        if m.contains("econnreset") || m.contains("connection reset") {
            UpstreamError::ConnectionReset(message)
        } else if m.contains("etimedout") || m.contains("connect timeout") {
            UpstreamError::ConnectTimeout(message)
        } else if m.contains("rate limit") || m.contains("429") {
            UpstreamError::RateLimited {
                message,
                retry_after: None,
            }
        } else if m.contains("timeout") || m.contains("abort") {
            UpstreamError::Aborted(message)
        } else {
            UpstreamError::Other(message)
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::Http { status, .. } => Some(*status),
            UpstreamError::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            UpstreamError::ConnectionReset(_) => ErrorCode::ConnectionReset,
            UpstreamError::ConnectTimeout(_) => ErrorCode::ConnectTimeout,
            UpstreamError::RateLimited { .. } => ErrorCode::RateLimited,
            UpstreamError::Http { status, .. } => ErrorCode::from_http_status(*status),
            UpstreamError::Aborted(_) => ErrorCode::Aborted,
            UpstreamError::MalformedResponse(_) => ErrorCode::MalformedResponse,
            UpstreamError::Other(_) => ErrorCode::Unknown,
        }
    }
}

/// Locate the JSON object or array embedded in free-form model output.
///
/// Models often wrap the payload in prose or code fences; the block spans from
/// the first opening brace/bracket to the last matching closing one.
pub fn extract_json_block(text: &str) -> Result<serde_json::Value, UpstreamError> {
    let start = text
        .find(|c: char| c == '{' || c == '[')
        .ok_or_else(|| UpstreamError::MalformedResponse("no JSON payload in response".into()))?;
    let close = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text
        .rfind(close)
        .filter(|end| *end > start)
        .ok_or_else(|| UpstreamError::MalformedResponse("unterminated JSON payload".into()))?;
    serde_json::from_str(&text[start..=end])
        .map_err(|e| UpstreamError::MalformedResponse(format!("invalid JSON payload: {}", e)))
}

/// Extract and deserialize the structured payload of a model response.
pub fn parse_structured<T: DeserializeOwned>(text: &str) -> Result<T, UpstreamError> {
    let value = extract_json_block(text)?;
    serde_json::from_value(value)
        .map_err(|e| UpstreamError::MalformedResponse(format!("unexpected payload shape: {}", e)))
}
