//! 标准错误码：定义上游调用失败的分类及其重试语义。
//!
//! Standard error codes for upstream call failures.
//!
//! Every failure the runtime observes is mapped to exactly one [`ErrorCode`].
//! The code decides whether the retry wrapper may try again and which
//! user-facing message a caller renders when no fallback exists.
//!
//! ## Error Code Categories
//!
//! | Prefix | Category  | Description                         |
//! |--------|-----------|-------------------------------------|
//! | E1xxx  | client    | Request-side or permanent errors    |
//! | E2xxx  | rate      | Rate limit errors                   |
//! | E3xxx  | server    | Provider-side and transport errors  |
//! | E9xxx  | unknown   | Catch-all / unclassified            |
//!
//! ## Example
//!
//! ```rust
//! use careeros_resilience::error_code::ErrorCode;
//!
//! let code = ErrorCode::from_http_status(429);
//! assert_eq!(code.code(), "E2001");
//! assert!(code.retryable());
//! assert_eq!(code.category(), "rate");
//! ```

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// E1001: Malformed request or other non-specific 4xx
    InvalidRequest,
    /// E1002: HTTP 401
    Authentication,
    /// E1003: HTTP 403
    PermissionDenied,
    /// E1004: HTTP 404
    NotFound,
    /// E1006: Upstream answered but the expected structured payload is missing
    MalformedResponse,
    /// E2001: HTTP 429 or provider rate limit
    RateLimited,
    /// E3001: Upstream 5xx
    ServerError,
    /// E3003: Wall-clock budget exceeded
    Timeout,
    /// E3004: Connection reset by peer
    ConnectionReset,
    /// E3005: Could not establish a connection in time
    ConnectTimeout,
    /// E3006: Request was aborted before completion
    Aborted,
    /// E9999: Error could not be classified
    Unknown,
}

impl ErrorCode {
    #[inline]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "E1001",
            Self::Authentication => "E1002",
            Self::PermissionDenied => "E1003",
            Self::NotFound => "E1004",
            Self::MalformedResponse => "E1006",
            Self::RateLimited => "E2001",
            Self::ServerError => "E3001",
            Self::Timeout => "E3003",
            Self::ConnectionReset => "E3004",
            Self::ConnectTimeout => "E3005",
            Self::Aborted => "E3006",
            Self::Unknown => "E9999",
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::Authentication => "authentication",
            Self::PermissionDenied => "permission_denied",
            Self::NotFound => "not_found",
            Self::MalformedResponse => "malformed_response",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::Timeout => "timeout",
            Self::ConnectionReset => "connection_reset",
            Self::ConnectTimeout => "connect_timeout",
            Self::Aborted => "aborted",
            Self::Unknown => "unknown",
        }
    }

    /// Whether this error is transient. Unclassified errors are not retried.
    #[inline]
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited
                | Self::ServerError
                | Self::Timeout
                | Self::ConnectionReset
                | Self::ConnectTimeout
                | Self::Aborted
        )
    }

    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidRequest
            | Self::Authentication
            | Self::PermissionDenied
            | Self::NotFound
            | Self::MalformedResponse => "client",
            Self::RateLimited => "rate",
            Self::ServerError
            | Self::Timeout
            | Self::ConnectionReset
            | Self::ConnectTimeout
            | Self::Aborted => "server",
            Self::Unknown => "unknown",
        }
    }

    /// Maps an HTTP status code to the most likely `ErrorCode`.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            401 => Self::Authentication,
            403 => Self::PermissionDenied,
            404 => Self::NotFound,
            408 => Self::Timeout,
            429 => Self::RateLimited,
            500..=599 => Self::ServerError,
            400..=499 => Self::InvalidRequest,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_codes_are_retryable() {
        for code in [
            ErrorCode::RateLimited,
            ErrorCode::ServerError,
            ErrorCode::Timeout,
            ErrorCode::ConnectionReset,
            ErrorCode::ConnectTimeout,
            ErrorCode::Aborted,
        ] {
            assert!(code.retryable(), "{} should be retryable", code.name());
        }
    }

    #[test]
    fn permanent_and_unknown_codes_are_not_retryable() {
        for code in [
            ErrorCode::Authentication,
            ErrorCode::PermissionDenied,
            ErrorCode::NotFound,
            ErrorCode::InvalidRequest,
            ErrorCode::MalformedResponse,
            ErrorCode::Unknown,
        ] {
            assert!(!code.retryable(), "{} should not be retryable", code.name());
        }
    }

    #[test]
    fn http_status_mapping() {
        assert_eq!(ErrorCode::from_http_status(401), ErrorCode::Authentication);
        assert_eq!(ErrorCode::from_http_status(403), ErrorCode::PermissionDenied);
        assert_eq!(ErrorCode::from_http_status(404), ErrorCode::NotFound);
        assert_eq!(ErrorCode::from_http_status(429), ErrorCode::RateLimited);
        assert_eq!(ErrorCode::from_http_status(502), ErrorCode::ServerError);
        assert_eq!(ErrorCode::from_http_status(599), ErrorCode::ServerError);
        assert_eq!(ErrorCode::from_http_status(422), ErrorCode::InvalidRequest);
        assert_eq!(ErrorCode::from_http_status(302), ErrorCode::Unknown);
    }
}
