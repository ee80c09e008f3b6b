use crate::error_code::ErrorCode;
use crate::upstream::UpstreamError;
use std::time::Duration;
use thiserror::Error;

/// Structured error context for logging and debugging.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorContext {
    /// Logical operation that failed (e.g., "transferable_skills", "onet_lookup")
    pub operation: Option<String>,
    /// Request id the failure belongs to, when known
    pub request_id: Option<String>,
    /// Additional context about the error (e.g., collection name, key)
    pub details: Option<String>,
    /// Component that raised the error (e.g., "memory_cache", "timeout")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Unified error type for the resilience runtime.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Operation timed out after {}ms{}", .after.as_millis(), format_context(.context))]
    Timeout {
        after: Duration,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Cache store error: {message}{}", format_context(.context))]
    Store {
        message: String,
        context: ErrorContext,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref op) = ctx.operation {
        parts.push(format!("operation: {}", op));
    }
    if let Some(ref id) = ctx.request_id {
        parts.push(format!("request_id: {}", id));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn store_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Store {
            message: msg.into(),
            context,
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Error::Timeout {
            after,
            context: ErrorContext::new().with_source("timeout"),
        }
    }

    /// Classify this error into a stable code. Drives retry decisions and user messages.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Upstream(e) => e.code(),
            Error::Timeout { .. } => ErrorCode::Timeout,
            Error::Serialization(_) => ErrorCode::MalformedResponse,
            Error::Configuration { .. } | Error::Store { .. } | Error::Yaml(_) | Error::Io(_) => {
                ErrorCode::Unknown
            }
        }
    }

    /// Whether the default classifier treats this error as transient.
    pub fn is_retryable(&self) -> bool {
        self.code().retryable()
    }

    /// Upstream-provided hint for how long to wait before retrying.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::Upstream(UpstreamError::RateLimited { retry_after, .. }) => *retry_after,
            _ => None,
        }
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Timeout { context, .. }
            | Error::Configuration { context, .. }
            | Error::Store { context, .. } => Some(context),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context_fields() {
        let err = Error::store_with_context(
            "collection file unreadable",
            ErrorContext::new()
                .with_operation("onet_lookup")
                .with_source("json_file_store"),
        );
        let text = err.to_string();
        assert!(text.contains("collection file unreadable"));
        assert!(text.contains("operation: onet_lookup"));
        assert!(text.contains("source: json_file_store"));
    }

    #[test]
    fn timeout_is_retryable_configuration_is_not() {
        assert!(Error::timeout(Duration::from_millis(10)).is_retryable());
        assert!(!Error::configuration("bad").is_retryable());
    }

    #[test]
    fn retry_after_only_from_rate_limits() {
        let err = Error::from(UpstreamError::RateLimited {
            message: "slow down".into(),
            retry_after: Some(Duration::from_secs(2)),
        });
        assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));
        let err = Error::from(UpstreamError::Http {
            status: 503,
            message: "unavailable".into(),
        });
        assert_eq!(err.retry_after(), None);
    }
}
