//! User-facing error messages.
//!
//! When a call has no fallback, the application shows a `{title, message,
//! action}` triple instead of the raw error.

use crate::error_code::ErrorCode;
use crate::Error;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFacingError {
    pub title: String,
    pub message: String,
    pub action: String,
}

impl UserFacingError {
    fn new(title: &str, message: &str, action: &str) -> Self {
        Self {
            title: title.to_string(),
            message: message.to_string(),
            action: action.to_string(),
        }
    }

    pub fn from_error(err: &Error) -> Self {
        Self::from_code(err.code())
    }

    pub fn from_code(code: ErrorCode) -> Self {
        match code {
            ErrorCode::RateLimited => Self::new(
                "Too many requests",
                "We're receiving a lot of requests right now.",
                "Please wait a moment and try again.",
            ),
            ErrorCode::Timeout | ErrorCode::Aborted => Self::new(
                "Request timed out",
                "The analysis is taking longer than expected.",
                "Please try again. Shorter inputs usually finish faster.",
            ),
            ErrorCode::Authentication => Self::new(
                "Session expired",
                "Your session is no longer valid.",
                "Please sign in again.",
            ),
            ErrorCode::PermissionDenied => Self::new(
                "Access denied",
                "You don't have permission to perform this action.",
                "Contact support if you believe this is a mistake.",
            ),
            ErrorCode::NotFound => Self::new(
                "Not found",
                "The requested information could not be found.",
                "Check the details and try again.",
            ),
            ErrorCode::ConnectionReset | ErrorCode::ConnectTimeout => Self::new(
                "Connection problem",
                "We couldn't reach the service.",
                "Check your internet connection and try again.",
            ),
            ErrorCode::ServerError => Self::new(
                "Service unavailable",
                "The service is temporarily unavailable.",
                "Please try again in a few minutes.",
            ),
            ErrorCode::MalformedResponse => Self::new(
                "Analysis failed",
                "We received an unexpected response while analyzing your request.",
                "Please try again.",
            ),
            ErrorCode::InvalidRequest | ErrorCode::Unknown => Self::new(
                "Something went wrong",
                "An unexpected error occurred.",
                "Please try again. If the problem persists, contact support.",
            ),
        }
    }
}

impl From<&Error> for UserFacingError {
    fn from(err: &Error) -> Self {
        Self::from_error(err)
    }
}
