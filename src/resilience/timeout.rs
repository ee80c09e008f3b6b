//! Timeout wrapper.
//!
//! Bounds how long the *caller* waits for one upstream attempt. On expiry the
//! operation's cancellation token is cancelled and the attempt's future is
//! dropped; the wrapper never waits for the operation to wind down.

use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Run `op` with a deadline of `timeout`, returning [`Error::Timeout`] on expiry.
pub async fn with_timeout<T, F, Fut>(timeout: Duration, op: F) -> Result<T>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    with_timeout_or(timeout, op, None).await
}

/// Like [`with_timeout`], returning `on_timeout` instead of the default error.
pub async fn with_timeout_or<T, F, Fut>(
    timeout: Duration,
    op: F,
    on_timeout: Option<Error>,
) -> Result<T>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let token = CancellationToken::new();
    let fut = op(token.clone());
    bounded(timeout, token, fut, on_timeout).await
}

/// Await an already-started attempt under a deadline.
pub(crate) async fn bounded<T, Fut>(
    timeout: Duration,
    token: CancellationToken,
    fut: Fut,
    on_timeout: Option<Error>,
) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            token.cancel();
            Err(on_timeout.unwrap_or_else(|| Error::timeout(timeout)))
        }
    }
}
