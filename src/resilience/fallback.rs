//! Fallback orchestration.
//!
//! The last line of defence around an upstream call: any error from the
//! primary path is logged and replaced by a fallback value or by the result
//! of a fallback operation. Only a failing fallback operation surfaces an
//! error, and that error is returned unmodified.

use crate::context::CallContext;
use crate::Result;
use futures::future::BoxFuture;
use std::future::Future;
use tracing::error;

pub enum Fallback<T> {
    /// Static degraded result.
    Value(T),
    /// Computed degraded result (e.g. baseline skill matching).
    Operation(Box<dyn FnOnce() -> BoxFuture<'static, Result<T>> + Send>),
}

impl<T> Fallback<T> {
    pub fn value(value: T) -> Self {
        Fallback::Value(value)
    }

    pub fn operation<F, Fut>(f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Fallback::Operation(Box::new(move || -> BoxFuture<'static, Result<T>> {
            Box::pin(f())
        }))
    }

    pub async fn resolve(self) -> Result<T> {
        match self {
            Fallback::Value(value) => Ok(value),
            Fallback::Operation(op) => op().await,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Fallback::Value(_) => "value",
            Fallback::Operation(_) => "operation",
        }
    }
}

impl<T> std::fmt::Debug for Fallback<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Fallback::{}", self.kind())
    }
}

/// Await `primary`; on error, log it with `ctx` and resolve `fallback` instead.
pub async fn with_fallback<T, Fut>(ctx: &CallContext, primary: Fut, fallback: Fallback<T>) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match primary.await {
        Ok(value) => Ok(value),
        Err(err) => {
            let code = err.code();
            error!(
                operation = ctx.operation.as_str(),
                user_id = ctx.user_id.as_deref().unwrap_or("-"),
                request_id = ctx.request_id.as_str(),
                error_code = code.code(),
                error_class = code.name(),
                fallback = fallback.kind(),
                error = %err,
                "upstream call failed; serving fallback"
            );
            fallback.resolve().await
        }
    }
}
