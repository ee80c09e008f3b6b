use uuid::Uuid;

/// Request-scoped identity threaded explicitly into every resilient call.
///
/// Carries what log lines need to be correlated: the logical operation, the
/// acting user (if any) and a request id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    pub operation: String,
    pub user_id: Option<String>,
    pub request_id: String,
}

impl CallContext {
    /// New context with a freshly generated request id.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            user_id: None,
            request_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub(crate) fn error_context(&self) -> crate::ErrorContext {
        crate::ErrorContext::new()
            .with_operation(self.operation.clone())
            .with_request_id(self.request_id.clone())
    }
}
