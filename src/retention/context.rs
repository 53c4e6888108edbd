use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::RetentionConfig;

/// Execution context of a single retention invocation.
///
/// Every store call made on behalf of the invocation is bounded by
/// `call_timeout`; cancelling `cancel` stops further store calls.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub cancel: CancellationToken,
    pub call_timeout: Duration,
}

impl InvocationContext {
    pub fn new(call_timeout: Duration) -> Self {
        Self {
            cancel: CancellationToken::new(),
            call_timeout,
        }
    }

    pub fn from_config(config: &RetentionConfig) -> Self {
        Self::new(config.call_timeout())
    }

    /// Use `cancel` instead of a fresh token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
