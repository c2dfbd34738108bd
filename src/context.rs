use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::UpstreamError;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Deadline and cancellation handle for the collaborator calls of one request.
#[derive(Debug, Clone)]
pub struct CallContext {
    timeout: Duration,
    cancel_token: CancellationToken,
}

impl CallContext {
    pub fn new(timeout: Duration, cancel_token: CancellationToken) -> Self {
        Self {
            timeout,
            cancel_token,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(timeout, CancellationToken::new())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    /// Child context that is cancelled together with this one.
    pub fn child(&self) -> Self {
        Self::new(self.timeout, self.cancel_token.child_token())
    }

    /// Runs `fut` unless the deadline passes or the token fires first.
    pub async fn run<F, T>(&self, operation: &'static str, fut: F) -> Result<T, UpstreamError>
    where
        F: Future<Output = T>,
    {
        if self.cancel_token.is_cancelled() {
            return Err(UpstreamError::Cancelled { operation });
        }

        tokio::select! {
            result = tokio::time::timeout(self.timeout, fut) => {
                result.map_err(|_| UpstreamError::Timeout {
                    operation,
                    after_secs: self.timeout.as_secs(),
                })
            }
            _ = self.cancel_token.cancelled() => {
                Err(UpstreamError::Cancelled { operation })
            }
        }
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }
}
