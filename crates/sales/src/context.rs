//! Per-call deadline and cancellation, applied uniformly to every store call.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::placement::PlaceOrderError;
use crate::store::StoreError;

/// Caller-supplied limits for one placement.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl CallContext {
    /// No deadline, never cancelled unless the returned token is.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run one store call under this context.
    ///
    /// A fired token wins over a ready result; an expired deadline is checked
    /// before the call starts.
    pub(crate) async fn run<T, F>(&self, call: F) -> Result<T, PlaceOrderError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        if self.cancel.is_cancelled() {
            return Err(PlaceOrderError::Cancelled);
        }

        let bounded = async {
            match self.deadline {
                Some(deadline) if deadline <= Instant::now() => Err(PlaceOrderError::DeadlineExceeded),
                Some(deadline) => match tokio::time::timeout_at(deadline, call).await {
                    Ok(result) => result.map_err(PlaceOrderError::from),
                    Err(_) => Err(PlaceOrderError::DeadlineExceeded),
                },
                None => call.await.map_err(PlaceOrderError::from),
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(PlaceOrderError::Cancelled),
            result = bounded => result,
        }
    }
}
