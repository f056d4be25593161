// src/tools/async_support.rs
//! Deadline helpers for async operations.

use crate::core::errors::TimeoutError;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

/// A deadline plus the label reported when it fires.
#[derive(Debug, Clone)]
pub struct TimeoutGuard {
    pub duration: Duration,
    pub label: String,
}

impl TimeoutGuard {
    pub fn new(duration: Duration, label: impl Into<String>) -> Self {
        Self { duration, label: label.into() }
    }

    /// Runs `future` against the deadline.
    ///
    /// When the deadline wins the future is dropped at its current suspension
    /// point; whatever it would have produced is discarded. Anything it already
    /// handed to the outside world (an RPC in flight) is not rolled back, so
    /// callers that need the work itself to stop must also flip a cancellation
    /// token the future observes.
    pub async fn run<F, T>(&self, future: F) -> Result<T, TimeoutError>
    where
        F: Future<Output = T>,
    {
        match timeout(self.duration, future).await {
            Ok(value) => Ok(value),
            Err(_) => {
                warn!("'{}' timed out after {:?}", self.label, self.duration);
                Err(TimeoutError { label: self.label.clone(), duration: self.duration })
            }
        }
    }
}

/// Shorthand for `TimeoutGuard::new(duration, label).run(future)`.
pub async fn with_timeout<F, T>(
    future: F,
    duration: Duration,
    label: impl Into<String>,
) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    TimeoutGuard::new(duration, label).run(future).await
}
