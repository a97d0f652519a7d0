//! Bounded retry around a sink
//!
//! [`RetryingSink`] retries transient failures (connection errors, 5xx,
//! 429) with exponential backoff. Once `max_attempts` is spent the last
//! error is returned as `SinkError::RetriesExhausted`, which the sink
//! worker treats as fatal. Other rejections (e.g. 400 for a malformed
//! point) are returned at once.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use logship_core::error::SinkError;
use logship_core::metrics as m;
use logship_core::pipeline::{DynEventSink, EventSink};
use logship_core::types::ParsedEvent;

/// Retry attempts and backoff bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per event, first one included; 1 disables retries
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_backoff: Duration,
    /// Upper bound on any delay
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based): doubles each time, capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(31);
        self.initial_backoff
            .saturating_mul(1u32 << shift)
            .min(self.max_backoff)
    }
}

/// Whether a failure is worth another attempt.
pub fn is_transient(err: &SinkError) -> bool {
    match err {
        SinkError::Connection(_) => true,
        SinkError::Rejected { status, .. } => *status >= 500 || *status == 429,
        SinkError::InvalidDsn(_) | SinkError::RetriesExhausted { .. } => false,
    }
}

/// Sink decorator applying a [`RetryPolicy`]
pub struct RetryingSink {
    inner: Arc<dyn DynEventSink>,
    policy: RetryPolicy,
}

impl RetryingSink {
    /// Wraps `inner`.
    pub fn new(inner: Arc<dyn DynEventSink>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Active policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl EventSink for RetryingSink {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn deliver(&self, event: &ParsedEvent) -> Result<(), SinkError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let err = match self.inner.deliver(event).await {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };

            if !is_transient(&err) {
                return Err(err);
            }
            if attempt >= max_attempts {
                return Err(SinkError::RetriesExhausted {
                    attempts: attempt,
                    last_error: err.to_string(),
                });
            }

            let delay = self.policy.backoff(attempt);
            warn!(
                sink = self.inner.name(),
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "point write failed, retrying"
            );
            metrics::counter!(m::SINK_RETRIES_TOTAL, m::LABEL_SINK => self.inner.name().to_owned())
                .increment(1);

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
