//! Pacing between record attempts within a batch.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

/// Awaited by the engine after every record attempt in a batch.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn pause(&self);
}

/// Sleeps for a fixed delay on every pause.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl RateLimiter for FixedDelay {
    async fn pause(&self) {
        tracing::trace!(delay_ms = self.delay.as_millis() as u64, "rate limit pause");
        tokio::time::sleep(self.delay).await;
    }
}

/// Never waits. Used in tests and when the configured delay is zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

#[async_trait]
impl RateLimiter for NoDelay {
    async fn pause(&self) {}
}

/// Limiter for a configured delay; a zero delay disables pacing.
pub fn limiter_for(delay: Duration) -> Arc<dyn RateLimiter> {
    if delay.is_zero() {
        Arc::new(NoDelay)
    } else {
        Arc::new(FixedDelay::new(delay))
    }
}
