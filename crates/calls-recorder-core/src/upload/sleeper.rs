use std::time::Duration;

use async_trait::async_trait;

/// Waits between upload attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Sleep for the specified duration.
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
