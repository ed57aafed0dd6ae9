//! The rate-limit seam.

use async_trait::async_trait;
use thiserror::Error;

use jobscale_core::ScaleError;

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("rate-limit store unavailable: {0}")]
    Unavailable(String),

    #[error("rate-limit command failed: {0}")]
    Command(String),
}

impl From<RateLimitError> for ScaleError {
    fn from(e: RateLimitError) -> Self {
        ScaleError::RateLimitStore(e.to_string())
    }
}

/// A shared counter with a cap and a fixed time window.
#[async_trait]
pub trait RateLimitCoordinator: Send + Sync {
    /// Atomically take `cost` units if they fit under the cap.
    async fn reserve(&self, cost: u64) -> Result<bool, RateLimitError>;

    /// Units still available in the current window.
    async fn headroom(&self) -> Result<u64, RateLimitError>;

    /// Release store connections. Called once during shutdown.
    async fn close(&self) {}
}
