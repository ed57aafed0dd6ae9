//! The queue-depth seam.

use async_trait::async_trait;
use thiserror::Error;

use jobscale_core::{QueueSnapshot, ScaleError};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue store unavailable: {0}")]
    Unavailable(String),

    #[error("queue query failed: {0}")]
    Query(String),
}

impl From<QueueError> for ScaleError {
    fn from(e: QueueError) -> Self {
        ScaleError::QueueRead(e.to_string())
    }
}

/// Reads how much work is waiting in the durable job queue.
#[async_trait]
pub trait QueueDepthSource: Send + Sync {
    /// Count jobs that are pending or running.
    async fn sample(&self) -> Result<QueueSnapshot, QueueError>;

    /// Release store connections. Called once during shutdown.
    async fn close(&self) {}
}
