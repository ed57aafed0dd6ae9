//! Scripted in-memory queue for tests and local runs.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use jobscale_core::{QueueSnapshot, epoch_ms};

use crate::source::{QueueDepthSource, QueueError};

/// Queue source whose answers are set by the caller.
///
/// Scripted results are consumed first, one per sample; once the script is
/// empty every sample returns the last depth set with [`MemoryQueue::set_depth`].
#[derive(Debug, Default)]
pub struct MemoryQueue {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    depth: u64,
    script: VecDeque<Result<u64, String>>,
    samples: u64,
    closed: bool,
}

impl MemoryQueue {
    pub fn new(depth: u64) -> Self {
        Self {
            inner: Mutex::new(Inner {
                depth,
                ..Default::default()
            }),
        }
    }

    pub async fn set_depth(&self, depth: u64) {
        self.inner.lock().await.depth = depth;
    }

    /// Queue up depths to be returned by the next samples, in order.
    pub async fn push_depths(&self, depths: impl IntoIterator<Item = u64>) {
        let mut inner = self.inner.lock().await;
        inner.script.extend(depths.into_iter().map(Ok));
    }

    /// Make the next sample fail with `message`.
    pub async fn fail_next(&self, message: &str) {
        self.inner
            .lock()
            .await
            .script
            .push_back(Err(message.to_string()));
    }

    pub async fn samples(&self) -> u64 {
        self.inner.lock().await.samples
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.lock().await.closed
    }
}

#[async_trait]
impl QueueDepthSource for MemoryQueue {
    async fn sample(&self) -> Result<QueueSnapshot, QueueError> {
        let mut inner = self.inner.lock().await;
        inner.samples += 1;
        let pending_count = match inner.script.pop_front() {
            Some(Ok(depth)) => {
                inner.depth = depth;
                depth
            }
            Some(Err(message)) => return Err(QueueError::Unavailable(message)),
            None => inner.depth,
        };
        Ok(QueueSnapshot {
            pending_count,
            sampled_at_ms: epoch_ms(),
        })
    }

    async fn close(&self) {
        self.inner.lock().await.closed = true;
    }
}
