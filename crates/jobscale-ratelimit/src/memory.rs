//! Process-local fixed window with the same semantics as the Redis one.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::coordinator::{RateLimitCoordinator, RateLimitError};

#[derive(Debug)]
pub struct MemoryWindow {
    cap: u64,
    window: Duration,
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    used: u64,
    /// Set on the first reservation of a window, never refreshed.
    expires_at: Option<Instant>,
    failures: u32,
}

impl MemoryWindow {
    pub fn new(cap: u64, window: Duration) -> Self {
        Self {
            cap,
            window,
            inner: Mutex::new(Inner {
                used: 0,
                expires_at: None,
                failures: 0,
            }),
        }
    }

    /// Make the next `n` calls fail as if the store were down.
    pub async fn fail_next(&self, n: u32) {
        self.inner.lock().await.failures = n;
    }

    pub async fn used(&self) -> u64 {
        let mut inner = self.inner.lock().await;
        expire(&mut inner);
        inner.used
    }
}

fn expire(inner: &mut Inner) {
    if inner.expires_at.is_some_and(|at| Instant::now() >= at) {
        inner.used = 0;
        inner.expires_at = None;
    }
}

fn take_failure(inner: &mut Inner) -> Result<(), RateLimitError> {
    if inner.failures > 0 {
        inner.failures -= 1;
        return Err(RateLimitError::Unavailable("injected failure".into()));
    }
    Ok(())
}

#[async_trait]
impl RateLimitCoordinator for MemoryWindow {
    async fn reserve(&self, cost: u64) -> Result<bool, RateLimitError> {
        let mut inner = self.inner.lock().await;
        take_failure(&mut inner)?;
        expire(&mut inner);

        if inner.used + cost > self.cap {
            return Ok(false);
        }
        inner.used += cost;
        if inner.expires_at.is_none() {
            inner.expires_at = Some(Instant::now() + self.window);
        }
        Ok(true)
    }

    async fn headroom(&self) -> Result<u64, RateLimitError> {
        let mut inner = self.inner.lock().await;
        take_failure(&mut inner)?;
        expire(&mut inner);
        Ok(self.cap.saturating_sub(inner.used))
    }
}
