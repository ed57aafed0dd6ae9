//! In-process fleet used by tests and dry runs.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::controller::{FleetController, FleetError};

/// A fake platform that records every replica update.
#[derive(Debug, Default)]
pub struct MemoryFleet {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    replicas: i64,
    set_calls: Vec<u32>,
    read_failures: VecDeque<FleetError>,
    set_failures: VecDeque<FleetError>,
    closed: bool,
}

impl MemoryFleet {
    pub fn new(replicas: u32) -> Self {
        Self {
            inner: Mutex::new(Inner {
                replicas: i64::from(replicas),
                ..Default::default()
            }),
        }
    }

    /// Change the running count behind the autoscaler's back, the way an
    /// operator editing the service by hand would.
    pub async fn set_out_of_band(&self, replicas: i64) {
        self.inner.lock().await.replicas = replicas;
    }

    pub async fn replicas(&self) -> i64 {
        self.inner.lock().await.replicas
    }

    /// Every successful `set_replica_count` value, in order.
    pub async fn set_calls(&self) -> Vec<u32> {
        self.inner.lock().await.set_calls.clone()
    }

    pub async fn fail_next_read(&self, err: FleetError) {
        self.inner.lock().await.read_failures.push_back(err);
    }

    pub async fn fail_next_set(&self, err: FleetError) {
        self.inner.lock().await.set_failures.push_back(err);
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.lock().await.closed
    }
}

#[async_trait]
impl FleetController for MemoryFleet {
    async fn replica_count(&self, _service_ref: &str) -> Result<i64, FleetError> {
        let mut inner = self.inner.lock().await;
        if let Some(err) = inner.read_failures.pop_front() {
            return Err(err);
        }
        Ok(inner.replicas)
    }

    async fn set_replica_count(&self, service_ref: &str, replicas: u32) -> Result<(), FleetError> {
        let mut inner = self.inner.lock().await;
        if let Some(err) = inner.set_failures.pop_front() {
            return Err(err);
        }
        debug!(service = %service_ref, replicas, "memory fleet updated");
        inner.replicas = i64::from(replicas);
        inner.set_calls.push(replicas);
        Ok(())
    }

    async fn close(&self) {
        self.inner.lock().await.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn setting_same_count_twice_is_idempotent() {
        let fleet = MemoryFleet::new(1);
        fleet.set_replica_count("workers", 3).await.unwrap();
        let after_first = fleet.replicas().await;
        fleet.set_replica_count("workers", 3).await.unwrap();

        assert_eq!(after_first, 3);
        assert_eq!(fleet.replicas().await, 3);
    }

    #[tokio::test]
    async fn injected_set_failure_leaves_count_unchanged() {
        let fleet = MemoryFleet::new(2);
        fleet.fail_next_set(FleetError::transient("503")).await;

        assert!(fleet.set_replica_count("workers", 5).await.is_err());
        assert_eq!(fleet.replicas().await, 2);
        assert!(fleet.set_calls().await.is_empty());
    }
}
