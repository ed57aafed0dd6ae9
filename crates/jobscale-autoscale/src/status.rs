//! Read-only view of the autoscaler for the status server.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use jobscale_core::{ScalingState, epoch_ms};
use jobscale_metrics::{CounterSnapshot, ScaleCounters};

/// Body of `GET /health`: the state snapshot plus derived cooldown timers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    #[serde(flatten)]
    pub state: ScalingState,
    pub scale_up_cooldown_remaining_ms: u64,
    pub scale_down_cooldown_remaining_ms: u64,
}

/// Cloneable handle onto the loop's published state.
///
/// Reading holds the channel's lock only long enough to clone the state,
/// so the loop is never held up by a status probe.
#[derive(Clone)]
pub struct StatusHandle {
    state: watch::Receiver<ScalingState>,
    counters: Arc<ScaleCounters>,
    scale_up_cooldown_ms: u64,
    scale_down_cooldown_ms: u64,
}

impl StatusHandle {
    pub(crate) fn new(
        state: watch::Receiver<ScalingState>,
        counters: Arc<ScaleCounters>,
        scale_up_cooldown_ms: u64,
        scale_down_cooldown_ms: u64,
    ) -> Self {
        Self {
            state,
            counters,
            scale_up_cooldown_ms,
            scale_down_cooldown_ms,
        }
    }

    pub fn snapshot(&self) -> ScalingState {
        self.state.borrow().clone()
    }

    pub fn health_report(&self) -> HealthReport {
        self.health_report_at(epoch_ms())
    }

    pub fn health_report_at(&self, now_ms: u64) -> HealthReport {
        let state = self.snapshot();
        HealthReport {
            scale_up_cooldown_remaining_ms: state
                .scale_up_cooldown_remaining_ms(self.scale_up_cooldown_ms, now_ms),
            scale_down_cooldown_remaining_ms: state
                .scale_down_cooldown_remaining_ms(self.scale_down_cooldown_ms, now_ms),
            state,
        }
    }

    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }
}
