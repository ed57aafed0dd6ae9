//! Data model shared by the control loop and the status server.
//!
//! Timestamps are Unix epoch milliseconds. Nothing here is persisted; every
//! value is either recreated per tick or owned by the running loop.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// ── Queue ──────────────────────────────────────────────────────────

/// A single sample of the queue's pending work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Jobs that are pending or running.
    pub pending_count: u64,
    /// When the sample was taken (epoch ms).
    pub sampled_at_ms: u64,
}

// ── Decisions ──────────────────────────────────────────────────────

/// Classification of a scaling decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleAction {
    #[default]
    NoOp,
    ScaleUp,
    ScaleDown,
}

/// The outcome of one policy evaluation. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingDecision {
    pub desired_replicas: u32,
    pub action: ScaleAction,
    pub reason: String,
}

impl ScalingDecision {
    /// A decision that keeps the fleet at `current` replicas.
    pub fn no_op(current: u32, reason: impl Into<String>) -> Self {
        Self {
            desired_replicas: current,
            action: ScaleAction::NoOp,
            reason: reason.into(),
        }
    }

    pub fn scale_up(desired: u32, reason: impl Into<String>) -> Self {
        Self {
            desired_replicas: desired,
            action: ScaleAction::ScaleUp,
            reason: reason.into(),
        }
    }

    pub fn scale_down(desired: u32, reason: impl Into<String>) -> Self {
        Self {
            desired_replicas: desired,
            action: ScaleAction::ScaleDown,
            reason: reason.into(),
        }
    }
}

// ── Loop state ─────────────────────────────────────────────────────

/// Where the control loop currently is within a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopPhase {
    #[default]
    Idle,
    Polling,
    Deciding,
    Cooling,
    Reconciling,
    /// Terminal: reached only through the shutdown signal.
    Stopped,
}

/// Category of a recorded tick failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    QueueRead,
    RateLimitStore,
    FleetControl,
    InternalInvariant,
}

/// Whether a fleet-control failure is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FleetErrorKind {
    /// Network trouble, timeouts, 5xx, throttling.
    Transient,
    /// Bad credentials, unknown service, rejected request.
    Permanent,
}

impl std::fmt::Display for FleetErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FleetErrorKind::Transient => f.write_str("transient"),
            FleetErrorKind::Permanent => f.write_str("permanent"),
        }
    }
}

/// The most recent tick failure, as exposed on `/health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastError {
    pub kind: ErrorKind,
    pub message: String,
    pub at_ms: u64,
}

/// State owned by the autoscaler loop. The status server only ever sees
/// cloned snapshots of it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScalingState {
    /// Replica count last read from (or successfully written to) the fleet.
    pub current_replicas: u32,
    pub last_scale_up_at_ms: Option<u64>,
    pub last_scale_down_at_ms: Option<u64>,
    pub last_decision: ScaleAction,
    pub last_error: Option<LastError>,
    pub phase: LoopPhase,
    /// Pending count from the last successful queue sample.
    pub last_pending_count: Option<u64>,
    pub last_tick_at_ms: Option<u64>,
    /// Number of ticks started.
    pub ticks: u64,
}

impl ScalingState {
    /// Milliseconds until another scale-up is allowed, 0 if allowed now.
    pub fn scale_up_cooldown_remaining_ms(&self, cooldown_ms: u64, now_ms: u64) -> u64 {
        cooldown_remaining_ms(self.last_scale_up_at_ms, cooldown_ms, now_ms)
    }

    /// Milliseconds until another scale-down is allowed, 0 if allowed now.
    pub fn scale_down_cooldown_remaining_ms(&self, cooldown_ms: u64, now_ms: u64) -> u64 {
        cooldown_remaining_ms(self.last_scale_down_at_ms, cooldown_ms, now_ms)
    }
}

/// Time left on a cooldown that started at `last_at_ms`.
///
/// A cooldown of `c` started at `t` blocks every instant in `[t, t + c)`.
pub fn cooldown_remaining_ms(last_at_ms: Option<u64>, cooldown_ms: u64, now_ms: u64) -> u64 {
    match last_at_ms {
        Some(last) => {
            let elapsed = now_ms.saturating_sub(last);
            cooldown_ms.saturating_sub(elapsed)
        }
        None => 0,
    }
}

pub fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
