//! Scaling policy — a pure function from observations to a decision.
//!
//! No clocks, no I/O: the same inputs always produce the same
//! [`ScalingDecision`]. Cooldowns are applied afterwards by the loop.

use jobscale_core::{Config, ScaleStep, ScalingDecision};

/// Reason attached to a scale-up that was blocked by the rate limit.
pub const RATE_LIMITED: &str = "rate-limited";

/// Reason attached to a decision demoted by a cooldown.
pub const COOLING_DOWN: &str = "cooling down";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalingPolicy {
    min_replicas: u32,
    max_replicas: u32,
    /// Validated breakpoints: increasing depth, non-decreasing replicas.
    steps: Vec<ScaleStep>,
}

impl ScalingPolicy {
    pub fn new(min_replicas: u32, max_replicas: u32, steps: Vec<ScaleStep>) -> Self {
        Self {
            min_replicas,
            max_replicas,
            steps,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.min_replicas,
            config.max_replicas,
            config.scale_steps.clone(),
        )
    }

    /// Step function from queue depth to replica target.
    ///
    /// Depths beyond the last breakpoint map to `max_replicas`. The result
    /// is always within `[min_replicas, max_replicas]`.
    pub fn target_for(&self, pending: u64) -> u32 {
        let raw = self
            .steps
            .iter()
            .find(|step| pending <= step.max_pending)
            .map(|step| step.replicas)
            .unwrap_or(self.max_replicas);
        raw.clamp(self.min_replicas, self.max_replicas)
    }

    /// Decide how many replicas to run.
    ///
    /// `headroom` is how many replicas may still be added under the global
    /// rate limit; it caps the size of a scale-up, and a headroom of zero
    /// blocks scaling up entirely. Scaling down never needs headroom.
    pub fn decide(&self, pending: u64, current: u32, headroom: u64) -> ScalingDecision {
        let target = self.target_for(pending);

        if target > current {
            if headroom == 0 {
                return ScalingDecision::no_op(current, RATE_LIMITED);
            }
            let allowed = u32::try_from(headroom).unwrap_or(u32::MAX);
            let desired = target
                .min(current.saturating_add(allowed))
                .min(self.max_replicas);
            let reason = if desired < target {
                format!("{pending} pending wants {target}, capped to {desired} by rate limit")
            } else {
                format!("{pending} pending wants {target}")
            };
            return ScalingDecision::scale_up(desired, reason);
        }

        if target < current {
            let desired = target.max(self.min_replicas);
            return ScalingDecision::scale_down(desired, format!("{pending} pending wants {target}"));
        }

        ScalingDecision::no_op(current, "at target")
    }
}
