//! Autoscaler loop — polls the queue and reconciles the fleet.
//!
//! One tick walks `Idle → Polling → Deciding → (Cooling | Reconciling) →
//! Idle`. Ticks never overlap: the next one is only scheduled after the
//! previous tick's fleet call has resolved.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use jobscale_core::{
    Config, FleetErrorKind, LastError, LoopPhase, ScaleAction, ScaleError, ScalingDecision,
    ScalingState, cooldown_remaining_ms, epoch_ms,
};
use jobscale_fleet::FleetController;
use jobscale_metrics::ScaleCounters;
use jobscale_queue::QueueDepthSource;
use jobscale_ratelimit::RateLimitCoordinator;

use crate::policy::{COOLING_DOWN, RATE_LIMITED, ScalingPolicy};
use crate::status::StatusHandle;

/// Drives the queue → policy → fleet control loop.
///
/// Owns the only mutable [`ScalingState`]; everyone else reads clones
/// through a [`StatusHandle`].
pub struct AutoscalerLoop {
    config: Config,
    policy: ScalingPolicy,
    queue: Arc<dyn QueueDepthSource>,
    limiter: Arc<dyn RateLimitCoordinator>,
    fleet: Arc<dyn FleetController>,
    counters: Arc<ScaleCounters>,
    state: ScalingState,
    published: watch::Sender<ScalingState>,
    /// Set when a non-fatal error was recorded during the current tick.
    degraded: bool,
}

impl AutoscalerLoop {
    pub fn new(
        config: Config,
        queue: Arc<dyn QueueDepthSource>,
        limiter: Arc<dyn RateLimitCoordinator>,
        fleet: Arc<dyn FleetController>,
    ) -> Self {
        let policy = ScalingPolicy::from_config(&config);
        let state = ScalingState::default();
        let (published, _) = watch::channel(state.clone());
        Self {
            config,
            policy,
            queue,
            limiter,
            fleet,
            counters: Arc::new(ScaleCounters::new()),
            state,
            published,
            degraded: false,
        }
    }

    /// Read-only handle for the status server.
    pub fn status(&self) -> StatusHandle {
        StatusHandle::new(
            self.published.subscribe(),
            Arc::clone(&self.counters),
            self.config.scale_up_cooldown_ms,
            self.config.scale_down_cooldown_ms,
        )
    }

    pub fn state(&self) -> &ScalingState {
        &self.state
    }

    /// Run one tick against the wall clock.
    pub async fn tick(&mut self) -> Result<ScalingDecision, ScaleError> {
        self.tick_at(epoch_ms()).await
    }

    /// Run one tick as if the current time were `now_ms`.
    ///
    /// Returns the decision that was acted on (possibly demoted to a no-op),
    /// or the error that cut the tick short. Either way the loop survives.
    pub async fn tick_at(&mut self, now_ms: u64) -> Result<ScalingDecision, ScaleError> {
        self.counters.record_tick();
        self.degraded = false;
        self.state.ticks += 1;
        self.state.last_tick_at_ms = Some(now_ms);

        let result = self.evaluate(now_ms).await;
        match &result {
            Ok(decision) => {
                self.state.last_decision = decision.action;
                if !self.degraded {
                    self.state.last_error = None;
                }
            }
            Err(e) => self.record_error(e, now_ms),
        }

        self.set_phase(LoopPhase::Idle);
        result
    }

    async fn evaluate(&mut self, now_ms: u64) -> Result<ScalingDecision, ScaleError> {
        let call_timeout = self.config.call_timeout();

        // ── Polling ──────────────────────────────────────────────
        self.set_phase(LoopPhase::Polling);

        let snapshot = match bounded(call_timeout, self.queue.sample(), ScaleError::QueueRead).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.counters.record_poll_error();
                return Err(e);
            }
        };
        let pending = snapshot.pending_count;
        self.state.last_pending_count = Some(pending);

        let headroom =
            match bounded(call_timeout, self.limiter.headroom(), ScaleError::RateLimitStore).await {
                Ok(headroom) => headroom,
                Err(e) => {
                    warn!(error = %e, "rate-limit store unavailable, assuming no headroom");
                    self.record_error(&e, now_ms);
                    0
                }
            };

        // The fleet is the source of truth for the running count, re-read
        // every tick so out-of-band changes are picked up.
        let reported = match bounded(
            call_timeout,
            self.fleet.replica_count(&self.config.service_ref),
            transient_fleet_error,
        )
        .await
        {
            Ok(reported) => reported,
            Err(e) => {
                self.counters.record_poll_error();
                return Err(e);
            }
        };
        let current = self.reconcile_reported(reported, now_ms);

        // ── Deciding ─────────────────────────────────────────────
        self.set_phase(LoopPhase::Deciding);

        let decision = self.policy.decide(pending, current, headroom);
        debug!(
            pending,
            current,
            headroom,
            desired = decision.desired_replicas,
            action = ?decision.action,
            reason = %decision.reason,
            "policy evaluated"
        );
        if decision.reason == RATE_LIMITED {
            self.counters.record_rate_limit_rejection();
        }

        let decision = self.gate_cooldown(decision, current, now_ms);
        if decision.action == ScaleAction::NoOp {
            return Ok(decision);
        }
        let decision = self.enforce_bounds(decision, current, now_ms);
        if decision.action == ScaleAction::NoOp {
            return Ok(decision);
        }

        if decision.action == ScaleAction::ScaleUp {
            let cost = u64::from(decision.desired_replicas - current);
            if !self.reserve(cost, now_ms).await {
                self.counters.record_rate_limit_rejection();
                debug!(cost, "scale-up denied by rate limit");
                return Ok(ScalingDecision::no_op(current, RATE_LIMITED));
            }
        }

        // ── Reconciling ──────────────────────────────────────────
        self.set_phase(LoopPhase::Reconciling);
        self.apply(decision, current, now_ms).await
    }

    /// Validate the platform-reported count. A nonsensical value keeps the
    /// last known count instead of feeding garbage into the policy.
    fn reconcile_reported(&mut self, reported: i64, now_ms: u64) -> u32 {
        match u32::try_from(reported) {
            Ok(actual) => {
                if actual != self.state.current_replicas {
                    info!(
                        from = self.state.current_replicas,
                        to = actual,
                        "replica count reconciled from fleet"
                    );
                    self.state.current_replicas = actual;
                }
                actual
            }
            Err(_) => {
                let e = ScaleError::InternalInvariant(format!(
                    "fleet reported {reported} replicas, keeping {}",
                    self.state.current_replicas
                ));
                error!(error = %e, "invalid replica count");
                self.record_error(&e, now_ms);
                self.state.current_replicas
            }
        }
    }

    /// Demote a scale action while its own cooldown is running.
    ///
    /// Scale-up and scale-down cooldowns are tracked separately, so a
    /// recent scale-up never delays a scale-down and vice versa.
    fn gate_cooldown(&mut self, decision: ScalingDecision, current: u32, now_ms: u64) -> ScalingDecision {
        let (last, cooldown) = match decision.action {
            ScaleAction::NoOp => return decision,
            ScaleAction::ScaleUp => (self.state.last_scale_up_at_ms, self.config.scale_up_cooldown_ms),
            ScaleAction::ScaleDown => (
                self.state.last_scale_down_at_ms,
                self.config.scale_down_cooldown_ms,
            ),
        };

        let remaining = cooldown_remaining_ms(last, cooldown, now_ms);
        if remaining == 0 {
            return decision;
        }

        self.set_phase(LoopPhase::Cooling);
        self.counters.record_cooldown_suppression();
        debug!(
            action = ?decision.action,
            desired = decision.desired_replicas,
            remaining_ms = remaining,
            "decision suppressed by cooldown"
        );
        ScalingDecision::no_op(current, COOLING_DOWN)
    }

    /// Reject a decision that moves the wrong way or overshoots a bound.
    ///
    /// A headroom-capped scale-up that stays below `min_replicas` is still a
    /// step toward the floor and passes untouched.
    fn enforce_bounds(
        &mut self,
        decision: ScalingDecision,
        current: u32,
        now_ms: u64,
    ) -> ScalingDecision {
        let (min, max) = (self.config.min_replicas, self.config.max_replicas);
        let desired = decision.desired_replicas;
        let (valid, clamped) = match decision.action {
            ScaleAction::NoOp => return decision,
            ScaleAction::ScaleUp => (desired > current && desired <= max, desired.min(max)),
            ScaleAction::ScaleDown => (desired < current && desired >= min, desired.max(min)),
        };
        if valid {
            return decision;
        }

        let e = ScaleError::InternalInvariant(format!(
            "{:?} from {current} to {desired} with bounds [{min}, {max}]",
            decision.action
        ));
        error!(error = %e, "correcting scaling decision");
        self.record_error(&e, now_ms);

        let still_moves = match decision.action {
            ScaleAction::ScaleUp => clamped > current,
            _ => clamped < current,
        };
        if still_moves {
            ScalingDecision {
                desired_replicas: clamped,
                ..decision
            }
        } else {
            ScalingDecision::no_op(current, decision.reason)
        }
    }

    /// Take `cost` units from the shared window. Store failures deny.
    async fn reserve(&mut self, cost: u64, now_ms: u64) -> bool {
        match bounded(
            self.config.call_timeout(),
            self.limiter.reserve(cost),
            ScaleError::RateLimitStore,
        )
        .await
        {
            Ok(granted) => granted,
            Err(e) => {
                warn!(error = %e, "rate-limit reservation failed, denying scale-up");
                self.record_error(&e, now_ms);
                false
            }
        }
    }

    async fn apply(
        &mut self,
        decision: ScalingDecision,
        current: u32,
        now_ms: u64,
    ) -> Result<ScalingDecision, ScaleError> {
        let result = bounded(
            self.config.call_timeout(),
            self.fleet
                .set_replica_count(&self.config.service_ref, decision.desired_replicas),
            transient_fleet_error,
        )
        .await;

        if let Err(e) = result {
            // Cooldown timestamps stay untouched: nothing was applied.
            self.counters.record_fleet_error();
            warn!(
                from = current,
                to = decision.desired_replicas,
                error = %e,
                "replica update failed"
            );
            return Err(e);
        }

        match decision.action {
            ScaleAction::ScaleUp => {
                self.state.last_scale_up_at_ms = Some(now_ms);
                self.counters.record_scale_up();
                info!(from = current, to = decision.desired_replicas, reason = %decision.reason, "scaled up");
            }
            ScaleAction::ScaleDown => {
                self.state.last_scale_down_at_ms = Some(now_ms);
                self.counters.record_scale_down();
                info!(from = current, to = decision.desired_replicas, reason = %decision.reason, "scaled down");
            }
            ScaleAction::NoOp => {}
        }
        self.state.current_replicas = decision.desired_replicas;
        Ok(decision)
    }

    fn record_error(&mut self, e: &ScaleError, now_ms: u64) {
        self.degraded = true;
        self.state.last_error = Some(LastError {
            kind: e.kind(),
            message: e.to_string(),
            at_ms: now_ms,
        });
    }

    fn set_phase(&mut self, phase: LoopPhase) {
        self.state.phase = phase;
        self.published.send_replace(self.state.clone());
    }

    /// Run the loop until the shutdown signal fires.
    ///
    /// An in-flight tick is allowed to finish; every call inside it is
    /// time-bounded. Collaborators are closed before returning.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        let poll_interval = self.config.poll_interval();
        info!(
            interval_ms = poll_interval.as_millis() as u64,
            service = %self.config.service_ref,
            "autoscaler started"
        );

        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        warn!(error = %e, transient = e.is_transient(), "autoscaler tick failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!("autoscaler shutting down");
                    break;
                }
            }
        }

        self.stop().await;
    }

    async fn stop(&mut self) {
        self.queue.close().await;
        self.limiter.close().await;
        self.fleet.close().await;
        self.set_phase(LoopPhase::Stopped);
        info!("autoscaler stopped");
    }
}

/// Await `fut` for at most `limit`, folding both its error and a timeout
/// into a [`ScaleError`].
async fn bounded<T, E, F>(
    limit: Duration,
    fut: F,
    on_timeout: fn(String) -> ScaleError,
) -> Result<T, ScaleError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<ScaleError>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(on_timeout(format!(
            "timed out after {}ms",
            limit.as_millis()
        ))),
    }
}

fn transient_fleet_error(message: String) -> ScaleError {
    ScaleError::FleetControl {
        kind: FleetErrorKind::Transient,
        message,
    }
}

#[cfg(test)]
mod tests {
    use jobscale_core::ErrorKind;
    use jobscale_fleet::{FleetError, MemoryFleet};
    use jobscale_queue::MemoryQueue;
    use jobscale_ratelimit::MemoryWindow;

    use super::*;

    const UP_COOLDOWN: u64 = 30_000;
    const DOWN_COOLDOWN: u64 = 120_000;

    fn test_config() -> Config {
        Config {
            service_ref: "workers".to_string(),
            max_replicas: 6,
            scale_up_cooldown_ms: UP_COOLDOWN,
            scale_down_cooldown_ms: DOWN_COOLDOWN,
            call_timeout_ms: 500,
            ..Config::default()
        }
    }

    struct Harness {
        queue: Arc<MemoryQueue>,
        limiter: Arc<MemoryWindow>,
        fleet: Arc<MemoryFleet>,
        scaler: AutoscalerLoop,
    }

    fn harness(config: Config, depth: u64, replicas: u32, cap: u64) -> Harness {
        let queue = Arc::new(MemoryQueue::new(depth));
        let limiter = Arc::new(MemoryWindow::new(cap, Duration::from_secs(60)));
        let fleet = Arc::new(MemoryFleet::new(replicas));
        let scaler = AutoscalerLoop::new(config, queue.clone(), limiter.clone(), fleet.clone());
        Harness {
            queue,
            limiter,
            fleet,
            scaler,
        }
    }

    #[tokio::test]
    async fn scales_up_to_step_target() {
        let mut h = harness(test_config(), 45, 2, 100);

        let decision = h.scaler.tick_at(1_000).await.unwrap();

        assert_eq!(decision.action, ScaleAction::ScaleUp);
        assert_eq!(h.fleet.replicas().await, 3);
        assert_eq!(h.scaler.state().current_replicas, 3);
        assert_eq!(h.scaler.state().last_scale_up_at_ms, Some(1_000));
        assert_eq!(h.scaler.state().phase, LoopPhase::Idle);
    }

    #[tokio::test]
    async fn scale_up_cooldown_boundary() {
        let mut h = harness(test_config(), 5, 0, 100);
        let t0 = 1_000_000;
        h.scaler.tick_at(t0).await.unwrap();
        assert_eq!(h.fleet.replicas().await, 1);

        h.queue.set_depth(25).await;
        let suppressed = h.scaler.tick_at(t0 + UP_COOLDOWN - 1).await.unwrap();
        assert_eq!(suppressed.action, ScaleAction::NoOp);
        assert_eq!(suppressed.reason, COOLING_DOWN);
        assert_eq!(h.fleet.replicas().await, 1);

        let permitted = h.scaler.tick_at(t0 + UP_COOLDOWN).await.unwrap();
        assert_eq!(permitted.action, ScaleAction::ScaleUp);
        assert_eq!(h.fleet.replicas().await, 2);
    }

    #[tokio::test]
    async fn recent_scale_up_does_not_block_scale_down() {
        let mut h = harness(test_config(), 90, 0, 100);
        h.scaler.tick_at(10_000).await.unwrap();
        assert_eq!(h.fleet.replicas().await, 4);

        h.queue.set_depth(0).await;
        let decision = h.scaler.tick_at(10_001).await.unwrap();

        assert_eq!(decision.action, ScaleAction::ScaleDown);
        assert_eq!(h.fleet.replicas().await, 0);
    }

    #[tokio::test]
    async fn scale_down_cooldown_suppresses_second_scale_down() {
        let mut h = harness(test_config(), 25, 4, 100);
        h.scaler.tick_at(10_000).await.unwrap();
        assert_eq!(h.fleet.replicas().await, 2);

        h.queue.set_depth(0).await;
        let decision = h.scaler.tick_at(10_000 + DOWN_COOLDOWN - 1).await.unwrap();
        assert_eq!(decision.reason, COOLING_DOWN);
        assert_eq!(h.fleet.replicas().await, 2);
    }

    #[tokio::test]
    async fn failed_fleet_update_does_not_consume_cooldown() {
        let mut h = harness(test_config(), 45, 1, 100);
        h.fleet.fail_next_set(FleetError::transient("503 unavailable")).await;

        let err = h.scaler.tick_at(5_000).await.unwrap_err();
        assert!(matches!(err, ScaleError::FleetControl { .. }));
        assert_eq!(h.scaler.state().last_scale_up_at_ms, None);
        assert_eq!(
            h.scaler.state().last_error.as_ref().map(|e| e.kind),
            Some(ErrorKind::FleetControl)
        );

        // Retry right away on the next tick.
        let decision = h.scaler.tick_at(5_001).await.unwrap();
        assert_eq!(decision.action, ScaleAction::ScaleUp);
        assert_eq!(h.fleet.replicas().await, 3);
        assert!(h.scaler.state().last_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn capped_scale_up_climbs_toward_min_replicas() {
        let config = Config {
            min_replicas: 2,
            ..test_config()
        };
        let mut h = harness(config, 0, 0, 1);

        let first = h.scaler.tick_at(100_000).await.unwrap();
        assert_eq!(first.action, ScaleAction::ScaleUp);
        assert_eq!(h.fleet.replicas().await, 1);
        assert!(h.scaler.state().last_error.is_none());

        // Same window: the single unit is spent.
        let blocked = h.scaler.tick_at(200_000).await.unwrap();
        assert_eq!(blocked.reason, RATE_LIMITED);
        assert_eq!(h.fleet.replicas().await, 1);
        assert!(h.scaler.state().last_error.is_none());

        tokio::time::advance(Duration::from_secs(61)).await;
        let second = h.scaler.tick_at(300_000).await.unwrap();
        assert_eq!(second.action, ScaleAction::ScaleUp);
        assert_eq!(h.fleet.replicas().await, 2);
        assert!(h.scaler.state().last_error.is_none());
        assert_eq!(h.fleet.set_calls().await, vec![1, 2]);
    }

    #[test]
    fn bounds_check_corrects_only_impossible_decisions() {
        let config = Config {
            min_replicas: 2,
            ..test_config()
        };
        let mut h = harness(config, 0, 0, 10);

        let toward_floor = h
            .scaler
            .enforce_bounds(ScalingDecision::scale_up(1, "capped"), 0, 1_000);
        assert_eq!(toward_floor.desired_replicas, 1);
        assert!(h.scaler.state().last_error.is_none());

        let overshoot = h
            .scaler
            .enforce_bounds(ScalingDecision::scale_up(9, "burst"), 2, 1_000);
        assert_eq!(overshoot.desired_replicas, 6);
        assert_eq!(
            h.scaler.state().last_error.as_ref().map(|e| e.kind),
            Some(ErrorKind::InternalInvariant)
        );

        let backwards = h
            .scaler
            .enforce_bounds(ScalingDecision::scale_up(1, "wrong way"), 3, 1_000);
        assert_eq!(backwards.action, ScaleAction::NoOp);
        assert_eq!(backwards.desired_replicas, 3);
    }

    #[tokio::test]
    async fn zero_headroom_forces_no_op() {
        let mut h = harness(test_config(), 500, 1, 3);
        assert!(h.limiter.reserve(3).await.unwrap());

        let decision = h.scaler.tick_at(1_000).await.unwrap();

        assert_eq!(decision.action, ScaleAction::NoOp);
        assert_eq!(decision.reason, RATE_LIMITED);
        assert!(h.fleet.set_calls().await.is_empty());
        assert_eq!(h.scaler.status().counters().rate_limit_rejections, 1);
    }

    #[tokio::test]
    async fn scale_up_consumes_shared_window() {
        let mut h = harness(test_config(), 90, 1, 10);
        h.scaler.tick_at(1_000).await.unwrap();

        assert_eq!(h.fleet.replicas().await, 4);
        assert_eq!(h.limiter.used().await, 3);
    }

    #[tokio::test]
    async fn rate_limit_store_outage_fails_closed() {
        let mut h = harness(test_config(), 90, 1, 10);
        h.limiter.fail_next(1).await;

        let decision = h.scaler.tick_at(1_000).await.unwrap();

        assert_eq!(decision.action, ScaleAction::NoOp);
        assert_eq!(h.fleet.replicas().await, 1);
        assert_eq!(
            h.scaler.state().last_error.as_ref().map(|e| e.kind),
            Some(ErrorKind::RateLimitStore)
        );
    }

    #[tokio::test]
    async fn rate_limit_outage_still_allows_scale_down() {
        let mut h = harness(test_config(), 0, 3, 10);
        h.limiter.fail_next(1).await;

        let decision = h.scaler.tick_at(1_000).await.unwrap();
        assert_eq!(decision.action, ScaleAction::ScaleDown);
        assert_eq!(h.fleet.replicas().await, 0);
    }

    #[tokio::test]
    async fn queue_failure_is_unknown_not_zero() {
        let mut h = harness(test_config(), 45, 3, 100);
        h.queue.fail_next("connection reset").await;

        let err = h.scaler.tick_at(1_000).await.unwrap_err();

        assert!(matches!(err, ScaleError::QueueRead(_)));
        // An empty queue would have scaled down to 0.
        assert_eq!(h.fleet.replicas().await, 3);
        assert!(h.fleet.set_calls().await.is_empty());
        assert_eq!(h.scaler.status().counters().poll_errors, 1);
        assert_eq!(h.scaler.state().phase, LoopPhase::Idle);
    }

    #[tokio::test]
    async fn fleet_read_failure_skips_decision() {
        let mut h = harness(test_config(), 90, 1, 100);
        h.fleet
            .fail_next_read(FleetError::permanent("401 unauthorized"))
            .await;

        let err = h.scaler.tick_at(1_000).await.unwrap_err();
        assert!(!err.is_transient());
        assert!(h.fleet.set_calls().await.is_empty());
    }

    #[tokio::test]
    async fn out_of_band_change_is_reconciled() {
        let mut h = harness(test_config(), 25, 2, 100);
        h.scaler.tick_at(1_000).await.unwrap();
        assert_eq!(h.scaler.state().current_replicas, 2);

        // Someone bumps the service by hand.
        h.fleet.set_out_of_band(5).await;
        let decision = h.scaler.tick_at(2_000).await.unwrap();

        assert_eq!(decision.action, ScaleAction::ScaleDown);
        assert_eq!(h.fleet.replicas().await, 2);
    }

    #[tokio::test]
    async fn negative_reported_count_keeps_last_known() {
        let mut h = harness(test_config(), 25, 2, 100);
        h.scaler.tick_at(1_000).await.unwrap();

        h.fleet.set_out_of_band(-3).await;
        let decision = h.scaler.tick_at(2_000).await.unwrap();

        assert_eq!(decision.action, ScaleAction::NoOp);
        assert_eq!(h.scaler.state().current_replicas, 2);
        assert_eq!(
            h.scaler.state().last_error.as_ref().map(|e| e.kind),
            Some(ErrorKind::InternalInvariant)
        );
    }

    #[tokio::test]
    async fn repeated_ticks_at_target_do_not_call_fleet() {
        let mut h = harness(test_config(), 25, 0, 100);
        h.scaler.tick_at(1_000).await.unwrap();
        h.scaler.tick_at(100_000).await.unwrap();
        h.scaler.tick_at(200_000).await.unwrap();

        assert_eq!(h.fleet.set_calls().await, vec![2]);
    }

    #[tokio::test]
    async fn status_handle_sees_published_state() {
        let mut h = harness(test_config(), 45, 2, 100);
        let status = h.scaler.status();

        h.scaler.tick_at(1_000).await.unwrap();

        let report = status.health_report_at(11_000);
        assert_eq!(report.state.current_replicas, 3);
        assert_eq!(report.state.last_decision, ScaleAction::ScaleUp);
        assert_eq!(report.scale_up_cooldown_remaining_ms, UP_COOLDOWN - 10_000);
        assert_eq!(report.scale_down_cooldown_remaining_ms, 0);
        assert_eq!(status.counters().scale_ups, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_shutdown_and_closes_collaborators() {
        let config = Config {
            poll_interval_ms: 1_000,
            ..test_config()
        };
        let mut h = harness(config, 5, 0, 100);
        let status = h.scaler.status();
        let queue = Arc::clone(&h.queue);
        let fleet = Arc::clone(&h.fleet);

        let (tx, rx) = watch::channel(false);
        let mut scaler = h.scaler;
        let handle = tokio::spawn(async move { scaler.run(rx).await });

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert!(queue.samples().await >= 2);
        assert!(queue.is_closed().await);
        assert!(fleet.is_closed().await);
        assert_eq!(fleet.replicas().await, 1);
        assert_eq!(status.snapshot().phase, LoopPhase::Stopped);
    }
}
