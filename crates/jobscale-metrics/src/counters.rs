//! Scaling counters.
//!
//! Monotonic since process start. Relaxed ordering is enough: each counter
//! is independent and readers only need an eventually consistent view.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Debug, Default)]
pub struct ScaleCounters {
    ticks: AtomicU64,
    scale_ups: AtomicU64,
    scale_downs: AtomicU64,
    rate_limit_rejections: AtomicU64,
    poll_errors: AtomicU64,
    fleet_errors: AtomicU64,
    cooldown_suppressions: AtomicU64,
}

/// Point-in-time copy of [`ScaleCounters`], as served on `/metrics`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub ticks: u64,
    pub scale_ups: u64,
    pub scale_downs: u64,
    pub rate_limit_rejections: u64,
    /// Ticks skipped because the queue or the fleet could not be read.
    pub poll_errors: u64,
    /// Failed replica updates.
    pub fleet_errors: u64,
    pub cooldown_suppressions: u64,
}

impl ScaleCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_scale_up(&self) {
        self.scale_ups.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_scale_down(&self) {
        self.scale_downs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limit_rejection(&self) {
        self.rate_limit_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_poll_error(&self) {
        self.poll_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fleet_error(&self) {
        self.fleet_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cooldown_suppression(&self) {
        self.cooldown_suppressions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            scale_ups: self.scale_ups.load(Ordering::Relaxed),
            scale_downs: self.scale_downs.load(Ordering::Relaxed),
            rate_limit_rejections: self.rate_limit_rejections.load(Ordering::Relaxed),
            poll_errors: self.poll_errors.load(Ordering::Relaxed),
            fleet_errors: self.fleet_errors.load(Ordering::Relaxed),
            cooldown_suppressions: self.cooldown_suppressions.load(Ordering::Relaxed),
        }
    }
}
