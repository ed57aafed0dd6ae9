//! jobscale-metrics — counters describing what the autoscaler has done.
//!
//! # Architecture
//!
//! ```text
//! ScaleCounters (Arc, shared)
//!   ├── record_*()   ← called by the autoscaler loop
//!   └── snapshot()   → CounterSnapshot for the /metrics endpoint
//! ```
//!
//! Counters are plain atomics so the status server can read them at any
//! time without touching the loop.

pub mod counters;

pub use counters::{CounterSnapshot, ScaleCounters};
