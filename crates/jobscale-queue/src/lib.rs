//! jobscale-queue — reads the "pending work" signal from the job queue.
//!
//! The autoscaler only ever asks one question of the queue store: how many
//! jobs are pending or running right now. [`QueueDepthSource`] is that
//! question; [`PgQueueDepth`] answers it from a Postgres job table and
//! [`MemoryQueue`] answers it from a script for tests.
//!
//! A failed sample is reported as an error, never as zero. The loop treats
//! it as "unknown" and skips the tick.

pub mod memory;
pub mod postgres;
pub mod source;

pub use memory::MemoryQueue;
pub use postgres::PgQueueDepth;
pub use source::{QueueDepthSource, QueueError};
