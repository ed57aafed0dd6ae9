//! jobscale-ratelimit — global, cross-process rate-limit coordination.
//!
//! Every process that talks to the rate-limited downstream (this autoscaler
//! and the workers it scales) reserves units against one shared counter.
//! The counter lives in a fixed window: its expiry is set on the first
//! increment of a window and never refreshed by later increments.
//!
//! # Semantics
//!
//! ```text
//! reserve(cost):
//!     if used + cost > cap:  deny
//!     used += cost           (atomic, with expiry-if-absent)
//!     grant
//!
//! headroom() = cap - used
//! ```

pub mod coordinator;
pub mod memory;
pub mod redis_store;

pub use coordinator::{RateLimitCoordinator, RateLimitError};
pub use memory::MemoryWindow;
pub use redis_store::RedisWindow;
