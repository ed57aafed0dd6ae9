//! jobscale-autoscale — queue-driven fleet scaling.
//!
//! Samples the job queue, maps its depth onto a replica target, and asks
//! the fleet controller for that count. A global rate limit caps how fast
//! capacity is added, and independent cooldowns stop the fleet from
//! flapping on a noisy queue.
//!
//! # Scaling Algorithm
//!
//! ```text
//! target = step(pending)              // monotonic, clamped to [min, max]
//!
//! if target > current:
//!     headroom == 0 → NoOp("rate-limited")
//!     ScaleUp(min(target, current + headroom, max))
//!
//! if target < current:
//!     ScaleDown(max(target, min))
//!
//! ScaleUp   suppressed while now - last_scale_up   < scale_up_cooldown
//! ScaleDown suppressed while now - last_scale_down < scale_down_cooldown
//! ```
//!
//! The running replica count is re-read from the fleet on every tick, so
//! manual changes are corrected rather than compounded.

pub mod policy;
pub mod scaler;
pub mod status;

pub use policy::{COOLING_DOWN, RATE_LIMITED, ScalingPolicy};
pub use scaler::AutoscalerLoop;
pub use status::{HealthReport, StatusHandle};
