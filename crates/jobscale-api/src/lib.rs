//! jobscale-api — status server for the autoscaler.
//!
//! Read-only: every scaling decision originates inside the loop, so no
//! route here can change anything.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/health` | Scaling state snapshot plus cooldown timers |
//! | GET | `/metrics` | Scaling counters |
//! | * | anything else | 404 |

pub mod handlers;

use axum::Router;
use axum::routing::get;
use jobscale_autoscale::StatusHandle;

/// Shared state for status handlers.
#[derive(Clone)]
pub struct ApiState {
    pub status: StatusHandle,
}

/// Build the status router.
pub fn build_router(status: StatusHandle) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .fallback(handlers::not_found)
        .with_state(ApiState { status })
}
