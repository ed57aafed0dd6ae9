//! jobscale-fleet — fleet-control abstraction.
//!
//! The autoscaler needs two things from the compute platform: the replica
//! count it is actually running, and a way to request a new absolute count.
//! Setting an absolute count (never incrementing) makes retries safe.
//!
//! # Architecture
//!
//! ```text
//! FleetController (trait)
//!   ├── HttpFleetController → GET/PUT {api}/services/{ref}/replicas
//!   └── MemoryFleet         → in-process fake with failure injection
//! ```
//!
//! Failures carry a [`FleetErrorKind`](jobscale_core::FleetErrorKind) so the
//! loop can tell a flaky network apart from a misconfigured service.

pub mod controller;
pub mod http_api;
pub mod memory;

pub use controller::{FleetController, FleetError};
pub use http_api::HttpFleetController;
pub use memory::MemoryFleet;
