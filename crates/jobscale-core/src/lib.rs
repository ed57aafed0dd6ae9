//! jobscale-core — shared types for the queue-driven fleet autoscaler.
//!
//! Holds the immutable process [`Config`], the data model exchanged between
//! the control loop and the status server, and the error taxonomy every
//! other crate maps its failures into.

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, ScaleStep, is_path_segment, parse_scale_steps};
pub use error::{ConfigError, ScaleError};
pub use types::*;
