//! Error taxonomy for the autoscaler.

use thiserror::Error;

use crate::types::{ErrorKind, FleetErrorKind};

/// Startup configuration problems. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    Read(String),

    #[error("failed to parse config file: {0}")]
    Parse(String),
}

impl ConfigError {
    pub fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Failures that can happen inside a single tick. None of them stop the loop.
#[derive(Debug, Clone, Error)]
pub enum ScaleError {
    #[error("queue read failed: {0}")]
    QueueRead(String),

    #[error("rate-limit store failed: {0}")]
    RateLimitStore(String),

    #[error("fleet control failed ({kind}): {message}")]
    FleetControl {
        kind: FleetErrorKind,
        message: String,
    },

    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}

impl ScaleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScaleError::QueueRead(_) => ErrorKind::QueueRead,
            ScaleError::RateLimitStore(_) => ErrorKind::RateLimitStore,
            ScaleError::FleetControl { .. } => ErrorKind::FleetControl,
            ScaleError::InternalInvariant(_) => ErrorKind::InternalInvariant,
        }
    }

    /// Whether retrying on the next tick can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            ScaleError::FleetControl {
                kind: FleetErrorKind::Permanent,
                ..
            }
        )
    }
}
