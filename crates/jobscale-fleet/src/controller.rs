//! The fleet-control seam.

use async_trait::async_trait;
use thiserror::Error;

use jobscale_core::{FleetErrorKind, ScaleError};

#[derive(Debug, Clone, Error)]
#[error("{kind} fleet error: {message}")]
pub struct FleetError {
    pub kind: FleetErrorKind,
    pub message: String,
}

impl FleetError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: FleetErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: FleetErrorKind::Permanent,
            message: message.into(),
        }
    }
}

impl From<FleetError> for ScaleError {
    fn from(e: FleetError) -> Self {
        ScaleError::FleetControl {
            kind: e.kind,
            message: e.message,
        }
    }
}

/// Reads and sets the replica count of a service on the compute platform.
#[async_trait]
pub trait FleetController: Send + Sync {
    /// Replica count as reported by the platform. Signed because the loop
    /// validates whatever the platform reports.
    async fn replica_count(&self, service_ref: &str) -> Result<i64, FleetError>;

    /// Request an absolute replica count.
    async fn set_replica_count(&self, service_ref: &str, replicas: u32) -> Result<(), FleetError>;

    async fn close(&self) {}
}
