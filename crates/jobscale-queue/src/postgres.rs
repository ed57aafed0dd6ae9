//! Postgres-backed queue depth.
//!
//! The pool connects lazily so the daemon can start (and keep ticking)
//! while the database is unreachable; each sample surfaces the connection
//! error instead.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{debug, info};

use jobscale_core::{QueueSnapshot, epoch_ms};

use crate::source::{QueueDepthSource, QueueError};

/// Counts `pending` and `running` rows of a job table.
pub struct PgQueueDepth {
    pool: PgPool,
    count_sql: String,
}

impl PgQueueDepth {
    /// Build a lazily connected pool for `url`.
    ///
    /// `table` must already be validated as a plain identifier.
    pub fn connect_lazy(
        url: &str,
        table: &str,
        acquire_timeout: Duration,
    ) -> Result<Self, QueueError> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(acquire_timeout)
            .connect_lazy(url)
            .map_err(|e| QueueError::Unavailable(e.to_string()))?;
        info!(%table, "queue store pool configured");
        Ok(Self::from_pool(pool, table))
    }

    pub fn from_pool(pool: PgPool, table: &str) -> Self {
        Self {
            pool,
            count_sql: count_query(table),
        }
    }
}

fn count_query(table: &str) -> String {
    format!("SELECT COUNT(*) FROM {table} WHERE status IN ('pending', 'running')")
}

#[async_trait]
impl QueueDepthSource for PgQueueDepth {
    async fn sample(&self) -> Result<QueueSnapshot, QueueError> {
        let count: i64 = sqlx::query_scalar(&self.count_sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::PoolClosed => {
                    QueueError::Unavailable(e.to_string())
                }
                other => QueueError::Query(other.to_string()),
            })?;

        debug!(pending = count, "queue depth sampled");
        Ok(QueueSnapshot {
            pending_count: count.max(0) as u64,
            sampled_at_ms: epoch_ms(),
        })
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("queue store pool closed");
    }
}
