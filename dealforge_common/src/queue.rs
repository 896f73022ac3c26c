//! The durable job queue.
//!
//! Named queues backed by the `queue_jobs` table, with at-least-once
//! delivery and job-level retry with exponential backoff. Producers call
//! [`enqueue_job`]; the worker pool claims jobs via
//! [`QueueJob::reserve_next`] and reports back with `complete`/`fail`.

use chrono::Duration;
use serde_json::Value;

use crate::prelude::*;

/// Queue names known to the system.
pub mod queues {
    /// User notification fan-out.
    pub const NOTIFICATIONS: &str = "notifications";
    /// Periodic recommendation refresh.
    pub const RECOMMENDATION_REFRESH: &str = "recommendation-refresh";
    /// Rewards accrual.
    pub const REWARDS: &str = "rewards";
    /// Deal ingestion batches.
    pub const INGESTION: &str = "ingestion";
}

/// Options controlling how a job is enqueued.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnqueueOptions {
    /// Don't run before this long from now.
    pub delay: Option<Duration>,
    /// Override the default delivery-attempt limit.
    pub max_attempts: Option<i32>,
}

/// Default delivery attempts when the caller doesn't say otherwise.
/// Callers with access to a [`crate::config::Config`] should pass its
/// `worker.max_attempts` via [`EnqueueOptions`] instead.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

/// Put a job on a named queue. Returns the persisted job as a handle.
#[tracing::instrument(skip(payload, conn))]
pub fn enqueue_job(
    queue: &str,
    job_name: &str,
    payload: Value,
    options: EnqueueOptions,
    conn: &mut PgConnection,
) -> Result<QueueJob> {
    let run_at = Utc::now().naive_utc() + options.delay.unwrap_or_else(Duration::zero);
    let job = NewQueueJob {
        id: Uuid::new_v4(),
        queue: queue.to_owned(),
        job_name: job_name.to_owned(),
        payload,
        max_attempts: options.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
        run_at,
    }
    .insert(conn)?;
    debug!(job = %job.id, queue = %queue, name = %job_name, "enqueued");
    Ok(job)
}
