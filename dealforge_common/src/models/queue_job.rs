use chrono::Duration;
use serde_json::Value;

use crate::prelude::*;
use crate::schema::queue_jobs;

/// One durable queue job. Delivery is at-least-once: a worker crash
/// after the handler ran but before `complete` commits means the job
/// will run again, so handlers must be row-level idempotent.
#[derive(Debug, Identifiable, Queryable, Serialize)]
#[diesel(table_name = queue_jobs)]
pub struct QueueJob {
    /// The unique ID of this job.
    pub id: Uuid,
    /// When this job was enqueued.
    pub created_at: NaiveDateTime,
    /// When this row was last updated.
    pub updated_at: NaiveDateTime,
    /// The named queue this job belongs to.
    pub queue: String,
    /// The job name, for logging and dispatch diagnostics.
    pub job_name: String,
    /// Handler payload.
    pub payload: Value,
    /// The current status of this job.
    pub status: QueueJobStatus,
    /// Delivery attempts so far.
    pub attempts: i32,
    /// Attempts allowed before the job is declared dead.
    pub max_attempts: i32,
    /// Not runnable before this time; pushed forward on retry.
    pub run_at: NaiveDateTime,
    /// The worker currently holding this job.
    pub locked_by: Option<String>,
    /// The last failure message, if any.
    pub error_message: Option<String>,
}

impl QueueJob {
    /// Claim the next runnable job on any of the given queues, oldest
    /// `run_at` first. Atomic from an SQL perspective: the row is locked
    /// with `FOR UPDATE SKIP LOCKED` and flipped to `running` inside one
    /// transaction, so two workers never claim the same job.
    pub fn reserve_next(
        queues: &[&str],
        worker_id: &str,
        conn: &mut PgConnection,
    ) -> Result<Option<QueueJob>> {
        let now = Utc::now().naive_utc();
        conn.transaction::<_, Error, _>(|conn| {
            let job_id: Option<Uuid> = queue_jobs::table
                .select(queue_jobs::id)
                .filter(
                    queue_jobs::queue
                        .eq_any(queues.iter().copied())
                        .and(queue_jobs::status.eq(QueueJobStatus::Queued))
                        .and(queue_jobs::run_at.le(now)),
                )
                .order(queue_jobs::run_at.asc())
                .for_update()
                .skip_locked()
                .first(conn)
                .optional()
                .context("error trying to reserve next queue job")?;
            if let Some(job_id) = job_id {
                let to_update = queue_jobs::table.filter(queue_jobs::id.eq(&job_id));
                let job: QueueJob = diesel::update(to_update)
                    .set((
                        queue_jobs::status.eq(QueueJobStatus::Running),
                        queue_jobs::locked_by.eq(Some(worker_id)),
                        queue_jobs::attempts.eq(queue_jobs::attempts + 1),
                        queue_jobs::updated_at.eq(now),
                    ))
                    .get_result(conn)
                    .context("cannot mark queue job as running")?;
                Ok(Some(job))
            } else {
                Ok(None)
            }
        })
    }

    /// Report that this job's handler succeeded.
    pub fn complete(&mut self, conn: &mut PgConnection) -> Result<()> {
        *self = diesel::update(queue_jobs::table.filter(queue_jobs::id.eq(&self.id)))
            .set((
                queue_jobs::status.eq(QueueJobStatus::Done),
                queue_jobs::locked_by.eq(None::<String>),
                queue_jobs::updated_at.eq(Utc::now().naive_utc()),
            ))
            .get_result(conn)
            .with_context(|| format!("cannot mark queue job {} as done", self.id))?;
        Ok(())
    }

    /// Report that this job's handler failed. Requeues with exponential
    /// backoff while attempts remain; otherwise the job goes dead and
    /// waits for an operator.
    pub fn fail(&mut self, error: &Error, conn: &mut PgConnection) -> Result<()> {
        let now = Utc::now().naive_utc();
        let message = format!("{:#}", error);
        let update = queue_jobs::table.filter(queue_jobs::id.eq(&self.id));
        *self = if self.attempts >= self.max_attempts {
            warn!(job = %self.id, queue = %self.queue, "queue job is dead: {}", message);
            diesel::update(update)
                .set((
                    queue_jobs::status.eq(QueueJobStatus::Dead),
                    queue_jobs::locked_by.eq(None::<String>),
                    queue_jobs::error_message.eq(Some(message.as_str())),
                    queue_jobs::updated_at.eq(now),
                ))
                .get_result(conn)
                .with_context(|| format!("cannot mark queue job {} as dead", self.id))?
        } else {
            let delay = retry_delay(self.attempts);
            diesel::update(update)
                .set((
                    queue_jobs::status.eq(QueueJobStatus::Queued),
                    queue_jobs::locked_by.eq(None::<String>),
                    queue_jobs::error_message.eq(Some(message.as_str())),
                    queue_jobs::run_at.eq(now + delay),
                    queue_jobs::updated_at.eq(now),
                ))
                .get_result(conn)
                .with_context(|| format!("cannot requeue queue job {}", self.id))?
        };
        Ok(())
    }
}

/// Data required to enqueue a new `QueueJob`.
#[derive(Debug, Insertable)]
#[diesel(table_name = queue_jobs)]
pub struct NewQueueJob {
    /// The unique ID of this job.
    pub id: Uuid,
    /// The named queue this job belongs to.
    pub queue: String,
    /// The job name.
    pub job_name: String,
    /// Handler payload.
    pub payload: Value,
    /// Attempts allowed before the job is declared dead.
    pub max_attempts: i32,
    /// Not runnable before this time.
    pub run_at: NaiveDateTime,
}

impl NewQueueJob {
    /// Insert a new queue job into the database.
    pub fn insert(&self, conn: &mut PgConnection) -> Result<QueueJob> {
        diesel::insert_into(queue_jobs::table)
            .values(self)
            .get_result(conn)
            .context("error enqueueing job")
    }
}

/// How long to wait before retrying a failed job: 30s doubling per
/// attempt, capped at an hour.
pub fn retry_delay(attempts: i32) -> Duration {
    let exponent = attempts.saturating_sub(1).clamp(0, 16) as u32;
    let secs = 30i64.saturating_mul(2i64.pow(exponent));
    Duration::seconds(secs.min(3600))
}

#[test]
fn retry_delay_doubles_and_caps() {
    assert_eq!(retry_delay(1), Duration::seconds(30));
    assert_eq!(retry_delay(2), Duration::seconds(60));
    assert_eq!(retry_delay(3), Duration::seconds(120));
    assert_eq!(retry_delay(100), Duration::seconds(3600));
    // A job that somehow failed before its first attempt still waits.
    assert_eq!(retry_delay(0), Duration::seconds(30));
}
