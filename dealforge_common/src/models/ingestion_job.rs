use crate::prelude::*;
use crate::schema::ingestion_jobs;

/// One batch submission from a producer, tracked end-to-end.
#[derive(Debug, Identifiable, Queryable, Serialize)]
#[diesel(table_name = ingestion_jobs)]
pub struct IngestionJob {
    /// The unique ID of this job.
    pub id: Uuid,
    /// When this row was created.
    pub created_at: NaiveDateTime,
    /// When this row was last updated.
    pub updated_at: NaiveDateTime,
    /// The producer that submitted this batch.
    pub source: String,
    /// Free-text batch label supplied by the producer.
    pub scope: Option<String>,
    /// The current status of this job.
    pub status: JobStatus,
    /// When processing of the batch began.
    pub started_at: NaiveDateTime,
    /// When the batch was finalized, if it has been.
    pub finished_at: Option<NaiveDateTime>,
    /// Number of deals in the batch.
    pub total_count: i32,
    /// Deals recorded as pending.
    pub recorded_count: i32,
    /// Deals auto-rejected or failed.
    pub error_count: i32,
}

impl IngestionJob {
    /// Find a job by ID.
    pub fn find(id: Uuid, conn: &mut PgConnection) -> Result<IngestionJob> {
        ingestion_jobs::table
            .find(id)
            .first(conn)
            .with_context(|| format!("could not load ingestion job {}", id))
    }

    /// List the most recent jobs, newest first.
    pub fn recent(limit: i64, conn: &mut PgConnection) -> Result<Vec<IngestionJob>> {
        ingestion_jobs::table
            .order(ingestion_jobs::started_at.desc())
            .limit(limit)
            .load(conn)
            .context("could not list ingestion jobs")
    }

    /// Finalize this job with its terminal status and stats. Called
    /// exactly once per job; the row is never mutated afterward.
    pub fn finalize(
        &mut self,
        status: JobStatus,
        recorded: i32,
        errors: i32,
        conn: &mut PgConnection,
    ) -> Result<()> {
        *self = diesel::update(ingestion_jobs::table.filter(ingestion_jobs::id.eq(&self.id)))
            .set((
                ingestion_jobs::status.eq(status),
                ingestion_jobs::recorded_count.eq(recorded),
                ingestion_jobs::error_count.eq(errors),
                ingestion_jobs::finished_at.eq(Utc::now().naive_utc()),
                ingestion_jobs::updated_at.eq(Utc::now().naive_utc()),
            ))
            .get_result(conn)
            .with_context(|| format!("cannot finalize ingestion job {}", self.id))?;
        Ok(())
    }

    /// Generate a sample value for testing.
    pub fn factory() -> Self {
        let now = Utc::now().naive_utc();
        IngestionJob {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            source: "web_scraper".to_owned(),
            scope: Some("downtown-test".to_owned()),
            status: JobStatus::Running,
            started_at: now,
            finished_at: None,
            total_count: 0,
            recorded_count: 0,
            error_count: 0,
        }
    }
}

/// Data required to create a new `IngestionJob`.
#[derive(Debug, Insertable)]
#[diesel(table_name = ingestion_jobs)]
pub struct NewIngestionJob {
    /// The unique ID of this job.
    pub id: Uuid,
    /// The producer that submitted this batch.
    pub source: String,
    /// Free-text batch label.
    pub scope: Option<String>,
    /// Initial status, normally `Running`.
    pub status: JobStatus,
    /// Number of deals in the batch.
    pub total_count: i32,
}

impl NewIngestionJob {
    /// Insert a new job into the database.
    pub fn insert(&self, conn: &mut PgConnection) -> Result<IngestionJob> {
        diesel::insert_into(ingestion_jobs::table)
            .values(self)
            .get_result(conn)
            .context("error inserting ingestion job")
    }
}
