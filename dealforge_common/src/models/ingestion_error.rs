use serde_json::Value;

use crate::prelude::*;
use crate::schema::ingestion_errors;

/// One append-only audit record explaining why a deal or batch failed.
#[derive(Associations, Debug, Identifiable, Queryable, Serialize)]
#[diesel(belongs_to(IngestionJob, foreign_key = job_id))]
#[diesel(table_name = ingestion_errors)]
pub struct IngestionError {
    /// The unique ID of this record.
    pub id: Uuid,
    /// When this record was created.
    pub created_at: NaiveDateTime,
    /// The job this error belongs to.
    pub job_id: Uuid,
    /// The pipeline stage that recorded the error.
    pub stage: IngestionStage,
    /// Human-readable description of what went wrong.
    pub error_message: String,
    /// Snapshot of the offending payload, if one was available.
    pub payload: Option<Value>,
}

impl IngestionError {
    /// Load all errors recorded against a job, oldest first.
    pub fn for_job(job_id: Uuid, conn: &mut PgConnection) -> Result<Vec<IngestionError>> {
        ingestion_errors::table
            .filter(ingestion_errors::job_id.eq(job_id))
            .order(ingestion_errors::created_at.asc())
            .load(conn)
            .with_context(|| format!("could not load errors for job {}", job_id))
    }
}

/// Data required to create a new `IngestionError`.
#[derive(Debug, Insertable)]
#[diesel(table_name = ingestion_errors)]
pub struct NewIngestionError {
    /// The unique ID of this record.
    pub id: Uuid,
    /// The job this error belongs to.
    pub job_id: Uuid,
    /// The pipeline stage recording the error.
    pub stage: IngestionStage,
    /// Human-readable description.
    pub error_message: String,
    /// Snapshot of the offending payload.
    pub payload: Option<Value>,
}

impl NewIngestionError {
    /// Build an error record for a job and stage.
    pub fn new(
        job_id: Uuid,
        stage: IngestionStage,
        error_message: impl Into<String>,
        payload: Option<Value>,
    ) -> NewIngestionError {
        NewIngestionError {
            id: Uuid::new_v4(),
            job_id,
            stage,
            error_message: error_message.into(),
            payload,
        }
    }

    /// Append this record to the audit log.
    pub fn insert(&self, conn: &mut PgConnection) -> Result<IngestionError> {
        diesel::insert_into(ingestion_errors::table)
            .values(self)
            .get_result(conn)
            .context("error inserting ingestion error record")
    }
}
