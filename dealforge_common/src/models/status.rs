//! Status enumerations for the pipeline's state machines.
//!
//! Each enum maps onto a Postgres enum type (see `migrations/`), and the
//! raw-row state machine carries an explicit transition table. Terminal
//! updates are additionally guarded in SQL with `WHERE status = 'pending'`,
//! so a racing second transition turns into a zero-row update rather than
//! a silent overwrite.

use diesel::{
    deserialize::{self, FromSql, FromSqlRow},
    expression::AsExpression,
    pg::{Pg, PgValue},
    serialize::{self, IsNull, Output, ToSql},
};
use std::fmt;
use std::io::Write;

use crate::prelude::*;

/// SQL type markers for use in Diesel's `table!` macro.
pub mod sql_types {
    /// `job_status` Postgres enum.
    #[derive(diesel::QueryId, diesel::SqlType)]
    #[diesel(postgres_type(name = "job_status"))]
    pub struct JobStatus;

    /// `raw_deal_status` Postgres enum.
    #[derive(diesel::QueryId, diesel::SqlType)]
    #[diesel(postgres_type(name = "raw_deal_status"))]
    pub struct RawDealStatus;

    /// `ingestion_stage` Postgres enum.
    #[derive(diesel::QueryId, diesel::SqlType)]
    #[diesel(postgres_type(name = "ingestion_stage"))]
    pub struct IngestionStage;

    /// `deal_status` Postgres enum.
    #[derive(diesel::QueryId, diesel::SqlType)]
    #[diesel(postgres_type(name = "deal_status"))]
    pub struct DealStatus;

    /// `queue_job_status` Postgres enum.
    #[derive(diesel::QueryId, diesel::SqlType)]
    #[diesel(postgres_type(name = "queue_job_status"))]
    pub struct QueueJobStatus;
}

/// Lifecycle of an ingestion job. Finalized exactly once; never mutated
/// afterward.
#[derive(
    AsExpression, Clone, Copy, Debug, Deserialize, Eq, FromSqlRow, PartialEq, Serialize,
)]
#[diesel(sql_type = sql_types::JobStatus)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// The batch is still being recorded.
    Running,
    /// Every deal in the batch was recorded as pending.
    Succeeded,
    /// The batch finished, but some deals were rejected or failed.
    HasErrors,
    /// The batch could not be processed at all.
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::HasErrors => "has_errors",
            JobStatus::Failed => "failed",
        };
        s.fmt(f)
    }
}

impl ToSql<sql_types::JobStatus, Pg> for JobStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        match self {
            JobStatus::Running => out.write_all(b"running")?,
            JobStatus::Succeeded => out.write_all(b"succeeded")?,
            JobStatus::HasErrors => out.write_all(b"has_errors")?,
            JobStatus::Failed => out.write_all(b"failed")?,
        }
        Ok(IsNull::No)
    }
}

impl FromSql<sql_types::JobStatus, Pg> for JobStatus {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        match bytes.as_bytes() {
            b"running" => Ok(JobStatus::Running),
            b"succeeded" => Ok(JobStatus::Succeeded),
            b"has_errors" => Ok(JobStatus::HasErrors),
            b"failed" => Ok(JobStatus::Failed),
            other => Err(format!("unrecognized job status {:?}", other).into()),
        }
    }
}

/// Lifecycle of a raw ingested deal. A row transitions out of `Pending`
/// at most once; terminal states have no outgoing transitions. The only
/// way to reprocess a terminal row is an external resubmission that
/// creates a new row.
#[derive(
    AsExpression, Clone, Copy, Debug, Deserialize, Eq, FromSqlRow, PartialEq, Serialize,
)]
#[diesel(sql_type = sql_types::RawDealStatus)]
#[serde(rename_all = "snake_case")]
pub enum RawDealStatus {
    /// Recorded and awaiting review or promotion.
    Pending,
    /// Rejected by the quality gate, without human involvement.
    AutoRejected,
    /// Promoted into the canonical deal catalog.
    Promoted,
    /// Rejected by an operator.
    Rejected,
    /// Promotion failed unexpectedly; see `ingestion_errors`.
    Error,
}

impl RawDealStatus {
    /// The explicit transition table for the raw-row state machine.
    pub fn can_transition_to(self, next: RawDealStatus) -> bool {
        match self {
            RawDealStatus::Pending => matches!(
                next,
                RawDealStatus::Promoted
                    | RawDealStatus::Rejected
                    | RawDealStatus::AutoRejected
                    | RawDealStatus::Error
            ),
            // Terminal states.
            RawDealStatus::AutoRejected
            | RawDealStatus::Promoted
            | RawDealStatus::Rejected
            | RawDealStatus::Error => false,
        }
    }
}

impl fmt::Display for RawDealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RawDealStatus::Pending => "pending",
            RawDealStatus::AutoRejected => "auto_rejected",
            RawDealStatus::Promoted => "promoted",
            RawDealStatus::Rejected => "rejected",
            RawDealStatus::Error => "error",
        };
        s.fmt(f)
    }
}

impl ToSql<sql_types::RawDealStatus, Pg> for RawDealStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        match self {
            RawDealStatus::Pending => out.write_all(b"pending")?,
            RawDealStatus::AutoRejected => out.write_all(b"auto_rejected")?,
            RawDealStatus::Promoted => out.write_all(b"promoted")?,
            RawDealStatus::Rejected => out.write_all(b"rejected")?,
            RawDealStatus::Error => out.write_all(b"error")?,
        }
        Ok(IsNull::No)
    }
}

impl FromSql<sql_types::RawDealStatus, Pg> for RawDealStatus {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        match bytes.as_bytes() {
            b"pending" => Ok(RawDealStatus::Pending),
            b"auto_rejected" => Ok(RawDealStatus::AutoRejected),
            b"promoted" => Ok(RawDealStatus::Promoted),
            b"rejected" => Ok(RawDealStatus::Rejected),
            b"error" => Ok(RawDealStatus::Error),
            other => Err(format!("unrecognized raw deal status {:?}", other).into()),
        }
    }
}

/// Which stage of the pipeline an ingestion error was recorded at.
#[derive(
    AsExpression, Clone, Copy, Debug, Deserialize, Eq, FromSqlRow, PartialEq, Serialize,
)]
#[diesel(sql_type = sql_types::IngestionStage)]
#[serde(rename_all = "snake_case")]
pub enum IngestionStage {
    /// Inserting the raw row itself failed.
    RawInsert,
    /// The deal failed the quality gate.
    QualityCheck,
    /// Promotion of a pending row failed.
    Promotion,
    /// A batch-level failure after the job row existed.
    Job,
}

impl fmt::Display for IngestionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IngestionStage::RawInsert => "raw_insert",
            IngestionStage::QualityCheck => "quality_check",
            IngestionStage::Promotion => "promotion",
            IngestionStage::Job => "job",
        };
        s.fmt(f)
    }
}

impl ToSql<sql_types::IngestionStage, Pg> for IngestionStage {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        match self {
            IngestionStage::RawInsert => out.write_all(b"raw_insert")?,
            IngestionStage::QualityCheck => out.write_all(b"quality_check")?,
            IngestionStage::Promotion => out.write_all(b"promotion")?,
            IngestionStage::Job => out.write_all(b"job")?,
        }
        Ok(IsNull::No)
    }
}

impl FromSql<sql_types::IngestionStage, Pg> for IngestionStage {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        match bytes.as_bytes() {
            b"raw_insert" => Ok(IngestionStage::RawInsert),
            b"quality_check" => Ok(IngestionStage::QualityCheck),
            b"promotion" => Ok(IngestionStage::Promotion),
            b"job" => Ok(IngestionStage::Job),
            other => Err(format!("unrecognized ingestion stage {:?}", other).into()),
        }
    }
}

/// Catalog status of a canonical deal. The pipeline only ever writes
/// `Active` and `PendingReview`; `Inactive` belongs to the operator
/// tooling.
#[derive(
    AsExpression, Clone, Copy, Debug, Deserialize, Eq, FromSqlRow, PartialEq, Serialize,
)]
#[diesel(sql_type = sql_types::DealStatus)]
#[serde(rename_all = "snake_case")]
pub enum DealStatus {
    /// Visible in the catalog.
    Active,
    /// Awaiting operator review.
    PendingReview,
    /// Withdrawn from the catalog.
    Inactive,
}

impl fmt::Display for DealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DealStatus::Active => "active",
            DealStatus::PendingReview => "pending_review",
            DealStatus::Inactive => "inactive",
        };
        s.fmt(f)
    }
}

impl ToSql<sql_types::DealStatus, Pg> for DealStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        match self {
            DealStatus::Active => out.write_all(b"active")?,
            DealStatus::PendingReview => out.write_all(b"pending_review")?,
            DealStatus::Inactive => out.write_all(b"inactive")?,
        }
        Ok(IsNull::No)
    }
}

impl FromSql<sql_types::DealStatus, Pg> for DealStatus {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        match bytes.as_bytes() {
            b"active" => Ok(DealStatus::Active),
            b"pending_review" => Ok(DealStatus::PendingReview),
            b"inactive" => Ok(DealStatus::Inactive),
            other => Err(format!("unrecognized deal status {:?}", other).into()),
        }
    }
}

/// Lifecycle of a durable queue job. `Queued` covers both "never tried"
/// and "awaiting retry"; `run_at` says when it becomes runnable.
#[derive(
    AsExpression, Clone, Copy, Debug, Deserialize, Eq, FromSqlRow, PartialEq, Serialize,
)]
#[diesel(sql_type = sql_types::QueueJobStatus)]
#[serde(rename_all = "snake_case")]
pub enum QueueJobStatus {
    /// Runnable once `run_at` has passed.
    Queued,
    /// Claimed by a worker.
    Running,
    /// Handler reported success.
    Done,
    /// Retries exhausted; needs operator attention.
    Dead,
}

impl fmt::Display for QueueJobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QueueJobStatus::Queued => "queued",
            QueueJobStatus::Running => "running",
            QueueJobStatus::Done => "done",
            QueueJobStatus::Dead => "dead",
        };
        s.fmt(f)
    }
}

impl ToSql<sql_types::QueueJobStatus, Pg> for QueueJobStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        match self {
            QueueJobStatus::Queued => out.write_all(b"queued")?,
            QueueJobStatus::Running => out.write_all(b"running")?,
            QueueJobStatus::Done => out.write_all(b"done")?,
            QueueJobStatus::Dead => out.write_all(b"dead")?,
        }
        Ok(IsNull::No)
    }
}

impl FromSql<sql_types::QueueJobStatus, Pg> for QueueJobStatus {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        match bytes.as_bytes() {
            b"queued" => Ok(QueueJobStatus::Queued),
            b"running" => Ok(QueueJobStatus::Running),
            b"done" => Ok(QueueJobStatus::Done),
            b"dead" => Ok(QueueJobStatus::Dead),
            other => Err(format!("unrecognized queue job status {:?}", other).into()),
        }
    }
}

#[test]
fn pending_is_the_only_state_with_outgoing_transitions() {
    use RawDealStatus::*;
    let all = [Pending, AutoRejected, Promoted, Rejected, Error];
    for next in all {
        assert_eq!(Pending.can_transition_to(next), next != Pending);
    }
    for terminal in [AutoRejected, Promoted, Rejected, Error] {
        for next in all {
            assert!(!terminal.can_transition_to(next));
        }
    }
}
