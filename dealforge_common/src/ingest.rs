//! The ingestion recorder.
//!
//! Accepts one batch from a producer, quality-gates each deal, and
//! persists survivors as pending raw rows. Every deal in the batch is
//! accounted for exactly once: inserted pending, inserted auto-rejected,
//! or logged as an insert error. One bad record never aborts a batch;
//! only batch-framing failures propagate to the caller so the queue
//! broker can apply its own retry policy at the whole-job level.

use serde_json::Value;

use crate::config::Config;
use crate::dates::clamp_date_range;
use crate::payload::extract_deal_fields;
use crate::prelude::*;
use crate::quality;

/// One candidate deal inside an ingestion request.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct IngestionDeal {
    /// Free-text merchant name asserted by the producer.
    #[serde(default, alias = "merchantAlias")]
    pub merchant_alias: Option<String>,
    /// Producer-native fields.
    #[serde(alias = "rawPayload")]
    pub raw_payload: Value,
    /// Canonicalized fields, if the producer supplies them.
    #[serde(default, alias = "normalizedPayload")]
    pub normalized_payload: Option<Value>,
    /// Producer-asserted confidence, 0..1.
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// One batch submission from a producer.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct IngestionRequest {
    /// Producer identifier. Required; a batch with no source is refused
    /// before any job row is created.
    pub source: String,
    /// Free-text batch label.
    #[serde(default)]
    pub scope: Option<String>,
    /// The deals in this batch.
    #[serde(default)]
    pub deals: Vec<IngestionDeal>,
}

/// Aggregate counts for one recorded batch.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct IngestionStats {
    /// Deals in the batch.
    pub total: usize,
    /// Deals recorded as pending.
    pub recorded: usize,
    /// Deals auto-rejected or failed.
    pub errors: usize,
}

/// The recorder's report for one batch.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct IngestionReport {
    /// The job row tracking this batch.
    pub job_id: Uuid,
    /// Aggregate counts.
    pub stats: IngestionStats,
}

/// Record one batch: open a job row, gate and persist each deal in input
/// order, finalize the job with its stats.
#[tracing::instrument(skip_all, fields(source = %request.source))]
pub fn process_ingestion_job(
    request: &IngestionRequest,
    config: &Config,
    conn: &mut PgConnection,
) -> Result<IngestionReport> {
    if request.source.trim().is_empty() {
        bail!("ingestion request has no source");
    }

    let mut job = NewIngestionJob {
        id: Uuid::new_v4(),
        source: request.source.clone(),
        scope: request.scope.clone(),
        status: JobStatus::Running,
        total_count: request.deals.len() as i32,
    }
    .insert(conn)?;

    match record_deals(&job, &request.deals, config, conn) {
        Ok(stats) => {
            let status = if stats.errors == 0 {
                JobStatus::Succeeded
            } else {
                JobStatus::HasErrors
            };
            job.finalize(status, stats.recorded as i32, stats.errors as i32, conn)?;
            info!(
                job = %job.id,
                total = stats.total,
                recorded = stats.recorded,
                errors = stats.errors,
                "ingestion batch finalized"
            );
            Ok(IngestionReport { job_id: job.id, stats })
        }
        Err(err) => {
            // A failure that escaped per-row handling. Record it against
            // the job, finalize as failed, and re-raise so the broker's
            // retry policy can decide what to do with the whole batch.
            let note = NewIngestionError::new(
                job.id,
                IngestionStage::Job,
                format!("{:#}", err),
                None,
            );
            if let Err(log_err) = note.insert(conn) {
                error!(job = %job.id, "could not record job-level error: {:#}", log_err);
            }
            if let Err(fin_err) = job.finalize(JobStatus::Failed, 0, 0, conn) {
                error!(job = %job.id, "could not finalize failed job: {:#}", fin_err);
            }
            Err(err)
        }
    }
}

/// Gate and persist each deal, sequentially and in input order, so error
/// attribution and job statistics stay simple.
fn record_deals(
    job: &IngestionJob,
    deals: &[IngestionDeal],
    config: &Config,
    conn: &mut PgConnection,
) -> Result<IngestionStats> {
    let mut stats = IngestionStats { total: deals.len(), ..Default::default() };

    for deal in deals {
        match record_one_deal(job, deal, config, conn) {
            Ok(RecordedAs::Pending) => stats.recorded += 1,
            Ok(RecordedAs::AutoRejected) => stats.errors += 1,
            Err(err) => {
                // The insert itself failed. Log and keep going; this row
                // is the only casualty.
                warn!(job = %job.id, "raw insert failed: {:#}", err);
                NewIngestionError::new(
                    job.id,
                    IngestionStage::RawInsert,
                    format!("{:#}", err),
                    Some(deal.raw_payload.clone()),
                )
                .insert(conn)?;
                stats.errors += 1;
            }
        }
    }

    Ok(stats)
}

/// How one deal was persisted.
enum RecordedAs {
    Pending,
    AutoRejected,
}

fn record_one_deal(
    job: &IngestionJob,
    deal: &IngestionDeal,
    config: &Config,
    conn: &mut PgConnection,
) -> Result<RecordedAs> {
    // Clamp the producer's date range and write the result back into the
    // normalized payload, so downstream consumers never see stale dates.
    let fields = extract_deal_fields(&deal.raw_payload, deal.normalized_payload.as_ref());
    let range = clamp_date_range(
        fields.start_date,
        fields.end_date,
        Utc::now().naive_utc(),
        &config.dates,
    );
    let normalized = normalized_with_dates(deal.normalized_payload.as_ref(), &range);

    // Re-extract with the clamped dates in place, then score.
    let fields = extract_deal_fields(&deal.raw_payload, Some(&normalized));
    let assessment = quality::assess(&fields, &config.quality);

    if assessment.should_auto_reject {
        let row = NewRawIngestedDeal {
            id: Uuid::new_v4(),
            job_id: job.id,
            merchant_alias: deal.merchant_alias.clone(),
            raw_payload: deal.raw_payload.clone(),
            normalized_payload: Some(with_assessment(normalized, &assessment)),
            status: RawDealStatus::AutoRejected,
            confidence: deal.confidence,
        }
        .insert(conn)?;
        NewIngestionError::new(
            job.id,
            IngestionStage::QualityCheck,
            assessment.summary(),
            Some(row.raw_payload.clone()),
        )
        .insert(conn)?;
        debug!(job = %job.id, row = %row.id, "auto-rejected: {}", assessment.summary());
        Ok(RecordedAs::AutoRejected)
    } else {
        NewRawIngestedDeal {
            id: Uuid::new_v4(),
            job_id: job.id,
            merchant_alias: deal.merchant_alias.clone(),
            raw_payload: deal.raw_payload.clone(),
            normalized_payload: Some(normalized),
            status: RawDealStatus::Pending,
            confidence: deal.confidence,
        }
        .insert(conn)?;
        Ok(RecordedAs::Pending)
    }
}

/// Merge the clamped dates into the normalized payload (creating one if
/// the producer sent none).
fn normalized_with_dates(
    normalized: Option<&Value>,
    range: &crate::dates::ClampedRange,
) -> Value {
    let mut merged = normalized.cloned().unwrap_or_else(|| Value::Object(Default::default()));
    if let Value::Object(map) = &mut merged {
        map.insert(
            "start_date".to_owned(),
            Value::String(range.starts_at.format("%Y-%m-%dT%H:%M:%S").to_string()),
        );
        map.insert(
            "end_date".to_owned(),
            Value::String(range.ends_at.format("%Y-%m-%dT%H:%M:%S").to_string()),
        );
    }
    merged
}

fn with_assessment(mut normalized: Value, assessment: &quality::QualityAssessment) -> Value {
    if let Value::Object(map) = &mut normalized {
        map.insert("quality_assessment".to_owned(), assessment.to_json());
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn requests_accept_camel_case_producer_payloads() {
        let request: IngestionRequest = serde_json::from_value(json!({
            "source": "web_scraper",
            "scope": "downtown",
            "deals": [{
                "merchantAlias": "Blue Bottle",
                "rawPayload": {"title": "Half-price espresso"},
                "normalizedPayload": {"category": "dining"},
                "confidence": 0.8,
            }],
        }))
        .expect("parse error");
        assert_eq!(request.deals.len(), 1);
        assert_eq!(request.deals[0].merchant_alias.as_deref(), Some("Blue Bottle"));
        assert!(request.deals[0].normalized_payload.is_some());
    }

    #[test]
    fn requests_accept_snake_case_too() {
        let request: IngestionRequest = serde_json::from_value(json!({
            "source": "bulk_import",
            "deals": [{"merchant_alias": "Taco Row", "raw_payload": {}}],
        }))
        .expect("parse error");
        assert_eq!(request.deals[0].merchant_alias.as_deref(), Some("Taco Row"));
        assert!(request.scope.is_none());
    }

    #[test]
    fn clamped_dates_land_in_the_normalized_payload() {
        let range = crate::dates::ClampedRange {
            starts_at: crate::payload::parse_datetime("2026-09-01").unwrap(),
            ends_at: crate::payload::parse_datetime("2026-10-31").unwrap(),
        };
        let merged = normalized_with_dates(Some(&json!({"category": "dining"})), &range);
        assert_eq!(merged["category"], "dining");
        assert_eq!(merged["start_date"], "2026-09-01T00:00:00");
        assert_eq!(merged["end_date"], "2026-10-31T00:00:00");

        // No normalized payload from the producer: we still record dates.
        let fresh = normalized_with_dates(None, &range);
        assert_eq!(fresh["start_date"], "2026-09-01T00:00:00");
    }
}
