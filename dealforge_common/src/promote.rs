//! The promotion engine.
//!
//! Converts pending raw rows into canonical catalog deals plus
//! provenance records, one database transaction per row. A row that
//! fails re-validation is auto-rejected even when an operator asked for
//! the promotion: operator intent is a quality override above the hard
//! floor, never below it.

use serde_json::Value;
use std::fmt;

use crate::config::Config;
use crate::dates::clamp_date_range;
use crate::payload::{extract_deal_fields, DealFields};
use crate::prelude::*;
use crate::quality::{self, QualityAssessment};
use crate::resolve;

/// Producer confidence at or above this promotes straight to `active`;
/// anything lower lands in `pending_review`. Promotion by an operator
/// forces `active` regardless.
const AUTO_ACTIVE_CONFIDENCE: f64 = 0.75;

/// Aggregate result of one promotion call.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct PromotionReport {
    /// Rows selected for promotion.
    pub fetched: usize,
    /// Rows promoted into the catalog.
    pub promoted: usize,
    /// Rows auto-rejected or failed.
    pub errors: usize,
}

/// Job metadata resolved once per batch and shared across rows, so a
/// thousand-row promotion doesn't mean a thousand job lookups. Scoped to
/// one call; deliberately not a process-wide cache.
type JobMetaCache = HashMap<Uuid, JobMeta>;

#[derive(Clone, Debug)]
struct JobMeta {
    source: String,
    scope: Option<String>,
}

/// Promote up to `limit` pending rows in FIFO order.
#[tracing::instrument(skip(config, conn))]
pub fn promote_pending_ingested_deals(
    limit: i64,
    config: &Config,
    conn: &mut PgConnection,
) -> Result<PromotionReport> {
    let rows = RawIngestedDeal::next_pending(limit, conn)?;
    promote_rows(rows, config, conn)
}

/// Promote an explicit set of rows, skipping any no longer pending.
#[tracing::instrument(skip(config, conn))]
pub fn promote_ingested_deals_by_ids(
    ids: &[Uuid],
    config: &Config,
    conn: &mut PgConnection,
) -> Result<PromotionReport> {
    let rows = RawIngestedDeal::pending_by_ids(ids, conn)?;
    promote_rows(rows, config, conn)
}

/// Reject an explicit set of rows. Only rows still pending transition;
/// the return value counts the rows actually updated.
pub fn reject_ingested_deals_by_ids(ids: &[Uuid], conn: &mut PgConnection) -> Result<usize> {
    RawIngestedDeal::reject_ids(ids, conn)
}

fn promote_rows(
    rows: Vec<RawIngestedDeal>,
    config: &Config,
    conn: &mut PgConnection,
) -> Result<PromotionReport> {
    let mut report = PromotionReport { fetched: rows.len(), ..Default::default() };
    let mut job_meta = JobMetaCache::new();

    for mut row in rows {
        match promote_one_row(&mut row, &mut job_meta, config, conn) {
            Ok(()) => report.promoted += 1,
            Err(err) => {
                report.errors += 1;
                if let Some(floor) = err.downcast_ref::<QualityFloor>() {
                    // Expected and frequent: the row just isn't a deal.
                    let assessment_json = floor.0.to_json();
                    debug!(row = %row.id, "promotion refused: {}", floor.0.summary());
                    if let Err(mark_err) =
                        row.mark_as_auto_rejected(assessment_json, conn)
                    {
                        error!(row = %row.id, "could not auto-reject: {:#}", mark_err);
                    }
                } else {
                    // Unexpected: record the fault and move on. One bad
                    // row never blocks the rest of the batch.
                    error!(row = %row.id, "promotion failed: {:#}", err);
                    if let Err(mark_err) = row.transition_to(RawDealStatus::Error, conn) {
                        error!(row = %row.id, "could not mark error: {:#}", mark_err);
                    }
                    let note = NewIngestionError::new(
                        row.job_id,
                        IngestionStage::Promotion,
                        format!("{:#}", err),
                        Some(row.raw_payload.clone()),
                    );
                    if let Err(log_err) = note.insert(conn) {
                        error!(row = %row.id, "could not record error: {:#}", log_err);
                    }
                }
            }
        }
    }

    info!(
        fetched = report.fetched,
        promoted = report.promoted,
        errors = report.errors,
        "promotion batch finished"
    );
    Ok(report)
}

/// Typed abort raised inside the promotion transaction when the row
/// fails re-validation. Rolls the transaction back (merchant creation
/// included) and is then handled as a soft rejection.
#[derive(Debug)]
struct QualityFloor(QualityAssessment);

impl fmt::Display for QualityFloor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "below auto-reject floor: {}", self.0.summary())
    }
}

impl std::error::Error for QualityFloor {}

/// Promote one row inside one transaction.
fn promote_one_row(
    row: &mut RawIngestedDeal,
    job_meta: &mut JobMetaCache,
    config: &Config,
    conn: &mut PgConnection,
) -> Result<()> {
    // Resolve the owning job's source/scope, cached per batch.
    let meta = match job_meta.get(&row.job_id) {
        Some(meta) => meta.clone(),
        None => {
            let job = IngestionJob::find(row.job_id, conn)?;
            let meta = JobMeta { source: job.source, scope: job.scope };
            job_meta.insert(row.job_id, meta.clone());
            meta
        }
    };

    conn.transaction::<_, Error, _>(|conn| {
        let fields =
            extract_deal_fields(&row.raw_payload, row.normalized_payload.as_ref());

        // Resolve merchant and location, and make sure the alias link
        // exists. Rolled back if the row fails re-validation below.
        let merchant = resolve::find_or_create_merchant(
            row.merchant_alias.as_deref(),
            &fields,
            &meta.source,
            row.confidence,
            conn,
        )?;
        let location = resolve::find_or_create_location(merchant.id, &fields, conn)?;

        // Re-validate. Even an operator-initiated promotion cannot force
        // a deal through the hard floor.
        let assessment = quality::assess(&fields, &config.quality);
        if assessment.should_auto_reject {
            return Err(QualityFloor(assessment).into());
        }

        let mut deal = build_deal(row, &fields, &meta, &merchant, location.as_ref(), config);
        // An operator promotion is an explicit quality override above the
        // hard floor: the deal goes live regardless of confidence.
        deal.status = DealStatus::Active;
        let deal = deal.insert(conn)?;
        NewDealSource {
            id: Uuid::new_v4(),
            deal_id: deal.id,
            source_type: meta.source.clone(),
            source_url: fields.source_url.clone(),
            fetched_at: Some(row.created_at),
            confidence: row.confidence,
            metadata: meta.scope.clone().map(|scope| serde_json::json!({ "scope": scope })),
        }
        .insert(conn)?;
        row.mark_as_promoted(merchant.id, conn)?;

        info!(row = %row.id, deal = %deal.id, merchant = %merchant.id, "promoted");
        Ok(())
    })
}

/// Extract the canonical deal fields for insertion.
fn build_deal(
    row: &RawIngestedDeal,
    fields: &DealFields,
    meta: &JobMeta,
    merchant: &Merchant,
    location: Option<&MerchantLocation>,
    config: &Config,
) -> NewDeal {
    let range = clamp_date_range(
        fields.start_date,
        fields.end_date,
        Utc::now().naive_utc(),
        &config.dates,
    );

    NewDeal {
        id: Uuid::new_v4(),
        merchant_id: merchant.id,
        location_id: location.map(|l| l.id),
        title: fields
            .title
            .clone()
            .unwrap_or_else(|| format!("{} deal", merchant.business_name)),
        description: fields.description.clone(),
        original_price: fields.original_price,
        deal_price: fields.deal_price,
        discount_percentage: fields.discount_percentage,
        category: fields.category.as_deref().map(str::to_lowercase),
        starts_at: range.starts_at,
        ends_at: range.ends_at,
        status: status_for_confidence(row.confidence),
        visibility: "public".to_owned(),
        image_url: fields.image_url.clone(),
        terms: fields.terms.clone(),
        source_type: meta.source.clone(),
        source_reference: fields.source_url.clone(),
        source_details: serde_json::json!({
            "raw_payload": row.raw_payload,
            "normalized_payload": row.normalized_payload,
            "scope": meta.scope,
            "raw_deal_id": row.id,
        }),
        confidence_score: row.confidence,
        max_redemptions: fields.max_redemptions,
        redemptions_per_user: fields.redemptions_per_user,
    }
}

/// The status a deal would get from producer confidence alone.
fn status_for_confidence(confidence: Option<f64>) -> DealStatus {
    match confidence {
        Some(c) if c >= AUTO_ACTIVE_CONFIDENCE => DealStatus::Active,
        _ => DealStatus::PendingReview,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_gates_active_versus_review() {
        assert_eq!(status_for_confidence(Some(0.9)), DealStatus::Active);
        assert_eq!(status_for_confidence(Some(0.75)), DealStatus::Active);
        assert_eq!(status_for_confidence(Some(0.5)), DealStatus::PendingReview);
        assert_eq!(status_for_confidence(None), DealStatus::PendingReview);
    }

    #[test]
    fn build_deal_snapshots_provenance() {
        let job = IngestionJob::factory();
        let row = RawIngestedDeal::factory(&job);
        let merchant = Merchant::factory();
        let meta = JobMeta { source: job.source.clone(), scope: job.scope.clone() };
        let fields = extract_deal_fields(&row.raw_payload, row.normalized_payload.as_ref());
        let config = Config::default();

        let deal = build_deal(&row, &fields, &meta, &merchant, None, &config);
        assert_eq!(deal.merchant_id, merchant.id);
        assert_eq!(deal.title, "Half-price espresso drinks");
        assert_eq!(deal.source_type, job.source);
        // Factory confidence is 0.9, above the auto-active bar.
        assert_eq!(deal.status, DealStatus::Active);
        assert!(deal.ends_at > deal.starts_at);
        assert_eq!(deal.source_details["raw_deal_id"], serde_json::json!(row.id));
        assert_eq!(deal.source_details["scope"], serde_json::json!(job.scope));
    }

    #[test]
    fn quality_floor_reports_its_assessment() {
        let fields = DealFields::default();
        let assessment = quality::assess(&fields, &Config::default().quality);
        assert!(assessment.should_auto_reject);
        let err: Error = QualityFloor(assessment).into();
        let floor = err.downcast_ref::<QualityFloor>().expect("lost the abort type");
        assert!(floor.0.should_auto_reject);
        assert!(format!("{}", floor).contains("below auto-reject floor"));
    }
}
