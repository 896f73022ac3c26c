use serde_json::Value;

use crate::prelude::*;
use crate::schema::ingested_deal_raw;

/// One producer-submitted candidate deal, prior to promotion.
#[derive(Associations, Debug, Identifiable, Queryable, Serialize)]
#[diesel(belongs_to(IngestionJob, foreign_key = job_id))]
#[diesel(table_name = ingested_deal_raw)]
pub struct RawIngestedDeal {
    /// The unique ID of this row.
    pub id: Uuid,
    /// When this row was created.
    pub created_at: NaiveDateTime,
    /// When this row was last updated.
    pub updated_at: NaiveDateTime,
    /// The ingestion job that recorded this row.
    pub job_id: Uuid,
    /// Free-text merchant name asserted by the producer.
    pub merchant_alias: Option<String>,
    /// Producer-native fields, untouched.
    pub raw_payload: Value,
    /// Canonicalized fields, if the producer supplied them.
    pub normalized_payload: Option<Value>,
    /// The current status of this row.
    pub status: RawDealStatus,
    /// The merchant this row resolved to, once promoted.
    pub matched_merchant_id: Option<Uuid>,
    /// Producer-asserted confidence in this deal, 0..1.
    pub confidence: Option<f64>,
}

impl RawIngestedDeal {
    /// Fetch the oldest `limit` rows still pending, in FIFO order.
    pub fn next_pending(limit: i64, conn: &mut PgConnection) -> Result<Vec<RawIngestedDeal>> {
        ingested_deal_raw::table
            .filter(ingested_deal_raw::status.eq(RawDealStatus::Pending))
            .order(ingested_deal_raw::created_at.asc())
            .limit(limit)
            .load(conn)
            .context("could not load pending raw deals")
    }

    /// Fetch the given rows, filtered to those still pending, in FIFO
    /// order.
    pub fn pending_by_ids(ids: &[Uuid], conn: &mut PgConnection) -> Result<Vec<RawIngestedDeal>> {
        ingested_deal_raw::table
            .filter(
                ingested_deal_raw::id
                    .eq_any(ids)
                    .and(ingested_deal_raw::status.eq(RawDealStatus::Pending)),
            )
            .order(ingested_deal_raw::created_at.asc())
            .load(conn)
            .context("could not load raw deals by id")
    }

    /// Transition this row to a terminal status.
    ///
    /// Checked against the transition table, and guarded in SQL so only a
    /// row still `pending` is updated. Returns an error if the row was
    /// already terminal, which callers treat as "someone else got here
    /// first".
    pub fn transition_to(
        &mut self,
        next: RawDealStatus,
        conn: &mut PgConnection,
    ) -> Result<()> {
        if !self.status.can_transition_to(next) {
            bail!(
                "raw deal {} cannot transition from {} to {}",
                self.id,
                self.status,
                next
            );
        }
        let updated: Option<RawIngestedDeal> = diesel::update(
            ingested_deal_raw::table.filter(
                ingested_deal_raw::id
                    .eq(&self.id)
                    .and(ingested_deal_raw::status.eq(RawDealStatus::Pending)),
            ),
        )
        .set((
            ingested_deal_raw::status.eq(next),
            ingested_deal_raw::updated_at.eq(Utc::now().naive_utc()),
        ))
        .get_result(conn)
        .optional()
        .with_context(|| format!("cannot update status of raw deal {}", self.id))?;
        match updated {
            Some(row) => {
                *self = row;
                Ok(())
            }
            None => bail!("raw deal {} was no longer pending", self.id),
        }
    }

    /// Mark this row as promoted, recording the merchant it resolved to.
    pub fn mark_as_promoted(
        &mut self,
        merchant_id: Uuid,
        conn: &mut PgConnection,
    ) -> Result<()> {
        let updated: Option<RawIngestedDeal> = diesel::update(
            ingested_deal_raw::table.filter(
                ingested_deal_raw::id
                    .eq(&self.id)
                    .and(ingested_deal_raw::status.eq(RawDealStatus::Pending)),
            ),
        )
        .set((
            ingested_deal_raw::status.eq(RawDealStatus::Promoted),
            ingested_deal_raw::matched_merchant_id.eq(Some(merchant_id)),
            ingested_deal_raw::updated_at.eq(Utc::now().naive_utc()),
        ))
        .get_result(conn)
        .optional()
        .with_context(|| format!("cannot mark raw deal {} as promoted", self.id))?;
        match updated {
            Some(row) => {
                *self = row;
                Ok(())
            }
            None => bail!("raw deal {} was no longer pending", self.id),
        }
    }

    /// Mark this row as auto-rejected, embedding the quality assessment
    /// into its normalized payload so review tooling can show the reasons.
    pub fn mark_as_auto_rejected(
        &mut self,
        assessment_json: Value,
        conn: &mut PgConnection,
    ) -> Result<()> {
        let mut normalized = self
            .normalized_payload
            .clone()
            .unwrap_or_else(|| Value::Object(Default::default()));
        if let Value::Object(map) = &mut normalized {
            map.insert("quality_assessment".to_owned(), assessment_json);
        }
        let updated: Option<RawIngestedDeal> = diesel::update(
            ingested_deal_raw::table.filter(
                ingested_deal_raw::id
                    .eq(&self.id)
                    .and(ingested_deal_raw::status.eq(RawDealStatus::Pending)),
            ),
        )
        .set((
            ingested_deal_raw::status.eq(RawDealStatus::AutoRejected),
            ingested_deal_raw::normalized_payload.eq(Some(normalized)),
            ingested_deal_raw::updated_at.eq(Utc::now().naive_utc()),
        ))
        .get_result(conn)
        .optional()
        .with_context(|| format!("cannot mark raw deal {} as auto-rejected", self.id))?;
        match updated {
            Some(row) => {
                *self = row;
                Ok(())
            }
            None => bail!("raw deal {} was no longer pending", self.id),
        }
    }

    /// Reject the given rows, skipping any that are no longer pending.
    /// Returns the number of rows actually updated.
    pub fn reject_ids(ids: &[Uuid], conn: &mut PgConnection) -> Result<usize> {
        diesel::update(
            ingested_deal_raw::table.filter(
                ingested_deal_raw::id
                    .eq_any(ids)
                    .and(ingested_deal_raw::status.eq(RawDealStatus::Pending)),
            ),
        )
        .set((
            ingested_deal_raw::status.eq(RawDealStatus::Rejected),
            ingested_deal_raw::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)
        .context("could not reject raw deals")
    }

    /// Generate a sample value for testing.
    pub fn factory(job: &IngestionJob) -> Self {
        let now = Utc::now().naive_utc();
        RawIngestedDeal {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            job_id: job.id,
            merchant_alias: Some("Blue Bottle Cafe".to_owned()),
            raw_payload: serde_json::json!({
                "title": "Half-price espresso drinks",
                "description": "All espresso drinks are half price before 9am on weekdays.",
                "discountPercentage": 50,
            }),
            normalized_payload: None,
            status: RawDealStatus::Pending,
            matched_merchant_id: None,
            confidence: Some(0.9),
        }
    }
}

/// Data required to create a new `RawIngestedDeal`.
#[derive(Debug, Insertable)]
#[diesel(table_name = ingested_deal_raw)]
pub struct NewRawIngestedDeal {
    /// The unique ID of this row.
    pub id: Uuid,
    /// The ingestion job recording this row.
    pub job_id: Uuid,
    /// Free-text merchant name asserted by the producer.
    pub merchant_alias: Option<String>,
    /// Producer-native fields.
    pub raw_payload: Value,
    /// Canonicalized fields, possibly rewritten by date clamping.
    pub normalized_payload: Option<Value>,
    /// Initial status: `Pending`, or `AutoRejected` straight from the
    /// quality gate.
    pub status: RawDealStatus,
    /// Producer-asserted confidence, 0..1.
    pub confidence: Option<f64>,
}

impl NewRawIngestedDeal {
    /// Insert a new raw row into the database.
    pub fn insert(&self, conn: &mut PgConnection) -> Result<RawIngestedDeal> {
        diesel::insert_into(ingested_deal_raw::table)
            .values(self)
            .get_result(conn)
            .context("error inserting raw deal")
    }
}
