use serde_json::Value;

use crate::prelude::*;
use crate::schema::{deal_sources, deals};

/// A canonical catalog deal. Created only by the promotion engine; one
/// row per promoted raw deal.
#[derive(Debug, Identifiable, Queryable, Serialize)]
#[diesel(table_name = deals)]
pub struct Deal {
    /// The unique ID of this deal.
    pub id: Uuid,
    /// When this row was created.
    pub created_at: NaiveDateTime,
    /// When this row was last updated.
    pub updated_at: NaiveDateTime,
    /// The merchant offering this deal.
    pub merchant_id: Uuid,
    /// The location offering this deal, if one was resolved.
    pub location_id: Option<Uuid>,
    /// Deal title.
    pub title: String,
    /// Deal description.
    pub description: Option<String>,
    /// Price before the deal.
    pub original_price: Option<f64>,
    /// Price under the deal.
    pub deal_price: Option<f64>,
    /// Discount percentage.
    pub discount_percentage: Option<f64>,
    /// Category, lower-cased for consistency.
    pub category: Option<String>,
    /// When the deal becomes valid.
    pub starts_at: NaiveDateTime,
    /// When the deal expires.
    pub ends_at: NaiveDateTime,
    /// Catalog status.
    pub status: DealStatus,
    /// Catalog visibility.
    pub visibility: String,
    /// Image URL, if the producer supplied one.
    pub image_url: Option<String>,
    /// Terms and conditions text.
    pub terms: Option<String>,
    /// The kind of producer this deal came from.
    pub source_type: String,
    /// Producer-native reference, usually a URL.
    pub source_reference: Option<String>,
    /// JSON snapshot of the raw and normalized payloads plus job scope.
    pub source_details: Value,
    /// Producer-asserted confidence, 0..1.
    pub confidence_score: Option<f64>,
    /// Total redemption limit, if any.
    pub max_redemptions: Option<i32>,
    /// Per-user redemption limit, if any.
    pub redemptions_per_user: Option<i32>,
}

/// Data required to create a new `Deal`.
#[derive(Debug, Insertable)]
#[diesel(table_name = deals)]
pub struct NewDeal {
    /// The unique ID of this deal.
    pub id: Uuid,
    /// The merchant offering this deal.
    pub merchant_id: Uuid,
    /// The location offering this deal.
    pub location_id: Option<Uuid>,
    /// Deal title.
    pub title: String,
    /// Deal description.
    pub description: Option<String>,
    /// Price before the deal.
    pub original_price: Option<f64>,
    /// Price under the deal.
    pub deal_price: Option<f64>,
    /// Discount percentage.
    pub discount_percentage: Option<f64>,
    /// Category, lower-cased.
    pub category: Option<String>,
    /// When the deal becomes valid.
    pub starts_at: NaiveDateTime,
    /// When the deal expires.
    pub ends_at: NaiveDateTime,
    /// Catalog status.
    pub status: DealStatus,
    /// Catalog visibility.
    pub visibility: String,
    /// Image URL.
    pub image_url: Option<String>,
    /// Terms and conditions.
    pub terms: Option<String>,
    /// The kind of producer this deal came from.
    pub source_type: String,
    /// Producer-native reference.
    pub source_reference: Option<String>,
    /// JSON snapshot of payloads and job scope.
    pub source_details: Value,
    /// Producer-asserted confidence.
    pub confidence_score: Option<f64>,
    /// Total redemption limit.
    pub max_redemptions: Option<i32>,
    /// Per-user redemption limit.
    pub redemptions_per_user: Option<i32>,
}

impl NewDeal {
    /// Insert a new deal into the catalog.
    pub fn insert(&self, conn: &mut PgConnection) -> Result<Deal> {
        diesel::insert_into(deals::table)
            .values(self)
            .get_result(conn)
            .context("error inserting deal")
    }
}

/// Append-only provenance record linking a deal back to its origin.
#[derive(Associations, Debug, Identifiable, Queryable, Serialize)]
#[diesel(belongs_to(Deal, foreign_key = deal_id))]
#[diesel(table_name = deal_sources)]
pub struct DealSource {
    /// The unique ID of this record.
    pub id: Uuid,
    /// When this record was created.
    pub created_at: NaiveDateTime,
    /// The deal this record describes.
    pub deal_id: Uuid,
    /// The kind of producer the deal came from.
    pub source_type: String,
    /// Raw reference URL, if any.
    pub source_url: Option<String>,
    /// When the producer fetched the underlying data.
    pub fetched_at: Option<NaiveDateTime>,
    /// Producer-asserted confidence.
    pub confidence: Option<f64>,
    /// Producer-specific metadata.
    pub metadata: Option<Value>,
}

/// Data required to create a new `DealSource`.
#[derive(Debug, Insertable)]
#[diesel(table_name = deal_sources)]
pub struct NewDealSource {
    /// The unique ID of this record.
    pub id: Uuid,
    /// The deal this record describes.
    pub deal_id: Uuid,
    /// The kind of producer the deal came from.
    pub source_type: String,
    /// Raw reference URL, if any.
    pub source_url: Option<String>,
    /// When the producer fetched the underlying data.
    pub fetched_at: Option<NaiveDateTime>,
    /// Producer-asserted confidence.
    pub confidence: Option<f64>,
    /// Producer-specific metadata.
    pub metadata: Option<Value>,
}

impl NewDealSource {
    /// Append a provenance record.
    pub fn insert(&self, conn: &mut PgConnection) -> Result<DealSource> {
        diesel::insert_into(deal_sources::table)
            .values(self)
            .get_result(conn)
            .context("error inserting deal source")
    }
}
