use crate::prelude::*;
use crate::schema::{merchant_aliases, merchant_locations, merchants};

diesel::define_sql_function! {
    /// SQL `lower()`, for case-insensitive exact matches.
    fn lower(x: diesel::sql_types::Text) -> diesel::sql_types::Text;
}

/// Status given to merchants created by the pipeline. Merchants from
/// other parts of the system use other values; the pipeline never
/// overwrites an existing merchant.
pub const MERCHANT_STATUS_IMPORTED: &str = "imported";

/// A canonical merchant record.
#[derive(Debug, Identifiable, Queryable, Serialize)]
#[diesel(table_name = merchants)]
pub struct Merchant {
    /// The unique ID of this merchant.
    pub id: Uuid,
    /// When this row was created.
    pub created_at: NaiveDateTime,
    /// When this row was last updated.
    pub updated_at: NaiveDateTime,
    /// The merchant's business name.
    pub business_name: String,
    /// Contact email, if known.
    pub email: Option<String>,
    /// Contact phone, if known.
    pub phone: Option<String>,
    /// Website, if known.
    pub website: Option<String>,
    /// Street address.
    pub address_line: Option<String>,
    /// City.
    pub city: Option<String>,
    /// State or province.
    pub state: Option<String>,
    /// Postal code.
    pub postal_code: Option<String>,
    /// Country.
    pub country: Option<String>,
    /// Account status; `imported` for pipeline-created merchants.
    pub status: String,
    /// Account level.
    pub level: i32,
}

impl Merchant {
    /// Find a merchant by ID.
    pub fn find(id: Uuid, conn: &mut PgConnection) -> Result<Merchant> {
        merchants::table
            .find(id)
            .first(conn)
            .with_context(|| format!("could not load merchant {}", id))
    }

    /// Case-insensitive exact match on business name.
    pub fn find_by_name(name: &str, conn: &mut PgConnection) -> Result<Option<Merchant>> {
        merchants::table
            .filter(lower(merchants::business_name).eq(name.to_lowercase()))
            .first(conn)
            .optional()
            .with_context(|| format!("error looking up merchant named {:?}", name))
    }

    /// Generate a sample value for testing.
    pub fn factory() -> Self {
        let now = Utc::now().naive_utc();
        Merchant {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            business_name: "Blue Bottle Cafe".to_owned(),
            email: None,
            phone: None,
            website: None,
            address_line: Some("66 Mint St".to_owned()),
            city: Some("San Francisco".to_owned()),
            state: Some("CA".to_owned()),
            postal_code: Some("94103".to_owned()),
            country: None,
            status: MERCHANT_STATUS_IMPORTED.to_owned(),
            level: 1,
        }
    }
}

/// Data required to create a new `Merchant`.
#[derive(Debug, Insertable)]
#[diesel(table_name = merchants)]
pub struct NewMerchant {
    /// The unique ID of this merchant.
    pub id: Uuid,
    /// The merchant's business name.
    pub business_name: String,
    /// Contact email, if known.
    pub email: Option<String>,
    /// Contact phone, if known.
    pub phone: Option<String>,
    /// Website, if known.
    pub website: Option<String>,
    /// Street address.
    pub address_line: Option<String>,
    /// City.
    pub city: Option<String>,
    /// State or province.
    pub state: Option<String>,
    /// Postal code.
    pub postal_code: Option<String>,
    /// Country.
    pub country: Option<String>,
    /// Account status.
    pub status: String,
    /// Account level.
    pub level: i32,
}

impl NewMerchant {
    /// Insert a new merchant into the database.
    pub fn insert(&self, conn: &mut PgConnection) -> Result<Merchant> {
        diesel::insert_into(merchants::table)
            .values(self)
            .get_result(conn)
            .context("error inserting merchant")
    }
}

/// A free-text name string known to resolve to a specific merchant.
/// Append-only; there is intentionally no cross-merchant uniqueness
/// constraint (see DESIGN.md).
#[derive(Associations, Debug, Identifiable, Queryable, Serialize)]
#[diesel(belongs_to(Merchant, foreign_key = merchant_id))]
#[diesel(table_name = merchant_aliases)]
pub struct MerchantAlias {
    /// The unique ID of this alias row.
    pub id: Uuid,
    /// When this row was created.
    pub created_at: NaiveDateTime,
    /// The merchant this alias resolves to.
    pub merchant_id: Uuid,
    /// The alias text.
    pub alias: String,
    /// The producer that asserted this alias.
    pub source: String,
    /// Producer-asserted confidence in the alias, 0..1.
    pub confidence: Option<f64>,
}

impl MerchantAlias {
    /// Case-insensitive exact match on alias text, across all merchants.
    pub fn find_by_alias(alias: &str, conn: &mut PgConnection) -> Result<Option<MerchantAlias>> {
        merchant_aliases::table
            .filter(lower(merchant_aliases::alias).eq(alias.to_lowercase()))
            .first(conn)
            .optional()
            .with_context(|| format!("error looking up alias {:?}", alias))
    }

    /// Insert-if-absent: link `alias` to `merchant_id` unless that link
    /// (case-insensitive) already exists. Idempotent from the pipeline's
    /// perspective.
    pub fn ensure(
        merchant_id: Uuid,
        alias: &str,
        source: &str,
        confidence: Option<f64>,
        conn: &mut PgConnection,
    ) -> Result<()> {
        let existing: Option<Uuid> = merchant_aliases::table
            .select(merchant_aliases::id)
            .filter(
                merchant_aliases::merchant_id
                    .eq(merchant_id)
                    .and(lower(merchant_aliases::alias).eq(alias.to_lowercase())),
            )
            .first(conn)
            .optional()
            .context("error checking for existing alias link")?;
        if existing.is_none() {
            diesel::insert_into(merchant_aliases::table)
                .values((
                    merchant_aliases::id.eq(Uuid::new_v4()),
                    merchant_aliases::merchant_id.eq(merchant_id),
                    merchant_aliases::alias.eq(alias),
                    merchant_aliases::source.eq(source),
                    merchant_aliases::confidence.eq(confidence),
                ))
                .execute(conn)
                .context("error inserting merchant alias")?;
        }
        Ok(())
    }
}

/// A physical location belonging to a merchant.
#[derive(Associations, Debug, Identifiable, Queryable, Serialize)]
#[diesel(belongs_to(Merchant, foreign_key = merchant_id))]
#[diesel(table_name = merchant_locations)]
pub struct MerchantLocation {
    /// The unique ID of this location.
    pub id: Uuid,
    /// When this row was created.
    pub created_at: NaiveDateTime,
    /// The merchant this location belongs to.
    pub merchant_id: Uuid,
    /// Street address.
    pub address_line: Option<String>,
    /// City.
    pub city: Option<String>,
    /// State or province.
    pub state: Option<String>,
    /// Postal code.
    pub postal_code: Option<String>,
    /// Latitude.
    pub latitude: Option<f64>,
    /// Longitude.
    pub longitude: Option<f64>,
    /// Whether this is the merchant's primary location. The first
    /// location recorded for a merchant is primary; never reassigned by
    /// the pipeline.
    pub is_primary: bool,
}

impl MerchantLocation {
    /// Count a merchant's existing locations.
    pub fn count_for_merchant(merchant_id: Uuid, conn: &mut PgConnection) -> Result<i64> {
        merchant_locations::table
            .filter(merchant_locations::merchant_id.eq(merchant_id))
            .count()
            .get_result(conn)
            .context("error counting merchant locations")
    }
}

/// Data required to create a new `MerchantLocation`.
#[derive(Debug, Insertable)]
#[diesel(table_name = merchant_locations)]
pub struct NewMerchantLocation {
    /// The unique ID of this location.
    pub id: Uuid,
    /// The merchant this location belongs to.
    pub merchant_id: Uuid,
    /// Street address.
    pub address_line: Option<String>,
    /// City.
    pub city: Option<String>,
    /// State or province.
    pub state: Option<String>,
    /// Postal code.
    pub postal_code: Option<String>,
    /// Latitude.
    pub latitude: Option<f64>,
    /// Longitude.
    pub longitude: Option<f64>,
    /// Whether this is the merchant's primary location.
    pub is_primary: bool,
}

impl NewMerchantLocation {
    /// Insert a new location into the database.
    pub fn insert(&self, conn: &mut PgConnection) -> Result<MerchantLocation> {
        diesel::insert_into(merchant_locations::table)
            .values(self)
            .get_result(conn)
            .context("error inserting merchant location")
    }
}
