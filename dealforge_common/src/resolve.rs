//! Merchant and location resolution.
//!
//! Turns a free-text alias plus payload fields into canonical merchant
//! and location rows, creating them when no match exists. Resolution is
//! idempotent for a given alias string: the same alias (any letter case)
//! always resolves to the same merchant across batches, because lookup
//! precedes creation and the alias link is an insert-if-absent.
//!
//! The alias check-then-insert pair is deliberately not wrapped in a
//! serializable transaction; two workers racing on the same brand-new
//! alias can each create a merchant. Accepted for a mostly-single-writer
//! admin workflow (see DESIGN.md before tightening).

use rand::Rng;

use crate::payload::DealFields;
use crate::prelude::*;
use crate::schema::merchant_locations;

/// Resolve `alias` (and the payload's merchant hints) to a merchant,
/// creating one if nothing matches.
pub fn find_or_create_merchant(
    alias: Option<&str>,
    fields: &DealFields,
    source: &str,
    confidence: Option<f64>,
    conn: &mut PgConnection,
) -> Result<Merchant> {
    let alias = alias.map(str::trim).filter(|a| !a.is_empty());

    // 1. Exact alias match, case-insensitive.
    if let Some(alias) = alias {
        if let Some(link) = MerchantAlias::find_by_alias(alias, conn)? {
            MerchantAlias::ensure(link.merchant_id, alias, source, confidence, conn)?;
            return Merchant::find(link.merchant_id, conn);
        }
    }

    // 2. Fall back to the business name itself.
    let name = best_merchant_name(alias, fields);
    if let Some(merchant) = Merchant::find_by_name(&name, conn)? {
        if let Some(alias) = alias {
            MerchantAlias::ensure(merchant.id, alias, source, confidence, conn)?;
        }
        return Ok(merchant);
    }

    // 3. Nothing matched; create the merchant.
    debug!(name = %name, source = %source, "creating merchant");
    let merchant = NewMerchant {
        id: Uuid::new_v4(),
        business_name: name,
        email: None,
        phone: None,
        website: None,
        address_line: fields.address_line.clone(),
        city: fields.city.clone(),
        state: fields.state.clone(),
        postal_code: fields.postal_code.clone(),
        country: None,
        status: MERCHANT_STATUS_IMPORTED.to_owned(),
        level: 1,
    }
    .insert(conn)?;
    if let Some(alias) = alias {
        MerchantAlias::ensure(merchant.id, alias, source, confidence, conn)?;
    }
    Ok(merchant)
}

/// Pick the best available merchant name: alias, then the payload's
/// merchant fields (the precedence chain inside `DealFields`), then the
/// deal title, then a generated placeholder.
fn best_merchant_name(alias: Option<&str>, fields: &DealFields) -> String {
    if let Some(alias) = alias {
        return alias.to_owned();
    }
    if let Some(name) = fields.merchant_name.as_deref() {
        return name.to_owned();
    }
    if let Some(title) = fields.title.as_deref() {
        return title.to_owned();
    }
    let tag: u32 = rand::thread_rng().gen();
    format!("merchant-{:08x}", tag)
}

/// Resolve or create a location for `merchant_id` from the payload's
/// address fields. Returns `None` when there is no location to record
/// (neither an address line nor a city).
pub fn find_or_create_location(
    merchant_id: Uuid,
    fields: &DealFields,
    conn: &mut PgConnection,
) -> Result<Option<MerchantLocation>> {
    if fields.address_line.is_none() && fields.city.is_none() {
        return Ok(None);
    }

    if let Some(existing) = match_existing_location(merchant_id, fields, conn)? {
        return Ok(Some(existing));
    }

    let prior = MerchantLocation::count_for_merchant(merchant_id, conn)?;
    let location = NewMerchantLocation {
        id: Uuid::new_v4(),
        merchant_id,
        address_line: fields.address_line.clone(),
        city: fields.city.clone(),
        state: fields.state.clone(),
        postal_code: fields.postal_code.clone(),
        latitude: fields.latitude,
        longitude: fields.longitude,
        // First location recorded for a merchant is primary.
        is_primary: prior == 0,
    }
    .insert(conn)?;
    Ok(Some(location))
}

/// Match an existing location by (address line + postal code) or by
/// (city + state).
fn match_existing_location(
    merchant: Uuid,
    fields: &DealFields,
    conn: &mut PgConnection,
) -> Result<Option<MerchantLocation>> {
    if let (Some(line), Some(postal)) = (&fields.address_line, &fields.postal_code) {
        let found: Option<MerchantLocation> = address_match_query(merchant, line, postal)
            .first(conn)
            .optional()
            .context("error matching location by address")?;
        if found.is_some() {
            return Ok(found);
        }
    }

    if let (Some(city_name), Some(state_name)) = (&fields.city, &fields.state) {
        let found: Option<MerchantLocation> =
            city_match_query(merchant, city_name, state_name)
                .first(conn)
                .optional()
                .context("error matching location by city")?;
        if found.is_some() {
            return Ok(found);
        }
    }

    Ok(None)
}

fn address_match_query<'a>(
    merchant: Uuid,
    line: &'a str,
    postal: &'a str,
) -> merchant_locations::BoxedQuery<'a, diesel::pg::Pg> {
    merchant_locations::table
        .filter(
            merchant_locations::merchant_id
                .eq(merchant)
                .and(merchant_locations::address_line.eq(line))
                .and(merchant_locations::postal_code.eq(postal)),
        )
        .into_boxed()
}

fn city_match_query<'a>(
    merchant: Uuid,
    city: &'a str,
    state: &'a str,
) -> merchant_locations::BoxedQuery<'a, diesel::pg::Pg> {
    merchant_locations::table
        .filter(
            merchant_locations::merchant_id
                .eq(merchant)
                .and(merchant_locations::city.eq(city))
                .and(merchant_locations::state.eq(state)),
        )
        .into_boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::extract_deal_fields;
    use serde_json::json;

    #[test]
    fn best_name_prefers_alias_over_payload() {
        let fields = extract_deal_fields(
            &json!({"business": "Taco Row", "title": "2-for-1 tacos"}),
            None,
        );
        assert_eq!(best_merchant_name(Some("Taco Row SF"), &fields), "Taco Row SF");
        assert_eq!(best_merchant_name(None, &fields), "Taco Row");
    }

    #[test]
    fn location_match_queries_bind_the_merchant() {
        let merchant = Uuid::new_v4();

        let by_address = address_match_query(merchant, "12 Mission St", "94110");
        let sql = diesel::debug_query::<diesel::pg::Pg, _>(&by_address).to_string();
        assert!(sql.contains("\"merchant_id\" = "), "got {}", sql);
        assert!(sql.contains("\"address_line\" = "), "got {}", sql);
        assert!(sql.contains("\"postal_code\" = "), "got {}", sql);

        let by_city = city_match_query(merchant, "San Francisco", "CA");
        let sql = diesel::debug_query::<diesel::pg::Pg, _>(&by_city).to_string();
        assert!(sql.contains("\"merchant_id\" = "), "got {}", sql);
        assert!(sql.contains("\"city\" = "), "got {}", sql);
        assert!(sql.contains("\"state\" = "), "got {}", sql);
    }

    #[test]
    fn best_name_falls_back_to_title_then_placeholder() {
        let fields = extract_deal_fields(&json!({"title": "2-for-1 tacos"}), None);
        assert_eq!(best_merchant_name(None, &fields), "2-for-1 tacos");

        let empty = extract_deal_fields(&json!({}), None);
        let generated = best_merchant_name(None, &empty);
        assert!(generated.starts_with("merchant-"), "got {:?}", generated);
    }
}
