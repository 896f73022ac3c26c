//! Field extraction from producer payloads.
//!
//! Producers disagree about field names: the scraper says `originalPrice`,
//! the spreadsheet importer says `regular_price`, the event feed says
//! `price`. Rather than probing properties at the point of use, this
//! module flattens a raw payload plus an optional normalized payload into
//! one canonical [`DealFields`] struct, using a constant precedence list
//! per logical field. Normalized values always win over raw ones.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

/// The flattened field set the rest of the pipeline works with.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DealFields {
    /// Deal title.
    pub title: Option<String>,
    /// Deal description.
    pub description: Option<String>,
    /// Discount percentage, 0..100.
    pub discount_percentage: Option<f64>,
    /// Price before the deal.
    pub original_price: Option<f64>,
    /// Price under the deal.
    pub deal_price: Option<f64>,
    /// Category.
    pub category: Option<String>,
    /// When the deal becomes valid.
    pub start_date: Option<NaiveDateTime>,
    /// When the deal expires.
    pub end_date: Option<NaiveDateTime>,
    /// Terms and conditions text.
    pub terms: Option<String>,
    /// Image URL.
    pub image_url: Option<String>,
    /// Producer-native reference, usually the page the deal came from.
    pub source_url: Option<String>,
    /// Merchant name as the producer knows it.
    pub merchant_name: Option<String>,
    /// Merchant street address.
    pub address_line: Option<String>,
    /// Merchant city.
    pub city: Option<String>,
    /// Merchant state or province.
    pub state: Option<String>,
    /// Merchant postal code.
    pub postal_code: Option<String>,
    /// Latitude.
    pub latitude: Option<f64>,
    /// Longitude.
    pub longitude: Option<f64>,
    /// Total redemption limit.
    pub max_redemptions: Option<i32>,
    /// Per-user redemption limit.
    pub redemptions_per_user: Option<i32>,
}

// Precedence lists, first match wins. snake_case and camelCase variants
// are both listed because producers emit both.
const TITLE_KEYS: &[&str] = &["title", "deal_title", "dealTitle", "name", "headline"];
const DESCRIPTION_KEYS: &[&str] = &["description", "details", "summary", "body"];
const DISCOUNT_KEYS: &[&str] =
    &["discount_percentage", "discountPercentage", "discount_pct", "discount"];
const ORIGINAL_PRICE_KEYS: &[&str] =
    &["original_price", "originalPrice", "regular_price", "regularPrice", "price"];
const DEAL_PRICE_KEYS: &[&str] =
    &["deal_price", "dealPrice", "sale_price", "salePrice", "discounted_price"];
const CATEGORY_KEYS: &[&str] = &["category", "deal_category", "dealCategory", "vertical"];
const START_DATE_KEYS: &[&str] =
    &["start_date", "startDate", "starts_at", "startsAt", "valid_from", "validFrom"];
const END_DATE_KEYS: &[&str] =
    &["end_date", "endDate", "ends_at", "endsAt", "valid_until", "validUntil", "expires_at"];
const TERMS_KEYS: &[&str] = &["terms", "terms_and_conditions", "termsAndConditions", "fine_print"];
const IMAGE_KEYS: &[&str] = &["image_url", "imageUrl", "image", "photo_url"];
const SOURCE_URL_KEYS: &[&str] = &["source_url", "sourceUrl", "url", "link", "page_url"];
const MERCHANT_KEYS: &[&str] = &[
    "merchant_name",
    "merchantName",
    "business_name",
    "businessName",
    "merchant",
    "business",
    "venue",
];
const ADDRESS_KEYS: &[&str] = &["address_line", "addressLine", "address", "street_address"];
const CITY_KEYS: &[&str] = &["city", "town", "locality"];
const STATE_KEYS: &[&str] = &["state", "province", "region"];
const POSTAL_KEYS: &[&str] = &["postal_code", "postalCode", "zip", "zip_code", "zipCode"];
const LATITUDE_KEYS: &[&str] = &["latitude", "lat"];
const LONGITUDE_KEYS: &[&str] = &["longitude", "lng", "lon"];
const MAX_REDEMPTIONS_KEYS: &[&str] = &["max_redemptions", "maxRedemptions", "inventory"];
const PER_USER_KEYS: &[&str] =
    &["redemptions_per_user", "redemptionsPerUser", "per_user_limit"];

/// Flatten a raw payload plus an optional normalized payload into
/// [`DealFields`].
pub fn extract_deal_fields(raw: &Value, normalized: Option<&Value>) -> DealFields {
    // The normalized payload, when present, is consulted first.
    let sources: Vec<&Value> = match normalized {
        Some(normalized) => vec![normalized, raw],
        None => vec![raw],
    };
    DealFields {
        title: first_string(&sources, TITLE_KEYS),
        description: first_string(&sources, DESCRIPTION_KEYS),
        discount_percentage: first_number(&sources, DISCOUNT_KEYS),
        original_price: first_number(&sources, ORIGINAL_PRICE_KEYS),
        deal_price: first_number(&sources, DEAL_PRICE_KEYS),
        category: first_string(&sources, CATEGORY_KEYS),
        start_date: first_date(&sources, START_DATE_KEYS),
        end_date: first_date(&sources, END_DATE_KEYS),
        terms: first_string(&sources, TERMS_KEYS),
        image_url: first_string(&sources, IMAGE_KEYS),
        source_url: first_string(&sources, SOURCE_URL_KEYS),
        merchant_name: first_string(&sources, MERCHANT_KEYS),
        address_line: first_string(&sources, ADDRESS_KEYS),
        city: first_string(&sources, CITY_KEYS),
        state: first_string(&sources, STATE_KEYS),
        postal_code: first_string(&sources, POSTAL_KEYS),
        latitude: first_number(&sources, LATITUDE_KEYS),
        longitude: first_number(&sources, LONGITUDE_KEYS),
        max_redemptions: first_number(&sources, MAX_REDEMPTIONS_KEYS).map(|n| n as i32),
        redemptions_per_user: first_number(&sources, PER_USER_KEYS).map(|n| n as i32),
    }
}

/// First non-empty string for any of `keys`, searching each payload in
/// order and each key in precedence order within a payload.
fn first_string(sources: &[&Value], keys: &[&str]) -> Option<String> {
    for source in sources {
        for key in keys {
            if let Some(s) = source.get(key).and_then(Value::as_str) {
                let trimmed = s.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_owned());
                }
            }
        }
    }
    None
}

/// First numeric value for any of `keys`. Accepts JSON numbers and
/// numeric strings ("12.50", "$12.50"), because spreadsheet imports
/// routinely stringify prices.
fn first_number(sources: &[&Value], keys: &[&str]) -> Option<f64> {
    for source in sources {
        for key in keys {
            match source.get(key) {
                Some(Value::Number(n)) => return n.as_f64(),
                Some(Value::String(s)) => {
                    let cleaned = s.trim().trim_start_matches('$').replace(',', "");
                    if let Ok(n) = cleaned.parse::<f64>() {
                        return Some(n);
                    }
                }
                _ => {}
            }
        }
    }
    None
}

/// First parseable date for any of `keys`.
fn first_date(sources: &[&Value], keys: &[&str]) -> Option<NaiveDateTime> {
    for source in sources {
        for key in keys {
            if let Some(s) = source.get(key).and_then(Value::as_str) {
                if let Some(date) = parse_datetime(s) {
                    return Some(date);
                }
            }
        }
    }
    None
}

/// Parse the date formats producers actually send: RFC 3339, a bare
/// datetime, or a bare date (taken as midnight UTC).
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalized_payload_wins_over_raw() {
        let raw = json!({"title": "scraped title", "price": 20.0});
        let normalized = json!({"title": "Clean Title"});
        let fields = extract_deal_fields(&raw, Some(&normalized));
        assert_eq!(fields.title.as_deref(), Some("Clean Title"));
        // Fields missing from the normalized payload still fall back.
        assert_eq!(fields.original_price, Some(20.0));
    }

    #[test]
    fn precedence_within_a_payload_is_the_listed_order() {
        let raw = json!({"name": "fallback", "title": "primary"});
        let fields = extract_deal_fields(&raw, None);
        assert_eq!(fields.title.as_deref(), Some("primary"));

        let raw = json!({"name": "fallback"});
        let fields = extract_deal_fields(&raw, None);
        assert_eq!(fields.title.as_deref(), Some("fallback"));
    }

    #[test]
    fn blank_strings_do_not_shadow_later_sources() {
        let raw = json!({"description": "a real description of the offer"});
        let normalized = json!({"description": "   "});
        let fields = extract_deal_fields(&raw, Some(&normalized));
        assert_eq!(
            fields.description.as_deref(),
            Some("a real description of the offer")
        );
    }

    #[test]
    fn prices_parse_from_numbers_and_strings() {
        let raw = json!({"originalPrice": "$1,200.50", "dealPrice": 99.0});
        let fields = extract_deal_fields(&raw, None);
        assert_eq!(fields.original_price, Some(1200.50));
        assert_eq!(fields.deal_price, Some(99.0));
    }

    #[test]
    fn dates_parse_in_all_supported_formats() {
        assert!(parse_datetime("2026-09-01T12:00:00Z").is_some());
        assert!(parse_datetime("2026-09-01T12:00:00+02:00").is_some());
        assert!(parse_datetime("2026-09-01 12:00:00").is_some());
        assert_eq!(
            parse_datetime("2026-09-01"),
            NaiveDate::from_ymd_opt(2026, 9, 1).and_then(|d| d.and_hms_opt(0, 0, 0)),
        );
        assert!(parse_datetime("next tuesday").is_none());
    }

    #[test]
    fn merchant_and_address_fields_flatten() {
        let raw = json!({
            "business": "Taco Row",
            "address": "12 Mission St",
            "city": "San Francisco",
            "state": "CA",
            "zip": "94110",
            "lat": 37.76,
            "lng": -122.42,
        });
        let fields = extract_deal_fields(&raw, None);
        assert_eq!(fields.merchant_name.as_deref(), Some("Taco Row"));
        assert_eq!(fields.address_line.as_deref(), Some("12 Mission St"));
        assert_eq!(fields.postal_code.as_deref(), Some("94110"));
        assert_eq!(fields.latitude, Some(37.76));
        assert_eq!(fields.longitude, Some(-122.42));
    }
}
