//! The deal quality scorer.
//!
//! A pure, deterministic function from flattened deal fields to a score
//! in [0, 1] plus human-readable reasons. No I/O: both the ingestion
//! recorder and the promotion engine call this, and auditors need the
//! same fields to always produce the same verdict.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::config::QualityConfig;
use crate::payload::DealFields;

lazy_static! {
    /// Titles producers synthesize when they have nothing real.
    static ref PLACEHOLDER_TITLE: Regex =
        Regex::new(r"(?i)^(untitled|unknown( merchant)?|placeholder|tbd|n/?a)\b|^deal\s*#?\d*$")
            .expect("invalid placeholder-title regex");
    /// Promotional language that marks a record as deal-like even when
    /// structured pricing is missing.
    static ref SPECIAL_OFFER: Regex =
        Regex::new(r"(?i)\b(bogo|free|special)\b").expect("invalid special-offer regex");
}

/// Categories where a description plus a price is enough structure to
/// stand in for a discount (ticketed events rarely have an "original
/// price").
const EVENT_CATEGORIES: &[&str] = &["event", "events", "entertainment", "activities"];

/// The scorer's verdict on one deal.
#[derive(Clone, Debug, Serialize)]
pub struct QualityAssessment {
    /// Heuristic quality estimate in [0, 1].
    pub score: f64,
    /// Deficiencies found, in the order they were checked.
    pub reasons: Vec<String>,
    /// Whether the deal clears the promotion bar.
    pub is_valid: bool,
    /// Whether the deal falls below the hard floor and should be
    /// rejected without review.
    pub should_auto_reject: bool,
}

impl QualityAssessment {
    /// A short single-line summary for audit records.
    pub fn summary(&self) -> String {
        if self.reasons.is_empty() {
            format!("quality score {:.2}", self.score)
        } else {
            let top: Vec<&str> =
                self.reasons.iter().take(3).map(String::as_str).collect();
            format!("quality score {:.2}: {}", self.score, top.join("; "))
        }
    }

    /// JSON form, embedded into rejected rows' normalized payloads.
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "score": self.score,
            "reasons": self.reasons,
            "is_valid": self.is_valid,
            "should_auto_reject": self.should_auto_reject,
        })
    }
}

/// Score a deal's flattened fields.
pub fn assess(fields: &DealFields, config: &QualityConfig) -> QualityAssessment {
    let mut score: f64 = 0.0;
    let mut reasons = Vec::new();

    // Title.
    let has_title = meaningful_title(fields.title.as_deref());
    if has_title {
        score += 0.15;
    } else {
        reasons.push("missing or generic title".to_owned());
    }

    // Description, in three bands.
    let description_len =
        fields.description.as_deref().map(|d| d.trim().len()).unwrap_or(0);
    if description_len > 20 {
        score += 0.25;
    } else if description_len > 10 {
        score += 0.15;
        reasons.push("description too short".to_owned());
    } else {
        reasons.push("missing description".to_owned());
    }

    // Discount percentage.
    let good_discount = match fields.discount_percentage {
        Some(pct) if pct >= config.min_discount_percentage => {
            score += 0.30;
            true
        }
        Some(pct) if pct > 0.0 => {
            score += 0.15;
            reasons.push("discount below minimum threshold".to_owned());
            false
        }
        _ => false,
    };

    // Price comparison.
    let good_savings = match (fields.original_price, fields.deal_price) {
        (Some(original), Some(deal)) if original - deal >= config.min_savings_amount => {
            score += 0.30;
            true
        }
        (Some(original), Some(deal)) if original - deal > 0.0 => {
            score += 0.15;
            reasons.push("savings below minimum amount".to_owned());
            false
        }
        (None, Some(_)) => {
            score += 0.10;
            reasons.push("no comparison price".to_owned());
            false
        }
        _ => false,
    };

    // Special-offer language is a bonus signal, not a deficiency, so no
    // reason is recorded when it's absent.
    if has_special_offer_language(fields) {
        score += 0.20;
    }

    // Category.
    let category = fields.category.as_deref().map(str::trim).filter(|c| !c.is_empty());
    if category.is_some() {
        score += 0.05;
    } else {
        reasons.push("missing category".to_owned());
    }

    // Expiration date.
    if fields.end_date.is_some() {
        score += 0.10;
    } else {
        reasons.push("no expiration date".to_owned());
    }

    // Terms.
    if fields.terms.as_deref().map(str::trim).filter(|t| !t.is_empty()).is_some() {
        score += 0.05;
    }

    let score = score.min(1.0_f64);

    // Structural check: a score alone is not enough to promote. A real
    // deal has a title plus either substance in the description, real
    // pricing, or (for event-like categories) a described, priced entry.
    let event_like = category
        .map(|c| EVENT_CATEGORIES.contains(&c.to_lowercase().as_str()))
        .unwrap_or(false);
    let structurally_sound = has_title
        && (description_len > 20
            || good_discount
            || good_savings
            || (event_like && description_len > 0 && fields.deal_price.is_some()));

    QualityAssessment {
        score,
        reasons,
        is_valid: score >= config.min_promotion_score && structurally_sound,
        should_auto_reject: score < config.auto_reject_score,
    }
}

/// A meaningful title is present, longer than three characters, and not
/// a synthetic placeholder.
fn meaningful_title(title: Option<&str>) -> bool {
    match title.map(str::trim) {
        Some(t) => t.len() > 3 && !PLACEHOLDER_TITLE.is_match(t),
        None => false,
    }
}

/// Case-insensitive check for promotional language in title or
/// description: "buy" and "get" together, or bogo/free/special.
fn has_special_offer_language(fields: &DealFields) -> bool {
    let mut text = String::new();
    if let Some(title) = &fields.title {
        text.push_str(title);
        text.push(' ');
    }
    if let Some(description) = &fields.description {
        text.push_str(description);
    }
    let lowered = text.to_lowercase();
    (lowered.contains("buy") && lowered.contains("get")) || SPECIAL_OFFER.is_match(&lowered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> QualityConfig {
        QualityConfig::default()
    }

    fn fields() -> DealFields {
        DealFields::default()
    }

    #[test]
    fn complete_deal_caps_at_one_and_is_valid() {
        let f = DealFields {
            title: Some("50% Off Everything Sale".to_owned()),
            description: Some(
                "Massive clearance sale! Get 50% off all items in store. Limited time only."
                    .to_owned(),
            ),
            discount_percentage: Some(50.0),
            original_price: Some(100.0),
            deal_price: Some(50.0),
            category: Some("Shopping".to_owned()),
            ..fields()
        };
        let assessment = assess(&f, &config());
        assert_eq!(assessment.score, 1.0);
        assert!(assessment.is_valid);
        assert!(!assessment.should_auto_reject);
    }

    #[test]
    fn bare_menu_row_is_auto_rejected() {
        let f = DealFields {
            title: Some("Menu".to_owned()),
            description: Some(String::new()),
            category: Some("Dining".to_owned()),
            ..fields()
        };
        let assessment = assess(&f, &config());
        assert!((assessment.score - 0.20).abs() < 1e-9);
        assert!(assessment.should_auto_reject);
        assert!(!assessment.is_valid);
        assert!(assessment.reasons.iter().any(|r| r == "missing description"));
    }

    #[test]
    fn scoring_is_deterministic() {
        let f = DealFields {
            title: Some("Two for one tacos".to_owned()),
            description: Some("Buy one taco, get one free every Tuesday.".to_owned()),
            category: Some("dining".to_owned()),
            ..fields()
        };
        let a = assess(&f, &config());
        let b = assess(&f, &config());
        assert_eq!(a.score, b.score);
        assert_eq!(a.reasons, b.reasons);
    }

    #[test]
    fn score_stays_in_bounds_for_degenerate_input() {
        let empty = assess(&fields(), &config());
        assert!(empty.score >= 0.0 && empty.score <= 1.0);
        assert!(empty.should_auto_reject);

        let negative_prices = DealFields {
            title: Some("Mystery".to_owned()),
            original_price: Some(-5.0),
            deal_price: Some(10.0),
            discount_percentage: Some(-3.0),
            ..fields()
        };
        let assessment = assess(&negative_prices, &config());
        assert!(assessment.score >= 0.0 && assessment.score <= 1.0);
    }

    #[test]
    fn placeholder_titles_earn_nothing() {
        for title in ["Deal #12", "untitled", "Unknown Merchant", "TBD", "n/a"] {
            let f = DealFields { title: Some(title.to_owned()), ..fields() };
            let assessment = assess(&f, &config());
            assert!(
                assessment.reasons.iter().any(|r| r == "missing or generic title"),
                "{:?} should be treated as a placeholder",
                title
            );
        }
    }

    #[test]
    fn special_offer_language_is_a_silent_bonus() {
        let base = DealFields {
            title: Some("Lunch plate".to_owned()),
            description: Some("A very ordinary lunch plate with rice.".to_owned()),
            ..fields()
        };
        let with_bonus = DealFields {
            description: Some("Buy one plate and get one half off.".to_owned()),
            ..base.clone()
        };
        let plain = assess(&base, &config());
        let bonus = assess(&with_bonus, &config());
        assert!((bonus.score - plain.score - 0.20).abs() < 1e-9);
        assert_eq!(plain.reasons, bonus.reasons);
    }

    #[test]
    fn event_deals_validate_on_description_plus_price() {
        let f = DealFields {
            title: Some("Jazz night at the Blue Room".to_owned()),
            description: Some("Live quartet".to_owned()),
            deal_price: Some(15.0),
            category: Some("Events".to_owned()),
            end_date: crate::payload::parse_datetime("2026-12-01"),
            terms: Some("21+ only".to_owned()),
            ..fields()
        };
        let assessment = assess(&f, &config());
        // 0.15 title + 0.15 short description + 0.10 no-comparison price
        // + 0.05 category + 0.10 end date + 0.05 terms = 0.60.
        assert!((assessment.score - 0.60).abs() < 1e-9);
        assert!(assessment.is_valid);
    }
}
