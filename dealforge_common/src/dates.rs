//! Date clamping.
//!
//! Producers routinely emit stale or malformed date ranges: scrapes of
//! cached pages send start dates years in the past, spreadsheet rows
//! carry 1970 sentinels, event feeds send end dates before start dates.
//! Downstream consumers assume a deal's range is sane, so the pipeline
//! rewrites bad ranges at the door and again at promotion.

use chrono::{Datelike, Duration, NaiveDateTime};

use crate::config::DateConfig;

/// A clamped start/end pair.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ClampedRange {
    /// When the deal becomes valid.
    pub starts_at: NaiveDateTime,
    /// When the deal expires.
    pub ends_at: NaiveDateTime,
}

/// Clamp a producer-supplied date range against `now`.
///
/// A start date in the past, or in a year before the configured minimum,
/// is replaced with `now`. An end date at or before the (possibly
/// clamped) start, or in a year before the minimum, is replaced with
/// start plus the default validity window.
pub fn clamp_date_range(
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
    now: NaiveDateTime,
    config: &DateConfig,
) -> ClampedRange {
    let starts_at = match start {
        Some(start) if start >= now && start.year() >= config.min_accepted_year => start,
        _ => now,
    };
    let window = Duration::from_std(config.default_validity_window)
        .unwrap_or_else(|_| Duration::days(60));
    let ends_at = match end {
        Some(end) if end > starts_at && end.year() >= config.min_accepted_year => end,
        _ => starts_at + window,
    };
    ClampedRange { starts_at, ends_at }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .expect("bad test date")
    }

    fn config() -> DateConfig {
        DateConfig::default()
    }

    #[test]
    fn past_start_dates_are_rewritten_to_now() {
        let now = at(2026, 8, 29);
        let range = clamp_date_range(Some(at(2023, 1, 1)), None, now, &config());
        assert_eq!(range.starts_at, now);
        assert_eq!(range.ends_at, now + Duration::days(60));
    }

    #[test]
    fn sentinel_years_are_rewritten_even_if_somehow_future() {
        let now = at(1969, 12, 31);
        let range = clamp_date_range(Some(at(1970, 1, 1)), None, now, &config());
        assert_eq!(range.starts_at, now);
    }

    #[test]
    fn end_before_start_gets_the_default_window() {
        let now = at(2026, 8, 29);
        let start = at(2026, 9, 15);
        let range = clamp_date_range(Some(start), Some(at(2026, 9, 1)), now, &config());
        assert_eq!(range.starts_at, start);
        assert_eq!(range.ends_at, start + Duration::days(60));
    }

    #[test]
    fn valid_future_ranges_pass_through_untouched() {
        let now = at(2026, 8, 29);
        let start = at(2026, 9, 1);
        let end = at(2026, 10, 1);
        let range = clamp_date_range(Some(start), Some(end), now, &config());
        assert_eq!(range, ClampedRange { starts_at: start, ends_at: end });
    }

    #[test]
    fn missing_dates_yield_now_plus_window() {
        let now = at(2026, 8, 29);
        let range = clamp_date_range(None, None, now, &config());
        assert_eq!(range.starts_at, now);
        assert_eq!(range.ends_at, now + Duration::days(60));
    }
}
