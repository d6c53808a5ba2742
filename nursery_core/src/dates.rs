//! Date and duration helpers for logging and displaying care events.

use crate::{Error, Result};
use chrono::{DateTime, Datelike, NaiveDate, Utc};

/// Render a whole-minute duration: "45m", "2h", "1h 30m"
pub fn format_duration_minutes(minutes: i64) -> String {
    let minutes = minutes.max(0);
    if minutes < 60 {
        return format!("{}m", minutes);
    }
    let hours = minutes / 60;
    let mins = minutes % 60;
    if mins > 0 {
        format!("{}h {}m", hours, mins)
    } else {
        format!("{}h", hours)
    }
}

/// Whole minutes from `start` to `end`, truncated toward zero
pub fn duration_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_minutes()
}

/// Age of a child, as displayed on the profile
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BabyAge {
    /// Completed calendar months
    pub months: u32,
    /// Days past the completed months, approximated as total days mod 30
    pub days: u32,
    pub text: String,
}

impl BabyAge {
    /// Age on `today` for a child born on `birth`. Future birth dates give
    /// an age of zero.
    pub fn between(birth: NaiveDate, today: NaiveDate) -> Self {
        let months = completed_months(birth, today);
        let total_days = (today - birth).num_days().max(0);
        let days = (total_days % 30) as u32;

        let text = if months >= 12 {
            let years = months / 12;
            let remaining = months % 12;
            if remaining > 0 {
                format!("{}y {}m", years, remaining)
            } else {
                format!("{}y", years)
            }
        } else if months > 0 {
            format!("{}m {}d", months, days)
        } else {
            format!("{}d", days)
        };

        Self { months, days, text }
    }
}

fn completed_months(birth: NaiveDate, today: NaiveDate) -> u32 {
    if today <= birth {
        return 0;
    }
    let mut months = (today.year() - birth.year()) * 12 + today.month() as i32
        - birth.month() as i32;
    if today.day() < birth.day() {
        months -= 1;
    }
    months.max(0) as u32
}

/// Fractional age in months using 30-day months, as wake-window rules use
pub fn age_in_months(birth: NaiveDate, now: DateTime<Utc>) -> f64 {
    let days = (now.date_naive() - birth).num_days().max(0);
    days as f64 / 30.0
}

/// Parse a calendar date ("2026-03-01")
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| Error::InvalidInput(format!("invalid date '{}': {}", s, e)))
}

/// Parse an RFC 3339 timestamp, normalised to UTC
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::InvalidInput(format!("invalid timestamp '{}': {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    #[test]
    fn test_format_duration_minutes() {
        assert_eq!(format_duration_minutes(0), "0m");
        assert_eq!(format_duration_minutes(45), "45m");
        assert_eq!(format_duration_minutes(60), "1h");
        assert_eq!(format_duration_minutes(90), "1h 30m");
        assert_eq!(format_duration_minutes(605), "10h 5m");
    }

    #[test]
    fn test_duration_minutes_truncates() {
        let start = parse_timestamp("2026-03-01T10:00:00Z").unwrap();
        assert_eq!(duration_minutes(start, start + Duration::seconds(119)), 1);
        assert_eq!(duration_minutes(start, start + Duration::minutes(45)), 45);
    }

    #[test]
    fn test_baby_age_text() {
        let birth = date("2025-01-15");

        let newborn = BabyAge::between(birth, date("2025-01-27"));
        assert_eq!(newborn.months, 0);
        assert_eq!(newborn.text, "12d");

        // Feb 14 is one day short of a completed month
        assert_eq!(BabyAge::between(birth, date("2025-02-14")).months, 0);
        assert_eq!(BabyAge::between(birth, date("2025-02-15")).months, 1);

        let infant = BabyAge::between(birth, date("2025-04-20"));
        assert_eq!(infant.months, 3);
        assert_eq!(infant.text, format!("3m {}d", infant.days));

        assert_eq!(BabyAge::between(birth, date("2026-01-15")).text, "1y");
        assert_eq!(BabyAge::between(birth, date("2026-03-20")).text, "1y 2m");
    }

    #[test]
    fn test_future_birth_is_zero_age() {
        let age = BabyAge::between(date("2026-05-01"), date("2026-04-01"));
        assert_eq!(age.months, 0);
        assert_eq!(age.days, 0);
        assert_eq!(age.text, "0d");
    }

    #[test]
    fn test_age_in_months_uses_thirty_day_months() {
        let now = parse_timestamp("2026-03-31T12:00:00Z").unwrap();
        let birth = date("2026-01-30");
        assert!((age_in_months(birth, now) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_date("01/03/2026").is_err());
        assert!(parse_timestamp("yesterday").is_err());
        assert_eq!(
            parse_timestamp("2026-03-01T10:00:00+02:00").unwrap(),
            parse_timestamp("2026-03-01T08:00:00Z").unwrap()
        );
    }
}
