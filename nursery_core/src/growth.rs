//! WHO growth-standard percentile estimation.
//!
//! Reference values are the WHO Child Growth Standards (simplified): for
//! each age bracket the 3rd, 15th, 50th, 85th and 97th percentile of weight
//! (kg) or length/height (cm). A measurement is placed on the nearest age
//! bracket and linearly interpolated between the anchors.

use crate::{Error, Result, Sex};
use serde::{Deserialize, Serialize};

/// One age bracket of a reference table
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PercentileRow {
    pub age_months: f64,
    pub p3: f64,
    pub p15: f64,
    pub p50: f64,
    pub p85: f64,
    pub p97: f64,
}

const fn row(age_months: f64, p3: f64, p15: f64, p50: f64, p85: f64, p97: f64) -> PercentileRow {
    PercentileRow {
        age_months,
        p3,
        p15,
        p50,
        p85,
        p97,
    }
}

impl PercentileRow {
    /// (percentile, reference value) anchors in ascending order
    pub fn anchors(&self) -> [(f64, f64); 5] {
        [
            (3.0, self.p3),
            (15.0, self.p15),
            (50.0, self.p50),
            (85.0, self.p85),
            (97.0, self.p97),
        ]
    }
}

/// What was measured
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Measurement {
    /// Weight in kilograms
    Weight,
    /// Length/height in centimetres
    Height,
}

impl std::str::FromStr for Measurement {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "weight" => Ok(Measurement::Weight),
            "height" | "length" => Ok(Measurement::Height),
            other => Err(Error::InvalidInput(format!(
                "unknown measurement '{}' (expected weight or height)",
                other
            ))),
        }
    }
}

// Boys weight (kg)
pub static BOYS_WEIGHT: [PercentileRow; 15] = [
    row(0.0, 2.5, 2.9, 3.3, 3.9, 4.4),
    row(1.0, 3.4, 3.9, 4.5, 5.1, 5.8),
    row(2.0, 4.3, 4.9, 5.6, 6.3, 7.1),
    row(3.0, 5.0, 5.7, 6.4, 7.2, 8.0),
    row(4.0, 5.6, 6.2, 7.0, 7.8, 8.7),
    row(5.0, 6.0, 6.7, 7.5, 8.4, 9.3),
    row(6.0, 6.4, 7.1, 7.9, 8.8, 9.8),
    row(7.0, 6.7, 7.4, 8.3, 9.2, 10.3),
    row(8.0, 6.9, 7.7, 8.6, 9.6, 10.7),
    row(9.0, 7.1, 8.0, 8.9, 9.9, 11.0),
    row(10.0, 7.4, 8.2, 9.2, 10.2, 11.4),
    row(11.0, 7.6, 8.4, 9.4, 10.5, 11.7),
    row(12.0, 7.7, 8.6, 9.6, 10.8, 12.0),
    row(18.0, 8.8, 9.8, 10.9, 12.2, 13.7),
    row(24.0, 9.7, 10.8, 12.2, 13.6, 15.3),
];

// Girls weight (kg)
pub static GIRLS_WEIGHT: [PercentileRow; 15] = [
    row(0.0, 2.4, 2.8, 3.2, 3.7, 4.2),
    row(1.0, 3.2, 3.6, 4.2, 4.8, 5.5),
    row(2.0, 3.9, 4.5, 5.1, 5.8, 6.6),
    row(3.0, 4.5, 5.2, 5.8, 6.6, 7.5),
    row(4.0, 5.0, 5.7, 6.4, 7.3, 8.2),
    row(5.0, 5.4, 6.1, 6.9, 7.8, 8.8),
    row(6.0, 5.7, 6.5, 7.3, 8.2, 9.3),
    row(7.0, 6.0, 6.8, 7.6, 8.6, 9.8),
    row(8.0, 6.3, 7.0, 7.9, 9.0, 10.2),
    row(9.0, 6.5, 7.3, 8.2, 9.3, 10.5),
    row(10.0, 6.7, 7.5, 8.5, 9.6, 10.9),
    row(11.0, 6.9, 7.7, 8.7, 9.9, 11.2),
    row(12.0, 7.0, 7.9, 8.9, 10.1, 11.5),
    row(18.0, 8.1, 9.1, 10.2, 11.6, 13.2),
    row(24.0, 9.0, 10.2, 11.5, 13.0, 14.8),
];

// Boys length/height (cm)
pub static BOYS_HEIGHT: [PercentileRow; 15] = [
    row(0.0, 46.1, 47.9, 49.9, 51.8, 53.7),
    row(1.0, 50.8, 52.7, 54.7, 56.7, 58.6),
    row(2.0, 54.4, 56.4, 58.4, 60.4, 62.4),
    row(3.0, 57.3, 59.4, 61.4, 63.5, 65.5),
    row(4.0, 59.7, 61.8, 63.9, 66.0, 68.0),
    row(5.0, 61.7, 63.8, 65.9, 68.0, 70.1),
    row(6.0, 63.3, 65.5, 67.6, 69.8, 71.9),
    row(7.0, 64.8, 67.0, 69.2, 71.3, 73.5),
    row(8.0, 66.2, 68.4, 70.6, 72.8, 75.0),
    row(9.0, 67.5, 69.7, 72.0, 74.2, 76.5),
    row(10.0, 68.7, 71.0, 73.3, 75.6, 77.9),
    row(11.0, 69.9, 72.2, 74.5, 76.9, 79.2),
    row(12.0, 71.0, 73.4, 75.7, 78.1, 80.5),
    row(18.0, 76.9, 79.6, 82.3, 85.0, 87.7),
    row(24.0, 81.7, 84.8, 87.8, 90.9, 93.9),
];

// Girls length/height (cm)
pub static GIRLS_HEIGHT: [PercentileRow; 15] = [
    row(0.0, 45.4, 47.2, 49.1, 51.0, 52.9),
    row(1.0, 49.8, 51.7, 53.7, 55.6, 57.6),
    row(2.0, 53.0, 55.0, 57.1, 59.1, 61.1),
    row(3.0, 55.6, 57.7, 59.8, 61.9, 64.0),
    row(4.0, 57.8, 59.9, 62.1, 64.3, 66.4),
    row(5.0, 59.6, 61.8, 64.0, 66.2, 68.5),
    row(6.0, 61.2, 63.5, 65.7, 68.0, 70.3),
    row(7.0, 62.7, 65.0, 67.3, 69.6, 71.9),
    row(8.0, 64.0, 66.4, 68.7, 71.1, 73.5),
    row(9.0, 65.3, 67.7, 70.1, 72.6, 75.0),
    row(10.0, 66.5, 69.0, 71.5, 73.9, 76.4),
    row(11.0, 67.7, 70.3, 72.8, 75.3, 77.8),
    row(12.0, 68.9, 71.4, 74.0, 76.6, 79.2),
    row(18.0, 74.9, 77.8, 80.7, 83.6, 86.5),
    row(24.0, 80.0, 83.2, 86.4, 89.6, 92.9),
];

/// Reference table for a child
///
/// Only male children use the boys' tables; female and unspecified use the
/// girls' tables.
pub fn reference_table(sex: Option<Sex>, measurement: Measurement) -> &'static [PercentileRow] {
    let boy = sex == Some(Sex::Male);
    match (measurement, boy) {
        (Measurement::Weight, true) => &BOYS_WEIGHT,
        (Measurement::Weight, false) => &GIRLS_WEIGHT,
        (Measurement::Height, true) => &BOYS_HEIGHT,
        (Measurement::Height, false) => &GIRLS_HEIGHT,
    }
}

/// Row whose age is numerically closest; the earliest row wins ties
pub fn nearest_row(table: &[PercentileRow], age_months: f64) -> Option<&PercentileRow> {
    let mut rows = table.iter();
    let mut best = rows.next()?;
    let mut best_diff = (best.age_months - age_months).abs();
    for candidate in rows {
        let diff = (candidate.age_months - age_months).abs();
        if diff < best_diff {
            best = candidate;
            best_diff = diff;
        }
    }
    Some(best)
}

/// Percentile of `value` within one bracket, rounded, clamped to [3, 97]
pub fn percentile_in_row(row: &PercentileRow, value: f64) -> u8 {
    let anchors = row.anchors();
    let (low_pct, low_value) = anchors[0];
    if value <= low_value {
        return low_pct as u8;
    }
    for pair in anchors.windows(2) {
        let (lo_pct, lo_value) = pair[0];
        let (hi_pct, hi_value) = pair[1];
        if value <= hi_value {
            let span = hi_value - lo_value;
            let fraction = if span > 0.0 { (value - lo_value) / span } else { 1.0 };
            return (lo_pct + fraction * (hi_pct - lo_pct)).round() as u8;
        }
    }
    anchors[4].0 as u8
}

/// Percentile of `value` against a table, using the nearest age bracket
///
/// An empty table yields the 50th percentile.
pub fn percentile_for_value(value: f64, age_months: f64, table: &[PercentileRow]) -> u8 {
    match nearest_row(table, age_months) {
        Some(row) => percentile_in_row(row, value),
        None => 50,
    }
}

/// Estimate the WHO growth percentile of a measurement
///
/// Rejects non-finite or non-positive values and negative or non-finite
/// ages; everything else maps into [3, 97].
pub fn growth_percentile(
    value: f64,
    age_months: f64,
    sex: Option<Sex>,
    measurement: Measurement,
) -> Result<u8> {
    if !value.is_finite() || value <= 0.0 {
        return Err(Error::InvalidMeasurement(format!(
            "{:?} must be a positive number, got {}",
            measurement, value
        )));
    }
    if !age_months.is_finite() || age_months < 0.0 {
        return Err(Error::InvalidMeasurement(format!(
            "age must be a non-negative number of months, got {}",
            age_months
        )));
    }

    let percentile = percentile_for_value(value, age_months, reference_table(sex, measurement));
    tracing::debug!(
        "{:?} {} at {} months -> p{}",
        measurement,
        value,
        age_months,
        percentile
    );
    Ok(percentile)
}

/// Coarse classification of a percentile for display
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PercentileBand {
    /// Within the 15th to 85th percentile
    Normal,
    /// Between the 3rd and 15th, or 85th and 97th
    Edge,
    /// Below the 3rd or above the 97th
    Outside,
}

impl PercentileBand {
    pub fn of(percentile: u8) -> Self {
        if !(3..=97).contains(&percentile) {
            PercentileBand::Outside
        } else if !(15..=85).contains(&percentile) {
            PercentileBand::Edge
        } else {
            PercentileBand::Normal
        }
    }
}

/// Display label such as "50th", "3rd" or "Below 3rd"
pub fn percentile_label(percentile: u8) -> String {
    if percentile < 3 {
        "Below 3rd".to_string()
    } else if percentile > 97 {
        "Above 97th".to_string()
    } else {
        format!("{}{}", percentile, ordinal_suffix(percentile))
    }
}

fn ordinal_suffix(n: u8) -> &'static str {
    match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}
