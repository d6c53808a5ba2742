//! Next-nap prediction from age-based wake windows.
//!
//! A wake window is the typical awake interval between sleeps for a child
//! of a given age. The prediction anchors on the end of the most recent
//! completed sleep; with less history it falls back to coarser estimates
//! and reports lower confidence.

use crate::sleep_log::SleepEntry;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// How far back sleep history is considered
pub const HISTORY_DAYS: i64 = 7;

/// Minutes from now used when the anchored prediction is already past
const OVERDUE_OFFSET_MINUTES: i64 = 30;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SleepPrediction {
    pub next_nap_time: DateTime<Utc>,
    pub confidence: f64,
    pub recommended_duration_minutes: i64,
    pub wake_window_minutes: i64,
}

/// (wake window, recommended nap length) in minutes for an age in months
pub fn wake_window_for_age(age_months: f64) -> (i64, i64) {
    if age_months < 3.0 {
        (60, 45)
    } else if age_months < 6.0 {
        (90, 60)
    } else if age_months < 9.0 {
        (120, 75)
    } else if age_months < 12.0 {
        (150, 90)
    } else {
        (180, 90)
    }
}

/// Predict when the next nap is due
///
/// `sleeps` may contain any history; only entries that started within the
/// last [`HISTORY_DAYS`] days are considered.
pub fn predict_next_nap(age_months: f64, sleeps: &[SleepEntry], now: DateTime<Utc>) -> SleepPrediction {
    let (wake_window, recommended) = wake_window_for_age(age_months);
    let cutoff = now - Duration::days(HISTORY_DAYS);

    let mut recent: Vec<&SleepEntry> = sleeps.iter().filter(|s| s.start_time >= cutoff).collect();
    recent.sort_by(|a, b| b.start_time.cmp(&a.start_time));

    let (next_nap_time, confidence) = if recent.is_empty() {
        (now + Duration::minutes(wake_window), 0.4)
    } else if let Some(last_wake) = recent.iter().find_map(|s| s.end_time) {
        let anchored = last_wake + Duration::minutes(wake_window);
        if anchored < now {
            (now + Duration::minutes(OVERDUE_OFFSET_MINUTES), 0.75)
        } else {
            (anchored, 0.75)
        }
    } else {
        (now + Duration::minutes(wake_window / 2), 0.5)
    };

    tracing::debug!(
        "Predicted next nap at {} (window {}m, confidence {})",
        next_nap_time,
        wake_window,
        confidence
    );

    SleepPrediction {
        next_nap_time,
        confidence,
        recommended_duration_minutes: recommended,
        wake_window_minutes: wake_window,
    }
}
