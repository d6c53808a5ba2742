#![forbid(unsafe_code)]

//! Core logic for the Nursery infant care tracker.
//!
//! This crate provides:
//! - The persisted sleep timer and its notification refresh loop
//! - WHO growth percentile estimation
//! - Nap prediction and reminder scheduling
//! - Local persistence (active timer, settings, sleep log, CSV export)

pub mod types;
pub mod error;
pub mod clock;
pub mod config;
pub mod logging;
pub mod store;
pub mod notify;
pub mod timer;
pub mod refresh;
pub mod growth;
pub mod dates;
pub mod sleep_log;
pub mod prediction;
pub mod reminders;
pub mod report;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, DataPaths};
pub use notify::{
    MemoryScheduler, NotificationContent, NotificationId, NotificationKind,
    NotificationScheduler, ScheduledNotification, SpoolScheduler, Trigger,
};
pub use timer::{format_timer_duration, ActiveTimer, SleepTimer, TimerSummary};
pub use refresh::{RefreshHandle, SupervisedTimer};
pub use growth::{growth_percentile, percentile_label, Measurement, PercentileBand};
pub use sleep_log::{daily_sleep_stats, SleepEntry, SleepLog};
pub use prediction::{predict_next_nap, SleepPrediction};
pub use reminders::{NotificationSettings, Reminders};
pub use report::export_csv;
