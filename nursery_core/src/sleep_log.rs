//! Local log of completed sleeps.
//!
//! Entries are appended to a JSONL (JSON Lines) file with file locking so
//! that the CLI and a long-running watcher can share it safely.

use crate::timer::TimerSummary;
use crate::{Result, SleepType};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// A recorded sleep session
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SleepEntry {
    pub id: Uuid,
    pub baby_id: String,
    pub sleep_type: SleepType,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
}

impl From<&TimerSummary> for SleepEntry {
    fn from(summary: &TimerSummary) -> Self {
        SleepEntry {
            id: Uuid::new_v4(),
            baby_id: summary.baby_id.clone(),
            sleep_type: summary.sleep_type,
            start_time: summary.start_time,
            end_time: Some(summary.end_time),
            duration_minutes: Some(summary.duration_minutes),
        }
    }
}

/// Append-only JSONL log of sleep entries
pub struct SleepLog {
    path: PathBuf,
}

impl SleepLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    pub fn append(&self, entry: &SleepEntry) -> Result<()> {
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;

        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(entry)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        drop(writer);

        file.unlock()?;

        tracing::debug!("Appended sleep entry {} to log", entry.id);
        Ok(())
    }

    /// Read every entry, skipping lines that fail to parse
    pub fn read_entries(&self) -> Result<Vec<SleepEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        file.lock_shared()?;

        let reader = BufReader::new(&file);
        let mut entries = Vec::new();

        for (line_num, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<SleepEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!("Failed to parse sleep entry at line {}: {}", line_num + 1, e);
                }
            }
        }

        file.unlock()?;
        tracing::debug!("Read {} sleep entries", entries.len());
        Ok(entries)
    }

    /// Entries for one baby that started within the last `days` days,
    /// newest first
    pub fn recent_for(&self, baby_id: &str, now: DateTime<Utc>, days: i64) -> Result<Vec<SleepEntry>> {
        let cutoff = now - Duration::days(days);
        let mut entries: Vec<_> = self
            .read_entries()?
            .into_iter()
            .filter(|e| e.baby_id == baby_id && e.start_time >= cutoff)
            .collect();
        entries.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(entries)
    }
}

/// Sleep totals for one calendar day
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DailySleepStats {
    pub date: NaiveDate,
    pub count: usize,
    pub total_minutes: i64,
    /// Total hours rounded to one decimal place
    pub total_hours: f64,
}

/// Sleep totals for entries that started on `date` (UTC)
pub fn daily_sleep_stats(entries: &[SleepEntry], date: NaiveDate) -> DailySleepStats {
    let day: Vec<_> = entries
        .iter()
        .filter(|e| e.start_time.date_naive() == date)
        .collect();
    let total_minutes: i64 = day.iter().filter_map(|e| e.duration_minutes).sum();
    DailySleepStats {
        date,
        count: day.len(),
        total_minutes,
        total_hours: (total_minutes as f64 / 60.0 * 10.0).round() / 10.0,
    }
}
