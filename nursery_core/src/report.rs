//! CSV export of the sleep log for sharing with caregivers or a doctor.

use crate::dates::format_duration_minutes;
use crate::sleep_log::SleepEntry;
use crate::{Error, Result};
use std::path::Path;
use tempfile::NamedTempFile;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    id: String,
    baby_id: String,
    sleep_type: String,
    start_time: String,
    end_time: Option<String>,
    duration_minutes: Option<i64>,
    duration: Option<String>,
}

impl From<&SleepEntry> for CsvRow {
    fn from(entry: &SleepEntry) -> Self {
        CsvRow {
            id: entry.id.to_string(),
            baby_id: entry.baby_id.clone(),
            sleep_type: entry.sleep_type.to_string(),
            start_time: entry.start_time.to_rfc3339(),
            end_time: entry.end_time.map(|t| t.to_rfc3339()),
            duration_minutes: entry.duration_minutes,
            duration: entry.duration_minutes.map(format_duration_minutes),
        }
    }
}

/// Write `entries` to a CSV file at `path`, oldest first
///
/// The file is written to a temporary sibling and renamed into place, so an
/// existing report is never left half-written. Returns the number of rows.
pub fn export_csv(entries: &[SleepEntry], path: &Path) -> Result<usize> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut sorted: Vec<&SleepEntry> = entries.iter().collect();
    sorted.sort_by_key(|e| e.start_time);

    let temp = NamedTempFile::new_in(parent)?;
    {
        let mut writer = csv::Writer::from_writer(temp.as_file());
        for entry in &sorted {
            writer.serialize(CsvRow::from(*entry))?;
        }
        writer.flush()?;
    }
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;

    tracing::info!("Exported {} sleep entries to {:?}", sorted.len(), path);
    Ok(sorted.len())
}
