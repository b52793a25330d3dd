//! Day-partitioned record log.
//!
//! Every reading committed to the history is appended as one CSV line to the
//! file of its local calendar day:
//!
//! ```text
//! <directory>/2024-03-01.csv
//! "2024-03-01","08:00:00","OPERATIONAL",21,9450
//! "2024-03-01","09:00:00","ERROR",21,9450
//! ```
//!
//! Strings are quoted, numbers are not. Each `persist` call opens the file in
//! append mode, writes the complete line with a single `write_all` and closes
//! it again; no handle is kept between calls.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use csv::{QuoteStyle, Terminator};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::HistoryConfig;
use crate::error::{AppResult, DaqError};
use crate::measurement_types::Reading;

/// One line of a partition file, as read back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedRecord {
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM:SS`
    pub time: String,
    /// `OPERATIONAL` or `ERROR`
    pub status: String,
    /// Centimeters at the time of the reading
    pub distance_cm: u64,
    /// Raw ticks at the time of the reading
    pub distance_raw: u64,
}

/// Append-only writer for the per-day record files
#[derive(Debug, Clone)]
pub struct RecordLog {
    directory: PathBuf,
    extension: String,
}

impl RecordLog {
    /// Write partitions named `YYYY-MM-DD.<extension>` into `directory`
    pub fn new(directory: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            extension: extension.into(),
        }
    }

    /// Record log described by the history configuration
    pub fn from_config(config: &HistoryConfig) -> Self {
        Self::new(&config.directory, config.extension.trim())
    }

    /// Directory holding the partitions
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Make sure the directory exists before steady-state operation.
    ///
    /// With `create = false` a missing directory is a startup error.
    pub fn ensure_directory(&self, create: bool) -> AppResult<()> {
        if self.directory.is_dir() {
            return Ok(());
        }
        if !create {
            return Err(DaqError::Configuration(format!(
                "History directory '{}' does not exist",
                self.directory.display()
            )));
        }
        fs::create_dir_all(&self.directory)?;
        info!(path = %self.directory.display(), "Created history directory");
        Ok(())
    }

    /// File holding the records of `date`
    pub fn partition_path(&self, date: NaiveDate) -> PathBuf {
        self.directory
            .join(format!("{}.{}", date.format("%Y-%m-%d"), self.extension))
    }

    /// Encode one reading as a complete, newline-terminated line
    pub fn encode(reading: &Reading) -> AppResult<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .quote_style(QuoteStyle::NonNumeric)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(Vec::with_capacity(64));

        writer
            .write_record([
                reading.date_string(),
                reading.time_string(),
                reading.status.as_str().to_string(),
                reading.distance_cm.to_string(),
                reading.raw_ticks.to_string(),
            ])
            .map_err(|e| DaqError::Encoding(e.to_string()))?;

        writer
            .into_inner()
            .map_err(|e| DaqError::Encoding(e.to_string()))
    }

    /// Append `reading` to its day partition, returning the file written.
    pub fn persist(&self, reading: &Reading) -> AppResult<PathBuf> {
        let path = self.partition_path(reading.timestamp.date_naive());
        let line = Self::encode(reading)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| DaqError::Persistence {
                path: path.clone(),
                source,
            })?;
        file.write_all(&line)
            .map_err(|source| DaqError::Persistence {
                path: path.clone(),
                source,
            })?;

        debug!(path = %path.display(), raw_ticks = reading.raw_ticks, "Persisted reading");
        Ok(path)
    }

    /// Read back every record of `date`. A missing partition is empty.
    pub fn read_partition(&self, date: NaiveDate) -> AppResult<Vec<PersistedRecord>> {
        let path = self.partition_path(date);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(&path)
            .map_err(|e| DaqError::Encoding(format!("{}: {}", path.display(), e)))?;

        reader
            .deserialize()
            .map(|record| record.map_err(|e| DaqError::Encoding(format!("{}: {}", path.display(), e))))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement_types::SensorStatus;
    use chrono::{Local, TimeZone};

    fn reading_at(h: u32, m: u32, s: u32, raw: u64, status: SensorStatus) -> Reading {
        let ts = Local.with_ymd_and_hms(2024, 3, 1, h, m, s).unwrap();
        Reading::new(ts, raw, status, 450)
    }

    #[test]
    fn test_encode_line_format() {
        let line = RecordLog::encode(&reading_at(8, 5, 9, 9_450, SensorStatus::Operational)).unwrap();
        assert_eq!(
            String::from_utf8(line).unwrap(),
            "\"2024-03-01\",\"08:05:09\",\"OPERATIONAL\",21,9450\n"
        );
    }

    #[test]
    fn test_partition_path() {
        let log = RecordLog::new("/opt/app/html/history", "csv");
        let date = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        assert_eq!(
            log.partition_path(date),
            PathBuf::from("/opt/app/html/history/2024-12-31.csv")
        );
    }

    #[test]
    fn test_ensure_directory() {
        let root = tempfile::tempdir().unwrap();
        let log = RecordLog::new(root.path().join("history"), "csv");

        assert!(log.ensure_directory(false).is_err());
        log.ensure_directory(true).unwrap();
        assert!(log.directory().is_dir());
        log.ensure_directory(false).unwrap();
    }

    #[test]
    fn test_persist_into_missing_directory_fails() {
        let root = tempfile::tempdir().unwrap();
        let log = RecordLog::new(root.path().join("absent"), "csv");
        let err = log
            .persist(&reading_at(1, 0, 0, 10, SensorStatus::Operational))
            .unwrap_err();
        assert!(matches!(err, DaqError::Persistence { .. }));
    }

    #[test]
    fn test_read_partition_round_trip() {
        let root = tempfile::tempdir().unwrap();
        let log = RecordLog::new(root.path(), "csv");
        log.persist(&reading_at(10, 0, 0, 900, SensorStatus::Error)).unwrap();

        let records = log
            .read_partition(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
            .unwrap();
        assert_eq!(
            records,
            vec![PersistedRecord {
                date: "2024-03-01".into(),
                time: "10:00:00".into(),
                status: "ERROR".into(),
                distance_cm: 2,
                distance_raw: 900,
            }]
        );
    }
}
