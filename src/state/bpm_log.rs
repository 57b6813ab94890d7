// Durable BPM log
// Append-only CSV (timestamp,BPM,label) that doubles as training data

use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use super::PersistResult;
use crate::events::types::{FearLabel, Reading};

/// Column names, in file order
pub const LOG_HEADER: [&str; 3] = ["timestamp", "BPM", "label"];

/// One row of the durable log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRow {
    /// Seconds since the Unix epoch
    pub timestamp: f64,

    #[serde(rename = "BPM")]
    pub bpm: f64,

    /// 0 = normal, 1 = fear
    pub label: u8,
}

impl LogRow {
    pub fn from_reading(reading: &Reading, label: FearLabel) -> Self {
        LogRow {
            timestamp: reading.epoch_secs(),
            bpm: reading.value,
            label: label.as_u8(),
        }
    }

    pub fn fear_label(&self) -> FearLabel {
        FearLabel::from_value(self.label as f64)
    }
}

/// Append handle on the BPM log
/// The header is written when the file is missing or empty
pub struct BpmLog {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl BpmLog {
    pub fn open(path: impl Into<PathBuf>) -> PersistResult<Self> {
        let path = path.into();
        ensure_log_file(&path)?;

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        Ok(BpmLog { path, writer })
    }

    /// Append one row and flush it to disk
    pub fn append(&mut self, row: &LogRow) -> PersistResult<()> {
        self.writer.serialize(row)?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn flush(&mut self) -> PersistResult<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Create the log with only a header row if it does not exist yet
pub fn ensure_log_file(path: &Path) -> PersistResult<()> {
    let needs_header = match std::fs::metadata(path) {
        Ok(meta) => meta.len() == 0,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => return Err(e.into()),
    };

    if !needs_header {
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(LOG_HEADER)?;
    writer.flush()?;
    log::info!("Created BPM log at {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_creates_header_once() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bpm_log.csv");

        ensure_log_file(&path).unwrap();
        ensure_log_file(&path).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "timestamp,BPM,label\n");
    }

    #[test]
    fn test_append_rows() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("logs").join("bpm_log.csv");

        let mut log = BpmLog::open(&path).unwrap();
        log.append(&LogRow {
            timestamp: 1700000000.5,
            bpm: 72.5,
            label: 0,
        })
        .unwrap();
        log.append(&LogRow {
            timestamp: 1700000001.5,
            bpm: 95.0,
            label: 1,
        })
        .unwrap();

        let contents = fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "timestamp,BPM,label");
        assert_eq!(lines[1], "1700000000.5,72.5,0");
        assert_eq!(lines[2], "1700000001.5,95.0,1");
    }

    #[test]
    fn test_reopen_keeps_existing_rows() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bpm_log.csv");
        fs::write(&path, "timestamp,BPM,label\n1.0,70.0,0\n").unwrap();

        let mut log = BpmLog::open(&path).unwrap();
        log.append(&LogRow {
            timestamp: 2.0,
            bpm: 71.0,
            label: 0,
        })
        .unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "timestamp,BPM,label\n1.0,70.0,0\n2.0,71.0,0\n");
    }

    #[test]
    fn test_row_from_reading() {
        let reading = Reading::now(88.0);
        let row = LogRow::from_reading(&reading, FearLabel::Normal);
        assert_eq!(row.bpm, 88.0);
        assert_eq!(row.label, 0);
        assert!(row.timestamp > 0.0);
        assert_eq!(row.fear_label(), FearLabel::Normal);
    }
}
