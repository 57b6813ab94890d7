// Training dataset loading
// Merges the static seed dataset with examples derived from the BPM log

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::events::types::{FearLabel, HrvFeatures};
use crate::hrv::extract_features;
use crate::state::LogRow;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing column '{0}'")]
    MissingColumn(&'static str),
}

pub type DatasetResult<T> = Result<T, DatasetError>;

/// Accepted header names for each seed feature column, in feature order
const SEED_FEATURE_COLUMNS: [(&str, &[&str]); 4] = [
    ("SD1", &["SD1"]),
    ("SD2", &["SD2"]),
    ("sampen", &["sampen", "sampen_proxy"]),
    ("higuci", &["higuci", "higuchi", "higuchi_proxy"]),
];

#[derive(Debug, Clone, PartialEq)]
pub struct LabeledExample {
    pub features: HrvFeatures,
    pub label: FearLabel,
}

/// Seed examples followed by log-derived examples
#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    seed: Vec<LabeledExample>,
    derived: Vec<LabeledExample>,
}

impl TrainingSet {
    pub fn new(seed: Vec<LabeledExample>, derived: Vec<LabeledExample>) -> Self {
        TrainingSet { seed, derived }
    }

    pub fn len(&self) -> usize {
        self.seed.len() + self.derived.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn seed_len(&self) -> usize {
        self.seed.len()
    }

    pub fn derived_len(&self) -> usize {
        self.derived.len()
    }

    /// All examples, seed first
    pub fn iter(&self) -> impl Iterator<Item = &LabeledExample> {
        self.seed.iter().chain(self.derived.iter())
    }
}

/// Loads the seed dataset and the BPM log into one training set
pub struct DatasetLoader {
    seed_path: PathBuf,
    log_path: PathBuf,
    window_size: usize,
}

impl DatasetLoader {
    pub fn new(seed_path: impl Into<PathBuf>, log_path: impl Into<PathBuf>, window_size: usize) -> Self {
        DatasetLoader {
            seed_path: seed_path.into(),
            log_path: log_path.into(),
            window_size,
        }
    }

    /// Never fails: an unreadable source contributes no examples
    pub fn load(&self) -> TrainingSet {
        let seed = load_seed_examples(&self.seed_path).unwrap_or_else(|e| {
            log::warn!(
                "Seed dataset {} unavailable, continuing without it: {}",
                self.seed_path.display(),
                e
            );
            Vec::new()
        });

        let rows = read_log_rows(&self.log_path).unwrap_or_else(|e| {
            log::warn!(
                "BPM log {} unreadable, continuing without it: {}",
                self.log_path.display(),
                e
            );
            Vec::new()
        });

        let derived = derive_examples(&rows, self.window_size);

        log::info!(
            "Loaded training set: {} seed + {} derived examples ({} log rows)",
            seed.len(),
            derived.len(),
            rows.len()
        );

        TrainingSet::new(seed, derived)
    }
}

/// Slide a window of `window_size` rows over the log
/// The window of rows [i - N, i) is labeled with row i's label, for i in [N, rows)
pub fn derive_examples(rows: &[LogRow], window_size: usize) -> Vec<LabeledExample> {
    if window_size == 0 || rows.len() <= window_size {
        return Vec::new();
    }

    let bpms: Vec<f64> = rows.iter().map(|r| r.bpm).collect();

    (window_size..rows.len())
        .filter_map(|i| match extract_features(&bpms[i - window_size..i]) {
            Ok(features) => Some(LabeledExample {
                features,
                label: rows[i].fear_label(),
            }),
            Err(e) => {
                log::debug!("Skipping log window ending at row {}: {}", i, e);
                None
            }
        })
        .collect()
}

/// Read the BPM log, dropping incomplete rows and sorting by timestamp
/// A missing label column means every row is labeled normal
pub fn read_log_rows(path: &Path) -> DatasetResult<Vec<LogRow>> {
    let mut reader = csv_reader(path)?;
    let headers = reader.headers()?.clone();

    let timestamp_col =
        find_column(&headers, &["timestamp"]).ok_or(DatasetError::MissingColumn("timestamp"))?;
    let bpm_col = find_column(&headers, &["BPM"]).ok_or(DatasetError::MissingColumn("BPM"))?;
    let label_col = find_column(&headers, &["label"]);

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                log::debug!("Dropping malformed log row {}: {}", line + 1, e);
                continue;
            }
        };

        let timestamp = parse_field(&record, timestamp_col);
        let bpm = parse_field(&record, bpm_col);
        let label = match label_col {
            Some(col) => parse_field(&record, col),
            None => Some(0.0),
        };

        match (timestamp, bpm, label) {
            (Some(timestamp), Some(bpm), Some(label)) => rows.push(LogRow {
                timestamp,
                bpm,
                label: FearLabel::from_value(label).as_u8(),
            }),
            _ => log::debug!("Dropping incomplete log row {}", line + 1),
        }
    }

    rows.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    Ok(rows)
}

/// Read the seed dataset (SD1, SD2, sampen, higuci[, label])
pub fn load_seed_examples(path: &Path) -> DatasetResult<Vec<LabeledExample>> {
    let mut reader = csv_reader(path)?;
    let headers = reader.headers()?.clone();

    let mut feature_cols = [0usize; HrvFeatures::DIM];
    for (slot, &(name, aliases)) in feature_cols.iter_mut().zip(SEED_FEATURE_COLUMNS.iter()) {
        *slot = find_column(&headers, aliases).ok_or(DatasetError::MissingColumn(name))?;
    }
    let label_col = find_column(&headers, &["label"]);

    let mut examples = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                log::debug!("Dropping malformed seed row {}: {}", line + 1, e);
                continue;
            }
        };

        let mut values = [0.0; HrvFeatures::DIM];
        let mut complete = true;
        for (value, &col) in values.iter_mut().zip(feature_cols.iter()) {
            match parse_field(&record, col) {
                Some(v) => *value = v,
                None => {
                    complete = false;
                    break;
                }
            }
        }

        let label = match label_col {
            Some(col) => parse_field(&record, col).map(FearLabel::from_value),
            None => Some(FearLabel::Normal),
        };

        match (complete, label) {
            (true, Some(label)) => examples.push(LabeledExample {
                features: HrvFeatures::from_array(values),
                label,
            }),
            _ => log::debug!("Dropping incomplete seed row {}", line + 1),
        }
    }

    Ok(examples)
}

fn csv_reader(path: &Path) -> DatasetResult<csv::Reader<std::fs::File>> {
    let file = std::fs::File::open(path)?;
    Ok(csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file))
}

fn find_column(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
}

/// Parse a finite float; empty, missing or non-numeric fields yield None
fn parse_field(record: &csv::StringRecord, col: usize) -> Option<f64> {
    record
        .get(col)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}
