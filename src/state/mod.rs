// State module
// Durable BPM log, latest-state publish and dashboard notification

pub mod bpm_log;
pub mod notify;
pub mod publish;

use thiserror::Error;

pub use bpm_log::{ensure_log_file, BpmLog, LogRow, LOG_HEADER};
pub use notify::{NotifyError, Notifier};
pub use publish::LatestStatePublisher;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type PersistResult<T> = Result<T, PersistError>;
