// Reading sources
// Sensor line stream with a synthetic fallback when no sensor is reachable

pub mod line;
pub mod parse;
pub mod synthetic;

use thiserror::Error;

pub use line::{LineSource, SourceAddress};
pub use parse::{parse_bpm_line, ParseError};
pub use synthetic::SyntheticSource;

use crate::config::MonitorConfig;
use crate::events::types::Reading;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Sensor unavailable: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid source address: {0:?}")]
    InvalidAddress(String),
}

/// The source the monitor pulls readings from
pub enum ReadingSource {
    Sensor(LineSource),
    Synthetic(SyntheticSource),
}

impl ReadingSource {
    /// Connect to the configured sensor, falling back to synthetic readings
    pub async fn connect_or_synthetic(config: &MonitorConfig) -> Self {
        let connected = match SourceAddress::parse(&config.source_address) {
            Ok(address) => {
                LineSource::connect(
                    address,
                    config.valid_bpm,
                    config.poll_interval(),
                    config.reconnect_delay(),
                )
                .await
            }
            Err(e) => Err(e),
        };

        match connected {
            Ok(source) => ReadingSource::Sensor(source),
            Err(e) => {
                log::warn!(
                    "Failed to connect to sensor at {:?}: {}; using synthetic readings",
                    config.source_address,
                    e
                );
                ReadingSource::Synthetic(SyntheticSource::new(&config.synthetic))
            }
        }
    }

    /// Wait for the next reading; malformed sensor lines surface as errors
    pub async fn next_reading(&mut self) -> Result<Reading, ParseError> {
        match self {
            ReadingSource::Sensor(source) => source.next_reading().await,
            ReadingSource::Synthetic(source) => Ok(source.next_reading().await),
        }
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self, ReadingSource::Synthetic(_))
    }
}
