// Sensor line parsing
// Lines look like "BPM: 72.5"; anything without the BPM marker is chatter

use thiserror::Error;

use crate::config::BpmRange;

const BPM_MARKER: &str = "BPM";

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("Malformed BPM line: {0:?}")]
    Malformed(String),

    #[error("Could not parse BPM value in {line:?}")]
    InvalidNumber { line: String },

    #[error("BPM {value} outside plausible range {min}..{max}")]
    OutOfRange { value: f64, min: f64, max: f64 },
}

/// Parse one raw line from the sensor
///
/// Returns `Ok(None)` for lines that carry no BPM value (boot banners,
/// debug output) and an error for BPM lines that cannot be used.
pub fn parse_bpm_line(line: &str, valid: &BpmRange) -> Result<Option<f64>, ParseError> {
    let line = line.trim();
    if !line.contains(BPM_MARKER) {
        return Ok(None);
    }

    let parts: Vec<&str> = line.split(':').collect();
    if parts.len() != 2 {
        return Err(ParseError::Malformed(line.to_string()));
    }

    let value: f64 = parts[1]
        .trim()
        .parse()
        .map_err(|_| ParseError::InvalidNumber {
            line: line.to_string(),
        })?;

    if !value.is_finite() || !valid.contains(value) {
        return Err(ParseError::OutOfRange {
            value,
            min: valid.min,
            max: valid.max,
        });
    }

    Ok(Some(value))
}
