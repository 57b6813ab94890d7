// Detection types
// Defines readings, HRV feature vectors, labels and detection results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Binary affective state predicted for a window of readings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FearLabel {
    /// Resting / normal heart-rate variability
    Normal,

    /// Variability pattern associated with fear
    Fear,
}

impl FearLabel {
    /// Binarize a raw label value: exactly 1 is Fear, anything else Normal
    pub fn from_value(value: f64) -> Self {
        if value == 1.0 {
            FearLabel::Fear
        } else {
            FearLabel::Normal
        }
    }

    /// Numeric form used in CSV files and as the regression target
    pub fn as_u8(&self) -> u8 {
        match self {
            FearLabel::Normal => 0,
            FearLabel::Fear => 1,
        }
    }

    pub fn is_fear(&self) -> bool {
        matches!(self, FearLabel::Fear)
    }
}

impl Default for FearLabel {
    fn default() -> Self {
        FearLabel::Normal
    }
}

/// A single heart-rate sample produced by a source
#[derive(Debug, Clone, Copy)]
pub struct Reading {
    /// Heart rate in beats per minute
    pub value: f64,

    /// Monotonic arrival time, used for rate-of-change checks
    pub timestamp: Instant,

    /// Wall-clock arrival time, stored in the durable log
    pub recorded_at: DateTime<Utc>,
}

impl Reading {
    /// Create a reading stamped with the current time
    pub fn now(value: f64) -> Self {
        Reading {
            value,
            timestamp: Instant::now(),
            recorded_at: Utc::now(),
        }
    }

    /// Create a reading with an explicit monotonic timestamp
    pub fn at(value: f64, timestamp: Instant) -> Self {
        Reading {
            value,
            timestamp,
            recorded_at: Utc::now(),
        }
    }

    /// Wall-clock time as fractional seconds since the Unix epoch
    pub fn epoch_secs(&self) -> f64 {
        self.recorded_at.timestamp_micros() as f64 / 1_000_000.0
    }
}

/// HRV features extracted from one window of BPM values
/// Column order (sd1, sd2, sampen_proxy, higuchi_proxy) is fixed and shared
/// by training and inference
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HrvFeatures {
    /// Short-term variability: std(diff(ibi)) / sqrt(2)
    pub sd1: f64,

    /// Long-term variability: std(ibi)
    pub sd2: f64,

    /// Sample entropy proxy: std(diff(ibi)) / (mean(diff(ibi)) + eps)
    pub sampen_proxy: f64,

    /// Higuchi fractal dimension proxy: ln(var(ibi) + eps)
    pub higuchi_proxy: f64,
}

impl HrvFeatures {
    pub const DIM: usize = 4;

    pub fn to_array(&self) -> [f64; Self::DIM] {
        [self.sd1, self.sd2, self.sampen_proxy, self.higuchi_proxy]
    }

    pub fn from_array(values: [f64; Self::DIM]) -> Self {
        HrvFeatures {
            sd1: values[0],
            sd2: values[1],
            sampen_proxy: values[2],
            higuchi_proxy: values[3],
        }
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

/// Outcome of observing one reading
/// Serializes to the `{"bpm": .., "fear": ..}` shape consumed downstream
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub bpm: f64,
    pub fear: bool,
}
