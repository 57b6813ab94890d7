// HRV feature extraction
// Converts a window of BPM values into inter-beat intervals and computes
// Poincaré and complexity proxies used by the fear classifier

use thiserror::Error;

use crate::events::types::HrvFeatures;

/// Guard added to denominators and logarithm arguments
pub const EPSILON: f64 = 1e-6;

/// Milliseconds per minute, BPM -> IBI conversion factor
const MS_PER_MINUTE: f64 = 60_000.0;

#[derive(Debug, Error, PartialEq)]
pub enum FeatureError {
    #[error("Window needs at least 2 readings, got {0}")]
    TooShort(usize),

    #[error("Invalid BPM value at index {index}: {value}")]
    NonPositiveBpm { index: usize, value: f64 },

    #[error("Feature computation produced a non-finite value")]
    NonFinite,
}

/// Extract HRV features from a window of BPM readings
///
/// Algorithm:
/// 1. ibi = 60000 / bpm (milliseconds)
/// 2. sd1 = std(diff(ibi)) / sqrt(2)
/// 3. sd2 = std(ibi)
/// 4. sampen_proxy = std(diff(ibi)) / (mean(diff(ibi)) + eps)
/// 5. higuchi_proxy = ln(var(ibi) + eps)
///
/// All spreads use the population estimator. The same function is called at
/// training and inference time, so an error here means "no features" at both.
pub fn extract_features(window: &[f64]) -> Result<HrvFeatures, FeatureError> {
    if window.len() < 2 {
        return Err(FeatureError::TooShort(window.len()));
    }

    if let Some((index, &value)) = window
        .iter()
        .enumerate()
        .find(|(_, v)| !v.is_finite() || **v <= 0.0)
    {
        return Err(FeatureError::NonPositiveBpm { index, value });
    }

    let ibi = to_ibi(window);
    let diffs = first_difference(&ibi);

    let diff_std = std_dev(&diffs);
    let sd1 = diff_std / std::f64::consts::SQRT_2;
    let sd2 = std_dev(&ibi);
    let sampen_proxy = diff_std / (mean(&diffs) + EPSILON);
    let higuchi_proxy = (variance(&ibi) + EPSILON).ln();

    let features = HrvFeatures {
        sd1,
        sd2,
        sampen_proxy,
        higuchi_proxy,
    };

    if !features.is_finite() {
        return Err(FeatureError::NonFinite);
    }

    Ok(features)
}

/// Convert BPM values to inter-beat intervals in milliseconds
pub fn to_ibi(window: &[f64]) -> Vec<f64> {
    window.iter().map(|bpm| MS_PER_MINUTE / bpm).collect()
}

fn first_difference(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|pair| pair[1] - pair[0]).collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance (divides by n)
fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}
