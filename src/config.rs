// Monitor configuration
// Fixed defaults, optionally overridden by a JSON file in the working directory

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::events::heuristic::SpikeConfig;

/// Looked up in the working directory at startup
pub const CONFIG_FILE_NAME: &str = "heartguard.json";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("window_size must be at least 2, got {0}")]
    WindowTooSmall(usize),

    #[error("valid BPM range is empty: {min}..{max}")]
    EmptyBpmRange { min: f64, max: f64 },

    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),
}

/// Plausible heart-rate range; parsed values outside it are rejected
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BpmRange {
    pub min: f64,
    pub max: f64,
}

impl BpmRange {
    pub fn contains(&self, bpm: f64) -> bool {
        bpm >= self.min && bpm <= self.max
    }
}

impl Default for BpmRange {
    fn default() -> Self {
        BpmRange {
            min: 20.0,
            max: 250.0,
        }
    }
}

/// Fallback generator used when the sensor cannot be reached
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    /// Lowest generated BPM
    pub baseline: f64,

    /// Generated values fall in [baseline, baseline + spread)
    pub spread: f64,

    /// Time between generated readings
    pub period_ms: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        SyntheticConfig {
            baseline: 75.0,
            spread: 10.0,
            period_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Readings per feature window
    pub window_size: usize,

    /// Device/file path, or `tcp://host:port`
    ///
    /// A serial device is read as a plain file with no line setup, so it must
    /// already be configured, e.g. `stty -F /dev/ttyACM0 9600 raw -echo`.
    pub source_address: String,

    /// Dashboard endpoint; empty disables notification
    pub notify_endpoint: String,

    /// Durable CSV log (timestamp,BPM,label)
    pub log_path: PathBuf,

    /// Latest-state JSON file
    pub publish_path: PathBuf,

    /// Seed training dataset
    pub seed_path: PathBuf,

    /// Idle wait between source polls
    pub poll_interval_ms: u64,

    /// Upper bound on one notification round trip
    pub notify_timeout_ms: u64,

    /// Wait before reopening a dropped source
    pub reconnect_delay_ms: u64,

    /// Gradient-descent iteration cap for training
    pub max_iterations: usize,

    /// Also append synthetic readings to the durable log
    pub log_synthetic: bool,

    pub valid_bpm: BpmRange,
    pub synthetic: SyntheticConfig,
    pub spike: SpikeConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            window_size: 10,
            source_address: "/dev/ttyACM0".to_string(),
            notify_endpoint: "http://localhost:3000/heart-rate-update".to_string(),
            log_path: PathBuf::from("bpm_log.csv"),
            publish_path: PathBuf::from("bpm_output.json"),
            seed_path: PathBuf::from("realtime_training_data.csv"),
            poll_interval_ms: 100,
            notify_timeout_ms: 2000,
            reconnect_delay_ms: 1000,
            max_iterations: 1000,
            log_synthetic: false,
            valid_bpm: BpmRange::default(),
            synthetic: SyntheticConfig::default(),
            spike: SpikeConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Load from `path` if it exists, otherwise use defaults
    /// Fields missing from the file keep their default values
    pub fn load_or_default(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config {}", path.display()))?
        } else {
            MonitorConfig::default()
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size < 2 {
            return Err(ConfigError::WindowTooSmall(self.window_size));
        }
        if !(self.valid_bpm.min > 0.0 && self.valid_bpm.min < self.valid_bpm.max) {
            return Err(ConfigError::EmptyBpmRange {
                min: self.valid_bpm.min,
                max: self.valid_bpm.max,
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval("poll_interval_ms"));
        }
        if self.notify_timeout_ms == 0 {
            return Err(ConfigError::ZeroInterval("notify_timeout_ms"));
        }
        if self.synthetic.period_ms == 0 {
            return Err(ConfigError::ZeroInterval("synthetic.period_ms"));
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::ZeroInterval("max_iterations"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_millis(self.notify_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}
