// Heuristic (rule-based) fear trigger
// Flags a sudden heart-rate spike between two consecutive readings

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Thresholds for the sudden-spike rule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpikeConfig {
    /// Rise in BPM that must be exceeded (strictly) to count as a spike
    pub min_delta_bpm: f64,

    /// The rise must happen in strictly less than this many milliseconds
    pub max_gap_ms: u64,
}

impl Default for SpikeConfig {
    fn default() -> Self {
        SpikeConfig {
            min_delta_bpm: 10.0,
            max_gap_ms: 3000,
        }
    }
}

/// Rate-of-change rule evaluated before any model is consulted
#[derive(Debug, Clone)]
pub struct SpikeHeuristic {
    config: SpikeConfig,
}

impl SpikeHeuristic {
    pub fn new() -> Self {
        SpikeHeuristic {
            config: SpikeConfig::default(),
        }
    }

    pub fn with_config(config: SpikeConfig) -> Self {
        SpikeHeuristic { config }
    }

    /// True when the heart rate rose by more than `min_delta_bpm`
    /// in less than `max_gap_ms`
    pub fn is_spike(&self, delta_bpm: f64, elapsed: Duration) -> bool {
        delta_bpm > self.config.min_delta_bpm
            && elapsed < Duration::from_millis(self.config.max_gap_ms)
    }

    pub fn config(&self) -> &SpikeConfig {
        &self.config
    }
}

impl Default for SpikeHeuristic {
    fn default() -> Self {
        Self::new()
    }
}
