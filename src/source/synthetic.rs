// Synthetic reading generator
// Keeps the pipeline exercisable without a sensor attached

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

use crate::config::SyntheticConfig;
use crate::events::types::Reading;

pub struct SyntheticSource {
    baseline: f64,
    spread: f64,
    period: Duration,
    rng: StdRng,
}

impl SyntheticSource {
    pub fn new(config: &SyntheticConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministic generator for tests
    pub fn with_seed(config: &SyntheticConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: &SyntheticConfig, rng: StdRng) -> Self {
        SyntheticSource {
            baseline: config.baseline,
            spread: config.spread.max(0.0),
            period: Duration::from_millis(config.period_ms),
            rng,
        }
    }

    /// Next value in [baseline, baseline + spread), without waiting
    pub fn sample(&mut self) -> f64 {
        self.baseline + self.rng.gen::<f64>() * self.spread
    }

    /// Wait one period, then emit a reading
    pub async fn next_reading(&mut self) -> Reading {
        tokio::time::sleep(self.period).await;
        Reading::now(self.sample())
    }
}
