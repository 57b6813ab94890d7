// Online fear detector
// Combines the spike heuristic with the trained scorer, one decision per reading

use std::time::Instant;

use crate::events::backend::FearScorer;
use crate::events::heuristic::SpikeHeuristic;
use crate::events::types::{DetectionResult, Reading};
use crate::hrv::{extract_features, SlidingWindow};

/// Which rule produced the decision, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionSource {
    /// Sudden-spike rule fired
    Spike,

    /// Trained scorer was consulted
    Model,

    /// Neither rule applied (window not full, no model, or bad features)
    Insufficient,
}

/// Last accepted sample; bpm and timestamp always change together
#[derive(Debug, Clone, Copy)]
struct LastSample {
    bpm: f64,
    at: Instant,
}

pub struct OnlineDetector {
    window: SlidingWindow,
    last: Option<LastSample>,
    scorer: Option<Box<dyn FearScorer>>,
    heuristic: SpikeHeuristic,
}

impl OnlineDetector {
    /// Create a detector with a window of `window_size` readings
    /// `scorer` is `None` when training was inconclusive
    pub fn new(window_size: usize, scorer: Option<Box<dyn FearScorer>>) -> Self {
        Self::with_heuristic(window_size, scorer, SpikeHeuristic::default())
    }

    pub fn with_heuristic(
        window_size: usize,
        scorer: Option<Box<dyn FearScorer>>,
        heuristic: SpikeHeuristic,
    ) -> Self {
        OnlineDetector {
            window: SlidingWindow::new(window_size),
            last: None,
            scorer,
            heuristic,
        }
    }

    /// Observe one reading and decide whether it indicates fear
    ///
    /// Order matters: the spike rule wins whenever it fires, the scorer is
    /// only consulted on a full window, and everything else is normal.
    pub fn observe(&mut self, reading: &Reading) -> DetectionResult {
        let (fear, source) = self.decide(reading);

        self.last = Some(LastSample {
            bpm: reading.value,
            at: reading.timestamp,
        });

        log::debug!(
            "bpm={:.2} fear={} via {:?} (window {}/{})",
            reading.value,
            fear,
            source,
            self.window.len(),
            self.window.capacity()
        );

        DetectionResult {
            bpm: reading.value,
            fear,
        }
    }

    fn decide(&mut self, reading: &Reading) -> (bool, DecisionSource) {
        self.window.observe(reading.value);

        if let Some(last) = self.last {
            let delta_bpm = reading.value - last.bpm;
            let elapsed = reading.timestamp.saturating_duration_since(last.at);
            if self.heuristic.is_spike(delta_bpm, elapsed) {
                return (true, DecisionSource::Spike);
            }
        }

        let scorer = match self.scorer.as_ref() {
            Some(scorer) if self.window.is_full() => scorer,
            _ => return (false, DecisionSource::Insufficient),
        };

        match extract_features(&self.window.snapshot()) {
            Ok(features) => (scorer.score(&features).is_fear(), DecisionSource::Model),
            Err(e) => {
                log::warn!("Skipping model check, feature extraction failed: {}", e);
                (false, DecisionSource::Insufficient)
            }
        }
    }

    pub fn has_scorer(&self) -> bool {
        self.scorer.is_some()
    }

    /// Current window contents, oldest first
    pub fn window_snapshot(&self) -> Vec<f64> {
        self.window.snapshot()
    }

    pub fn last_bpm(&self) -> Option<f64> {
        self.last.map(|l| l.bpm)
    }
}
