// Fear detection module
// Reading/feature types, spike heuristic, scorer abstraction and online detector

pub mod backend;
pub mod detector;
pub mod heuristic;
pub mod types;

pub use backend::FearScorer;
pub use detector::{DecisionSource, OnlineDetector};
pub use heuristic::{SpikeConfig, SpikeHeuristic};
pub use types::{DetectionResult, FearLabel, HrvFeatures, Reading};
