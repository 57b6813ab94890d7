// HRV module
// Sliding window state and feature extraction over BPM readings

pub mod features;
pub mod window;

pub use features::{extract_features, FeatureError};
pub use window::SlidingWindow;
