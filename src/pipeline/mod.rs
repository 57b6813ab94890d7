// Pipeline module
// Drives readings from the source through detection, persistence and notification

pub mod monitor;

pub use monitor::{build_detector, Monitor, MonitorStats};
