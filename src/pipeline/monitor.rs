// Stream driver
// Pulls readings from the source, runs the detector and fans results out to
// the log, the latest-state file and the dashboard

use tokio_util::sync::CancellationToken;

use crate::config::MonitorConfig;
use crate::events::backend::FearScorer;
use crate::events::heuristic::SpikeHeuristic;
use crate::events::types::{DetectionResult, FearLabel, Reading};
use crate::events::OnlineDetector;
use crate::source::ReadingSource;
use crate::state::{BpmLog, LatestStatePublisher, LogRow, Notifier};
use crate::training::{train, DatasetLoader, TrainerConfig};

/// Counters reported when the loop exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorStats {
    pub readings: u64,
    pub fear: u64,
    pub skipped: u64,
}

/// Train on whatever data exists now and build the detector
/// An inconclusive training run yields a heuristic-only detector
pub fn build_detector(config: &MonitorConfig) -> OnlineDetector {
    let dataset = DatasetLoader::new(&config.seed_path, &config.log_path, config.window_size).load();
    let trainer = TrainerConfig {
        max_iterations: config.max_iterations,
        ..TrainerConfig::default()
    };

    let scorer = train(&dataset, &trainer).map(|model| Box::new(model) as Box<dyn FearScorer>);
    match &scorer {
        Some(scorer) => log::info!("Using {} classifier", scorer.name()),
        None => log::warn!("No classifier available, running on the spike heuristic only"),
    }

    OnlineDetector::with_heuristic(
        config.window_size,
        scorer,
        SpikeHeuristic::with_config(config.spike.clone()),
    )
}

pub struct Monitor {
    detector: OnlineDetector,
    log: Option<BpmLog>,
    publisher: LatestStatePublisher,
    notifier: Notifier,
    log_synthetic: bool,
    stats: MonitorStats,
}

impl Monitor {
    pub fn new(
        detector: OnlineDetector,
        log: Option<BpmLog>,
        publisher: LatestStatePublisher,
        notifier: Notifier,
    ) -> Self {
        Monitor {
            detector,
            log,
            publisher,
            notifier,
            log_synthetic: false,
            stats: MonitorStats::default(),
        }
    }

    /// Also record synthetic readings in the durable log
    pub fn log_synthetic(mut self, enabled: bool) -> Self {
        self.log_synthetic = enabled;
        self
    }

    /// Process one reading end to end
    ///
    /// Persistence and notification failures are logged and never affect
    /// the detector state. Notification runs in the background, so this must
    /// be called inside a tokio runtime.
    pub fn handle_reading(&mut self, reading: &Reading, synthetic: bool) -> DetectionResult {
        if !synthetic || self.log_synthetic {
            if let Some(log) = self.log.as_mut() {
                if let Err(e) = log.append(&LogRow::from_reading(reading, FearLabel::Normal)) {
                    log::warn!("Failed to append to BPM log: {}", e);
                }
            }
        }

        let result = self.detector.observe(reading);
        if result.fear {
            log::info!("FEAR DETECTED at {:.2} BPM", result.bpm);
            self.stats.fear += 1;
        } else {
            log::debug!("BPM {:.2} normal", result.bpm);
        }
        self.stats.readings += 1;

        if let Err(e) = self.publisher.publish(&result) {
            log::warn!(
                "Failed to publish latest state to {}: {}",
                self.publisher.path().display(),
                e
            );
        }

        self.notifier.spawn_notify(result);

        result
    }

    /// Run until `cancel` fires
    /// Cancellation is only observed between readings, so the reading in
    /// flight is always fully processed before the log is flushed.
    pub async fn run(mut self, mut source: ReadingSource, cancel: CancellationToken) -> MonitorStats {
        log::info!(
            "Monitoring started ({} source)",
            if source.is_synthetic() { "synthetic" } else { "sensor" }
        );
        if let Some(endpoint) = self.notifier.endpoint() {
            log::info!("Sending results to {}", endpoint);
        }

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = source.next_reading() => next,
            };

            match next {
                Ok(reading) => {
                    self.handle_reading(&reading, source.is_synthetic());
                }
                Err(e) => {
                    log::warn!("Skipping reading: {}", e);
                    self.stats.skipped += 1;
                }
            }
        }

        self.shutdown()
    }

    pub fn stats(&self) -> MonitorStats {
        self.stats
    }

    pub fn detector(&self) -> &OnlineDetector {
        &self.detector
    }

    fn shutdown(mut self) -> MonitorStats {
        if let Some(log) = self.log.as_mut() {
            if let Err(e) = log.flush() {
                log::warn!("Failed to flush BPM log: {}", e);
            }
        }
        log::info!(
            "Monitoring stopped: {} readings, {} fear, {} skipped",
            self.stats.readings,
            self.stats.fear,
            self.stats.skipped
        );
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hrv::extract_features;
    use crate::source::{LineSource, SourceAddress};
    use std::fs;
    use std::path::Path;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn test_config(dir: &Path) -> MonitorConfig {
        MonitorConfig {
            window_size: 3,
            log_path: dir.join("bpm_log.csv"),
            publish_path: dir.join("bpm_output.json"),
            seed_path: dir.join("seed.csv"),
            notify_endpoint: String::new(),
            ..MonitorConfig::default()
        }
    }

    fn monitor_for(config: &MonitorConfig, detector: OnlineDetector) -> Monitor {
        Monitor::new(
            detector,
            Some(BpmLog::open(&config.log_path).unwrap()),
            LatestStatePublisher::new(&config.publish_path),
            Notifier::new(&config.notify_endpoint, config.notify_timeout()).unwrap(),
        )
    }

    fn log_lines(config: &MonitorConfig) -> Vec<String> {
        fs::read_to_string(&config.log_path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[tokio::test]
    async fn test_header_only_log_runs_heuristic_only() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        crate::state::ensure_log_file(&config.log_path).unwrap();

        let detector = build_detector(&config);
        assert!(!detector.has_scorer());

        let mut monitor = monitor_for(&config, detector);
        let start = Instant::now();
        let fear: Vec<bool> = [70.0, 71.0, 70.0, 72.0, 95.0]
            .iter()
            .enumerate()
            .map(|(i, &bpm)| {
                let reading = Reading::at(bpm, start + Duration::from_secs(i as u64));
                monitor.handle_reading(&reading, false).fear
            })
            .collect();

        assert_eq!(fear, vec![false, false, false, false, true]);
        assert_eq!(
            monitor.stats(),
            MonitorStats {
                readings: 5,
                fear: 1,
                skipped: 0
            }
        );

        let lines = log_lines(&config);
        assert_eq!(lines.len(), 6);
        assert!(lines[5].ends_with(",95.0,0"));

        let published = LatestStatePublisher::new(&config.publish_path).read().unwrap();
        assert_eq!(published, DetectionResult { bpm: 95.0, fear: true });
    }

    /// Log where steep windows are followed by fear rows and flat ones by normal rows
    fn write_labelled_log(config: &MonitorConfig) {
        let cycle = [60.0, 65.0, 70.0, 60.0, 60.5, 61.0];
        let series: Vec<f64> = cycle.iter().cycle().take(36).copied().collect();
        let n = config.window_size;

        let mut contents = String::from("timestamp,BPM,label\n");
        for (i, bpm) in series.iter().enumerate() {
            let label = if i >= n {
                let window = &series[i - n..i];
                let max = window.iter().cloned().fold(f64::MIN, f64::max);
                let min = window.iter().cloned().fold(f64::MAX, f64::min);
                u8::from(max - min >= 5.0)
            } else {
                0
            };
            contents.push_str(&format!("{},{},{}\n", 1_700_000_000 + i, bpm, label));
        }
        fs::write(&config.log_path, contents).unwrap();
    }

    fn write_seed(config: &MonitorConfig) {
        let mut contents = String::from("SD1,SD2,sampen,higuci,label\n");
        for (window, label) in [(&[60.0, 65.0, 70.0], 1), (&[60.0, 60.5, 61.0], 0)] {
            let f = extract_features(window).unwrap();
            contents.push_str(&format!(
                "{},{},{},{},{}\n",
                f.sd1, f.sd2, f.sampen_proxy, f.higuchi_proxy, label
            ));
        }
        fs::write(&config.seed_path, contents).unwrap();
    }

    #[tokio::test]
    async fn test_trained_model_decides_full_windows() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        write_seed(&config);
        write_labelled_log(&config);

        let dataset = DatasetLoader::new(&config.seed_path, &config.log_path, config.window_size).load();
        assert_eq!(dataset.seed_len(), 2);
        assert_eq!(dataset.derived_len(), 33);
        let trainer = TrainerConfig {
            max_iterations: config.max_iterations,
            ..TrainerConfig::default()
        };
        let model = train(&dataset, &trainer).unwrap();

        let detector = build_detector(&config);
        assert!(detector.has_scorer());

        let mut monitor = monitor_for(&config, detector);
        let start = Instant::now();
        let readings = [60.0, 65.0, 70.0, 70.5, 71.0, 71.5];
        let mut verdicts = Vec::new();
        for (i, &bpm) in readings.iter().enumerate() {
            let reading = Reading::at(bpm, start + Duration::from_secs(i as u64));
            let result = monitor.handle_reading(&reading, false);

            // Steps stay under the spike threshold, so only the model can flag fear
            if i + 1 >= config.window_size {
                let window = &readings[i + 1 - config.window_size..=i];
                let expected = model.score(&extract_features(window).unwrap()).is_fear();
                assert_eq!(result.fear, expected, "window {:?}", window);
            } else {
                assert!(!result.fear);
            }
            verdicts.push(result.fear);
        }

        // Steep climb is fear, the flat tail is normal
        assert!(verdicts[2]);
        assert!(!verdicts[5]);
    }

    #[tokio::test]
    async fn test_synthetic_readings_not_logged_by_default() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let mut monitor = monitor_for(&config, OnlineDetector::new(3, None));

        monitor.handle_reading(&Reading::now(80.0), true);
        assert_eq!(log_lines(&config).len(), 1);

        let mut monitor = monitor.log_synthetic(true);
        monitor.handle_reading(&Reading::now(81.0), true);
        assert_eq!(log_lines(&config).len(), 2);
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_disturb_detection() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        // A directory where the publish file should be makes every publish fail
        fs::create_dir_all(&config.publish_path).unwrap();

        let mut monitor = Monitor::new(
            OnlineDetector::new(3, None),
            None,
            LatestStatePublisher::new(&config.publish_path),
            Notifier::new("", config.notify_timeout()).unwrap(),
        );

        let start = Instant::now();
        assert!(!monitor.handle_reading(&Reading::at(70.0, start), false).fear);
        let spike = monitor.handle_reading(&Reading::at(90.0, start + Duration::from_secs(1)), false);

        assert!(spike.fear);
        assert_eq!(monitor.detector().last_bpm(), Some(90.0));
    }

    #[tokio::test]
    async fn test_unreachable_dashboard_does_not_block() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(dir.path());
        config.notify_endpoint = "http://127.0.0.1:9/heart-rate-update".to_string();
        config.notify_timeout_ms = 200;

        let mut monitor = monitor_for(&config, OnlineDetector::new(3, None));
        let started = Instant::now();
        for bpm in [70.0, 71.0, 72.0] {
            monitor.handle_reading(&Reading::now(bpm), false);
        }

        assert!(started.elapsed() < Duration::from_millis(200));
        assert_eq!(monitor.stats().readings, 3);
    }

    #[tokio::test]
    async fn test_run_processes_source_until_cancelled() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let serial = dir.path().join("serial.txt");
        fs::write(&serial, "BPM: 70\nBPM: oops\nBPM: 71\nBPM: 72\n").unwrap();

        let source = LineSource::connect(
            SourceAddress::Path(serial),
            config.valid_bpm,
            Duration::from_millis(10),
            Duration::from_millis(10),
        )
        .await
        .unwrap();

        let monitor = monitor_for(&config, OnlineDetector::new(3, None));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(monitor.run(ReadingSource::Sensor(source), cancel.clone()));

        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();
        let stats = handle.await.unwrap();

        assert_eq!(stats.readings, 3);
        assert_eq!(stats.skipped, 1);
        assert_eq!(log_lines(&config).len(), 4);
    }

    #[tokio::test]
    async fn test_run_exits_immediately_when_already_cancelled() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let monitor = monitor_for(&config, OnlineDetector::new(3, None));
        let source = ReadingSource::Synthetic(crate::source::SyntheticSource::new(&config.synthetic));

        let cancel = CancellationToken::new();
        cancel.cancel();

        let stats = monitor.run(source, cancel).await;
        assert_eq!(stats, MonitorStats::default());
    }
}
