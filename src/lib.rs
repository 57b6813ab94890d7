// HeartGuard - real-time fear detection from heart-rate variability
// Module declarations and process entry point

use anyhow::Context;
use std::path::Path;
use tokio_util::sync::CancellationToken;

pub mod config;
pub mod events;
pub mod hrv;
pub mod pipeline;
pub mod source;
pub mod state;
pub mod training;

use config::{MonitorConfig, CONFIG_FILE_NAME};
use pipeline::{build_detector, Monitor};
use source::ReadingSource;
use state::{ensure_log_file, BpmLog, LatestStatePublisher, Notifier};

/// Train, then monitor until interrupted
pub async fn run() -> anyhow::Result<()> {
    // Default to info; RUST_LOG overrides
    let _ = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init();

    log::info!("HeartGuard starting up...");

    let config = MonitorConfig::load_or_default(Path::new(CONFIG_FILE_NAME))?;

    // The log must exist before training reads it
    ensure_log_file(&config.log_path)
        .with_context(|| format!("Failed to create BPM log {}", config.log_path.display()))?;

    let detector = build_detector(&config);

    let log = match BpmLog::open(&config.log_path) {
        Ok(log) => Some(log),
        Err(e) => {
            log::error!(
                "BPM log {} unavailable, readings will not be recorded: {}",
                config.log_path.display(),
                e
            );
            None
        }
    };
    let publisher = LatestStatePublisher::new(&config.publish_path);
    let notifier = Notifier::new(&config.notify_endpoint, config.notify_timeout())
        .context("Failed to build dashboard client")?;

    let source = ReadingSource::connect_or_synthetic(&config).await;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => log::info!("Interrupt received, shutting down"),
                Err(e) => log::error!("Failed to listen for interrupt: {}", e),
            }
            cancel.cancel();
        });
    }

    let monitor = Monitor::new(detector, log, publisher, notifier).log_synthetic(config.log_synthetic);
    monitor.run(source, cancel).await;

    Ok(())
}
