// Dashboard notifier
// POSTs each detection result to a configured endpoint with a bounded timeout

use std::time::Duration;
use thiserror::Error;

use crate::events::types::DetectionResult;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Clone)]
pub struct Notifier {
    client: reqwest::Client,
    endpoint: Option<String>,
}

impl Notifier {
    /// Build a notifier for `endpoint`; an empty endpoint disables sending
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        let endpoint = Some(endpoint.trim())
            .filter(|e| !e.is_empty())
            .map(str::to_string);

        Ok(Notifier { client, endpoint })
    }

    pub fn is_enabled(&self) -> bool {
        self.endpoint.is_some()
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Send one result and wait for the response
    pub async fn notify(&self, result: &DetectionResult) -> Result<(), NotifyError> {
        let Some(endpoint) = self.endpoint.as_deref() else {
            return Ok(());
        };

        let response = self.client.post(endpoint).json(result).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(NotifyError::Status {
            status: status.as_u16(),
            body,
        })
    }

    /// Send in the background; the outcome is only logged
    /// Must be called from within a tokio runtime
    pub fn spawn_notify(&self, result: DetectionResult) {
        if !self.is_enabled() {
            return;
        }

        let notifier = self.clone();
        tokio::spawn(async move {
            match notifier.notify(&result).await {
                Ok(()) => log::debug!("Sent bpm={:.2} fear={} to dashboard", result.bpm, result.fear),
                Err(e) => log::warn!("Failed to notify dashboard: {}", e),
            }
        });
    }
}
