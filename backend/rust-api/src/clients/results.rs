use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::engine::{ParticipantBatch, ResultSink};
use crate::metrics::track_upstream_call;

/// Posts one participant's results to the results API. Failures are
/// reported back to the save coordinator as-is; retry is a user action.
pub struct RestResultClient {
    http_client: Client,
    url: String,
    timeout: Duration,
}

impl RestResultClient {
    pub fn new(base_url: &str, batch_path: &str, timeout: Duration) -> Self {
        Self {
            http_client: Client::new(),
            url: format!(
                "{}/{}",
                base_url.trim_end_matches('/'),
                batch_path.trim_start_matches('/')
            ),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post_batch(&self, batch: &ParticipantBatch) -> Result<()> {
        let payload = batch.submissions();

        let response = self
            .http_client
            .post(&self.url)
            .json(&payload)
            .timeout(self.timeout)
            .send()
            .await
            .context("Failed to call results API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!(
                "Results API returned error {}: {}",
                status,
                error_text
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl ResultSink for RestResultClient {
    async fn submit(&self, batch: &ParticipantBatch) -> Result<()> {
        track_upstream_call("results", "submit", self.post_batch(batch)).await
    }
}
