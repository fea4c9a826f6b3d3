//! API client for querying a running monitor

use anyhow::{Context, Result};
use monitor_lib::health::{HealthResponse, ReadinessResponse};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

/// API client for the monitor's health endpoints
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// GET a health endpoint; 503 carries a body too, so it is returned rather than failed
    async fn get_status<T: DeserializeOwned>(&self, path: &str) -> Result<(StatusCode, T)> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        if !status.is_success() && status != StatusCode::SERVICE_UNAVAILABLE {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        let body = response.json().await.context("Failed to parse response")?;
        Ok((status, body))
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        Ok(self.get_status("healthz").await?.1)
    }

    pub async fn readiness(&self) -> Result<ReadinessResponse> {
        Ok(self.get_status("readyz").await?.1)
    }
}
