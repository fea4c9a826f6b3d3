//! Webhook delivery of container stats
//!
//! One POST per tick with a JSON array of
//! `{"containerName": .., "stats": {"memoryUsage": .., "cpuUsage": ..}}`.
//! Failures are returned to the caller, never retried.

use super::ReportSink;
use crate::error::{DeliveryError, InitError, SinkError};
use crate::models::{ContainerStat, Report};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Serialize container stats to the webhook wire format
pub fn encode_payload(stats: &[ContainerStat]) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(stats)
}

/// Posts container stats to a fixed URL
#[derive(Debug, Clone)]
pub struct WebhookPublisher {
    client: Client,
    url: Url,
}

impl WebhookPublisher {
    /// Create a publisher with a bounded request timeout
    pub fn new(url: &str, timeout: Duration) -> Result<Self, InitError> {
        let url = Url::parse(url).map_err(|source| InitError::WebhookUrl {
            url: url.to_string(),
            source,
        })?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(InitError::HttpClient)?;

        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// POST one payload
    pub async fn publish(&self, stats: &[ContainerStat]) -> Result<(), DeliveryError> {
        let body = encode_payload(stats)?;

        let response = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|source| DeliveryError::Transport {
                url: self.url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Status {
                url: self.url.to_string(),
                status: status.as_u16(),
            });
        }

        debug!(
            url = %self.url,
            containers = stats.len(),
            status = status.as_u16(),
            "Delivered container stats"
        );

        Ok(())
    }
}

#[async_trait]
impl ReportSink for WebhookPublisher {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn consume(&self, report: &Report) -> Result<(), SinkError> {
        self.publish(&report.containers).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContainerUsage;

    #[test]
    fn test_wire_format() {
        let stats = vec![ContainerStat {
            container_name: "app".to_string(),
            stats: ContainerUsage {
                memory_usage: 1_048_576,
                cpu_usage: 12.5,
            },
        }];

        let payload = encode_payload(&stats).unwrap();

        assert_eq!(
            String::from_utf8(payload).unwrap(),
            r#"[{"containerName":"app","stats":{"memoryUsage":1048576,"cpuUsage":12.5}}]"#
        );
    }

    #[test]
    fn test_empty_payload_is_empty_array() {
        assert_eq!(encode_payload(&[]).unwrap(), b"[]");
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let result = WebhookPublisher::new("not a url", Duration::from_secs(5));
        assert!(matches!(result, Err(InitError::WebhookUrl { .. })));
    }
}
