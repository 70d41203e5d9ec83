//! HTTP client for talking to the nagard daemon.

use anyhow::{anyhow, bail, Result};
use nagar_common::{Complaint, DaemonStatus, RetryResponse};
use std::time::Duration;
use uuid::Uuid;

pub struct DaemonClient {
    http: reqwest::Client,
    base_url: String,
}

impl DaemonClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn unreachable(e: reqwest::Error) -> anyhow::Error {
        anyhow!("Daemon not reachable ({}). Is nagard running?", e)
    }

    pub async fn status(&self) -> Result<DaemonStatus> {
        let response = self
            .http
            .get(format!("{}/api/status", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(Self::unreachable)?;
        Ok(response.error_for_status()?.json().await?)
    }

    pub async fn complaint(&self, id: Uuid) -> Result<Complaint> {
        let response = self
            .http
            .get(format!("{}/api/complaints/{}", self.base_url, id))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(Self::unreachable)?;
        if response.status().as_u16() == 404 {
            bail!("Complaint {} not found", id);
        }
        Ok(response.error_for_status()?.json().await?)
    }

    pub async fn failed_complaints(&self) -> Result<Vec<Complaint>> {
        let response = self
            .http
            .get(format!("{}/api/complaints/failed", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(Self::unreachable)?;
        Ok(response.error_for_status()?.json().await?)
    }

    pub async fn retry(&self, id: Uuid) -> Result<RetryResponse> {
        self.post_reset(id, "retry").await
    }

    pub async fn reset(&self, id: Uuid) -> Result<RetryResponse> {
        self.post_reset(id, "reset").await
    }

    async fn post_reset(&self, id: Uuid, action: &str) -> Result<RetryResponse> {
        let response = self
            .http
            .post(format!(
                "{}/api/complaints/{}/{}",
                self.base_url, id, action
            ))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(Self::unreachable)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("{} rejected ({}): {}", action, status, body);
        }
        Ok(response.json().await?)
    }

    pub async fn sidecar(&self, action: &str) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/api/sidecar/{}", self.base_url, action))
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(Self::unreachable)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("sidecar {} failed ({}): {}", action, status, body);
        }
        Ok(())
    }
}
