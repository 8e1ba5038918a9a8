// HTTP unit directory - Request/response lookup of the monitorable units
use crate::application::unit_directory::UnitDirectory;
use crate::domain::unit::UnitId;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpUnitDirectory {
    host: String,
    client: reqwest::Client,
}

impl HttpUnitDirectory {
    pub fn new(host: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            host: host.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn units_url(&self) -> String {
        format!("{}/units", self.host)
    }
}

#[async_trait]
impl UnitDirectory for HttpUnitDirectory {
    async fn list_units(&self) -> Result<Vec<UnitId>> {
        let url = self.units_url();
        tracing::debug!(%url, "looking up units");

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to send unit lookup request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Unit lookup failed with status {}: {}", status, body);
        }

        let units = response
            .json::<Vec<UnitId>>()
            .await
            .context("Failed to parse unit list")?;

        tracing::info!(count = units.len(), "units loaded");
        Ok(units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_units_url_ignores_trailing_slash() {
        let directory =
            HttpUnitDirectory::new("http://mes:8000/".into(), Duration::from_secs(1)).unwrap();
        assert_eq!(directory.units_url(), "http://mes:8000/units");
    }
}
