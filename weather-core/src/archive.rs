//! Historical daily observations from the weather archive service.

use std::fmt::Debug;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{
    error::{PipelineError, truncate_body},
    model::{DateRange, Location, MetricSelection, RawWeatherPayload},
};

pub const DEFAULT_ARCHIVE_URL: &str = "https://archive-api.open-meteo.com";

/// Let the service pick the timezone from the coordinates.
const TIMEZONE_MODE: &str = "auto";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[async_trait]
pub trait WeatherArchive: Send + Sync + Debug {
    async fn fetch(
        &self,
        location: &Location,
        range: &DateRange,
        metrics: &MetricSelection,
    ) -> Result<RawWeatherPayload, PipelineError>;
}

/// Client for an Open-Meteo compatible `/v1/archive` endpoint.
#[derive(Debug, Clone)]
pub struct OpenMeteoArchive {
    base_url: String,
    http: Client,
}

impl OpenMeteoArchive {
    pub fn new(http: Client) -> Self {
        Self::with_base_url(http, DEFAULT_ARCHIVE_URL)
    }

    pub fn with_base_url(http: Client, base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), http }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/archive", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct ArchiveResponse {
    daily: Option<RawWeatherPayload>,
}

#[async_trait]
impl WeatherArchive for OpenMeteoArchive {
    async fn fetch(
        &self,
        location: &Location,
        range: &DateRange,
        metrics: &MetricSelection,
    ) -> Result<RawWeatherPayload, PipelineError> {
        if metrics.is_empty() {
            return Err(PipelineError::invalid("at least one metric must be selected"));
        }

        let params = [
            ("latitude", location.latitude().to_string()),
            ("longitude", location.longitude().to_string()),
            ("start_date", range.start().format(DATE_FORMAT).to_string()),
            ("end_date", range.end().format(DATE_FORMAT).to_string()),
            ("daily", metrics.query_value()),
            ("timezone", TIMEZONE_MODE.to_string()),
        ];

        tracing::debug!(%location, %range, daily = %metrics.query_value(), "fetching archive data");

        let res = self
            .http
            .get(self.endpoint())
            .query(&params)
            .send()
            .await
            .map_err(|e| PipelineError::WeatherService(format!("failed to send request: {e}")))?;

        let status = res.status();
        let body = res.text().await.map_err(|e| {
            PipelineError::WeatherService(format!("failed to read response body: {e}"))
        })?;

        if !status.is_success() {
            tracing::warn!(%status, "archive request failed");
            return Err(PipelineError::WeatherService(format!(
                "request failed with status {}: {}",
                status,
                truncate_body(&body),
            )));
        }

        let parsed: ArchiveResponse = serde_json::from_str(&body)
            .map_err(|e| PipelineError::malformed(format!("archive response: {e}")))?;

        parsed
            .daily
            .ok_or_else(|| PipelineError::malformed("archive response has no 'daily' section"))
    }
}
