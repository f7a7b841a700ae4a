//! Place name → coordinates resolution.

use std::fmt::Debug;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{
    error::{PipelineError, truncate_body},
    model::Location,
};

pub const DEFAULT_GEOCODE_URL: &str = "https://api.opencagedata.com";

#[async_trait]
pub trait Geocoder: Send + Sync + Debug {
    /// Resolve `place_name` to the first candidate the service returns.
    async fn resolve(&self, place_name: &str, api_key: &str) -> Result<Location, PipelineError>;
}

/// Client for an OpenCage-compatible forward geocoding endpoint.
#[derive(Debug, Clone)]
pub struct OpenCageGeocoder {
    base_url: String,
    http: Client,
}

impl OpenCageGeocoder {
    pub fn new(http: Client) -> Self {
        Self::with_base_url(http, DEFAULT_GEOCODE_URL)
    }

    pub fn with_base_url(http: Client, base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), http }
    }

    fn endpoint(&self) -> String {
        format!("{}/geocode/v1/json", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OcResponse {
    results: Vec<OcResult>,
}

#[derive(Debug, Deserialize)]
struct OcResult {
    geometry: OcGeometry,
}

#[derive(Debug, Deserialize)]
struct OcGeometry {
    lat: f64,
    lng: f64,
}

#[async_trait]
impl Geocoder for OpenCageGeocoder {
    async fn resolve(&self, place_name: &str, api_key: &str) -> Result<Location, PipelineError> {
        if place_name.trim().is_empty() {
            return Err(PipelineError::invalid("place name must not be empty"));
        }
        if api_key.is_empty() {
            return Err(PipelineError::invalid("geocoding requires an API key"));
        }

        tracing::debug!(place = place_name, "geocoding place name");

        let res = self
            .http
            .get(self.endpoint())
            .query(&[("q", place_name), ("key", api_key)])
            .send()
            .await
            .map_err(|e| {
                PipelineError::GeocodeService(format!(
                    "failed to send request: {}",
                    e.without_url()
                ))
            })?;

        let status = res.status();
        let body = res.text().await.map_err(|e| {
            PipelineError::GeocodeService(format!(
                "failed to read response body: {}",
                e.without_url()
            ))
        })?;

        if !status.is_success() {
            tracing::warn!(%status, "geocoding request failed");
            return Err(PipelineError::GeocodeService(format!(
                "request failed with status {}: {}",
                status,
                truncate_body(&body),
            )));
        }

        let parsed: OcResponse = serde_json::from_str(&body)
            .map_err(|e| PipelineError::malformed(format!("geocoding response: {e}")))?;

        let candidates = parsed.results.len();
        let first = parsed
            .results
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::LocationNotFound(place_name.to_string()))?;

        if candidates > 1 {
            tracing::debug!(candidates, "using first geocoding candidate");
        }

        let location = Location::new(first.geometry.lat, first.geometry.lng)
            .map_err(|e| PipelineError::malformed(format!("geocoding response: {e}")))?
            .with_name(place_name);

        tracing::info!(%location, "resolved place name");
        Ok(location)
    }
}
