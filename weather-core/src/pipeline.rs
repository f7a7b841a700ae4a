//! Geocode → fetch → normalize, as one call.

use anyhow::Context;
use reqwest::Client;

use crate::{
    archive::{OpenMeteoArchive, WeatherArchive},
    config::{API_KEY_ENV, Config},
    error::PipelineError,
    geocode::{Geocoder, OpenCageGeocoder},
    model::{DateRange, FillPolicy, Location, MetricSelection, WeatherRecordSet},
    normalize::normalize,
    sink::RecordSink,
};

/// Where to fetch weather for.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationQuery {
    /// Free-text place name, resolved through the geocoder.
    Place(String),
    /// Coordinates used as-is.
    Coordinates(Location),
}

impl From<Location> for LocationQuery {
    fn from(location: Location) -> Self {
        LocationQuery::Coordinates(location)
    }
}

/// Per-pipeline settings, fixed at construction.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Whether this pipeline may call the geocoder at all.
    ///
    /// A pipeline built with `geocode = false` carries no API key, so it only
    /// accepts [`LocationQuery::Coordinates`] and rejects a place name before
    /// any request is sent.
    pub geocode: bool,
    pub fill_policy: FillPolicy,
    pub api_key: String,
}

#[derive(Debug)]
pub struct Pipeline {
    geocoder: Box<dyn Geocoder>,
    archive: Box<dyn WeatherArchive>,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(
        geocoder: Box<dyn Geocoder>,
        archive: Box<dyn WeatherArchive>,
        options: PipelineOptions,
    ) -> Self {
        Self { geocoder, archive, options }
    }

    /// HTTP-backed pipeline using the configured endpoints, timeout, key and fill policy.
    pub fn from_config(config: &Config, geocode: bool) -> anyhow::Result<Self> {
        let api_key = match config.api_key() {
            Some(key) => key,
            None if geocode => {
                return Err(anyhow::anyhow!(
                    "No geocoding API key configured.\n\
                     Hint: run `weather-archive configure` or set {API_KEY_ENV}."
                ));
            }
            None => String::new(),
        };

        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("Failed to build HTTP client")?;

        let geocoder =
            OpenCageGeocoder::with_base_url(http.clone(), config.endpoints.geocode_url.clone());
        let archive = OpenMeteoArchive::with_base_url(http, config.endpoints.archive_url.clone());

        Ok(Self::new(
            Box::new(geocoder),
            Box::new(archive),
            PipelineOptions { geocode, fill_policy: config.fill_policy, api_key },
        ))
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Run one request end to end. Component errors are returned unchanged.
    pub async fn run(
        &self,
        query: LocationQuery,
        range: &DateRange,
        metrics: &MetricSelection,
    ) -> Result<WeatherRecordSet, PipelineError> {
        if metrics.is_empty() {
            return Err(PipelineError::invalid("at least one metric must be selected"));
        }

        let location = match query {
            LocationQuery::Coordinates(location) => location,
            LocationQuery::Place(name) if self.options.geocode => {
                self.geocoder.resolve(&name, &self.options.api_key).await?
            }
            LocationQuery::Place(name) => {
                return Err(PipelineError::invalid(format!(
                    "geocoding is disabled; coordinates are required instead of '{name}'"
                )));
            }
        };

        let raw = self.archive.fetch(&location, range, metrics).await?;
        let records = normalize(raw, self.options.fill_policy)?;

        tracing::info!(
            %location,
            %range,
            rows = records.len(),
            fill_policy = %self.options.fill_policy,
            "pipeline run complete"
        );
        Ok(records)
    }

    /// Run, then hand the result to `sink`. Nothing is written when the run fails.
    pub async fn run_into(
        &self,
        query: LocationQuery,
        range: &DateRange,
        metrics: &MetricSelection,
        sink: &mut dyn RecordSink,
    ) -> anyhow::Result<WeatherRecordSet> {
        let records = self.run(query, range, metrics).await?;
        sink.write(&records).context("Failed to persist weather records")?;
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_errors_when_geocoding_without_key() {
        let err = Pipeline::from_config(&Config::default(), true).unwrap_err();
        assert!(err.to_string().contains("No geocoding API key configured"));

        let mut blank = Config::default();
        blank.set_api_key("   ".into());
        assert!(Pipeline::from_config(&blank, true).is_err());
    }

    #[test]
    fn from_config_works_for_coordinates_without_key() {
        let cfg = Config::default();
        let pipeline = Pipeline::from_config(&cfg, false).unwrap();
        assert!(!pipeline.options().geocode);
    }

    #[test]
    fn from_config_uses_configured_key_and_fill_policy() {
        let mut cfg = Config::default();
        cfg.set_api_key("KEY".into());
        cfg.fill_policy = FillPolicy::ForwardFill;

        let pipeline = Pipeline::from_config(&cfg, true).unwrap();
        assert!(pipeline.options().geocode);
        assert_eq!(pipeline.options().fill_policy, FillPolicy::ForwardFill);
        assert_eq!(pipeline.options().api_key, "KEY");
    }
}
