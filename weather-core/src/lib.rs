//! Core library for the `weather-archive` CLI.
//!
//! This crate defines:
//! - Geocoding of place names and fetching of historical daily observations
//! - Normalization of archive payloads into canonical daily records
//! - The pipeline tying those together, plus CSV / SQLite sinks
//! - Configuration & credentials handling
//!
//! It is used by `weather-archive-cli`, but can also be embedded by other
//! front ends that only need the returned [`WeatherRecordSet`].

pub mod archive;
pub mod config;
pub mod error;
pub mod geocode;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod sink;
pub mod summary;

pub use archive::{OpenMeteoArchive, WeatherArchive};
pub use config::Config;
pub use error::{PipelineError, SinkError};
pub use geocode::{Geocoder, OpenCageGeocoder};
pub use model::{
    Column, DateRange, FillPolicy, Location, Metric, MetricSelection, RawWeatherPayload,
    WeatherRecord, WeatherRecordSet,
};
pub use normalize::normalize;
pub use pipeline::{LocationQuery, Pipeline, PipelineOptions};
pub use sink::{CsvFileSink, RecordSink, SqliteSink};
