use std::{collections::BTreeMap, fmt};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// A resolved point on the globe.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub name: Option<String>,
    latitude: f64,
    longitude: f64,
}

impl Location {
    /// Build a location, rejecting coordinates outside [-90, 90] x [-180, 180].
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, PipelineError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(PipelineError::invalid(format!(
                "latitude {latitude} is outside [-90, 90]"
            )));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(PipelineError::invalid(format!(
                "longitude {longitude} is outside [-180, 180]"
            )));
        }

        Ok(Self { name: None, latitude, longitude })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} ({:.4}, {:.4})", self.latitude, self.longitude),
            None => write!(f, "{:.4}, {:.4}", self.latitude, self.longitude),
        }
    }
}

/// Inclusive calendar date range, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, PipelineError> {
        if start > end {
            return Err(PipelineError::invalid(format!(
                "start date {start} is after end date {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Daily metrics the archive service is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    TemperatureMax,
    TemperatureMin,
    PrecipitationSum,
}

impl Metric {
    /// Identifier used by the archive service.
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::TemperatureMax => "temperature_2m_max",
            Metric::TemperatureMin => "temperature_2m_min",
            Metric::PrecipitationSum => "precipitation_sum",
        }
    }

    pub fn column(&self) -> Column {
        match self {
            Metric::TemperatureMax => Column::TempMax,
            Metric::TemperatureMin => Column::TempMin,
            Metric::PrecipitationSum => Column::Precipitation,
        }
    }

    pub const fn all() -> &'static [Metric] {
        &[Metric::TemperatureMax, Metric::TemperatureMin, Metric::PrecipitationSum]
    }

    /// Strict lookup of a service key; `None` for anything outside the catalog.
    pub fn from_source_key(key: &str) -> Option<Metric> {
        Metric::all().iter().copied().find(|m| m.as_str() == key)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Metric {
    type Error = PipelineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.trim().to_lowercase();

        Metric::from_source_key(&lower).ok_or_else(|| {
            PipelineError::invalid(format!(
                "Unknown metric '{value}'. Supported metrics: temperature_2m_max, \
                 temperature_2m_min, precipitation_sum."
            ))
        })
    }
}

/// Canonical output column for a metric.
///
/// Declaration order is the canonical column order of every record set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    TempMax,
    TempMin,
    Precipitation,
}

impl Column {
    pub const TIME: &'static str = "time";

    pub fn as_str(&self) -> &'static str {
        match self {
            Column::TempMax => "temp_max",
            Column::TempMin => "temp_min",
            Column::Precipitation => "precipitation",
        }
    }

    pub const fn all() -> &'static [Column] {
        &[Column::TempMax, Column::TempMin, Column::Precipitation]
    }

    pub fn from_name(name: &str) -> Option<Column> {
        Column::all().iter().copied().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered, de-duplicated set of requested metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricSelection(Vec<Metric>);

impl MetricSelection {
    pub fn new(metrics: impl IntoIterator<Item = Metric>) -> Self {
        let mut selected = Vec::new();
        for metric in metrics {
            if !selected.contains(&metric) {
                selected.push(metric);
            }
        }
        Self(selected)
    }

    /// Max and min temperature, the usual interactive default.
    pub fn temperatures() -> Self {
        Self::new([Metric::TemperatureMax, Metric::TemperatureMin])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Comma-joined identifiers for the `daily` query parameter.
    pub fn query_value(&self) -> String {
        self.0.iter().map(Metric::as_str).collect::<Vec<_>>().join(",")
    }
}

impl FromIterator<Metric> for MetricSelection {
    fn from_iter<T: IntoIterator<Item = Metric>>(iter: T) -> Self {
        Self::new(iter)
    }
}

/// How gaps inside a column are treated during normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FillPolicy {
    #[default]
    None,
    ForwardFill,
}

impl FillPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FillPolicy::None => "none",
            FillPolicy::ForwardFill => "forward-fill",
        }
    }

    pub const fn all() -> &'static [FillPolicy] {
        &[FillPolicy::None, FillPolicy::ForwardFill]
    }
}

impl fmt::Display for FillPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for FillPolicy {
    type Error = PipelineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            "none" => Ok(FillPolicy::None),
            "forward-fill" | "ffill" => Ok(FillPolicy::ForwardFill),
            _ => Err(PipelineError::invalid(format!(
                "Unknown fill policy '{value}'. Supported policies: none, forward-fill."
            ))),
        }
    }
}

/// The `daily` section of an archive response, as returned by the service.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct RawWeatherPayload {
    pub daily: serde_json::Map<String, serde_json::Value>,
}

/// One day of observations keyed by canonical column.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherRecord {
    pub time: NaiveDate,
    pub values: BTreeMap<Column, Option<f64>>,
}

impl WeatherRecord {
    /// Value of `column`, `None` when the column is absent or the day is missing.
    pub fn get(&self, column: Column) -> Option<f64> {
        self.values.get(&column).copied().flatten()
    }
}

/// Daily records in ascending date order, sharing one column set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeatherRecordSet {
    columns: Vec<Column>,
    records: Vec<WeatherRecord>,
}

impl WeatherRecordSet {
    /// Columns are stored in canonical order; each record is given an entry
    /// (possibly `None`) for every column.
    pub fn new(columns: impl IntoIterator<Item = Column>, records: Vec<WeatherRecord>) -> Self {
        let mut columns: Vec<Column> = columns.into_iter().collect();
        columns.sort();
        columns.dedup();

        let records = records
            .into_iter()
            .map(|mut record| {
                record.values.retain(|column, _| columns.contains(column));
                for column in &columns {
                    record.values.entry(*column).or_insert(None);
                }
                record
            })
            .collect();

        Self { columns, records }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// `time` followed by the metric columns.
    pub fn column_names(&self) -> Vec<&'static str> {
        std::iter::once(Column::TIME)
            .chain(self.columns.iter().map(Column::as_str))
            .collect()
    }

    pub fn records(&self) -> &[WeatherRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Values of one column in record order.
    pub fn column_values(&self, column: Column) -> Vec<Option<f64>> {
        self.records.iter().map(|r| r.get(column)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn metric_as_str_roundtrip() {
        for metric in Metric::all() {
            let parsed = Metric::try_from(metric.as_str()).expect("roundtrip should succeed");
            assert_eq!(*metric, parsed);
        }
    }

    #[test]
    fn unknown_metric_error() {
        let err = Metric::try_from("wind_speed_10m_max").unwrap_err();
        assert!(matches!(err, PipelineError::InvalidRequest(_)));
        assert!(err.to_string().contains("Unknown metric"));
    }

    #[test]
    fn metrics_map_one_to_one_onto_columns() {
        let columns: Vec<&str> = Metric::all().iter().map(|m| m.column().as_str()).collect();
        assert_eq!(columns, ["temp_max", "temp_min", "precipitation"]);
    }

    #[test]
    fn location_rejects_out_of_range_coordinates() {
        assert!(Location::new(90.0, -180.0).is_ok());
        assert!(Location::new(90.1, 0.0).is_err());
        assert!(Location::new(0.0, 180.5).is_err());
        assert!(Location::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn date_range_requires_start_not_after_end() {
        let range = DateRange::new(date(2024, 1, 1), date(2024, 1, 3)).unwrap();
        assert_eq!((range.start(), range.end()), (date(2024, 1, 1), date(2024, 1, 3)));
        assert!(DateRange::new(date(2024, 1, 1), date(2024, 1, 1)).is_ok());

        let err = DateRange::new(date(2024, 1, 3), date(2024, 1, 1)).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidRequest(_)));
    }

    #[test]
    fn selection_dedupes_and_joins_in_order() {
        let selection = MetricSelection::new([
            Metric::PrecipitationSum,
            Metric::TemperatureMax,
            Metric::PrecipitationSum,
        ]);
        assert_eq!(selection.query_value(), "precipitation_sum,temperature_2m_max");
        assert!(MetricSelection::default().is_empty());
    }

    #[test]
    fn fill_policy_parses_known_names() {
        for policy in FillPolicy::all() {
            assert_eq!(FillPolicy::try_from(policy.as_str()).unwrap(), *policy);
        }
        assert!(FillPolicy::try_from("backfill").is_err());
    }

    #[test]
    fn record_set_orders_columns_and_pads_values() {
        let record = WeatherRecord {
            time: date(2024, 1, 1),
            values: BTreeMap::from([(Column::TempMin, Some(1.0))]),
        };
        let set = WeatherRecordSet::new([Column::TempMin, Column::TempMax], vec![record]);

        assert_eq!(set.column_names(), ["time", "temp_max", "temp_min"]);
        assert_eq!(set.records()[0].get(Column::TempMax), None);
        assert_eq!(set.records()[0].get(Column::TempMin), Some(1.0));
        assert_eq!(set.records()[0].values.len(), 2);
    }
}
