//! Raw archive payload → canonical daily record set.
//!
//! Known metric keys are renamed to their canonical column; any other key in
//! the payload is dropped. Records keep the order the service returned.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::{
    error::PipelineError,
    model::{Column, FillPolicy, Metric, RawWeatherPayload, WeatherRecord, WeatherRecordSet},
};

pub fn normalize(
    raw: RawWeatherPayload,
    fill_policy: FillPolicy,
) -> Result<WeatherRecordSet, PipelineError> {
    let mut daily = raw.daily;
    if daily.is_empty() {
        return Ok(WeatherRecordSet::default());
    }

    let time = daily
        .remove(Column::TIME)
        .ok_or_else(|| PipelineError::malformed("daily payload has no 'time' series"))?;
    let dates = parse_dates(time)?;

    let mut series: BTreeMap<Column, Vec<Option<f64>>> = BTreeMap::new();
    for (key, value) in daily {
        let Some(metric) = Metric::from_source_key(&key) else {
            tracing::debug!(key = %key, "dropping unrecognized daily series");
            continue;
        };

        let mut values = parse_values(&key, value)?;
        if values.len() != dates.len() {
            return Err(PipelineError::malformed(format!(
                "series '{key}' has {} values but 'time' has {}",
                values.len(),
                dates.len()
            )));
        }

        if fill_policy == FillPolicy::ForwardFill {
            forward_fill(&mut values);
        }
        series.insert(metric.column(), values);
    }

    let records = dates
        .into_iter()
        .enumerate()
        .map(|(idx, time)| WeatherRecord {
            time,
            values: series.iter().map(|(column, values)| (*column, values[idx])).collect(),
        })
        .collect();

    Ok(WeatherRecordSet::new(series.keys().copied(), records))
}

/// Replace each gap with the last preceding observation. A leading run of
/// gaps has nothing to propagate and stays empty.
pub fn forward_fill(values: &mut [Option<f64>]) {
    let mut last = None;
    for value in values.iter_mut() {
        match value {
            Some(v) => last = Some(*v),
            None => *value = last,
        }
    }
}

fn parse_dates(time: Value) -> Result<Vec<NaiveDate>, PipelineError> {
    let Value::Array(items) = time else {
        return Err(PipelineError::malformed("'time' is not an array"));
    };

    items
        .iter()
        .map(|item| {
            item.as_str()
                .and_then(parse_date)
                .ok_or_else(|| PipelineError::malformed(format!("invalid date in 'time': {item}")))
        })
        .collect()
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M")
                .ok()
                .map(|dt| dt.date())
        })
}

fn parse_values(key: &str, value: Value) -> Result<Vec<Option<f64>>, PipelineError> {
    let Value::Array(items) = value else {
        return Err(PipelineError::malformed(format!("series '{key}' is not an array")));
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::Null => Ok(None),
            Value::Number(n) => n.as_f64().map(Some).ok_or_else(|| {
                PipelineError::malformed(format!("series '{key}' has a non-finite value"))
            }),
            other => Err(PipelineError::malformed(format!(
                "series '{key}' has a non-numeric value: {other}"
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> RawWeatherPayload {
        serde_json::from_value(value).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn renames_known_metrics_and_parses_dates() {
        let raw = payload(json!({
            "time": ["2024-01-01", "2024-01-02"],
            "temperature_2m_max": [5.0, 6.5],
            "precipitation_sum": [0.0, 1.2],
        }));

        let set = normalize(raw, FillPolicy::None).unwrap();

        assert_eq!(set.column_names(), ["time", "temp_max", "precipitation"]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.records()[0].time, date(2024, 1, 1));
        assert_eq!(set.records()[1].get(Column::TempMax), Some(6.5));
        assert_eq!(set.records()[1].get(Column::Precipitation), Some(1.2));
    }

    #[test]
    fn unknown_keys_are_dropped() {
        let raw = payload(json!({
            "time": ["2024-01-01"],
            "temperature_2m_min": [-3],
            "wind_speed_10m_max": [12.0],
        }));

        let set = normalize(raw, FillPolicy::None).unwrap();

        assert_eq!(set.columns(), [Column::TempMin]);
        assert_eq!(set.records()[0].get(Column::TempMin), Some(-3.0));
    }

    #[test]
    fn record_count_matches_time_series() {
        let raw = payload(json!({
            "time": ["2024-03-01", "2024-03-02", "2024-03-04"],
            "temperature_2m_max": [1, null, 3],
        }));

        let set = normalize(raw, FillPolicy::None).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.column_values(Column::TempMax), [Some(1.0), None, Some(3.0)]);
    }

    #[test]
    fn forward_fill_leaves_leading_gap() {
        let raw = payload(json!({
            "time": ["2024-01-01", "2024-01-02", "2024-01-03", "2024-01-04", "2024-01-05"],
            "precipitation_sum": [null, null, 2.0, null, null],
            "temperature_2m_max": [1.0, null, 3.0, null, 5.0],
        }));

        let set = normalize(raw, FillPolicy::ForwardFill).unwrap();

        assert_eq!(
            set.column_values(Column::Precipitation),
            [None, None, Some(2.0), Some(2.0), Some(2.0)]
        );
        assert_eq!(
            set.column_values(Column::TempMax),
            [Some(1.0), Some(1.0), Some(3.0), Some(3.0), Some(5.0)]
        );
    }

    #[test]
    fn forward_fill_property_holds_after_first_observation() {
        let mut values = vec![None, Some(1.0), None, None, Some(4.0), None];
        forward_fill(&mut values);

        let first = values.iter().position(Option::is_some).unwrap();
        assert!(values[..first].iter().all(Option::is_none));
        assert!(values[first..].iter().all(Option::is_some));
    }

    #[test]
    fn empty_payload_yields_empty_set() {
        let set = normalize(RawWeatherPayload::default(), FillPolicy::ForwardFill).unwrap();
        assert!(set.is_empty());
        assert!(set.columns().is_empty());
    }

    #[test]
    fn empty_time_series_yields_empty_set() {
        let raw = payload(json!({ "time": [], "temperature_2m_max": [] }));
        let set = normalize(raw, FillPolicy::None).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn missing_time_is_malformed() {
        let raw = payload(json!({ "temperature_2m_max": [1.0] }));
        let err = normalize(raw, FillPolicy::None).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedPayload(_)));
    }

    #[test]
    fn length_mismatch_is_malformed() {
        let raw = payload(json!({
            "time": ["2024-01-01", "2024-01-02"],
            "temperature_2m_max": [1.0],
        }));
        let err = normalize(raw, FillPolicy::None).unwrap_err();
        assert!(err.to_string().contains("temperature_2m_max"));
    }

    #[test]
    fn bad_dates_and_values_are_malformed() {
        let bad_date = payload(json!({ "time": ["01/02/2024"] }));
        assert!(matches!(
            normalize(bad_date, FillPolicy::None),
            Err(PipelineError::MalformedPayload(_))
        ));

        let bad_value = payload(json!({
            "time": ["2024-01-01"],
            "temperature_2m_min": ["cold"],
        }));
        assert!(matches!(
            normalize(bad_value, FillPolicy::None),
            Err(PipelineError::MalformedPayload(_))
        ));
    }

    #[test]
    fn accepts_midnight_timestamps() {
        let raw = payload(json!({ "time": ["2024-02-29T00:00"] }));
        let set = normalize(raw, FillPolicy::None).unwrap();
        assert_eq!(set.records()[0].time, date(2024, 2, 29));
    }
}
