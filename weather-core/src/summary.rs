use std::collections::BTreeMap;

use chrono::Datelike;

use crate::model::{Column, WeatherRecordSet};

/// Per-month aggregate of a record set.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlySummary {
    /// `YYYY-MM`
    pub month: String,
    pub days: usize,
    pub temp_max_mean: Option<f64>,
    pub temp_min_mean: Option<f64>,
    pub precipitation_total: Option<f64>,
}

#[derive(Default)]
struct Acc {
    days: usize,
    temp_max: Vec<f64>,
    temp_min: Vec<f64>,
    precipitation: Vec<f64>,
}

/// Group records by calendar month, ascending. Missing values are skipped.
pub fn monthly(records: &WeatherRecordSet) -> Vec<MonthlySummary> {
    let mut months: BTreeMap<(i32, u32), Acc> = BTreeMap::new();

    for record in records.records() {
        let acc = months
            .entry((record.time.year(), record.time.month()))
            .or_default();
        acc.days += 1;
        acc.temp_max.extend(record.get(Column::TempMax));
        acc.temp_min.extend(record.get(Column::TempMin));
        acc.precipitation.extend(record.get(Column::Precipitation));
    }

    months
        .into_iter()
        .map(|((year, month), acc)| MonthlySummary {
            month: format!("{year:04}-{month:02}"),
            days: acc.days,
            temp_max_mean: mean(&acc.temp_max),
            temp_min_mean: mean(&acc.temp_min),
            precipitation_total: (!acc.precipitation.is_empty())
                .then(|| acc.precipitation.iter().sum()),
        })
        .collect()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
