use weather_archive_core::{WeatherRecordSet, summary::MonthlySummary};

const DATE_WIDTH: usize = 10;
const VALUE_WIDTH: usize = 14;

pub fn print_records(records: &WeatherRecordSet) {
    print!("{}", render_records(records));
}

pub fn print_summary(months: &[MonthlySummary]) {
    print!("{}", render_summary(months));
}

fn cell(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:>w$.1}", w = VALUE_WIDTH),
        None => format!("{:>w$}", "-", w = VALUE_WIDTH),
    }
}

fn render_records(records: &WeatherRecordSet) -> String {
    let mut out = format!("{:<w$}", "time", w = DATE_WIDTH);
    for column in records.columns() {
        out.push_str(&format!("{:>w$}", column.as_str(), w = VALUE_WIDTH));
    }
    out.push('\n');

    for record in records.records() {
        let date = record.time.format("%Y-%m-%d").to_string();
        out.push_str(&format!("{:<w$}", date, w = DATE_WIDTH));
        for column in records.columns() {
            out.push_str(&cell(record.get(*column)));
        }
        out.push('\n');
    }
    out
}

fn render_summary(months: &[MonthlySummary]) -> String {
    if months.is_empty() {
        return "No monthly summary available.\n".to_string();
    }

    let mut out = format!(
        "{:<dw$}{:>6}{:>vw$}{:>vw$}{:>vw$}\n",
        "month",
        "days",
        "avg_temp_max",
        "avg_temp_min",
        "precip_total",
        dw = DATE_WIDTH,
        vw = VALUE_WIDTH,
    );
    for month in months {
        out.push_str(&format!(
            "{:<w$}{:>6}{}{}{}\n",
            month.month,
            month.days,
            cell(month.temp_max_mean),
            cell(month.temp_min_mean),
            cell(month.precipitation_total),
            w = DATE_WIDTH,
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use chrono::NaiveDate;
    use weather_archive_core::{Column, WeatherRecord};

    #[test]
    fn records_render_with_placeholder_for_gaps() {
        let set = WeatherRecordSet::new(
            [Column::TempMax, Column::Precipitation],
            vec![WeatherRecord {
                time: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                values: BTreeMap::from([(Column::TempMax, Some(5.25))]),
            }],
        );

        let text = render_records(&set);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("time"));
        assert!(lines[0].contains("temp_max") && lines[0].contains("precipitation"));
        assert!(lines[1].starts_with("2024-01-01"));
        assert!(lines[1].contains("5.2") || lines[1].contains("5.3"));
        assert!(lines[1].trim_end().ends_with('-'));
    }

    #[test]
    fn empty_summary_has_message() {
        assert_eq!(render_summary(&[]), "No monthly summary available.\n");
    }
}
