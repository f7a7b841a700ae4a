//! Persistence targets for a finished record set.
//!
//! Sinks only read the record set. Every write replaces what the target held
//! before; nothing is appended across runs.

use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use rusqlite::{Connection, params_from_iter, types::Value as SqlValue};

use crate::{
    error::SinkError,
    model::{Column, WeatherRecord, WeatherRecordSet},
};

pub const DEFAULT_TABLE: &str = "weather_data";
const DATE_FORMAT: &str = "%Y-%m-%d";

pub trait RecordSink {
    fn write(&mut self, records: &WeatherRecordSet) -> Result<(), SinkError>;
}

/// Write `records` as CSV: a `time` header followed by the present columns.
/// Missing values become empty cells.
pub fn write_csv<W: Write>(records: &WeatherRecordSet, writer: W) -> Result<(), SinkError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(records.column_names())?;

    for record in records.records() {
        let mut row = Vec::with_capacity(records.columns().len() + 1);
        row.push(record.time.format(DATE_FORMAT).to_string());
        row.extend(
            records
                .columns()
                .iter()
                .map(|column| record.get(*column).map(|v| v.to_string()).unwrap_or_default()),
        );
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

/// UTF-8 CSV bytes, e.g. for a download button.
pub fn to_csv_bytes(records: &WeatherRecordSet) -> Result<Vec<u8>, SinkError> {
    let mut buf = Vec::new();
    write_csv(records, &mut buf)?;
    Ok(buf)
}

/// Parse CSV produced by [`write_csv`] back into a record set.
pub fn read_csv<R: Read>(reader: R) -> Result<WeatherRecordSet, SinkError> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);

    let headers = rdr.headers()?.clone();
    let mut names = headers.iter();
    match names.next() {
        Some(Column::TIME) => {}
        Some(other) => return Err(SinkError::UnknownColumn(other.to_string())),
        None => return Ok(WeatherRecordSet::default()),
    }
    let columns = names
        .map(|name| {
            Column::from_name(name).ok_or_else(|| SinkError::UnknownColumn(name.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut records = Vec::new();
    for (idx, row) in rdr.records().enumerate() {
        let row = row?;
        let line = idx + 1;

        let raw_time = row.get(0).unwrap_or_default();
        let time = NaiveDate::parse_from_str(raw_time, DATE_FORMAT).map_err(|_| {
            SinkError::InvalidCell {
                column: Column::TIME.to_string(),
                row: line,
                value: raw_time.to_string(),
            }
        })?;

        let mut values = BTreeMap::new();
        for (pos, column) in columns.iter().enumerate() {
            let cell = row.get(pos + 1).unwrap_or_default().trim();
            let value = if cell.is_empty() {
                None
            } else {
                Some(cell.parse::<f64>().map_err(|_| SinkError::InvalidCell {
                    column: column.to_string(),
                    row: line,
                    value: cell.to_string(),
                })?)
            };
            values.insert(*column, value);
        }

        records.push(WeatherRecord { time, values });
    }

    Ok(WeatherRecordSet::new(columns, records))
}

/// Writes the record set to a CSV file, truncating any previous content.
#[derive(Debug, Clone)]
pub struct CsvFileSink {
    path: PathBuf,
}

impl CsvFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for CsvFileSink {
    fn write(&mut self, records: &WeatherRecordSet) -> Result<(), SinkError> {
        let file = File::create(&self.path)?;
        write_csv(records, BufWriter::new(file))?;
        tracing::info!(path = %self.path.display(), rows = records.len(), "wrote CSV export");
        Ok(())
    }
}

/// Stores the record set in one SQLite table, replacing the table on each write.
#[derive(Debug)]
pub struct SqliteSink {
    conn: Connection,
    table: String,
}

impl SqliteSink {
    pub fn open(path: impl AsRef<Path>, table: impl Into<String>) -> Result<Self, SinkError> {
        let table = validate_table_name(table.into())?;
        let conn = Connection::open(path)?;
        Ok(Self { conn, table })
    }

    pub fn in_memory(table: impl Into<String>) -> Result<Self, SinkError> {
        let table = validate_table_name(table.into())?;
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn, table })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Read the stored table back, ordered by date.
    pub fn load(&self) -> Result<WeatherRecordSet, SinkError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {} ORDER BY time", self.table))?;

        let columns = stmt
            .column_names()
            .into_iter()
            .skip(1)
            .map(|name| {
                Column::from_name(name).ok_or_else(|| SinkError::UnknownColumn(name.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut records = Vec::new();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let raw_time: String = row.get(0)?;
            let time = NaiveDate::parse_from_str(&raw_time, DATE_FORMAT).map_err(|_| {
                SinkError::InvalidCell {
                    column: Column::TIME.to_string(),
                    row: records.len() + 1,
                    value: raw_time.clone(),
                }
            })?;

            let mut values = BTreeMap::new();
            for (pos, column) in columns.iter().enumerate() {
                values.insert(*column, row.get::<_, Option<f64>>(pos + 1)?);
            }
            records.push(WeatherRecord { time, values });
        }

        Ok(WeatherRecordSet::new(columns, records))
    }
}

impl RecordSink for SqliteSink {
    fn write(&mut self, records: &WeatherRecordSet) -> Result<(), SinkError> {
        let tx = self.conn.transaction()?;

        tx.execute(&format!("DROP TABLE IF EXISTS {}", self.table), [])?;

        let mut defs = vec![format!("{} TEXT NOT NULL", Column::TIME)];
        defs.extend(records.columns().iter().map(|c| format!("{c} REAL")));
        tx.execute(&format!("CREATE TABLE {} ({})", self.table, defs.join(", ")), [])?;

        {
            let placeholders = (1..=records.columns().len() + 1)
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ");
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.table,
                records.column_names().join(", "),
                placeholders
            ))?;

            for record in records.records() {
                let time = SqlValue::Text(record.time.format(DATE_FORMAT).to_string());
                let row = std::iter::once(time)
                    .chain(records.columns().iter().map(|column| {
                        record.get(*column).map(SqlValue::Real).unwrap_or(SqlValue::Null)
                    }));
                stmt.execute(params_from_iter(row))?;
            }
        }

        tx.commit()?;
        tracing::info!(table = %self.table, rows = records.len(), "replaced SQLite table");
        Ok(())
    }
}

fn validate_table_name(table: String) -> Result<String, SinkError> {
    let valid = !table.is_empty()
        && !table.starts_with(|c: char| c.is_ascii_digit())
        && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid { Ok(table) } else { Err(SinkError::InvalidTableName(table)) }
}
