use std::path::PathBuf;

use anyhow::{Context, bail};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use weather_archive_core::{
    Config, CsvFileSink, DateRange, FillPolicy, Location, LocationQuery, Metric, MetricSelection,
    Pipeline, RecordSink, SqliteSink, sink::DEFAULT_TABLE, summary,
};

use crate::output;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-archive", version, about = "Historical daily weather CLI")]
pub struct Cli {
    /// Print debug logs to stderr (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the geocoding API key and default fill policy.
    Configure,

    /// Fetch daily observations for a place or a coordinate pair.
    Fetch(FetchArgs),
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Place name to geocode, e.g. "New York".
    #[arg(conflicts_with_all = ["lat", "lon"])]
    pub place: Option<String>,

    /// Latitude in decimal degrees; skips geocoding.
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    pub lat: Option<f64>,

    /// Longitude in decimal degrees; skips geocoding.
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    pub lon: Option<f64>,

    /// First day, YYYY-MM-DD.
    #[arg(long)]
    pub start: NaiveDate,

    /// Last day (inclusive), YYYY-MM-DD.
    #[arg(long)]
    pub end: NaiveDate,

    /// Daily metric to request; repeatable. Defaults to max and min temperature.
    #[arg(long = "metric", value_parser = parse_metric)]
    pub metrics: Vec<Metric>,

    /// Gap handling: "none" or "forward-fill". Defaults to the configured policy.
    #[arg(long, value_parser = parse_fill_policy)]
    pub fill: Option<FillPolicy>,

    /// Write the records to this CSV file.
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Store the records in this SQLite database, replacing the table.
    #[arg(long)]
    pub sqlite: Option<PathBuf>,

    /// Table name used with --sqlite.
    #[arg(long, default_value = DEFAULT_TABLE)]
    pub table: String,

    /// Also print monthly averages and precipitation totals.
    #[arg(long)]
    pub summary: bool,
}

fn parse_metric(value: &str) -> Result<Metric, String> {
    Metric::try_from(value).map_err(|e| e.to_string())
}

fn parse_fill_policy(value: &str) -> Result<FillPolicy, String> {
    FillPolicy::try_from(value).map_err(|e| e.to_string())
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Fetch(args) => fetch(args).await,
        }
    }
}

fn configure() -> anyhow::Result<()> {
    // File values only, so an environment key is never written to disk.
    let mut config = Config::load_from(&Config::config_file_path()?)?;

    let api_key = inquire::Password::new("Geocoding API key:")
        .without_confirmation()
        .with_display_mode(inquire::PasswordDisplayMode::Masked)
        .prompt()
        .context("Failed to read API key")?;
    if !api_key.trim().is_empty() {
        config.set_api_key(api_key.trim().to_string());
    }

    let policies: Vec<&str> = FillPolicy::all().iter().map(FillPolicy::as_str).collect();
    let current = FillPolicy::all()
        .iter()
        .position(|p| *p == config.fill_policy)
        .unwrap_or_default();
    let chosen = inquire::Select::new("Default fill policy:", policies)
        .with_starting_cursor(current)
        .prompt()
        .context("Failed to read fill policy")?;
    config.fill_policy = FillPolicy::try_from(chosen)?;

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn fetch(args: FetchArgs) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(fill) = args.fill {
        config.fill_policy = fill;
    }

    let query = match (args.place, args.lat, args.lon) {
        (Some(place), _, _) => LocationQuery::Place(place),
        (None, Some(lat), Some(lon)) => LocationQuery::Coordinates(Location::new(lat, lon)?),
        _ => bail!("Provide a place name or both --lat and --lon."),
    };
    let label = match &query {
        LocationQuery::Place(place) => place.clone(),
        LocationQuery::Coordinates(location) => location.to_string(),
    };

    let range = DateRange::new(args.start, args.end)?;
    let metrics = if args.metrics.is_empty() {
        MetricSelection::temperatures()
    } else {
        MetricSelection::new(args.metrics)
    };

    let geocode = matches!(query, LocationQuery::Place(_));
    let pipeline = Pipeline::from_config(&config, geocode)?;

    let records = pipeline
        .run(query, &range, &metrics)
        .await
        .with_context(|| format!("Failed to fetch weather for {label}"))?;

    if records.is_empty() {
        println!("No observations returned for {label} ({range}).");
    } else {
        output::print_records(&records);
    }

    if args.summary {
        println!();
        output::print_summary(&summary::monthly(&records));
    }

    if let Some(path) = args.csv {
        let mut sink = CsvFileSink::new(&path);
        sink.write(&records)
            .with_context(|| format!("Failed to write CSV file: {}", path.display()))?;
        println!("Wrote {} rows to {}", records.len(), path.display());
    }

    if let Some(path) = args.sqlite {
        let mut sink = SqliteSink::open(&path, args.table)
            .with_context(|| format!("Failed to open SQLite database: {}", path.display()))?;
        sink.write(&records)
            .with_context(|| format!("Failed to write SQLite table '{}'", sink.table()))?;
        println!("Stored {} rows in {}:{}", records.len(), path.display(), sink.table());
    }

    Ok(())
}
