use thiserror::Error;

/// Failures of a single pipeline run.
///
/// Every variant is terminal for the run that produced it: nothing is retried
/// and no partial record set is returned.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Non-success status or transport failure from the geocoding service.
    #[error("Geocoding service error: {0}")]
    GeocodeService(String),

    /// The geocoder answered but had no candidates for the place name.
    #[error("Could not find coordinates for '{0}'")]
    LocationNotFound(String),

    /// Non-success status or transport failure from the archive service.
    #[error("Weather archive service error: {0}")]
    WeatherService(String),

    /// A response was missing expected fields or carried values of the wrong shape.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// The request was rejected before any network call was made.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl PipelineError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedPayload(message.into())
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }
}

/// Failures while persisting or re-reading a record set.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error writing records")]
    Io(#[from] std::io::Error),

    #[error("CSV error")]
    Csv(#[from] csv::Error),

    #[error("SQLite error")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid table name '{0}': only ASCII letters, digits and '_' are allowed")]
    InvalidTableName(String),

    #[error("Unknown CSV column '{0}'")]
    UnknownColumn(String),

    #[error("Could not parse CSV cell '{value}' in column '{column}' at row {row}")]
    InvalidCell {
        column: String,
        row: usize,
        value: String,
    },
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
