use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Date parsing error: {0}")]
    DateParse(#[from] chrono::ParseError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("Geometry decoding error: {0}")]
    Geozero(#[from] geozero::error::GeozeroError),

    #[error("GeoPackage error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Variable {0} not supported")]
    UnsupportedVariable(String),

    #[error("Boundaries collection is empty: {0}")]
    EmptyBoundaries(String),

    #[error("Invalid bounding box: {0}")]
    InvalidBounds(String),

    #[error("Invalid geometry: {0}")]
    Geometry(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Toolbox error: {0}")]
    Toolbox(String),

    #[error("DHIS2 error: {0}")]
    Dhis2(String),

    #[error("{} variable(s) failed: {}", failures.len(), summarize(failures))]
    PartialFailure { failures: Vec<(String, String)> },
}

fn summarize(failures: &[(String, String)]) -> String {
    failures
        .iter()
        .map(|(variable, message)| format!("{} ({})", variable, message))
        .collect::<Vec<_>>()
        .join(", ")
}

impl PipelineError {
    /// True for errors raised because an expected file or directory is missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PipelineError::NotFound(_))
    }
}
