//! Error types for the habitat pipeline.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HabitatError {
    #[error("habitat group '{group}' has no host-association entry")]
    MissingCategoryMapping { group: String },

    #[error("group '{group}' has {n} observation(s); at least 2 are needed for a comparison")]
    InsufficientSampleSize { group: String, n: usize },

    #[error("malformed value '{value}' in table '{table}', row {row}, column '{column}' (key {key}): {reason}")]
    MalformedInputRow {
        table: String,
        row: usize,
        column: String,
        key: String,
        value: String,
        reason: String,
    },

    #[error("missing column '{column}' in table '{table}'")]
    MissingColumn { table: String, column: String },

    #[error("unknown habitat group '{0}'")]
    UnknownHabitatGroup(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HabitatError>;
