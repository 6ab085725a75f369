//! Error type shared by the library modules.
//!
//! Data-quality problems (blank names, placeholders, unmatched queries) are
//! never errors; they are encoded in match results and report statuses.
//! Only contract violations and I/O failures surface here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Config values out of range or inconsistent.
    #[error("config validation error: {0}")]
    ConfigValidation(String),

    /// A required column is absent from a table header.
    #[error("{table}: missing column (tried {tried})")]
    MissingColumn { table: String, tried: String },

    /// Index built from records that disagree with its name columns.
    #[error("malformed candidate index: {0}")]
    MalformedIndex(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Registry HTTP or decoding failure.
    #[error("registry lookup failed: {0}")]
    Registry(String),
}

impl From<reqwest::Error> for ReconcileError {
    fn from(error: reqwest::Error) -> Self {
        ReconcileError::Registry(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
