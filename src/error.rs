use std::path::PathBuf;
use thiserror::Error;

/// All errors produced while loading and aggregating report inputs.
#[derive(Error, Debug)]
pub enum ReportError {
    /// A configured data source could not be reached or a file is missing.
    #[error("Source '{source_name}' unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    /// An input row is malformed or inconsistent. `line` is 1-based when known.
    #[error("Invalid input in {origin}{}: {message}", .line.map(|l| format!(" (line {l})")).unwrap_or_default())]
    Validation {
        origin: String,
        line: Option<u64>,
        message: String,
    },

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An output file could not be written.
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ReportError {
    pub fn validation(origin: impl Into<String>, line: Option<u64>, message: impl Into<String>) -> Self {
        ReportError::Validation {
            origin: origin.into(),
            line,
            message: message.into(),
        }
    }

    pub fn unavailable(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        ReportError::SourceUnavailable {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ReportError::Validation { .. })
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReportError>;
