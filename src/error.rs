//! Error taxonomy for the scoring engine and the fleet tracker.

/// Errors surfaced by the library.
///
/// Data-quality faults (`DataUnavailable`, `Classifier`) are usually absorbed
/// with a documented default before they reach a caller. Caller-input faults
/// (`Validation`, `NotAssigned`, `Forbidden`) are reported per item.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("weather data unavailable: {0}")]
    DataUnavailable(String),
    #[error("classifier failed for {combination}: {reason}")]
    Classifier { combination: String, reason: String },
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },
    #[error("no bus assigned to {0}")]
    NotAssigned(String),
    #[error("{0} access required")]
    Forbidden(&'static str),
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to parse json: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Error::Validation {
            field,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
