//! Error types for each pipeline stage.
//!
//! Stage errors are kept separate so the driver can attribute a failure to
//! the stage that produced it. [`Error`] wraps them for callers that only
//! need a single type.

use thiserror::Error;

/// A page could not be fetched.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("could not connect to {url}")]
    Connect { url: String },

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },
}

impl NetworkError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            NetworkError::Timeout { .. } | NetworkError::Connect { .. } => true,
            NetworkError::Status { status, .. } => *status == 429 || *status >= 500,
            NetworkError::Request { .. } => false,
        }
    }

    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        let url = url.to_string();
        if err.is_timeout() {
            NetworkError::Timeout { url }
        } else if err.is_connect() {
            NetworkError::Connect { url }
        } else if let Some(status) = err.status() {
            NetworkError::Status {
                url,
                status: status.as_u16(),
            }
        } else {
            NetworkError::Request {
                url,
                message: err.to_string(),
            }
        }
    }
}

/// HTML could not be turned into listing records.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("listing container `{selector}` not found in page")]
    MissingContainer { selector: String },

    #[error("listing card #{index} has no id attribute and no url")]
    MissingId { index: usize },

    #[error("invalid selector `{selector}` for {field}: {message}")]
    InvalidSelector {
        field: String,
        selector: String,
        message: String,
    },
}

/// A single field of a listing could not be normalized.
#[derive(Debug, Error, PartialEq)]
pub enum CleaningError {
    #[error("price `{text}` has no numeric content")]
    NoNumericContent { text: String },

    #[error("price `{text}` is negative")]
    NegativePrice { text: String },

    #[error("listing {id} has no cleaned price")]
    MissingPrice { id: String },
}

/// A listing could not be persisted or read back.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("could not create database directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored row {id} has malformed column `{column}`: {message}")]
    Corrupt {
        id: String,
        column: &'static str,
        message: String,
    },
}

/// Run output (CSV or report) could not be written.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration could not be read from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {key}")]
    Invalid { key: &'static str, value: String },

    #[error("could not read selector rules from {path}: {message}")]
    Selectors { path: String, message: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Any error the crate can produce.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Cleaning(#[from] CleaningError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_and_throttling_are_transient() {
        let url = "http://x".to_string();
        assert!(NetworkError::Status { url: url.clone(), status: 503 }.is_transient());
        assert!(NetworkError::Status { url: url.clone(), status: 429 }.is_transient());
        assert!(NetworkError::Timeout { url: url.clone() }.is_transient());
        assert!(!NetworkError::Status { url: url.clone(), status: 404 }.is_transient());
        assert!(!NetworkError::Request { url, message: "bad".into() }.is_transient());
    }
}
