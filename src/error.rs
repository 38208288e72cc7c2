use std::path::PathBuf;
use thiserror::Error;

use crate::types::ResultTable;

/// Failure of one OCR call. Always recoverable: the walker turns it into an empty row.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Could not read image {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Image preprocessing failed: {0}")]
    Preprocess(#[from] crate::preprocess::PreprocessError),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Unable to get access_token: {0}")]
    Auth(String),
    #[error("OCR service error {code}: {message}")]
    Service { code: i64, message: String },
    #[error("Malformed OCR response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for OcrError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            OcrError::Network(format!("check your internet connection and try again ({e})"))
        } else if e.is_decode() {
            OcrError::Malformed(e.to_string())
        } else {
            OcrError::Network(e.to_string())
        }
    }
}

#[derive(Debug, Error)]
#[error("Checkpoint store {path}: {source}")]
pub struct LedgerError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Cannot write Excel file: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid output path: {0}")]
    InvalidPath(String),
}

/// Errors that stop a whole run. Everything per-image is swallowed before it gets here.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Cannot read root directory {path}: {source}")]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    /// Recording a finished unit failed mid-run. `partial` holds the rows of units already recorded.
    #[error("{source} ({} row(s) from recorded units kept)", .partial.rows.len())]
    Interrupted {
        #[source]
        source: LedgerError,
        partial: ResultTable,
    },
    #[error("Export failed: {0}")]
    Export(#[from] ExportError),
}
