//! Error Handling Module
//!
//! This module defines custom error types for dmarc2logger using the `thiserror` crate.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DmarcError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("File too large: {0}")]
    FileTooLarge(String),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No valid 'policy_published' and 'report_metadata' xml tags found; File: {}", file.display())]
    MissingMetadata { file: PathBuf },
}

impl DmarcError {
    /// True for the expected "malformed report" outcome, as opposed to a fault.
    pub fn is_missing_metadata(&self) -> bool {
        matches!(self, DmarcError::MissingMetadata { .. })
    }
}

pub type Result<T> = std::result::Result<T, DmarcError>;
