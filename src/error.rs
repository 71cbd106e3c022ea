//! Defines the custom error types for the email-cleaner application.

use crate::models::JobState;
use std::io;
use thiserror::Error;
use url::ParseError as UrlParseError;

/// The primary error type for the validation pipeline.
#[derive(Error, Debug)]
pub enum AppError {
    /// The normalized address list has zero entries; nothing was submitted.
    #[error("No email addresses found in the input")]
    EmptyInput,

    /// The uploaded file is neither CSV nor a spreadsheet.
    #[error("Unsupported file type: {0}. Please upload a CSV or Excel file")]
    UnsupportedFileType(String),

    /// The file content could not be loaded or decoded as text.
    #[error("Failed to read the file: {0}")]
    FileRead(String),

    /// The validation service rejected the call or could not be reached.
    /// Carries the service-provided message verbatim.
    #[error("{0}")]
    ValidationService(String),

    /// A tracker operation was attempted from a state that does not allow it.
    #[error("Cannot {action} while job is {from}")]
    InvalidTransition {
        /// State the job was in.
        from: JobState,
        /// The rejected operation.
        action: &'static str,
    },

    /// Error occurring during configuration loading or validation.
    #[error("Configuration Error: {0}")]
    Config(String),

    /// Error related to file input/output operations.
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),

    /// Error during JSON serialization or deserialization.
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error parsing a URL.
    #[error("URL Parsing Error: {0}")]
    UrlParse(#[from] UrlParseError),
}

impl AppError {
    /// True for the four error kinds a user can recover from by restarting the flow.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            AppError::EmptyInput
                | AppError::UnsupportedFileType(_)
                | AppError::FileRead(_)
                | AppError::ValidationService(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
