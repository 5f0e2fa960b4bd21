use thiserror::Error;

use crate::http::HttpError;

/// Reasons a local file is refused at intake.
///
/// Intake errors are synchronous and never leave partial state behind: the
/// offending file is simply not tracked.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IntakeError {
    #[error("Unsupported file type \"{extension}\" (allowed: {allowed})")]
    UnsupportedExtension { extension: String, allowed: String },

    #[error("File is too large ({size_label}, limit {limit_label})")]
    FileTooLarge {
        size: u64,
        size_label: String,
        limit_label: String,
    },

    #[error("Failed to read file: {0}")]
    Unreadable(String),
}

/// Failure of one step of the per-file transfer pipeline.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransferError {
    #[error("Failed to register file: {0}")]
    Create(String),

    #[error("Upload to storage failed: {0}")]
    Upload(String),

    #[error("Failed to confirm upload: {0}")]
    Acknowledge(String),

    #[error("Upload cancelled")]
    Cancelled,
}

impl TransferError {
    /// The user-facing message stored on the tracked item.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

/// Errors raised by the knowledge API client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("Request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),
}

impl ApiError {
    /// Build a status error from a non-2xx response body.
    ///
    /// The backend answers with `{"error": "..."}`; the raw text is used when
    /// the body is not in that shape.
    pub fn from_status(status: u16, body: &[u8]) -> Self {
        #[derive(serde::Deserialize)]
        struct ErrorBody {
            error: String,
        }

        let message = match serde_json::from_slice::<ErrorBody>(body) {
            Ok(parsed) => parsed.error,
            Err(_) => String::from_utf8_lossy(body).trim().to_owned(),
        };

        Self::Status { status, message }
    }
}
