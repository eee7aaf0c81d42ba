use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing credential: {0}")]
    Credentials(String),

    #[error("Transport error: {reason}")]
    Transport { reason: String },

    #[error("Could not open upload session (status {status}): {body}")]
    SessionOpen { status: u16, body: String },

    #[error("Upload rejected at offset {offset} (status {status}): {body}")]
    TransferRejected { offset: u64, status: u16, body: String },

    #[error("Upload failed at offset {offset} after {attempts} attempts: {reason}")]
    TransferFailed {
        offset: u64,
        attempts: u32,
        reason: String,
    },

    #[error("Publish rejected (status {status}): {body}")]
    PublishRejected { status: u16, body: String },

    #[error("API error during {operation} (status {status}): {body}")]
    Api {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("Place not found for query '{query}'")]
    PlaceNotFound { query: String },

    #[error("Place lookup failed: {reason}")]
    PlaceResolution { reason: String },

    #[error("Processing of sequence {sequence_id} failed: {reason}")]
    ProcessingFailed { sequence_id: String, reason: String },

    #[error("Sequence {sequence_id} still {last_state} after {elapsed:?}")]
    ProcessingTimeout {
        sequence_id: String,
        last_state: String,
        elapsed: Duration,
    },

    #[error("Cancelled during {stage}")]
    Cancelled { stage: &'static str },
}

/// Custom result type
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn invalid_input(field: &str, message: &str) -> Self {
        Self::InvalidInput {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    pub fn place_resolution(reason: impl Into<String>) -> Self {
        Self::PlaceResolution {
            reason: reason.into(),
        }
    }

    pub fn cancelled(stage: &'static str) -> Self {
        Self::Cancelled { stage }
    }

    /// Only connectivity-level failures are worth another attempt. HTTP status
    /// based retries are decided by the retry policy, not here.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Transport { .. })
    }

    /// Pipeline stage the error originated from, for user-facing messages.
    pub fn stage(&self) -> &'static str {
        match self {
            AppError::InvalidInput { .. } => "input validation",
            AppError::Config(_) => "configuration",
            AppError::Credentials(_) => "credentials",
            AppError::Io(_) => "file access",
            AppError::Json(_) => "response parsing",
            AppError::Transport { .. } => "network",
            AppError::SessionOpen { .. } => "open upload session",
            AppError::TransferRejected { .. } | AppError::TransferFailed { .. } => "media transfer",
            AppError::PublishRejected { .. } => "publish",
            AppError::Api { operation, .. } => *operation,
            AppError::PlaceNotFound { .. } | AppError::PlaceResolution { .. } => {
                "place resolution"
            }
            AppError::ProcessingFailed { .. } | AppError::ProcessingTimeout { .. } => {
                "sequence processing"
            }
            AppError::Cancelled { stage } => *stage,
        }
    }
}

/// Truncate a response body for logs and error messages.
pub fn excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    match text.char_indices().nth(300) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.into_owned(),
    }
}
