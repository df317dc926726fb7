//! Error types for the login-audit application.
//!
//! Uses `thiserror` for library-style errors with automatic `Display` and `Error` implementations.

use thiserror::Error;

/// Top-level application error type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),
}

/// Platform API errors surfaced to callers of the transport.
///
/// Retryable failures (429, 5xx, network) never appear here until the
/// attempt budget is spent.
#[derive(Error, Debug)]
pub enum ApiError {
    /// A non-retryable 4xx response.
    #[error("HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    /// A retryable failure that persisted for every allowed attempt.
    #[error("{message} (gave up after {attempts} attempts{})", status_suffix(.status))]
    RetryExhausted {
        /// `None` when the last attempt failed below the HTTP layer.
        status: Option<u16>,
        message: String,
        attempts: u32,
    },

    #[error("Failed to parse API response: {0}")]
    ParseFailed(String),

    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(", last HTTP {}", s)).unwrap_or_default()
}

impl ApiError {
    /// HTTP status associated with the failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            Self::RetryExhausted { status, .. } => *status,
            _ => None,
        }
    }

    /// Returns a user-friendly message for console output.
    pub fn user_message(&self) -> &str {
        match self {
            Self::Rejected { status: 401, .. } => "The API token was rejected. Check the token.",
            Self::Rejected { status: 403, .. } => {
                "The API token lacks permission for this operation."
            }
            Self::Rejected { .. } => "The platform rejected the request.",
            Self::RetryExhausted { status: Some(429), .. } => {
                "Rate limit exceeded. Please wait a moment and run again."
            }
            Self::RetryExhausted { status: None, .. } => "Network error. Check your connection.",
            Self::RetryExhausted { .. } => "The platform is unavailable. Please try again later.",
            Self::ParseFailed(_) => "Unexpected response from the platform.",
            Self::InvalidUrl(_) | Self::Client(_) => "Configuration error. Please check settings.",
        }
    }
}

/// CSV report errors.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[source] csv::Error),
}

impl From<csv::Error> for ReportError {
    /// Keep write failures (full disk, closed handle) in the I/O class.
    fn from(err: csv::Error) -> Self {
        if !err.is_io_error() {
            return Self::Csv(err);
        }
        match err.into_kind() {
            csv::ErrorKind::Io(e) => Self::Io(e),
            other => Self::Io(std::io::Error::other(format!("{:?}", other))),
        }
    }
}

impl AppError {
    /// Returns a user-friendly message for console output.
    pub fn user_message(&self) -> &str {
        match self {
            Self::Api(e) => e.user_message(),
            Self::Report(_) => "Failed to write the report file.",
        }
    }
}
