//! Failure classification for tracked calls.
//!
//! Every tracked call that does not succeed carries a [`FailureReason`], the
//! human-readable text that ends up in the failure table of the final report.
//! Each reason also maps to an [`ErrorCategory`], a coarse label used for the
//! Prometheus failure counters.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Categories of errors that can occur during load testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// HTTP 4xx errors (client errors)
    ClientError,

    /// HTTP 5xx errors (server errors)
    ServerError,

    /// Network connectivity errors (DNS, connection refused, etc.)
    NetworkError,

    /// Request timeout errors, or responses slower than the allowed bound
    TimeoutError,

    /// TLS/SSL certificate errors
    TlsError,

    /// A 2xx response whose body did not contain what the task needs
    PayloadError,

    /// Other/unknown errors
    OtherError,
}

impl ErrorCategory {
    /// Categorize an HTTP status code.
    ///
    /// Returns None for 2xx/3xx responses.
    pub fn from_status_code(status_code: u16) -> Option<Self> {
        match status_code {
            200..=399 => None,
            400..=499 => Some(ErrorCategory::ClientError),
            500..=599 => Some(ErrorCategory::ServerError),
            _ => Some(ErrorCategory::OtherError),
        }
    }

    /// Categorize a reqwest error.
    pub fn from_reqwest_error(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            ErrorCategory::TimeoutError
        } else if error.is_connect() || error.is_request() || error.is_body() {
            ErrorCategory::NetworkError
        } else if error.is_decode() {
            ErrorCategory::PayloadError
        } else if error.is_redirect() {
            ErrorCategory::ClientError
        } else {
            let error_msg = error.to_string().to_lowercase();

            if error_msg.contains("certificate")
                || error_msg.contains("tls")
                || error_msg.contains("ssl")
            {
                ErrorCategory::TlsError
            } else if error_msg.contains("timed out") || error_msg.contains("timeout") {
                ErrorCategory::TimeoutError
            } else if error_msg.contains("dns") || error_msg.contains("connection") {
                ErrorCategory::NetworkError
            } else {
                ErrorCategory::OtherError
            }
        }
    }

    /// Get the Prometheus label for this error category.
    pub fn label(&self) -> &'static str {
        match self {
            ErrorCategory::ClientError => "client_error",
            ErrorCategory::ServerError => "server_error",
            ErrorCategory::NetworkError => "network_error",
            ErrorCategory::TimeoutError => "timeout_error",
            ErrorCategory::TlsError => "tls_error",
            ErrorCategory::PayloadError => "payload_error",
            ErrorCategory::OtherError => "other_error",
        }
    }

    /// Get a human-readable description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCategory::ClientError => "HTTP 4xx Client Errors",
            ErrorCategory::ServerError => "HTTP 5xx Server Errors",
            ErrorCategory::NetworkError => "Network/Connection Errors",
            ErrorCategory::TimeoutError => "Timeouts and Slow Responses",
            ErrorCategory::TlsError => "TLS/SSL Certificate Errors",
            ErrorCategory::PayloadError => "Unexpected Response Payloads",
            ErrorCategory::OtherError => "Other/Unknown Errors",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Why a tracked call was classified as a failure.
///
/// The `Display` text is what gets reported, so the formats are fixed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The server answered with a status the call does not accept.
    #[error("Status: {0}")]
    Status(u16),

    /// The call took longer than the allowed response time.
    #[error("Timeout: {:.2}s", .elapsed.as_secs_f64())]
    Timeout { elapsed: Duration },

    /// The response (or a follow-up step inside the same scope) could not be processed.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// An upload succeeded but the body carried neither `id` nor `file_id`.
    #[error("No file_id in response")]
    MissingFileId,

    /// The request never produced a response.
    #[error("Request error: {message}")]
    Transport {
        category: ErrorCategory,
        message: String,
    },
}

impl FailureReason {
    /// Builds the failure for a call whose transport raised an error.
    ///
    /// Timeouts are reported with the measured elapsed time so they read the
    /// same as a slow-but-successful response.
    pub fn from_reqwest(error: &reqwest::Error, elapsed: Duration) -> Self {
        let category = ErrorCategory::from_reqwest_error(error);
        if category == ErrorCategory::TimeoutError {
            FailureReason::Timeout { elapsed }
        } else {
            FailureReason::Transport {
                category,
                message: error.to_string(),
            }
        }
    }

    /// The category this failure is counted under.
    pub fn category(&self) -> ErrorCategory {
        match self {
            FailureReason::Status(code) => {
                ErrorCategory::from_status_code(*code).unwrap_or(ErrorCategory::OtherError)
            }
            FailureReason::Timeout { .. } => ErrorCategory::TimeoutError,
            FailureReason::InvalidResponse(_) | FailureReason::MissingFileId => {
                ErrorCategory::PayloadError
            }
            FailureReason::Transport { category, .. } => *category,
        }
    }
}
