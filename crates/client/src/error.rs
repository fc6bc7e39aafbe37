//! Error taxonomy for the client core
//!
//! Two levels: [`TransportError`] is what an executor produces (timeout,
//! connection failure, cancellation, or a non-success response carrying
//! status and raw body), and [`ApiError`] is its classified form with a
//! retryability verdict. Classification is the only place response bodies
//! are inspected: known server error shapes (`message`, `errors: {field:
//! [strings]}`) are extracted with serde, anything else stays [`ApiError::Unknown`].

use std::collections::HashMap;

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Longest slice of a response body carried into an error message
const BODY_SNIPPET_CHARS: usize = 200;

/// Transport-level failure produced by a request executor
///
/// Executors are the only producers; the dispatch loop never assembles
/// one of these from partial information. All payloads are owned so the
/// type can be cloned into scripted test sequences.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The attempt exceeded the configured timeout
    #[error("request timed out")]
    Timeout,

    /// The connection could not be established or was dropped
    #[error("connection failure: {0}")]
    ConnectionFailure(String),

    /// The caller's cancellation signal fired mid-flight
    #[error("request cancelled")]
    Cancelled,

    /// The server answered with a non-success status
    #[error("bad response ({status})")]
    BadResponse {
        /// HTTP status of the response
        status: StatusCode,
        /// Raw response body, undecoded
        body: String,
    },

    /// Anything the executor could not identify
    #[error("transport error: {0}")]
    Unknown(String),
}

/// Application-meaningful failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Credential rejected; recovered through a refresh cycle
    Unauthorized,
    /// Request payload rejected with per-field detail; never retried
    Validation,
    /// Resource missing; never retried
    NotFound,
    /// Server-side failure (5xx); retryable
    Server,
    /// Connection-level failure; retryable
    Network,
    /// Attempt timed out; retryable
    Timeout,
    /// Cancelled by the caller; never retried
    Cancelled,
    /// Unrecognized failure; never retried
    Unknown,
}

/// Classified request failure surfaced to callers
///
/// Transient variants carry the retry count observed when the error was
/// surfaced, mirroring how exhausted-attempt errors report themselves in
/// retry executors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The server rejected the presented credential (401)
    #[error("unauthorized: {message}")]
    Unauthorized {
        /// Server-provided message, when one was recognized
        message: String,
    },

    /// The server rejected the payload with field-level detail (400/422)
    #[error("validation failed: {message}")]
    Validation {
        /// Top-level rejection message
        message: String,
        /// Per-field error lists as sent by the server
        field_errors: HashMap<String, Vec<String>>,
    },

    /// The resource does not exist (404)
    #[error("not found: {message}")]
    NotFound {
        /// Server-provided message, when one was recognized
        message: String,
    },

    /// Server-side failure (5xx)
    #[error("server error ({status}): {message}")]
    Server {
        /// HTTP status of the response
        status: StatusCode,
        /// Server-provided message or body snippet
        message: String,
        /// Retries performed before surfacing
        retries: u32,
    },

    /// Connection-level failure
    #[error("network error: {message}")]
    Network {
        /// Executor-provided cause
        message: String,
        /// Retries performed before surfacing
        retries: u32,
    },

    /// The attempt timed out
    #[error("request timed out after {retries} retries")]
    Timeout {
        /// Retries performed before surfacing
        retries: u32,
    },

    /// The caller cancelled the request
    #[error("request cancelled")]
    Cancelled,

    /// Unrecognized failure shape
    #[error("unexpected error: {message}")]
    Unknown {
        /// Body snippet or executor-provided cause
        message: String,
        /// HTTP status when the failure came from a response
        status: Option<StatusCode>,
    },
}

/// Recognized server error body shape
///
/// `{"message": "...", "errors": {"field": ["problem", …]}}` with both
/// keys optional. A body that fails this parse is an unknown shape and is
/// never guessed into `Validation`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    errors: Option<HashMap<String, Vec<String>>>,
}

impl ApiError {
    /// Get the category for this error
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Unauthorized { .. } => ErrorCategory::Unauthorized,
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Server { .. } => ErrorCategory::Server,
            Self::Network { .. } => ErrorCategory::Network,
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::Cancelled => ErrorCategory::Cancelled,
            Self::Unknown { .. } => ErrorCategory::Unknown,
        }
    }

    /// Check if this error is worth another attempt
    ///
    /// Unauthorized counts as retryable because it is recovered through a
    /// credential refresh rather than a plain resubmission; Validation,
    /// NotFound, Cancelled, and Unknown are terminal by construction.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Unauthorized
                | ErrorCategory::Server
                | ErrorCategory::Network
                | ErrorCategory::Timeout
        )
    }

    /// Retries performed before this error was surfaced
    ///
    /// `Some` for transient variants, `None` for errors that surface on
    /// first occurrence.
    #[must_use]
    pub fn retries(&self) -> Option<u32> {
        match self {
            Self::Server { retries, .. }
            | Self::Network { retries, .. }
            | Self::Timeout { retries } => Some(*retries),
            _ => None,
        }
    }

    /// Stamp the final retry count onto a transient error
    pub(crate) fn with_retries(mut self, count: u32) -> Self {
        match &mut self {
            Self::Server { retries, .. }
            | Self::Network { retries, .. }
            | Self::Timeout { retries } => *retries = count,
            _ => {}
        }
        self
    }

    fn classify_response(status: StatusCode, body: &str) -> Self {
        let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
        let message = parsed.as_ref().and_then(|b| b.message.clone());

        if status == StatusCode::UNAUTHORIZED {
            Self::Unauthorized {
                message: message.unwrap_or_else(|| "credential rejected".to_string()),
            }
        } else if status == StatusCode::NOT_FOUND {
            Self::NotFound { message: message.unwrap_or_else(|| "resource not found".to_string()) }
        } else if status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY {
            match parsed {
                Some(ErrorBody { message, errors }) if message.is_some() || errors.is_some() => {
                    Self::Validation {
                        message: message.unwrap_or_else(|| "request rejected".to_string()),
                        field_errors: errors.unwrap_or_default(),
                    }
                }
                _ => Self::Unknown { message: body_snippet(body), status: Some(status) },
            }
        } else if status.is_server_error() {
            Self::Server {
                status,
                message: message.unwrap_or_else(|| body_snippet(body)),
                retries: 0,
            }
        } else {
            Self::Unknown {
                message: message.unwrap_or_else(|| body_snippet(body)),
                status: Some(status),
            }
        }
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => Self::Timeout { retries: 0 },
            TransportError::ConnectionFailure(message) => Self::Network { message, retries: 0 },
            TransportError::Cancelled => Self::Cancelled,
            TransportError::BadResponse { status, body } => {
                Self::classify_response(status, &body)
            }
            TransportError::Unknown(message) => Self::Unknown { message, status: None },
        }
    }
}

fn body_snippet(body: &str) -> String {
    if body.is_empty() {
        return "<empty body>".to_string();
    }
    body.chars().take(BODY_SNIPPET_CHARS).collect()
}
