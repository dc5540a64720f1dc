use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Errors surfaced to callers of [`crate::ApiClient`].
///
/// Every variant maps onto the `{status, data}` pair that feature code
/// reports to the user; see [`ApiError::status`] and [`ApiError::data`].
#[derive(Debug, Error, Clone)]
pub enum ApiError {
    #[error("transport error: {message}")]
    Transport { message: String, timed_out: bool },
    #[error("request failed: {status}")]
    Status { status: StatusCode, data: Value },
    #[error("session expired")]
    SessionExpired,
    #[error("domain error {code}: {message}")]
    Domain {
        code: Value,
        message: String,
        result: Value,
    },
    #[error("invalid response body: {0}")]
    Decode(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::SessionExpired => Some(StatusCode::UNAUTHORIZED),
            _ => None,
        }
    }

    #[must_use]
    pub fn data(&self) -> Value {
        match self {
            Self::Status { data, .. } => data.clone(),
            Self::Domain { message, .. } => Value::String(message.clone()),
            other => Value::String(other.to_string()),
        }
    }

    /// Best-effort human message: the server's `message` field when the body
    /// carries one, otherwise the raw data.
    #[must_use]
    pub fn message(&self) -> String {
        match self.data() {
            Value::String(text) => text,
            Value::Object(map) => map
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| Value::Object(map).to_string()),
            other => other.to_string(),
        }
    }

    #[must_use]
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport { timed_out: true, .. })
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        Self::Transport {
            message: err.message,
            timed_out: err.timed_out,
        }
    }
}

/// No response was obtained from the server.
#[derive(Debug, Error, Clone)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    pub timed_out: bool,
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self {
            timed_out: err.is_timeout(),
            message: err.to_string(),
        }
    }
}

/// Why a refresh cycle failed. Delivered to every queued waiter, so it is
/// cheap to clone.
#[derive(Debug, Error, Clone)]
pub enum RefreshError {
    #[error("refresh rejected: {status}")]
    Rejected { status: StatusCode, body: String },
    #[error("refresh transport error: {0}")]
    Transport(String),
    #[error("refresh timed out after {0:?}")]
    TimedOut(Duration),
    #[error("refresh response missing token: {0}")]
    Malformed(String),
    #[error("refresh cancelled")]
    Cancelled,
    #[error("session ended while refreshing")]
    SessionEnded,
}
