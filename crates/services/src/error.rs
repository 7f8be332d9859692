//! Shared error types for the services crate.

use reqwest::StatusCode;
use thiserror::Error;

/// Fallback text shown when a failed response carries no usable message.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";

/// How a failed HTTP status is handled at the client boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// 401: forced logout and a redirect to the login route.
    Unauthorized,
    /// 408/504: retried transparently, session preserved.
    Retryable,
    /// Any other 4xx/5xx: surfaced to the user.
    Application,
}

impl ErrorCategory {
    /// Returns `None` for statuses that are not errors.
    #[must_use]
    pub fn from_status(status: StatusCode) -> Option<Self> {
        match status {
            StatusCode::UNAUTHORIZED => Some(Self::Unauthorized),
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => Some(Self::Retryable),
            s if s.is_client_error() || s.is_server_error() => Some(Self::Application),
            _ => None,
        }
    }
}

/// Errors emitted by `ApiClient`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("session expired or not authorized")]
    Unauthorized,
    #[error("request failed with status {status}: {message}")]
    Status { status: StatusCode, message: String },
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response body: {0}")]
    Decode(String),
    #[error(transparent)]
    Url(#[from] url::ParseError),
}

impl ApiError {
    /// Text suitable for a user-visible notification.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Unauthorized => "Your session has expired. Please log in again.".into(),
            ApiError::Status { message, .. } => message.clone(),
            ApiError::Transport(err) if err.is_timeout() || err.is_connect() => {
                "Unable to reach the server. Check your connection and try again.".into()
            }
            _ => GENERIC_ERROR_MESSAGE.into(),
        }
    }

    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Unauthorized => Some(StatusCode::UNAUTHORIZED),
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport(err) => err.status(),
            _ => None,
        }
    }
}

/// Errors emitted by `ProgressTracker`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("no user is logged in")]
    NotLoggedIn,
    #[error("failed to submit completion")]
    Submit(#[source] ApiError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Errors emitted while loading client configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("invalid value for {name}: {raw}")]
    Invalid { name: &'static str, raw: String },
    #[error(transparent)]
    Url(#[from] url::ParseError),
}
