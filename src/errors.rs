use std::time::Duration;

use thiserror::Error;

use crate::core::models::HttpResponse;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timed out after {}ms", .timeout.as_millis())]
    Timeout { timeout: Duration },

    #[error("Network request failed: {source}")]
    Network {
        #[source]
        source: BoxError,
    },

    #[error("HTTP error {}: {}", .response.status.as_u16(), .response.url)]
    Http { response: Box<HttpResponse> },

    #[error("Failed to parse JSON response: {source}")]
    Parse {
        #[source]
        source: serde_json::Error,
    },

    #[error("Retry limit exceeded after {attempts} attempts: {last}")]
    RetryLimitExceeded {
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },

    #[error("Invalid request configuration: {0}")]
    Config(String),

    #[error("Invalid option `{field}`: {reason}")]
    Validation { field: String, reason: String },
}

impl FetchError {
    pub(crate) fn network<E>(source: E) -> Self
    where
        E: Into<BoxError>,
    {
        FetchError::Network {
            source: source.into(),
        }
    }

    pub(crate) fn validation(field: &str, reason: impl Into<String>) -> Self {
        FetchError::Validation {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Stable label used in log fields.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Timeout { .. } => "timeout",
            FetchError::Network { .. } => "network",
            FetchError::Http { .. } => "http",
            FetchError::Parse { .. } => "parse",
            FetchError::RetryLimitExceeded { .. } => "retry_limit_exceeded",
            FetchError::Config(_) => "config",
            FetchError::Validation { .. } => "validation",
        }
    }

    /// HTTP status of the failing response, looking through exhausted retries.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Http { response } => Some(response.status.as_u16()),
            FetchError::RetryLimitExceeded { last, .. } => last.status(),
            _ => None,
        }
    }

    #[must_use]
    pub fn response(&self) -> Option<&HttpResponse> {
        match self {
            FetchError::Http { response } => Some(response),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout { .. })
    }

    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, FetchError::Network { .. })
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(error: serde_json::Error) -> Self {
        FetchError::Parse { source: error }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            // reqwest does not expose the configured duration
            FetchError::Timeout {
                timeout: Duration::ZERO,
            }
        } else {
            FetchError::network(error)
        }
    }
}
