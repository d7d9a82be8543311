//! Error types for the NSE data source.

use thiserror::Error;

/// Errors raised while talking to NSE or reading the local cache.
#[derive(Debug, Error)]
pub enum NseError {
    /// Connection or transport failure.
    #[error("network error: {0}")]
    Network(String),

    /// Request exceeded the configured timeout.
    #[error("request timeout: {0}")]
    Timeout(String),

    /// Non-success HTTP status.
    #[error("API error: {status_code} - {message}")]
    Api {
        status_code: u16,
        message: String,
    },

    /// The session cookies were rejected.
    #[error("session expired (status {status_code})")]
    SessionExpired { status_code: u16 },

    /// Response body could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Cache file could not be read or written.
    #[error("cache error: {0}")]
    Cache(String),
}

impl NseError {
    pub fn api(status_code: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status_code,
            message: message.into(),
        }
    }

    /// True when the same request may succeed if retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::SessionExpired { .. } => true,
            Self::Api { status_code, .. } => *status_code == 429 || *status_code >= 500,
            Self::Serialization(_) | Self::Cache(_) => false,
        }
    }
}

impl From<reqwest::Error> for NseError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Network(format!("connection failed: {err}"))
        } else if err.is_decode() {
            Self::Serialization(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for NseError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for NseError {
    fn from(err: std::io::Error) -> Self {
        Self::Cache(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NseError>;
