// src/error.rs

//! Unified error handling for the export pipeline.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for export operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or invalid configuration/credentials
    #[error("Configuration error: {0}")]
    Config(String),

    /// The awards platform rejected the API key
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Network failure or 5xx response
    #[error("Transient error: {0}")]
    Transient(String),

    /// The remote side asked us to slow down
    #[error("Rate limited by {context}")]
    RateLimited {
        context: String,
        retry_after: Option<Duration>,
    },

    /// The persisted baseline could not be read back
    #[error("Corrupt state: {0}")]
    CorruptState(String),

    /// Notification could not be delivered
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// Non-retryable API response (unexpected status or payload)
    #[error("API error for {context}: {message}")]
    Api { context: String, message: String },

    /// AWS S3 error
    #[error("S3 error: {0}")]
    S3(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a corrupt state error.
    pub fn corrupt_state(message: impl Into<String>) -> Self {
        Self::CorruptState(message.into())
    }

    /// Create a delivery error.
    pub fn delivery(message: impl Into<String>) -> Self {
        Self::Delivery(message.into())
    }

    /// Create an API error with context.
    pub fn api(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Api {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Classify a transport-level `reqwest` failure.
    ///
    /// Timeouts, connection failures and interrupted bodies are transient.
    /// Anything else (builder misuse, redirect loops, decoding) is not worth
    /// retrying.
    pub fn from_reqwest(context: &str, err: reqwest::Error) -> Self {
        // The URL may embed the bot token; never let it reach a log line.
        let err = err.without_url();
        if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
            Self::Transient(format!("{context}: {err}"))
        } else {
            Self::api(context, err)
        }
    }

    /// Whether a bounded retry may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::RateLimited { .. })
    }

    /// Server-advised wait before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Process exit status for operator triage.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::Toml(_) | Self::Url(_) => 2,
            Self::Auth(_) => 3,
            Self::Transient(_) | Self::RateLimited { .. } => 4,
            Self::Delivery(_) => 5,
            Self::CorruptState(_) => 6,
            Self::Api { .. } | Self::S3(_) | Self::Io(_) | Self::Json(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classes() {
        assert!(AppError::Transient("503".into()).is_retryable());
        assert!(
            AppError::RateLimited {
                context: "entries".into(),
                retry_after: None
            }
            .is_retryable()
        );
        assert!(!AppError::Auth("401".into()).is_retryable());
        assert!(!AppError::delivery("chat not found").is_retryable());
        assert!(!AppError::api("entries", "404").is_retryable());
    }

    #[test]
    fn test_exit_codes_are_distinct() {
        let codes = [
            AppError::config("missing").exit_code(),
            AppError::Auth("401".into()).exit_code(),
            AppError::Transient("timeout".into()).exit_code(),
            AppError::delivery("failed").exit_code(),
            AppError::corrupt_state("bad").exit_code(),
            AppError::api("entries", "404").exit_code(),
        ];
        let unique: std::collections::HashSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), codes.len());
        assert!(codes.iter().all(|c| *c != 0));
    }

    #[test]
    fn test_retry_after_only_for_rate_limit() {
        let err = AppError::RateLimited {
            context: "telegram".into(),
            retry_after: Some(Duration::from_secs(5)),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(5)));
        assert_eq!(AppError::Transient("x".into()).retry_after(), None);
    }
}
