// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};

use crate::error::{AppError, Result};
use crate::models::{ApiConfig, TelegramConfig};

const USER_AGENT: &str = concat!("award-export/", env!("CARGO_PKG_VERSION"));

/// Create the awards-platform client with its authentication headers.
pub fn create_api_client(config: &ApiConfig, api_key: &str) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, header_value("api.accept", &config.accept)?);
    let mut key = header_value("CF_API_KEY", api_key)?;
    key.set_sensitive(true);
    headers.insert(HeaderName::from_static("x-api-key"), key);
    headers.insert(
        HeaderName::from_static("x-api-language"),
        header_value("api.language", &config.language)?,
    );

    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| AppError::config(format!("Failed to build API client: {e}")))
}

/// Create the messaging transport client.
pub fn create_telegram_client(config: &TelegramConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| AppError::config(format!("Failed to build Telegram client: {e}")))
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| AppError::config(format!("{name} is not a valid header value")))
}

/// Parse a `Retry-After` header given in seconds.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Map a non-success awards-platform status to the error taxonomy.
pub fn classify_status(
    context: &str,
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> AppError {
    let snippet: String = body.chars().take(200).collect();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AppError::Auth(format!("{context}: {status}"))
        }
        StatusCode::TOO_MANY_REQUESTS => AppError::RateLimited {
            context: context.to_string(),
            retry_after,
        },
        StatusCode::REQUEST_TIMEOUT => AppError::Transient(format!("{context}: {status}")),
        s if s.is_server_error() => AppError::Transient(format!("{context}: {status} {snippet}")),
        s => AppError::api(context, format!("{s} {snippet}")),
    }
}
