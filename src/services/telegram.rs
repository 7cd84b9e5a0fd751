// src/services/telegram.rs

//! Telegram Bot API transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::TelegramConfig;
use crate::services::MessageTransport;
use crate::utils::http;

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    result: Option<SentMessage>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

/// Sends plain-text messages through a bot.
pub struct TelegramTransport {
    client: Client,
    endpoint: String,
}

impl TelegramTransport {
    pub fn new(config: &TelegramConfig, bot_token: &str) -> Result<Self> {
        let client = http::create_telegram_client(config)?;
        Ok(Self::with_client(client, &config.api_base, bot_token))
    }

    pub fn with_client(client: Client, api_base: &str, bot_token: &str) -> Self {
        Self {
            client,
            endpoint: format!(
                "{}/bot{}/sendMessage",
                api_base.trim_end_matches('/'),
                bot_token
            ),
        }
    }

    fn classify(status: StatusCode, response: Option<ApiResponse>) -> AppError {
        let description = response
            .as_ref()
            .and_then(|r| r.description.clone())
            .unwrap_or_else(|| status.to_string());

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .and_then(|r| r.parameters)
                .and_then(|p| p.retry_after)
                .map(Duration::from_secs);
            return AppError::RateLimited {
                context: "telegram".into(),
                retry_after,
            };
        }
        if status.is_server_error() {
            return AppError::Transient(format!("telegram: {description}"));
        }
        AppError::delivery(format!("telegram rejected message ({status}): {description}"))
    }
}

#[async_trait]
impl MessageTransport for TelegramTransport {
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<i64> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&SendMessage {
                chat_id,
                text,
                disable_web_page_preview: true,
            })
            .send()
            .await
            .map_err(|e| AppError::from_reqwest("telegram", e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::from_reqwest("telegram", e))?;
        let parsed: Option<ApiResponse> = serde_json::from_slice(&body).ok();

        match parsed {
            Some(ApiResponse {
                ok: true,
                result: Some(sent),
                ..
            }) if status.is_success() => Ok(sent.message_id),
            other => Err(Self::classify(status, other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_server::{Reply, TestServer};

    fn transport(base_url: &str) -> TelegramTransport {
        let config = TelegramConfig {
            api_base: base_url.to_string(),
            ..TelegramConfig::default()
        };
        TelegramTransport::new(&config, "123:ABC").unwrap()
    }

    #[tokio::test]
    async fn test_send_text_posts_json() {
        let server = TestServer::start(|_, _| {
            Reply::json(200, r#"{"ok":true,"result":{"message_id":77}}"#)
        })
        .await;

        let id = transport(&server.base_url)
            .send_text("-100200", "hello")
            .await
            .unwrap();
        assert_eq!(id, 77);

        let requests = server.requests();
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].path(), "/bot123:ABC/sendMessage");
        let body: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
        assert_eq!(body["chat_id"], "-100200");
        assert_eq!(body["text"], "hello");
    }

    #[tokio::test]
    async fn test_rate_limit_carries_retry_after() {
        let server = TestServer::start(|_, _| {
            Reply::json(
                429,
                r#"{"ok":false,"error_code":429,"description":"Too Many Requests: retry after 3","parameters":{"retry_after":3}}"#,
            )
        })
        .await;

        let err = transport(&server.base_url)
            .send_text("1", "x")
            .await
            .unwrap_err();
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
    }

    #[tokio::test]
    async fn test_bad_chat_is_delivery_error() {
        let server = TestServer::start(|_, _| {
            Reply::json(
                400,
                r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#,
            )
        })
        .await;

        let err = transport(&server.base_url)
            .send_text("1", "x")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Delivery(ref m) if m.contains("chat not found")));
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = TestServer::start(|_, _| Reply::json(502, "<html>bad gateway</html>")).await;

        let err = transport(&server.base_url)
            .send_text("1", "x")
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
