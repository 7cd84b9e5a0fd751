// src/config.rs

//! Configuration loading utilities.
//!
//! Non-secret settings come from an optional TOML file, secrets only from the
//! environment.

use std::fmt;
use std::path::Path;

use regex::Regex;

use crate::error::{AppError, Result};
use crate::models::Config;

/// Awards platform API key.
pub const API_KEY_VAR: &str = "CF_API_KEY";
/// Telegram bot token.
pub const BOT_TOKEN_VAR: &str = "BOT_TOKEN";
/// Destination chat: numeric id or `@channel`.
pub const CHAT_ID_VAR: &str = "TELEGRAM_CHAT_ID";

/// Secrets needed for a run.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub bot_token: String,
    pub chat_id: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

impl Credentials {
    /// Read credentials from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read credentials through `lookup`. Every missing or blank variable is
    /// reported in a single error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let read = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = read(API_KEY_VAR);
        let bot_token = read(BOT_TOKEN_VAR);
        let chat_id = read(CHAT_ID_VAR);

        let missing: Vec<&str> = [
            (API_KEY_VAR, api_key.is_none()),
            (BOT_TOKEN_VAR, bot_token.is_none()),
            (CHAT_ID_VAR, chat_id.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect();

        match (api_key, bot_token, chat_id) {
            (Some(api_key), Some(bot_token), Some(chat_id)) => {
                validate_chat_id(&chat_id)?;
                Ok(Self {
                    api_key,
                    bot_token,
                    chat_id,
                })
            }
            _ => Err(AppError::config(format!(
                "Missing environment variables: {}",
                missing.join(", ")
            ))),
        }
    }
}

/// Accept `-1001234567890`, `12345` or `@channel_name`.
fn validate_chat_id(chat_id: &str) -> Result<()> {
    let pattern = Regex::new(r"^(-?\d+|@\w+)$")
        .map_err(|e| AppError::config(format!("chat id pattern: {e}")))?;
    if pattern.is_match(chat_id) {
        Ok(())
    } else {
        Err(AppError::config(format!(
            "{CHAT_ID_VAR} must be a numeric chat id or an @username"
        )))
    }
}

/// Load configuration from a TOML file.
///
/// A missing file falls back to defaults. A file that exists but cannot be
/// read or parsed is a configuration error, as is a config that fails
/// validation.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        Config::load(path).map_err(|e| match e {
            AppError::Io(e) => AppError::config(format!("cannot read {}: {e}", path.display())),
            other => other,
        })?
    } else {
        log::warn!(
            "Config file {} not found. Using default configuration.",
            path.display()
        );
        Config::default()
    };

    config.validate()?;
    Ok(config)
}

/// Load and validate both the config file and the environment credentials.
pub fn load_all(config_path: &Path) -> Result<(Config, Credentials)> {
    let config = load_config(config_path)?;
    let credentials = Credentials::from_env()?;
    Ok((config, credentials))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_credentials_complete() {
        let creds = Credentials::from_lookup(env(&[
            (API_KEY_VAR, "key"),
            (BOT_TOKEN_VAR, "123:abc"),
            (CHAT_ID_VAR, " -1001234567890 "),
        ]))
        .unwrap();
        assert_eq!(creds.chat_id, "-1001234567890");
        assert!(!format!("{creds:?}").contains("123:abc"));
    }

    #[test]
    fn test_missing_credentials_reported_together() {
        let err = Credentials::from_lookup(env(&[(API_KEY_VAR, "key"), (BOT_TOKEN_VAR, "  ")]))
            .unwrap_err();
        match err {
            AppError::Config(msg) => {
                assert!(msg.contains(BOT_TOKEN_VAR));
                assert!(msg.contains(CHAT_ID_VAR));
                assert!(!msg.contains(API_KEY_VAR));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_chat_id_forms() {
        assert!(validate_chat_id("12345").is_ok());
        assert!(validate_chat_id("@award_updates").is_ok());
        assert!(validate_chat_id("award updates").is_err());
        assert!(validate_chat_id("-").is_err());
    }

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.api.per_page, 100);
    }

    #[test]
    fn test_load_config_rejects_invalid_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("award-export.toml");
        std::fs::write(&path, "[retry]\nmax_attempts = 0\n").unwrap();
        let err = load_config(&path).unwrap_err();
        assert_eq!(err.exit_code(), 2);

        std::fs::write(&path, "[api\n").unwrap();
        assert!(matches!(load_config(&path), Err(AppError::Toml(_))));
    }

    #[test]
    fn test_load_config_unreadable_file_is_config_error() {
        let tmp = TempDir::new().unwrap();
        // a directory exists but cannot be read as a file
        let err = load_config(tmp.path()).unwrap_err();
        assert!(matches!(err, AppError::Config(ref m) if m.contains("cannot read")));
        assert_eq!(err.exit_code(), 2);
    }
}
