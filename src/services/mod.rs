// src/services/mod.rs

//! External service clients.
//!
//! - [`AwardForceClient`]: paginated, authenticated entry and chapter listings
//! - [`TelegramTransport`]: bot `sendMessage`

mod award_force;
mod telegram;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Chapter, Record};

pub use award_force::AwardForceClient;
pub use telegram::TelegramTransport;

/// Source of the complete current record set.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Every record across every page; never a partial set.
    async fn fetch_records(&self) -> Result<Vec<Record>>;

    /// Active chapters for the chapter tally.
    async fn fetch_chapters(&self) -> Result<Vec<Chapter>>;
}

/// A single plain-text message delivery.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Send one message; returns the platform message id.
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<i64>;
}
