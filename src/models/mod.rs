// src/models/mod.rs

//! Domain models for the export pipeline.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod chapter;
mod config;
pub(crate) mod record;

// Re-export all public types
pub use chapter::Chapter;
pub use config::{
    ApiConfig, CATEGORY_FIELD, CategoryConfig, Config, FieldSpec, LoggingConfig, RetryConfig,
    StorageBackend, StorageConfig, SummaryConfig, TelegramConfig,
};
pub use record::{FieldValue, Record, Snapshot};
