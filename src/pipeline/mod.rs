//! Pipeline stages for an export run.
//!
//! - `diff`: classify records against the baseline
//! - `summary`: per-chapter tally for the notification header
//! - `render` / `notify`: text rendering and delivery
//! - `run`: the orchestrator tying the stages to the state store

pub mod diff;
pub mod notify;
pub mod render;
pub mod run;
pub mod summary;

use chrono::Utc;

use crate::config::Credentials;
use crate::error::Result;
use crate::models::{CATEGORY_FIELD, Config};
use crate::services::{AwardForceClient, TelegramTransport};
use crate::storage::StateStore;
use crate::utils::report_date;

pub use diff::{Delta, DiffCalculator, compute_delta};
pub use notify::{Ack, Notifier, NotifyOutcome};
pub use run::{Orchestrator, RunReport, RunSettings, RunStage};

/// Settings for one run derived from the configuration.
pub fn run_settings(config: &Config, chat_id: &str) -> RunSettings {
    let tracked = config
        .api
        .fields
        .iter()
        .map(|f| f.name.clone())
        .chain(std::iter::once(CATEGORY_FIELD.to_string()))
        .collect();

    RunSettings {
        chat_id: chat_id.to_string(),
        title: config.telegram.title.clone(),
        report_date: report_date(Utc::now(), config.telegram.utc_offset_hours),
        summary: config.summary.enabled.then(|| config.summary.clone()),
        categories: config.api.categories.iter().map(|c| c.key.clone()).collect(),
        tracked_fields: Some(tracked),
    }
}

/// Run one export against the live platform and chat.
pub async fn run_export(
    config: &Config,
    credentials: &Credentials,
    store: &dyn StateStore,
) -> Result<RunReport> {
    let retry = config.retry.policy();
    let source = AwardForceClient::new(
        &config.api,
        &config.summary,
        retry,
        &credentials.api_key,
    )?;
    let transport = TelegramTransport::new(&config.telegram, &credentials.bot_token)?;
    let notifier = Notifier::new(
        &transport,
        retry,
        config.telegram.max_message_chars,
        config.telegram.part_delay(),
    );

    Orchestrator::new(
        &source,
        store,
        notifier,
        run_settings(config, &credentials.chat_id),
    )
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_settings_track_configured_fields_and_category() {
        let settings = run_settings(&Config::default(), "@updates");
        assert_eq!(
            settings.tracked_fields,
            Some(vec![
                "title".to_string(),
                "status".to_string(),
                "chapter".to_string(),
                "category".to_string(),
            ])
        );
        assert!(settings.summary.is_some());
        assert_eq!(settings.categories, vec!["13_17".to_string(), "above18".to_string()]);
        assert_eq!(settings.report_date.len(), 10);
    }

    #[test]
    fn test_disabled_summary() {
        let mut config = Config::default();
        config.summary.enabled = false;
        assert!(run_settings(&config, "1").summary.is_none());
    }
}
