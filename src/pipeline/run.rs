// src/pipeline/run.rs

//! Run orchestration: fetch, diff, notify, commit.
//!
//! ```text
//! START -> FETCHED -> DIFFED -> NOTIFIED -> COMMITTED
//!   \________\__________\_________\_______> FAILED
//! ```
//!
//! The baseline is only replaced after the notification went out (or was
//! skipped because nothing changed). A failed delivery leaves the old
//! baseline in place so the next run reports the same changes again.

use std::fmt;

use crate::error::{AppError, Result};
use crate::models::{Snapshot, SummaryConfig};
use crate::pipeline::diff::{Delta, DiffCalculator};
use crate::pipeline::notify::{Notifier, NotifyOutcome};
use crate::pipeline::render::RenderContext;
use crate::pipeline::summary::ChapterSummary;
use crate::services::RecordSource;
use crate::storage::StateStore;

/// Position in the run state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunStage {
    Start,
    Fetched,
    Diffed,
    Notified,
    Committed,
    Failed,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "START",
            Self::Fetched => "FETCHED",
            Self::Diffed => "DIFFED",
            Self::Notified => "NOTIFIED",
            Self::Committed => "COMMITTED",
            Self::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Per-run settings that are not part of any collaborator.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub chat_id: String,
    pub title: String,
    pub report_date: String,
    /// `None` disables the chapter tally (and the chapter fetch)
    pub summary: Option<SummaryConfig>,
    /// Category keys, in the column order of the chapter tally
    pub categories: Vec<String>,
    /// Fields compared by the diff; `None` compares everything stored
    pub tracked_fields: Option<Vec<String>>,
}

/// What a successful run did.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub stage: RunStage,
    pub previous_count: usize,
    pub current_count: usize,
    /// The stored baseline was unreadable and replaced by an empty one
    pub baseline_recovered: bool,
    pub delta: Delta,
    pub notification: NotifyOutcome,
}

/// Sequences one export run over its collaborators.
pub struct Orchestrator<'a> {
    source: &'a dyn RecordSource,
    store: &'a dyn StateStore,
    notifier: Notifier<'a>,
    settings: RunSettings,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        source: &'a dyn RecordSource,
        store: &'a dyn StateStore,
        notifier: Notifier<'a>,
        settings: RunSettings,
    ) -> Self {
        Self {
            source,
            store,
            notifier,
            settings,
        }
    }

    /// Execute the run. Any error other than a corrupt baseline ends in FAILED.
    pub async fn run(&self) -> Result<RunReport> {
        let mut stage = RunStage::Start;
        match self.execute(&mut stage).await {
            Ok(report) => Ok(report),
            Err(e) => {
                log::error!("Run failed after {} -> {}: {}", stage, RunStage::Failed, e);
                Err(e)
            }
        }
    }

    async fn execute(&self, stage: &mut RunStage) -> Result<RunReport> {
        let (previous, baseline_recovered) = self.load_baseline().await?;

        log::info!("Step 1/4: Fetching current records");
        let current = Snapshot::from_records(self.source.fetch_records().await?);
        advance(stage, RunStage::Fetched);
        log::info!(
            "Fetched {} records (baseline: {})",
            current.len(),
            previous.len()
        );

        log::info!("Step 2/4: Computing changes");
        let calculator = match &self.settings.tracked_fields {
            Some(fields) => DiffCalculator::tracking(fields.iter().cloned()),
            None => DiffCalculator::new(),
        };
        let delta = calculator.calculate(&previous, &current);
        advance(stage, RunStage::Diffed);
        log::info!(
            "Delta: {} added, {} removed, {} changed, {} unchanged",
            delta.added.len(),
            delta.removed.len(),
            delta.changed.len(),
            delta.unchanged
        );

        log::info!("Step 3/4: Notifying");
        let ctx = self.render_context(&delta, &current).await?;
        let notification = self
            .notifier
            .send(&delta, &ctx, &self.settings.chat_id)
            .await?;
        advance(stage, RunStage::Notified);

        log::info!("Step 4/4: Committing baseline to {}", self.store.location());
        self.store.commit(&current).await?;
        advance(stage, RunStage::Committed);

        Ok(RunReport {
            stage: *stage,
            previous_count: previous.len(),
            current_count: current.len(),
            baseline_recovered,
            delta,
            notification,
        })
    }

    /// A corrupt baseline degrades to a first run; every other error aborts.
    async fn load_baseline(&self) -> Result<(Snapshot, bool)> {
        match self.store.load_previous().await {
            Ok(snapshot) => Ok((snapshot, false)),
            Err(AppError::CorruptState(reason)) => {
                log::warn!(
                    "Baseline at {} is unusable ({}); continuing with an empty baseline",
                    self.store.location(),
                    reason
                );
                Ok((Snapshot::new(), true))
            }
            Err(e) => Err(e),
        }
    }

    /// Chapters are only fetched when there is something to send.
    async fn render_context(&self, delta: &Delta, current: &Snapshot) -> Result<RenderContext> {
        let summary = match &self.settings.summary {
            Some(config) if delta.has_changes() => {
                let chapters = self.source.fetch_chapters().await?;
                Some(ChapterSummary::tally(
                    current,
                    &chapters,
                    &self.settings.categories,
                    config,
                ))
            }
            _ => None,
        };

        Ok(RenderContext {
            title: self.settings.title.clone(),
            report_date: self.settings.report_date.clone(),
            summary,
        })
    }
}

fn advance(stage: &mut RunStage, next: RunStage) {
    log::debug!("Run stage {} -> {}", stage, next);
    *stage = next;
}
