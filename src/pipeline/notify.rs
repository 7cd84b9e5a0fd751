//! Delivery of a rendered delta to the chat.

use std::time::Duration;

use crate::error::{AppError, Result};
use crate::pipeline::diff::Delta;
use crate::pipeline::render::{RenderContext, render, split_message};
use crate::services::MessageTransport;
use crate::utils::retry::{RetryPolicy, with_retry};

/// Confirmation that every part of a notification was accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub message_ids: Vec<i64>,
}

impl Ack {
    pub fn parts(&self) -> usize {
        self.message_ids.len()
    }
}

/// Result of a notification attempt that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    Delivered(Ack),
    /// Nothing changed, nothing sent
    EmptyDeltaSkip,
}

/// Renders deltas and pushes them through a transport.
pub struct Notifier<'a> {
    transport: &'a dyn MessageTransport,
    retry: RetryPolicy,
    max_message_units: usize,
    part_delay: Duration,
}

impl<'a> Notifier<'a> {
    pub fn new(
        transport: &'a dyn MessageTransport,
        retry: RetryPolicy,
        max_message_units: usize,
        part_delay: Duration,
    ) -> Self {
        Self {
            transport,
            retry,
            max_message_units,
            part_delay,
        }
    }

    /// Render and send `delta`.
    ///
    /// Fails with `AppError::Delivery` once any part has exhausted its retries;
    /// parts already sent are not recalled.
    pub async fn send(&self, delta: &Delta, ctx: &RenderContext, chat_id: &str) -> Result<NotifyOutcome> {
        if !delta.has_changes() {
            log::info!("No changes since last run; skipping notification");
            return Ok(NotifyOutcome::EmptyDeltaSkip);
        }

        let parts = split_message(&render(delta, ctx), self.max_message_units);
        let total = parts.len();
        log::info!("Sending notification in {} part(s)", total);

        let mut message_ids = Vec::with_capacity(total);
        for (i, part) in parts.iter().enumerate() {
            if i > 0 && !self.part_delay.is_zero() {
                tokio::time::sleep(self.part_delay).await;
            }

            let label = format!("notification part {}/{}", i + 1, total);
            let id = with_retry(&self.retry, &label, |_| self.transport.send_text(chat_id, part))
                .await
                .map_err(|e| match e {
                    AppError::Delivery(msg) => AppError::delivery(format!("{label}: {msg}")),
                    other => AppError::delivery(format!("{label}: {other}")),
                })?;
            message_ids.push(id);
        }

        Ok(NotifyOutcome::Delivered(Ack { message_ids }))
    }
}
