//! Utility functions and helpers.

pub mod http;
pub mod retry;

#[cfg(test)]
pub(crate) mod test_server;

use chrono::{DateTime, FixedOffset, Offset, Utc};

/// Render `now` as a calendar date in a fixed UTC offset.
pub fn report_date(now: DateTime<Utc>, utc_offset_hours: i32) -> String {
    let offset = FixedOffset::east_opt(utc_offset_hours * 3600).unwrap_or_else(|| Utc.fix());
    now.with_timezone(&offset).format("%Y-%m-%d").to_string()
}

/// Count text length the way Telegram measures message limits.
pub fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}
