//! Plain-text rendering of a delta and splitting into transport-sized parts.
//!
//! Rendering is a pure function of its inputs, so the same delta and context
//! always yield byte-identical text.

use std::fmt::Write as _;

use unicode_segmentation::UnicodeSegmentation;

use crate::models::{FieldValue, Record};
use crate::pipeline::diff::Delta;
use crate::pipeline::summary::{ChapterSummary, StatusTally};
use crate::utils::utf16_len;

/// Room kept for the `[i/n] ` part marker.
const PART_PREFIX_RESERVE: usize = 12;

const ABSENT: &str = "∅";

/// Everything besides the delta that appears in the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderContext {
    pub title: String,
    /// Calendar date shown in the header, e.g. `2025-07-22`
    pub report_date: String,
    pub summary: Option<ChapterSummary>,
}

/// Render the full notification text.
pub fn render(delta: &Delta, ctx: &RenderContext) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{} ({})", ctx.title, ctx.report_date);
    let _ = writeln!(
        out,
        "{} added, {} removed, {} changed, {} unchanged",
        delta.added.len(),
        delta.removed.len(),
        delta.changed.len(),
        delta.unchanged
    );

    if let Some(summary) = ctx.summary.as_ref().filter(|s| !s.is_empty()) {
        render_summary(&mut out, summary);
    }

    if !delta.added.is_empty() {
        let _ = write!(out, "\nADDED ({})\n", delta.added.len());
        for record in &delta.added {
            let _ = writeln!(out, "+ {}", record_line(record));
        }
    }

    if !delta.removed.is_empty() {
        let _ = write!(out, "\nREMOVED ({})\n", delta.removed.len());
        for record in &delta.removed {
            let _ = writeln!(out, "- {}", record_line(record));
        }
    }

    if !delta.changed.is_empty() {
        let _ = write!(out, "\nCHANGED ({})\n", delta.changed.len());
        for changed in &delta.changed {
            let _ = writeln!(out, "~ {}", single_line(&changed.id));
            for change in &changed.changes {
                let _ = writeln!(
                    out,
                    "    {}: {} -> {}",
                    change.field,
                    display(change.old.as_ref()),
                    display(change.new.as_ref())
                );
            }
        }
    }

    out.trim_end().to_string()
}

/// Chapter rows grouped under region headings, then a totals line.
fn render_summary(out: &mut String, summary: &ChapterSummary) {
    out.push('\n');
    out.push_str("Entries by chapter (submitted / in progress):\n");

    let mut region: Option<&str> = None;
    for (no, row) in summary.rows.iter().enumerate() {
        if region != Some(row.region.as_str()) {
            let _ = writeln!(out, "{}", row.region);
            region = Some(row.region.as_str());
        }
        let _ = writeln!(
            out,
            "  {}. {}{} | total {}",
            no + 1,
            single_line(&row.name),
            tally_columns(&summary.categories, |c| row.by_category.get(c).copied()),
            row.total()
        );
    }

    let totals = summary.totals();
    let _ = writeln!(
        out,
        "Total{} | total {}",
        tally_columns(&summary.categories, |c| totals.get(c).copied()),
        summary.total()
    );
}

fn tally_columns(categories: &[String], tally: impl Fn(&str) -> Option<StatusTally>) -> String {
    let mut columns = String::new();
    for category in categories {
        let t = tally(category).unwrap_or_default();
        let _ = write!(columns, " | {} {}/{}", category, t.submitted, t.in_progress);
    }
    columns
}

fn record_line(record: &Record) -> String {
    let mut line = single_line(&record.id);
    for (name, value) in &record.fields {
        let _ = write!(line, " | {}={}", name, display(Some(value)));
    }
    line
}

fn display(value: Option<&FieldValue>) -> String {
    match value {
        Some(value) => single_line(&value.to_string()),
        None => ABSENT.to_string(),
    }
}

/// Keep one record per line whatever the platform puts in its strings.
fn single_line(text: &str) -> String {
    text.split(['\r', '\n']).filter(|s| !s.is_empty()).collect::<Vec<_>>().join(" ")
}

/// Split `text` into parts of at most `max_units` UTF-16 code units.
///
/// Splits happen between lines; a single line longer than a part is cut on
/// grapheme boundaries. Nothing is dropped except blank lines at part edges.
/// With more than one part each is prefixed `[i/n] `.
pub fn split_message(text: &str, max_units: usize) -> Vec<String> {
    if utf16_len(text) <= max_units {
        return if text.trim().is_empty() {
            Vec::new()
        } else {
            vec![text.to_string()]
        };
    }

    let budget = max_units.saturating_sub(PART_PREFIX_RESERVE).max(1);
    let mut parts: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for line in text.lines().flat_map(|line| split_long_line(line, budget)) {
        let line_len = utf16_len(&line);
        let needed = if current.is_empty() { line_len } else { current_len + 1 + line_len };
        if needed > budget && !current.is_empty() {
            parts.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push('\n');
            current_len += 1;
        }
        current.push_str(&line);
        current_len += line_len;
    }
    if !current.is_empty() {
        parts.push(current);
    }

    let parts: Vec<String> = parts
        .into_iter()
        .map(|p| p.trim_matches('\n').to_string())
        .filter(|p| !p.trim().is_empty())
        .collect();

    let total = parts.len();
    if total <= 1 {
        return parts;
    }
    parts
        .into_iter()
        .enumerate()
        .map(|(i, part)| format!("[{}/{}] {}", i + 1, total, part))
        .collect()
}

fn split_long_line(line: &str, budget: usize) -> Vec<String> {
    if utf16_len(line) <= budget {
        return vec![line.to_string()];
    }

    let mut pieces = Vec::new();
    let mut piece = String::new();
    let mut piece_len = 0usize;
    for grapheme in line.graphemes(true) {
        let len = utf16_len(grapheme);
        if piece_len + len > budget && !piece.is_empty() {
            pieces.push(std::mem::take(&mut piece));
            piece_len = 0;
        }
        piece.push_str(grapheme);
        piece_len += len;
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}
