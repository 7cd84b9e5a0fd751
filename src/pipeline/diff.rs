//! Delta calculation between the stored baseline and the fresh fetch.
//!
//! Every identifier in either snapshot lands in exactly one class:
//! added, removed, changed or unchanged. Unchanged records are only counted.

use std::collections::{BTreeSet, HashMap};

use crate::models::{FieldValue, Record, Snapshot};

/// One tracked field that differs between runs.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub field: String,
    /// `None` when the field was absent
    pub old: Option<FieldValue>,
    pub new: Option<FieldValue>,
}

/// A record present in both snapshots with at least one changed field.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangedRecord {
    pub id: String,
    /// Sorted by field name
    pub changes: Vec<FieldChange>,
}

/// Classification of one identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Change {
    Added,
    Removed,
    Changed,
    Unchanged,
}

/// Differences between two snapshots. Each list is sorted by identifier.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Delta {
    pub added: Vec<Record>,
    pub removed: Vec<Record>,
    pub changed: Vec<ChangedRecord>,
    /// Number of identifiers present and identical in both
    pub unchanged: usize,
}

impl Delta {
    /// Check if there are any changes.
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty() || !self.changed.is_empty()
    }

    /// Get the total number of changes.
    pub fn change_count(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len()
    }
}

/// Calculator for computing deltas between snapshots.
#[derive(Debug, Clone, Default)]
pub struct DiffCalculator {
    /// Restrict comparison to these fields; `None` compares every field
    tracked: Option<BTreeSet<String>>,
}

impl DiffCalculator {
    /// Compare every stored field.
    pub fn new() -> Self {
        Self { tracked: None }
    }

    /// Compare only the named fields. Fields dropped from the tracked set since
    /// the baseline was written then stop producing changes.
    pub fn tracking<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tracked: Some(fields.into_iter().map(Into::into).collect()),
        }
    }

    /// Classify one identifier.
    pub fn classify(&self, previous: Option<&Record>, current: Option<&Record>) -> Change {
        match (previous, current) {
            (None, Some(_)) => Change::Added,
            (Some(_), None) => Change::Removed,
            (Some(prev), Some(curr)) if !self.field_changes(prev, curr).is_empty() => {
                Change::Changed
            }
            _ => Change::Unchanged,
        }
    }

    /// Calculate the delta between previous and current snapshots.
    pub fn calculate(&self, previous: &Snapshot, current: &Snapshot) -> Delta {
        let prev_map: HashMap<&str, &Record> = previous.iter().map(|r| (r.id.as_str(), r)).collect();
        let curr_map: HashMap<&str, &Record> = current.iter().map(|r| (r.id.as_str(), r)).collect();

        let ids: BTreeSet<&str> = prev_map.keys().chain(curr_map.keys()).copied().collect();

        let mut delta = Delta::default();
        for id in ids {
            match (prev_map.get(id).copied(), curr_map.get(id).copied()) {
                (None, Some(curr)) => delta.added.push(curr.clone()),
                (Some(prev), None) => delta.removed.push(prev.clone()),
                (Some(prev), Some(curr)) => {
                    let changes = self.field_changes(prev, curr);
                    if changes.is_empty() {
                        delta.unchanged += 1;
                    } else {
                        delta.changed.push(ChangedRecord {
                            id: id.to_string(),
                            changes,
                        });
                    }
                }
                (None, None) => {}
            }
        }
        delta
    }

    fn is_tracked(&self, field: &str) -> bool {
        self.tracked.as_ref().is_none_or(|set| set.contains(field))
    }

    fn field_changes(&self, prev: &Record, curr: &Record) -> Vec<FieldChange> {
        let names: BTreeSet<&str> = prev
            .fields
            .keys()
            .chain(curr.fields.keys())
            .map(String::as_str)
            .filter(|name| self.is_tracked(name))
            .collect();

        names
            .into_iter()
            .filter_map(|name| {
                let old = prev.fields.get(name);
                let new = curr.fields.get(name);
                (old != new).then(|| FieldChange {
                    field: name.to_string(),
                    old: old.cloned(),
                    new: new.cloned(),
                })
            })
            .collect()
    }
}

/// Convenience function to compute a delta over all fields.
pub fn compute_delta(previous: &Snapshot, current: &Snapshot) -> Delta {
    DiffCalculator::new().calculate(previous, current)
}
