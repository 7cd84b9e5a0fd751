//! Entry records and snapshots.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::FieldSpec;

/// A scalar tracked-field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    /// Reduce a JSON value to a scalar.
    ///
    /// Localized objects (`{"en_GB": "..."}`) resolve to `language`; other
    /// composite values keep their compact JSON text.
    pub fn from_json(value: &Value, language: &str) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => n.as_f64().map(Self::Float).unwrap_or(Self::Null),
            },
            Value::String(s) => Self::Text(s.clone()),
            Value::Object(map) => match map.get(language) {
                Some(Value::String(s)) => Self::Text(s.clone()),
                _ => Self::Text(value.to_string()),
            },
            Value::Array(_) => Self::Text(value.to_string()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

/// One awards-platform entry, reduced to its identifier and tracked fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Extract a record from a raw entry payload.
    ///
    /// Fields whose path is absent are left out; a missing or empty identifier
    /// is an error because the entry could not be tracked across runs.
    pub fn from_entry(
        entry: &Value,
        id_path: &str,
        fields: &[FieldSpec],
        language: &str,
    ) -> Result<Self> {
        let id = match lookup(entry, id_path) {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                return Err(AppError::api(
                    "entry",
                    format!("missing identifier at '{id_path}'"),
                ));
            }
        };

        let mut record = Record::new(id);
        for spec in fields {
            if let Some(value) = lookup(entry, &spec.path) {
                record
                    .fields
                    .insert(spec.name.clone(), FieldValue::from_json(value, language));
            }
        }
        Ok(record)
    }
}

/// Resolve a dotted path (`chapter.slug`) inside a JSON document.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| current.get(segment))
}

/// All records observed in one run, keyed by identifier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    records: BTreeMap<String, Record>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot, keeping the first occurrence of each identifier.
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let mut snapshot = Self::new();
        let mut duplicates = 0usize;
        for record in records {
            if !snapshot.insert(record) {
                duplicates += 1;
            }
        }
        if duplicates > 0 {
            log::warn!("Dropped {} records with duplicate identifiers", duplicates);
        }
        snapshot
    }

    /// Insert a record; returns `false` if its identifier is already present.
    pub fn insert(&mut self, record: Record) -> bool {
        match self.records.entry(record.id.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }
}

impl FromIterator<Record> for Snapshot {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self::from_records(iter)
    }
}
