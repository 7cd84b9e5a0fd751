//! Baseline snapshot persistence.
//!
//! Exactly one document is kept: the snapshot of the last successful run.
//!
//! ```text
//! {
//!   "version": 1,
//!   "captured_at": "2025-07-22T03:00:00Z",
//!   "count": 2,
//!   "checksum": "<sha256 of the records array>",
//!   "records": [ { "id": "...", "fields": { ... } }, ... ]
//! }
//! ```
//!
//! Records are written in identifier order so the same snapshot always
//! produces the same bytes (apart from `captured_at`).

pub mod local;
#[cfg(feature = "s3")]
pub mod s3;

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{AppError, Result};
use crate::models::{Record, Snapshot, StorageBackend, StorageConfig};

pub use local::LocalStateStore;
#[cfg(feature = "s3")]
pub use s3::S3StateStore;

/// Current on-disk format version.
pub const FORMAT_VERSION: u32 = 1;

/// Trait for baseline storage backends.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the last committed snapshot.
    ///
    /// Returns an empty snapshot when nothing was ever committed and
    /// `AppError::CorruptState` when the stored document is unusable.
    async fn load_previous(&self) -> Result<Snapshot>;

    /// Replace the baseline. Either the whole snapshot lands or nothing does.
    async fn commit(&self, snapshot: &Snapshot) -> Result<()>;

    /// Metadata of the stored document without validating it, for `info`.
    async fn describe(&self) -> Result<Option<StateInfo>>;

    /// Human-readable location for logs.
    fn location(&self) -> String;
}

/// Open the configured backend.
pub async fn open(config: &StorageConfig) -> Result<Box<dyn StateStore>> {
    match config.backend {
        StorageBackend::Local => Ok(Box::new(LocalStateStore::new(config.path.clone()))),
        #[cfg(feature = "s3")]
        StorageBackend::S3 => {
            let bucket = config
                .s3_bucket
                .clone()
                .ok_or_else(|| AppError::config("storage.s3_bucket is required for the s3 backend"))?;
            Ok(Box::new(
                S3StateStore::from_env(bucket, config.s3_key.clone()).await,
            ))
        }
        #[cfg(not(feature = "s3"))]
        StorageBackend::S3 => Err(AppError::config(
            "storage.backend = \"s3\" needs a build with the s3 feature",
        )),
    }
}

/// Header fields of a stored snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateInfo {
    pub version: u32,
    pub captured_at: DateTime<Utc>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotDocument {
    version: u32,
    captured_at: DateTime<Utc>,
    count: usize,
    checksum: String,
    records: Vec<Record>,
}

fn checksum(records: &[Record]) -> Result<String> {
    let canonical = serde_json::to_vec(records)?;
    Ok(hex::encode(Sha256::digest(&canonical)))
}

/// Serialize a snapshot into the persisted document.
pub fn encode(snapshot: &Snapshot, captured_at: DateTime<Utc>) -> Result<Vec<u8>> {
    let records: Vec<Record> = snapshot.iter().cloned().collect();
    let document = SnapshotDocument {
        version: FORMAT_VERSION,
        captured_at,
        count: records.len(),
        checksum: checksum(&records)?,
        records,
    };
    Ok(serde_json::to_vec_pretty(&document)?)
}

/// Parse and verify a persisted document.
pub fn decode(bytes: &[u8]) -> Result<Snapshot> {
    let document: SnapshotDocument = serde_json::from_slice(bytes)
        .map_err(|e| AppError::corrupt_state(format!("unparseable snapshot: {e}")))?;

    if document.version != FORMAT_VERSION {
        return Err(AppError::corrupt_state(format!(
            "unsupported snapshot version {}",
            document.version
        )));
    }
    if document.count != document.records.len() {
        return Err(AppError::corrupt_state(format!(
            "header says {} records, found {}",
            document.count,
            document.records.len()
        )));
    }
    if checksum(&document.records)? != document.checksum {
        return Err(AppError::corrupt_state("checksum mismatch"));
    }

    let mut seen = HashSet::new();
    if let Some(dup) = document.records.iter().find(|r| !seen.insert(r.id.as_str())) {
        return Err(AppError::corrupt_state(format!(
            "duplicate identifier '{}'",
            dup.id
        )));
    }

    Ok(Snapshot::from_records(document.records))
}

/// Read only the header fields.
pub fn describe(bytes: &[u8]) -> Result<StateInfo> {
    serde_json::from_slice(bytes)
        .map_err(|e| AppError::corrupt_state(format!("unparseable snapshot: {e}")))
}
