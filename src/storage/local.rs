//! Local filesystem state store.
//!
//! The baseline is a single JSON file. Commits write a sibling temp file,
//! fsync it, then rename it over the target, so a killed process leaves
//! either the old baseline or the new one and never a torn write.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::Snapshot;
use crate::storage::{self, StateInfo, StateStore};

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStateStore {
    path: PathBuf,
}

impl LocalStateStore {
    /// Create a store persisting to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Temp file next to the target so the rename stays on one filesystem.
    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "snapshot".to_string());
        self.path.with_file_name(format!(".{name}.tmp"))
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        self.ensure_dir().await?;

        let tmp = self.temp_path();
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(AppError::Io(e));
        }
        Ok(())
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

#[async_trait]
impl StateStore for LocalStateStore {
    async fn load_previous(&self) -> Result<Snapshot> {
        match self.read_bytes().await? {
            Some(bytes) => storage::decode(&bytes),
            None => {
                log::info!("No baseline at {}; treating as first run", self.path.display());
                Ok(Snapshot::new())
            }
        }
    }

    async fn commit(&self, snapshot: &Snapshot) -> Result<()> {
        let bytes = storage::encode(snapshot, Utc::now())?;
        self.write_bytes(&bytes).await?;
        log::info!(
            "Committed {} records to {}",
            snapshot.len(),
            self.path.display()
        );
        Ok(())
    }

    async fn describe(&self) -> Result<Option<StateInfo>> {
        match self.read_bytes().await? {
            Some(bytes) => storage::describe(&bytes).map(Some),
            None => Ok(None),
        }
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
