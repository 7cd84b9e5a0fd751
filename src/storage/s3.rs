//! AWS S3 state store.
//!
//! The baseline lives in one object. A `PutObject` either replaces the whole
//! object or fails, which gives the same all-or-nothing commit as the local
//! temp-file rename.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use chrono::Utc;

use crate::error::{AppError, Result};
use crate::models::Snapshot;
use crate::storage::{self, StateInfo, StateStore};

/// S3-based baseline storage.
pub struct S3StateStore {
    client: Client,
    bucket: String,
    key: String,
}

impl S3StateStore {
    /// Create a new S3 state store.
    pub fn new(client: Client, bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Create S3 storage from the ambient AWS configuration.
    pub async fn from_env(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&config), bucket, key)
    }

    /// Read the object, returning None if it doesn't exist.
    async fn read_bytes(&self) -> Result<Option<Vec<u8>>> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| AppError::S3(e.to_string()))?;
                Ok(Some(bytes.into_bytes().to_vec()))
            }
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    Ok(None)
                } else {
                    Err(AppError::S3(service_err.to_string()))
                }
            }
        }
    }
}

#[async_trait]
impl StateStore for S3StateStore {
    async fn load_previous(&self) -> Result<Snapshot> {
        match self.read_bytes().await? {
            Some(bytes) => storage::decode(&bytes),
            None => {
                log::info!("No baseline at {}; treating as first run", self.location());
                Ok(Snapshot::new())
            }
        }
    }

    async fn commit(&self, snapshot: &Snapshot) -> Result<()> {
        let bytes = storage::encode(snapshot, Utc::now())?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .body(ByteStream::from(bytes))
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| AppError::S3(e.to_string()))?;

        log::info!("Committed {} records to {}", snapshot.len(), self.location());
        Ok(())
    }

    async fn describe(&self) -> Result<Option<StateInfo>> {
        match self.read_bytes().await? {
            Some(bytes) => storage::describe(&bytes).map(Some),
            None => Ok(None),
        }
    }

    fn location(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }
}
