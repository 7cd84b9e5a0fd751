//! AWS Lambda entry point for the Award Force export
//!
//! Deploy with `cargo lambda build --release --features lambda`
//! and trigger it from a daily EventBridge schedule.
//!
//! Environment: `S3_BUCKET` (required), `S3_KEY` (optional),
//! `CONFIG_PATH` (optional, defaults to `award-export.toml`) and the
//! credential variables read by `Credentials::from_env`.

use std::path::Path;

use award_export::{
    config::{self, Credentials},
    error::{AppError, Result},
    pipeline::{self, NotifyOutcome},
    storage::S3StateStore,
};
use lambda_runtime::{Error as LambdaError, LambdaEvent, service_fn};
use serde_json::Value;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the AWS Lambda function.
#[tokio::main]
async fn main() -> std::result::Result<(), LambdaError> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Award Force export Lambda starting...");
    lambda_runtime::run(service_fn(handler)).await
}

/// Handler for scheduled invocations. A failed run fails the invocation.
async fn handler(event: LambdaEvent<Value>) -> std::result::Result<Value, LambdaError> {
    info!("Received event: {:?}", event.payload);

    match run_lambda_pipeline().await {
        Ok(summary) => {
            info!("Lambda execution successful: {}", summary);
            Ok(summary)
        }
        Err(e) => {
            error!(exit_code = e.exit_code(), "Lambda execution failed: {}", e);
            Err(e.into())
        }
    }
}

async fn run_lambda_pipeline() -> Result<Value> {
    let bucket = std::env::var("S3_BUCKET")
        .map_err(|_| AppError::config("S3_BUCKET environment variable is required"))?;
    let config_path =
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| "award-export.toml".to_string());

    let config = config::load_config(Path::new(&config_path))?;
    let credentials = Credentials::from_env()?;
    let key = std::env::var("S3_KEY").unwrap_or_else(|_| config.storage.s3_key.clone());

    let store = S3StateStore::from_env(bucket, key).await;
    let report = pipeline::run_export(&config, &credentials, &store).await?;

    let messages = match &report.notification {
        NotifyOutcome::Delivered(ack) => ack.parts(),
        NotifyOutcome::EmptyDeltaSkip => 0,
    };
    Ok(serde_json::json!({
        "status": "success",
        "added": report.delta.added.len(),
        "removed": report.delta.removed.len(),
        "changed": report.delta.changed.len(),
        "unchanged": report.delta.unchanged,
        "messages": messages,
        "baseline_recovered": report.baseline_recovered,
    }))
}
