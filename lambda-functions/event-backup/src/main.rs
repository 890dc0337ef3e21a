use anyhow::Context;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde_json::Value;

use backup_core::driver::{BackupDriver, BackupReport};
use event_backup::handle_event;

async fn function_handler(event: LambdaEvent<Value>) -> Result<BackupReport, Error> {
    let driver = BackupDriver::from_env()
        .await
        .context("initializing backup driver")?;
    let report = handle_event(&driver, &event.payload).await?;
    Ok(report)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    run(service_fn(function_handler)).await
}
