//! EventBridge-triggered backup Lambda.
//!
//! Serves both event-driven deployments: the scheduled rule that sweeps every
//! hosted zone, and the rule matching CloudTrail-recorded Route 53 API calls.
//! Both arrive as EventBridge envelopes; the trigger normalizer tells them
//! apart. Delivery is fire-and-forget, so failures surface in the logs and in
//! the returned report, never as retries initiated here.

use serde_json::Value;
use tracing::{info, warn};

use backup_core::document::{InvocationContext, UNKNOWN_ACCOUNT};
use backup_core::driver::{BackupDriver, BackupReport};
use backup_core::error::Result;
use backup_core::reader::ZoneStore;
use backup_core::trigger::normalize_event;
use backup_core::writer::ObjectStore;

/// Account id from the EventBridge envelope.
///
/// Every EventBridge event carries `account`; if it is somehow missing the
/// backup still runs, namespaced under a placeholder account.
pub fn event_account(event: &Value) -> String {
    match event.get("account").and_then(Value::as_str) {
        Some(account) if !account.is_empty() => account.to_string(),
        _ => {
            warn!("event carries no account id, using {:?}", UNKNOWN_ACCOUNT);
            UNKNOWN_ACCOUNT.to_string()
        }
    }
}

/// Run one EventBridge-delivered invocation end to end.
pub async fn handle_event<S: ZoneStore, O: ObjectStore>(
    driver: &BackupDriver<S, O>,
    event: &Value,
) -> Result<BackupReport> {
    let ctx = InvocationContext::new(event_account(event));
    let trigger = normalize_event(event, driver.store()).await;
    info!(
        "handling {} trigger for account {}",
        trigger.kind().label(),
        ctx.account_id()
    );
    driver.run(&trigger, &ctx).await
}
