//! AWS Config custom-rule event handling.
//!
//! The rule variant receives its payload indirectly: the Lambda event carries
//! `invokingEvent` as a JSON string which re-parses into the configuration
//! item describing the hosted zone under evaluation.

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::{BackupError, Result};
use crate::trigger::{Trigger, TriggerKind};

/// The Lambda event delivered to an AWS Config custom rule.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigRuleEvent {
    /// JSON string; parse with [`parse_invoking_event`].
    pub invoking_event: String,
    /// Token echoed back with the compliance evaluation.
    pub result_token: String,
    /// Account the rule runs in.
    #[serde(default)]
    pub account_id: Option<String>,
    /// Rule parameters, also a JSON string. Unused by the backup rule.
    #[serde(default)]
    pub rule_parameters: Option<String>,
}

/// The re-parsed `invokingEvent` payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokingEvent {
    #[serde(default)]
    pub configuration_item: Option<ConfigurationItem>,
    #[serde(default)]
    pub message_type: Option<String>,
}

/// The configuration item under evaluation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationItem {
    pub resource_id: String,
    pub resource_type: String,
    #[serde(alias = "accountId", default)]
    pub aws_account_id: Option<String>,
    #[serde(default)]
    pub configuration_item_capture_time: Option<String>,
    #[serde(default)]
    pub configuration_item_status: Option<String>,
    /// Full recorded configuration, when the recorder captured one.
    #[serde(default)]
    pub configuration: Option<Value>,
}

/// Parse the `invokingEvent` JSON string.
pub fn parse_invoking_event(raw: &str) -> Result<InvokingEvent> {
    serde_json::from_str(raw)
        .map_err(|e| BackupError::malformed(format!("invokingEvent is not valid JSON: {}", e)))
}

/// Map a configuration item to a backup trigger.
///
/// Only hosted zone items that still exist produce work: a freshly discovered
/// zone backs up as a creation, any later change as a change. Deleted zones
/// have nothing left to fetch.
pub fn normalize_config_item(item: &ConfigurationItem) -> Trigger {
    if item.resource_type != "AWS::Route53::HostedZone" {
        warn!(
            "configuration item {} is a {}, not a hosted zone, skipping",
            item.resource_id, item.resource_type
        );
        return Trigger::unsupported(None);
    }

    let status = item.configuration_item_status.as_deref().unwrap_or("");
    if status.to_ascii_lowercase().starts_with("resourcedeleted") {
        warn!(
            "hosted zone {} was deleted, nothing to back up",
            item.resource_id
        );
        return Trigger::unsupported(None);
    }

    let kind = if status.eq_ignore_ascii_case("resourcediscovered") {
        TriggerKind::ZoneCreated
    } else {
        TriggerKind::ZoneChanged
    };
    Trigger::zone_event(kind, &item.resource_id)
}
