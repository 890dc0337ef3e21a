//! Trigger normalization.
//!
//! Events arrive as EventBridge envelopes, either a scheduled timer fire or a
//! CloudTrail-recorded Route 53 API call. Everything downstream of this
//! module works on the normalized [`Trigger`], never on raw event JSON.

use serde_json::Value;
use tracing::warn;

use crate::reader::ZoneStore;
use crate::zone::normalize_zone_id;

/// What kind of event asked for a backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    /// Fixed-interval sweep of every hosted zone in the account.
    ScheduledSweep,
    /// A hosted zone was discovered by the configuration recorder.
    ZoneCreated,
    /// An already-known hosted zone changed.
    ZoneChanged,
    /// A record-set change batch was applied to a zone.
    RecordSetsChanged,
    /// A health check was updated.
    HealthCheckUpdated,
    /// A CIDR collection was changed.
    CidrCollectionChanged,
    /// A traffic policy instance was updated.
    TrafficPolicyInstanceUpdated,
    /// Anything the pipeline does not back up.
    Unsupported,
}

impl TriggerKind {
    /// Label recorded as `triggerType` in backup metadata.
    pub fn label(&self) -> &'static str {
        match self {
            TriggerKind::ScheduledSweep => "schedule",
            TriggerKind::ZoneCreated => "creation",
            TriggerKind::ZoneChanged => "change",
            TriggerKind::RecordSetsChanged => "records",
            TriggerKind::HealthCheckUpdated => "healthcheck",
            TriggerKind::CidrCollectionChanged => "cidr",
            TriggerKind::TrafficPolicyInstanceUpdated => "trafficpolicy",
            TriggerKind::Unsupported => "unsupported",
        }
    }

    /// Suffix used in the storage key. Unsupported triggers never reach the
    /// writer; the mapping still covers them with the schedule default.
    pub fn key_suffix(&self) -> &'static str {
        match self {
            TriggerKind::ScheduledSweep => "schedule",
            TriggerKind::ZoneCreated => "creation",
            TriggerKind::ZoneChanged => "change",
            TriggerKind::RecordSetsChanged => "records",
            TriggerKind::HealthCheckUpdated => "healthcheck",
            TriggerKind::CidrCollectionChanged => "cidr",
            TriggerKind::TrafficPolicyInstanceUpdated => "trafficpolicy",
            TriggerKind::Unsupported => "schedule",
        }
    }
}

/// A normalized trigger.
///
/// Built only by the normalization functions in this module and in
/// [`crate::config_rule`]; scheduled sweeps and unsupported triggers carry
/// neither a zone id nor a change payload.
#[derive(Debug, Clone)]
pub struct Trigger {
    kind: TriggerKind,
    raw_event_name: Option<String>,
    affected_zone_id: Option<String>,
    change_payload: Option<Value>,
}

impl Trigger {
    pub(crate) fn scheduled_sweep() -> Self {
        Self {
            kind: TriggerKind::ScheduledSweep,
            raw_event_name: None,
            affected_zone_id: None,
            change_payload: None,
        }
    }

    pub(crate) fn unsupported(raw_event_name: Option<String>) -> Self {
        Self {
            kind: TriggerKind::Unsupported,
            raw_event_name,
            affected_zone_id: None,
            change_payload: None,
        }
    }

    /// Zone lifecycle trigger from the configuration recorder.
    pub(crate) fn zone_event(kind: TriggerKind, zone_id: &str) -> Self {
        Self {
            kind,
            raw_event_name: None,
            affected_zone_id: Some(normalize_zone_id(zone_id).to_string()),
            change_payload: None,
        }
    }

    /// Change-driven trigger carrying the captured payload.
    pub(crate) fn change(
        kind: TriggerKind,
        raw_event_name: &str,
        affected_zone_id: Option<String>,
        change_payload: Value,
    ) -> Self {
        Self {
            kind,
            raw_event_name: Some(raw_event_name.to_string()),
            affected_zone_id,
            change_payload: Some(change_payload),
        }
    }

    pub fn kind(&self) -> TriggerKind {
        self.kind
    }

    pub fn raw_event_name(&self) -> Option<&str> {
        self.raw_event_name.as_deref()
    }

    pub fn affected_zone_id(&self) -> Option<&str> {
        self.affected_zone_id.as_deref()
    }

    pub fn change_payload(&self) -> Option<&Value> {
        self.change_payload.as_ref()
    }
}

/// Normalize an EventBridge envelope into a [`Trigger`].
///
/// The store is consulted only for `UpdateTrafficPolicyInstance`, where the
/// event names a policy but does not carry its document.
pub async fn normalize_event<S: ZoneStore>(event: &Value, store: &S) -> Trigger {
    let source = event.get("source").and_then(Value::as_str);
    let detail_type = event.get("detail-type").and_then(Value::as_str);

    if source == Some("aws.events") && detail_type == Some("Scheduled Event") {
        return Trigger::scheduled_sweep();
    }

    if detail_type == Some("AWS API Call via CloudTrail") {
        let detail = event.get("detail").unwrap_or(&Value::Null);
        if detail.get("eventSource").and_then(Value::as_str) == Some("route53.amazonaws.com") {
            return normalize_api_call(detail, store).await;
        }
    }

    warn!("event is not a schedule fire or a Route 53 API call, skipping");
    Trigger::unsupported(None)
}

async fn normalize_api_call<S: ZoneStore>(detail: &Value, store: &S) -> Trigger {
    let event_name = detail.get("eventName").and_then(Value::as_str);
    let params = detail.get("requestParameters").unwrap_or(&Value::Null);

    match event_name {
        Some("ChangeResourceRecordSets") => {
            let zone_id = params.get("hostedZoneId").and_then(Value::as_str);
            let changes = params.pointer("/changeBatch/changes");
            match (zone_id, changes) {
                (Some(zone_id), Some(changes)) => Trigger::change(
                    TriggerKind::RecordSetsChanged,
                    "ChangeResourceRecordSets",
                    Some(normalize_zone_id(zone_id).to_string()),
                    changes.clone(),
                ),
                _ => {
                    warn!("ChangeResourceRecordSets event is missing its zone id or change batch");
                    Trigger::unsupported(event_name.map(str::to_string))
                }
            }
        }
        Some("ChangeCidrCollection") => match params.get("changes") {
            Some(changes) => Trigger::change(
                TriggerKind::CidrCollectionChanged,
                "ChangeCidrCollection",
                None,
                changes.clone(),
            ),
            None => {
                warn!("ChangeCidrCollection event carries no change list");
                Trigger::unsupported(event_name.map(str::to_string))
            }
        },
        Some("UpdateHealthCheck") => {
            if params.is_null() {
                warn!("UpdateHealthCheck event carries no request parameters");
                Trigger::unsupported(event_name.map(str::to_string))
            } else {
                Trigger::change(
                    TriggerKind::HealthCheckUpdated,
                    "UpdateHealthCheck",
                    None,
                    params.clone(),
                )
            }
        }
        Some("UpdateTrafficPolicyInstance") => normalize_traffic_policy_update(detail, store).await,
        Some(other) => {
            warn!("Route 53 API call {} is not backed up, skipping", other);
            Trigger::unsupported(Some(other.to_string()))
        }
        None => {
            warn!("API call event carries no event name");
            Trigger::unsupported(None)
        }
    }
}

async fn normalize_traffic_policy_update<S: ZoneStore>(detail: &Value, store: &S) -> Trigger {
    let params = detail.get("requestParameters").unwrap_or(&Value::Null);
    let policy_id = params.get("trafficPolicyId").and_then(Value::as_str);
    let version = params
        .get("trafficPolicyVersion")
        .and_then(Value::as_i64)
        .and_then(|v| i32::try_from(v).ok());

    let (policy_id, version) = match (policy_id, version) {
        (Some(id), Some(version)) => (id, version),
        _ => {
            warn!("UpdateTrafficPolicyInstance event is missing its policy id or version");
            return Trigger::unsupported(Some("UpdateTrafficPolicyInstance".to_string()));
        }
    };

    let zone_id = detail
        .pointer("/responseElements/trafficPolicyInstance/hostedZoneId")
        .and_then(Value::as_str)
        .map(|id| normalize_zone_id(id).to_string());

    // The event only names the policy; fetch its document so the backup is
    // useful on its own. A failed fetch degrades to the raw parameters
    // rather than dropping the capture.
    let payload = match store.get_traffic_policy(policy_id, version).await {
        Ok(policy) => policy,
        Err(err) => {
            warn!(
                "could not resolve traffic policy {} version {}: {}; keeping raw request parameters",
                policy_id, version, err
            );
            params.clone()
        }
    };

    Trigger::change(
        TriggerKind::TrafficPolicyInstanceUpdated,
        "UpdateTrafficPolicyInstance",
        zone_id,
        payload,
    )
}
