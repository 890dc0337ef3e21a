//! Backup document model.
//!
//! A backup object is a single JSON document: identifying metadata, the full
//! hosted zone representation, and whichever configuration sections the
//! trigger called for.

use bon::Builder;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Timestamp layout used in metadata and object keys, e.g.
/// `20260824T153045.123Z`.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.3fZ";

/// Account id recorded when the inbound event does not name one.
pub const UNKNOWN_ACCOUNT: &str = "unknown";

/// Current UTC time rendered in the backup timestamp layout.
pub fn timestamp_now() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Per-invocation identity shared by every document written in one run.
///
/// The timestamp is taken once, so all documents of a sweep carry the same
/// one and sort together under their zone prefixes.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    account_id: String,
    timestamp: String,
}

impl InvocationContext {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            timestamp: timestamp_now(),
        }
    }

    /// Context with a caller-chosen timestamp.
    pub fn with_timestamp(account_id: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            timestamp: timestamp.into(),
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }
}

/// Identifying metadata carried by every backup document.
#[derive(Debug, Clone, Serialize, Builder)]
#[serde(rename_all = "camelCase")]
pub struct BackupMetadata {
    /// Account that owns the hosted zone.
    #[builder(into)]
    pub account_id: String,
    /// Bare hosted zone id (no `/hostedzone/` prefix).
    #[builder(into)]
    pub hosted_zone_id: String,
    /// Zone name without the trailing dot.
    #[builder(into)]
    pub hosted_zone_name: String,
    /// Label of the trigger that produced this document.
    #[builder(into)]
    pub trigger_type: String,
    /// Invocation timestamp, shared by every document of one invocation.
    #[builder(into)]
    pub timestamp: String,
    /// Unique id for this document.
    #[builder(default = Uuid::new_v4().to_string())]
    pub backup_id: String,
    /// Name of the API call that triggered the backup, when there was one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_event_name: Option<String>,
    /// Whether the triggering change targeted this zone directly.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direct_change: Option<bool>,
}

/// The change payload attached to a change-driven backup, keyed by the kind
/// of configuration that changed.
#[derive(Debug, Clone, Serialize)]
pub enum ChangeSet {
    #[serde(rename = "records")]
    Records(Value),
    #[serde(rename = "cidr")]
    Cidr(Value),
    #[serde(rename = "healthcheck")]
    HealthCheck(Value),
    #[serde(rename = "trafficpolicy")]
    TrafficPolicy(Value),
    #[serde(rename = "changes")]
    Other(Value),
}

/// One backup object, serialized as-is to the bucket.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    pub metadata: BackupMetadata,
    /// Full provider representation of the zone.
    #[serde(rename = "hostedZone")]
    pub hosted_zone: Value,
    /// All record sets in the zone, when the trigger captures them.
    #[serde(rename = "resourceRecordSets", skip_serializing_if = "Option::is_none")]
    pub record_sets: Option<Vec<Value>>,
    /// Account-wide health checks (scheduled sweeps only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_checks: Option<Vec<Value>>,
    /// Account-wide CIDR collections with their blocks (scheduled sweeps only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cidr_blocks: Option<Vec<Value>>,
    /// Account-wide traffic policies with their documents (scheduled sweeps only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traffic_policies: Option<Vec<Value>>,
    /// Kind-specific change payload, flattened to a top-level key.
    #[serde(flatten)]
    pub changes: Option<ChangeSet>,
}
