//! Backup Assembler: turns a trigger and a zone into a backup document.

use serde_json::Value;

use crate::document::{BackupDocument, BackupMetadata, ChangeSet, InvocationContext};
use crate::error::{BackupError, FailureLog, Result};
use crate::reader::ZoneStore;
use crate::trigger::{Trigger, TriggerKind};
use crate::zone::ZoneSnapshot;

/// Account-wide listings fetched once per sweep invocation and embedded
/// identically into every sweep document.
#[derive(Debug, Clone, Default)]
pub struct AccountInventory {
    pub health_checks: Vec<Value>,
    pub cidr_collections: Vec<Value>,
    pub traffic_policies: Vec<Value>,
}

impl AccountInventory {
    /// Fetch the three listings. Each one is independent: a failure is
    /// recorded and leaves that section empty.
    pub async fn collect<S: ZoneStore>(store: &S, failures: &mut FailureLog) -> Self {
        let health_checks = match store.list_health_checks().await {
            Ok(checks) => checks,
            Err(err) => {
                failures.record("listing health checks", err);
                Vec::new()
            }
        };
        let cidr_collections = match store.list_cidr_collections().await {
            Ok(collections) => collections,
            Err(err) => {
                failures.record("listing CIDR collections", err);
                Vec::new()
            }
        };
        let traffic_policies = match store.list_traffic_policies().await {
            Ok(policies) => policies,
            Err(err) => {
                failures.record("listing traffic policies", err);
                Vec::new()
            }
        };

        Self {
            health_checks,
            cidr_collections,
            traffic_policies,
        }
    }
}

/// Resolve the zone a single-zone trigger applies to.
///
/// Zone lifecycle triggers must resolve or the backup is meaningless, so
/// their lookup failures propagate. Change-driven triggers fall back to a
/// placeholder: the change payload is the valuable part and must still be
/// captured.
pub async fn resolve_zone<S: ZoneStore>(
    store: &S,
    trigger: &Trigger,
    failures: &mut FailureLog,
) -> Result<ZoneSnapshot> {
    match trigger.kind() {
        TriggerKind::ZoneCreated | TriggerKind::ZoneChanged => {
            let id = trigger.affected_zone_id().ok_or_else(|| {
                BackupError::malformed("zone lifecycle trigger carries no zone id")
            })?;
            store.get_zone(id).await
        }
        TriggerKind::RecordSetsChanged | TriggerKind::TrafficPolicyInstanceUpdated => {
            match trigger.affected_zone_id() {
                Some(id) => match store.get_zone(id).await {
                    Ok(zone) => Ok(zone),
                    Err(err) => {
                        failures.record(format!("looking up hosted zone {}", id), err);
                        Ok(ZoneSnapshot::placeholder(id, "Unknown"))
                    }
                },
                None => Ok(ZoneSnapshot::placeholder(
                    "TrafficPolicyInstance",
                    "TrafficPolicyInstance",
                )),
            }
        }
        TriggerKind::CidrCollectionChanged => {
            let id = trigger.affected_zone_id().unwrap_or("CIDRCollection");
            Ok(ZoneSnapshot::placeholder(id, "CIDRCollection"))
        }
        TriggerKind::HealthCheckUpdated => {
            let id = trigger.affected_zone_id().unwrap_or("HealthCheckUpdate");
            Ok(ZoneSnapshot::placeholder(id, "HealthCheckUpdate"))
        }
        TriggerKind::ScheduledSweep | TriggerKind::Unsupported => Err(BackupError::malformed(
            "trigger kind names no single zone",
        )),
    }
}

/// Build one sweep document: the zone, its full record-set listing, and the
/// shared account inventory.
pub async fn assemble_sweep_document<S: ZoneStore>(
    store: &S,
    zone: &ZoneSnapshot,
    inventory: &AccountInventory,
    ctx: &InvocationContext,
) -> Result<BackupDocument> {
    let record_sets = store.list_record_sets(zone.id()).await?;

    let metadata = BackupMetadata::builder()
        .account_id(ctx.account_id())
        .hosted_zone_id(zone.id())
        .hosted_zone_name(zone.name())
        .trigger_type(TriggerKind::ScheduledSweep.label())
        .timestamp(ctx.timestamp())
        .build();

    Ok(BackupDocument {
        metadata,
        hosted_zone: zone.raw().clone(),
        record_sets: Some(record_sets),
        health_checks: Some(inventory.health_checks.clone()),
        cidr_blocks: Some(inventory.cidr_collections.clone()),
        traffic_policies: Some(inventory.traffic_policies.clone()),
        changes: None,
    })
}

/// Build a full single-zone document for a zone lifecycle trigger: the zone
/// plus its complete record-set listing. Fetch failures propagate.
pub async fn assemble_zone_document<S: ZoneStore>(
    store: &S,
    trigger: &Trigger,
    zone: &ZoneSnapshot,
    ctx: &InvocationContext,
) -> Result<BackupDocument> {
    let record_sets = store.list_record_sets(zone.id()).await?;

    let metadata = BackupMetadata::builder()
        .account_id(ctx.account_id())
        .hosted_zone_id(zone.id())
        .hosted_zone_name(zone.name())
        .trigger_type(trigger.kind().label())
        .timestamp(ctx.timestamp())
        .build();

    Ok(BackupDocument {
        metadata,
        hosted_zone: zone.raw().clone(),
        record_sets: Some(record_sets),
        health_checks: None,
        cidr_blocks: None,
        traffic_policies: None,
        changes: None,
    })
}

/// Build a change-driven document: the zone representation and the captured
/// change payload, nothing else. No listings are fetched.
pub fn assemble_change_document(
    trigger: &Trigger,
    zone: &ZoneSnapshot,
    ctx: &InvocationContext,
) -> Result<BackupDocument> {
    let payload = trigger
        .change_payload()
        .cloned()
        .ok_or_else(|| BackupError::malformed("change trigger carries no payload"))?;

    let changes = match trigger.kind() {
        TriggerKind::RecordSetsChanged => ChangeSet::Records(payload),
        TriggerKind::CidrCollectionChanged => ChangeSet::Cidr(payload),
        TriggerKind::HealthCheckUpdated => ChangeSet::HealthCheck(payload),
        TriggerKind::TrafficPolicyInstanceUpdated => ChangeSet::TrafficPolicy(payload),
        TriggerKind::ScheduledSweep
        | TriggerKind::ZoneCreated
        | TriggerKind::ZoneChanged
        | TriggerKind::Unsupported => ChangeSet::Other(payload),
    };

    let direct = trigger
        .affected_zone_id()
        .map_or(false, |id| id == zone.id());

    let metadata = BackupMetadata::builder()
        .account_id(ctx.account_id())
        .hosted_zone_id(zone.id())
        .hosted_zone_name(zone.name())
        .trigger_type(trigger.kind().label())
        .timestamp(ctx.timestamp())
        .maybe_change_event_name(trigger.raw_event_name().map(str::to_string))
        .direct_change(direct)
        .build();

    Ok(BackupDocument {
        metadata,
        hosted_zone: zone.raw().clone(),
        record_sets: None,
        health_checks: None,
        cidr_blocks: None,
        traffic_policies: None,
        changes: Some(changes),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::MockZoneStore;
    use mockall::predicate::eq;
    use serde_json::json;

    fn ctx() -> InvocationContext {
        InvocationContext::with_timestamp("111122223333", "20260824T120000.000Z")
    }

    fn record_change_trigger() -> Trigger {
        Trigger::change(
            TriggerKind::RecordSetsChanged,
            "ChangeResourceRecordSets",
            Some("Z123".to_string()),
            json!([{ "action": "UPSERT" }]),
        )
    }

    #[tokio::test]
    async fn test_change_document_never_lists_record_sets() {
        let mut store = MockZoneStore::new();
        store
            .expect_get_zone()
            .with(eq("Z123"))
            .times(1)
            .returning(|_| {
                Ok(ZoneSnapshot::new(
                    "/hostedzone/Z123",
                    "example.com.",
                    json!({ "Id": "/hostedzone/Z123", "Name": "example.com." }),
                ))
            });
        store.expect_list_record_sets().times(0);

        let trigger = record_change_trigger();
        let mut failures = FailureLog::new();
        let zone = resolve_zone(&store, &trigger, &mut failures).await.unwrap();
        let document = assemble_change_document(&trigger, &zone, &ctx()).unwrap();

        let value = serde_json::to_value(&document).unwrap();
        assert_eq!(value["records"], json!([{ "action": "UPSERT" }]));
        assert!(value.get("resourceRecordSets").is_none());
        assert!(value.get("healthChecks").is_none());
        assert_eq!(value["metadata"]["directChange"], true);
        assert_eq!(value["metadata"]["changeEventName"], "ChangeResourceRecordSets");
        assert_eq!(value["metadata"]["triggerType"], "records");
    }

    #[tokio::test]
    async fn test_zone_lookup_failure_degrades_to_placeholder() {
        let mut store = MockZoneStore::new();
        store
            .expect_get_zone()
            .returning(|id| Err(BackupError::fetch("hosted zone", id, "gone")));

        let trigger = record_change_trigger();
        let mut failures = FailureLog::new();
        let zone = resolve_zone(&store, &trigger, &mut failures).await.unwrap();

        assert_eq!(zone.id(), "Z123");
        assert_eq!(zone.name(), "Unknown");
        assert_eq!(zone.raw(), &json!({ "Id": "Z123", "Name": "Unknown" }));
        assert_eq!(failures.len(), 1);
    }

    #[tokio::test]
    async fn test_zone_lifecycle_lookup_failure_is_fatal() {
        let mut store = MockZoneStore::new();
        store
            .expect_get_zone()
            .returning(|id| Err(BackupError::fetch("hosted zone", id, "gone")));

        let trigger = Trigger::zone_event(TriggerKind::ZoneChanged, "/hostedzone/Z123");
        let mut failures = FailureLog::new();
        let result = resolve_zone(&store, &trigger, &mut failures).await;

        assert!(result.is_err());
        assert!(failures.is_empty());
    }

    #[tokio::test]
    async fn test_cidr_and_health_check_triggers_get_placeholder_zones() {
        let store = MockZoneStore::new();
        let mut failures = FailureLog::new();

        let cidr = Trigger::change(
            TriggerKind::CidrCollectionChanged,
            "ChangeCidrCollection",
            None,
            json!([]),
        );
        let zone = resolve_zone(&store, &cidr, &mut failures).await.unwrap();
        assert_eq!(zone.id(), "CIDRCollection");
        assert_eq!(zone.name(), "CIDRCollection");

        let health = Trigger::change(
            TriggerKind::HealthCheckUpdated,
            "UpdateHealthCheck",
            None,
            json!({}),
        );
        let zone = resolve_zone(&store, &health, &mut failures).await.unwrap();
        assert_eq!(zone.id(), "HealthCheckUpdate");
        assert_eq!(zone.name(), "HealthCheckUpdate");
        assert!(failures.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_document_embeds_inventory_and_record_sets() {
        let mut store = MockZoneStore::new();
        store
            .expect_list_record_sets()
            .with(eq("Z123"))
            .times(1)
            .returning(|_| Ok(vec![json!({ "Name": "example.com.", "Type": "NS" })]));

        let zone = ZoneSnapshot::new("Z123", "example.com.", json!({ "Id": "Z123" }));
        let inventory = AccountInventory {
            health_checks: vec![json!({ "Id": "hc-1" })],
            cidr_collections: vec![],
            traffic_policies: vec![json!({ "Id": "pol-1" })],
        };

        let document = assemble_sweep_document(&store, &zone, &inventory, &ctx())
            .await
            .unwrap();
        let value = serde_json::to_value(&document).unwrap();

        assert_eq!(value["metadata"]["triggerType"], "schedule");
        assert!(value["metadata"].get("directChange").is_none());
        assert_eq!(value["resourceRecordSets"][0]["Type"], "NS");
        assert_eq!(value["healthChecks"][0]["Id"], "hc-1");
        assert_eq!(value["cidrBlocks"], json!([]));
        assert_eq!(value["trafficPolicies"][0]["Id"], "pol-1");
    }

    #[tokio::test]
    async fn test_zone_lifecycle_document_carries_record_sets_only() {
        let mut store = MockZoneStore::new();
        store
            .expect_list_record_sets()
            .with(eq("Z123"))
            .times(1)
            .returning(|_| Ok(vec![json!({ "Name": "example.com.", "Type": "SOA" })]));

        let trigger = Trigger::zone_event(TriggerKind::ZoneCreated, "Z123");
        let zone = ZoneSnapshot::new("Z123", "example.com.", json!({ "Id": "Z123" }));
        let document = assemble_zone_document(&store, &trigger, &zone, &ctx())
            .await
            .unwrap();
        let value = serde_json::to_value(&document).unwrap();

        assert_eq!(value["metadata"]["triggerType"], "creation");
        assert_eq!(value["resourceRecordSets"][0]["Type"], "SOA");
        assert!(value.get("healthChecks").is_none());
        assert!(value.get("records").is_none());
    }

    #[tokio::test]
    async fn test_inventory_failure_leaves_section_empty() {
        let mut store = MockZoneStore::new();
        store
            .expect_list_health_checks()
            .returning(|| Err(BackupError::listing("health checks", "throttled")));
        store
            .expect_list_cidr_collections()
            .returning(|| Ok(vec![json!({ "Id": "coll-1" })]));
        store
            .expect_list_traffic_policies()
            .returning(|| Ok(vec![]));

        let mut failures = FailureLog::new();
        let inventory = AccountInventory::collect(&store, &mut failures).await;

        assert!(inventory.health_checks.is_empty());
        assert_eq!(inventory.cidr_collections.len(), 1);
        assert!(inventory.traffic_policies.is_empty());
        assert_eq!(failures.len(), 1);
        assert!(failures.entries()[0].contains("health checks"));
    }
}
