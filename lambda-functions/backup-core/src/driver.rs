//! Orchestration Driver: runs one backup invocation end to end.

use aws_config::BehaviorVersion;
use serde::Serialize;
use tracing::{info, warn};

use crate::assembler::{self, AccountInventory};
use crate::config::Settings;
use crate::document::InvocationContext;
use crate::error::{FailureLog, Result};
use crate::reader::{Route53ZoneStore, ZoneStore};
use crate::trigger::{Trigger, TriggerKind};
use crate::writer::{ObjectStore, ObjectWriter, S3ObjectStore};

/// Outcome of one invocation. Serialized as the Lambda response by the
/// event-driven deployment.
#[derive(Debug, Clone, Serialize)]
pub struct BackupReport {
    /// Label of the trigger that ran.
    pub trigger: String,
    /// Zones the invocation looked at.
    pub zones_considered: usize,
    /// Documents actually persisted.
    pub documents_written: usize,
    /// Storage keys of the persisted documents.
    pub keys: Vec<String>,
    /// Best-effort failures absorbed along the way.
    pub failures: Vec<String>,
    /// Invocation timestamp shared by all documents.
    pub timestamp: String,
}

/// Drives the pipeline: resolve zones, assemble documents, write objects.
///
/// The store and writer are injected so the whole driver runs against
/// in-memory doubles in tests.
pub struct BackupDriver<S, O> {
    store: S,
    writer: ObjectWriter<O>,
}

impl BackupDriver<Route53ZoneStore, S3ObjectStore> {
    /// Production driver: clients from the shared AWS config, bucket from
    /// the environment.
    pub async fn from_env() -> Result<Self> {
        let settings = Settings::from_env()?;
        let config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        let store = Route53ZoneStore::new(aws_sdk_route53::Client::new(&config));
        let object_store = S3ObjectStore::new(aws_sdk_s3::Client::new(&config));
        Ok(Self::new(
            store,
            ObjectWriter::new(object_store, settings.bucket()),
        ))
    }
}

impl<S: ZoneStore, O: ObjectStore> BackupDriver<S, O> {
    pub fn new(store: S, writer: ObjectWriter<O>) -> Self {
        Self { store, writer }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bucket(&self) -> &str {
        self.writer.bucket()
    }

    /// Run one invocation.
    ///
    /// Only two things abort a run: the sweep's zone listing failing, and a
    /// zone lifecycle backup losing its zone. Everything else is absorbed
    /// into the report's failure list.
    pub async fn run(&self, trigger: &Trigger, ctx: &InvocationContext) -> Result<BackupReport> {
        let mut failures = FailureLog::new();
        let mut keys = Vec::new();
        let mut zones_considered = 0;

        match trigger.kind() {
            TriggerKind::ScheduledSweep => {
                let zones = self.store.list_zones().await?;
                zones_considered = zones.len();
                if zones.is_empty() {
                    info!("account has no hosted zones, nothing to back up");
                } else {
                    info!("sweeping {} hosted zones", zones.len());
                    let inventory = AccountInventory::collect(&self.store, &mut failures).await;
                    for zone in &zones {
                        match assembler::assemble_sweep_document(&self.store, zone, &inventory, ctx)
                            .await
                        {
                            Ok(document) => {
                                let written = self
                                    .writer
                                    .write(&document, trigger.kind(), &mut failures)
                                    .await;
                                if let Some(key) = written {
                                    keys.push(key);
                                }
                            }
                            Err(err) => {
                                let context =
                                    format!("assembling backup for zone {}", zone.id());
                                failures.record(context, err);
                            }
                        }
                    }
                }
            }
            TriggerKind::ZoneCreated | TriggerKind::ZoneChanged => {
                zones_considered = 1;
                let zone = assembler::resolve_zone(&self.store, trigger, &mut failures).await?;
                let document =
                    assembler::assemble_zone_document(&self.store, trigger, &zone, ctx).await?;
                if let Some(key) = self.writer.write(&document, trigger.kind(), &mut failures).await
                {
                    keys.push(key);
                }
            }
            TriggerKind::RecordSetsChanged
            | TriggerKind::HealthCheckUpdated
            | TriggerKind::CidrCollectionChanged
            | TriggerKind::TrafficPolicyInstanceUpdated => {
                zones_considered = 1;
                let zone = assembler::resolve_zone(&self.store, trigger, &mut failures).await?;
                let document = assembler::assemble_change_document(trigger, &zone, ctx)?;
                if let Some(key) = self.writer.write(&document, trigger.kind(), &mut failures).await
                {
                    keys.push(key);
                }
            }
            TriggerKind::Unsupported => {
                if let Some(name) = trigger.raw_event_name() {
                    warn!("unsupported trigger {}, no backup performed", name);
                } else {
                    warn!("unsupported trigger, no backup performed");
                }
            }
        }

        Ok(BackupReport {
            trigger: trigger.kind().label().to_string(),
            zones_considered,
            documents_written: keys.len(),
            keys,
            failures: failures.into_entries(),
            timestamp: ctx.timestamp().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackupError;
    use crate::reader::MockZoneStore;
    use crate::writer::MockObjectStore;
    use crate::zone::ZoneSnapshot;
    use mockall::predicate::eq;
    use serde_json::json;

    fn ctx() -> InvocationContext {
        InvocationContext::with_timestamp("111122223333", "20260824T120000.000Z")
    }

    fn driver(
        store: MockZoneStore,
        objects: MockObjectStore,
    ) -> BackupDriver<MockZoneStore, MockObjectStore> {
        BackupDriver::new(store, ObjectWriter::new(objects, "backup-bucket"))
    }

    #[tokio::test]
    async fn test_empty_sweep_succeeds_with_no_writes() {
        let mut store = MockZoneStore::new();
        store.expect_list_zones().times(1).returning(|| Ok(vec![]));
        store.expect_list_health_checks().times(0);
        store.expect_list_cidr_collections().times(0);
        store.expect_list_traffic_policies().times(0);
        let mut objects = MockObjectStore::new();
        objects.expect_put_json().times(0);

        let report = driver(store, objects)
            .run(&Trigger::scheduled_sweep(), &ctx())
            .await
            .unwrap();

        assert_eq!(report.trigger, "schedule");
        assert_eq!(report.zones_considered, 0);
        assert_eq!(report.documents_written, 0);
        assert!(report.keys.is_empty());
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_zone_listing_failure_is_fatal() {
        let mut store = MockZoneStore::new();
        store
            .expect_list_zones()
            .returning(|| Err(BackupError::listing("hosted zones", "throttled")));
        let objects = MockObjectStore::new();

        let result = driver(store, objects)
            .run(&Trigger::scheduled_sweep(), &ctx())
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_sweep_continues_past_a_failing_zone() {
        let mut store = MockZoneStore::new();
        store.expect_list_zones().returning(|| {
            Ok(vec![
                ZoneSnapshot::new("Z1", "one.example.", json!({ "Id": "Z1" })),
                ZoneSnapshot::new("Z2", "two.example.", json!({ "Id": "Z2" })),
            ])
        });
        store.expect_list_health_checks().returning(|| Ok(vec![]));
        store.expect_list_cidr_collections().returning(|| Ok(vec![]));
        store.expect_list_traffic_policies().returning(|| Ok(vec![]));
        store
            .expect_list_record_sets()
            .with(eq("Z1"))
            .returning(|_| Err(BackupError::listing("resource record sets", "denied")));
        store
            .expect_list_record_sets()
            .with(eq("Z2"))
            .returning(|_| Ok(vec![json!({ "Name": "two.example.", "Type": "NS" })]));
        let mut objects = MockObjectStore::new();
        objects.expect_put_json().times(1).returning(|_, _, _| Ok(()));

        let report = driver(store, objects)
            .run(&Trigger::scheduled_sweep(), &ctx())
            .await
            .unwrap();

        assert_eq!(report.zones_considered, 2);
        assert_eq!(report.documents_written, 1);
        assert_eq!(
            report.keys,
            vec!["route53-backup/111122223333/two.example/schedule-20260824T120000.000Z.json"]
        );
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].contains("Z1"));
    }

    #[tokio::test]
    async fn test_unsupported_trigger_does_nothing() {
        let store = MockZoneStore::new();
        let mut objects = MockObjectStore::new();
        objects.expect_put_json().times(0);

        let report = driver(store, objects)
            .run(&Trigger::unsupported(Some("DeleteHostedZone".to_string())), &ctx())
            .await
            .unwrap();

        assert_eq!(report.trigger, "unsupported");
        assert_eq!(report.zones_considered, 0);
        assert_eq!(report.documents_written, 0);
    }

    #[tokio::test]
    async fn test_zone_change_writes_one_document() {
        let mut store = MockZoneStore::new();
        store.expect_get_zone().with(eq("Z123")).returning(|_| {
            Ok(ZoneSnapshot::new(
                "/hostedzone/Z123",
                "example.com.",
                json!({ "Id": "/hostedzone/Z123", "Name": "example.com." }),
            ))
        });
        store
            .expect_list_record_sets()
            .with(eq("Z123"))
            .returning(|_| Ok(vec![json!({ "Name": "example.com.", "Type": "SOA" })]));
        let mut objects = MockObjectStore::new();
        objects
            .expect_put_json()
            .with(
                eq("backup-bucket"),
                eq("route53-backup/111122223333/example.com/change-20260824T120000.000Z.json"),
                mockall::predicate::always(),
            )
            .times(1)
            .returning(|_, _, _| Ok(()));

        let trigger = Trigger::zone_event(TriggerKind::ZoneChanged, "/hostedzone/Z123");
        let report = driver(store, objects).run(&trigger, &ctx()).await.unwrap();

        assert_eq!(report.documents_written, 1);
        assert_eq!(report.zones_considered, 1);
        assert!(report.failures.is_empty());
    }
}
