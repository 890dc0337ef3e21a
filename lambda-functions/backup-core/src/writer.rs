//! Object Writer: persists backup documents to the bucket.

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::types::ServerSideEncryption;
use aws_sdk_s3::Client as S3Client;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use tracing::info;

#[cfg(test)]
use mockall::automock;

use crate::document::BackupDocument;
use crate::error::{BackupError, FailureLog, Result};
use crate::trigger::TriggerKind;

/// Fixed first segment of every backup key.
pub const KEY_PREFIX: &str = "route53-backup";

/// Bytes escaped in the zone-name key segment. Zone names are already
/// constrained by DNS, but user-entered names can still carry characters
/// that break a path segment or an S3 console link.
const KEY_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'\\');

/// Build the storage key for one backup document.
///
/// Layout: `route53-backup/<account-id>/<zone-name>/<suffix>-<timestamp>.json`.
/// Identical inputs always produce the identical key.
pub fn object_key(account_id: &str, zone_name: &str, kind: TriggerKind, timestamp: &str) -> String {
    let zone_segment = utf8_percent_encode(zone_name, KEY_SEGMENT);
    format!(
        "{}/{}/{}/{}-{}.json",
        KEY_PREFIX,
        account_id,
        zone_segment,
        kind.key_suffix(),
        timestamp
    )
}

/// Raw object-write capability.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_json(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()>;
}

/// [`ObjectStore`] over S3. Objects are written with AES256 server-side
/// encryption and an `application/json` content type.
pub struct S3ObjectStore {
    client: S3Client,
}

impl S3ObjectStore {
    pub fn new(client: S3Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_json(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body.into())
            .content_type("application/json")
            .server_side_encryption(ServerSideEncryption::Aes256)
            .send()
            .await
            .map_err(|e| BackupError::write(key, DisplayErrorContext(&e)))?;
        Ok(())
    }
}

/// Writes backup documents, absorbing per-document failures.
///
/// A failed serialization or store write is recorded in the failure log and
/// reported as `None`; it never propagates, so sibling zones in a sweep keep
/// getting written.
pub struct ObjectWriter<O> {
    store: O,
    bucket: String,
}

impl<O: ObjectStore> ObjectWriter<O> {
    pub fn new(store: O, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Write one document; returns the key on success.
    pub async fn write(
        &self,
        document: &BackupDocument,
        kind: TriggerKind,
        failures: &mut FailureLog,
    ) -> Option<String> {
        let zone_name = &document.metadata.hosted_zone_name;
        let key = object_key(
            &document.metadata.account_id,
            zone_name,
            kind,
            &document.metadata.timestamp,
        );

        let body = match serde_json::to_vec_pretty(document) {
            Ok(body) => body,
            Err(err) => {
                failures.record(format!("serializing backup for zone {}", zone_name), err);
                return None;
            }
        };

        match self.store.put_json(&self.bucket, &key, body).await {
            Ok(()) => {
                info!(
                    "wrote backup for zone {} to s3://{}/{}",
                    zone_name, self.bucket, key
                );
                Some(key)
            }
            Err(err) => {
                failures.record(format!("writing backup for zone {}", zone_name), err);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::BackupMetadata;
    use mockall::predicate::eq;
    use serde_json::json;

    fn sample_document(zone_name: &str, trigger_type: &str) -> BackupDocument {
        BackupDocument {
            metadata: BackupMetadata::builder()
                .account_id("111122223333")
                .hosted_zone_id("Z123")
                .hosted_zone_name(zone_name)
                .trigger_type(trigger_type)
                .timestamp("20260824T120000.000Z")
                .build(),
            hosted_zone: json!({ "Id": "Z123" }),
            record_sets: None,
            health_checks: None,
            cidr_blocks: None,
            traffic_policies: None,
            changes: None,
        }
    }

    #[test]
    fn test_key_layout_is_deterministic() {
        let kind = TriggerKind::ScheduledSweep;
        let expected = "route53-backup/111122223333/example.com/schedule-20260824T120000.000Z.json";
        assert_eq!(
            object_key("111122223333", "example.com", kind, "20260824T120000.000Z"),
            expected
        );
        assert_eq!(
            object_key("111122223333", "example.com", kind, "20260824T120000.000Z"),
            expected
        );
    }

    #[test]
    fn test_key_suffix_follows_trigger_kind() {
        let key = object_key("1", "example.com", TriggerKind::RecordSetsChanged, "ts");
        assert!(key.contains("/records-"));
        let key = object_key("1", "example.com", TriggerKind::CidrCollectionChanged, "ts");
        assert!(key.contains("/cidr-"));
        let key = object_key("1", "example.com", TriggerKind::ZoneCreated, "ts");
        assert!(key.contains("/creation-"));
    }

    #[test]
    fn test_zone_segment_is_percent_encoded() {
        let key = object_key("1", "weird name/100%", TriggerKind::ScheduledSweep, "ts");
        assert_eq!(key, "route53-backup/1/weird%20name%2F100%25/schedule-ts.json");
    }

    #[tokio::test]
    async fn test_write_returns_key_and_sends_document() {
        let mut store = MockObjectStore::new();
        store
            .expect_put_json()
            .with(
                eq("backup-bucket"),
                eq("route53-backup/111122223333/example.com/schedule-20260824T120000.000Z.json"),
                mockall::predicate::function(|body: &Vec<u8>| {
                    let value: serde_json::Value = serde_json::from_slice(body).unwrap();
                    value["metadata"]["hostedZoneName"] == "example.com"
                }),
            )
            .times(1)
            .returning(|_, _, _| Ok(()));

        let writer = ObjectWriter::new(store, "backup-bucket");
        let mut failures = FailureLog::new();
        let key = writer
            .write(
                &sample_document("example.com", "schedule"),
                TriggerKind::ScheduledSweep,
                &mut failures,
            )
            .await;

        assert_eq!(
            key.as_deref(),
            Some("route53-backup/111122223333/example.com/schedule-20260824T120000.000Z.json")
        );
        assert!(failures.is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_is_absorbed_and_recorded() {
        let mut store = MockObjectStore::new();
        store
            .expect_put_json()
            .returning(|_, key, _| Err(BackupError::write(key, "access denied")));

        let writer = ObjectWriter::new(store, "backup-bucket");
        let mut failures = FailureLog::new();
        let key = writer
            .write(
                &sample_document("example.com", "schedule"),
                TriggerKind::ScheduledSweep,
                &mut failures,
            )
            .await;

        assert!(key.is_none());
        assert_eq!(failures.len(), 1);
        assert!(failures.entries()[0].contains("example.com"));
    }
}
