//! AWS Config custom-rule backup Lambda.
//!
//! The policy-engine deployment: AWS Config invokes the rule whenever a
//! hosted zone's recorded configuration changes, the rule backs the zone up,
//! and reports exactly one compliance evaluation per invocation. A successful
//! write is COMPLIANT; an unsupported item, a failed write, or any pipeline
//! error is NON_COMPLIANT with the failure as annotation.

use anyhow::Context as _;
use aws_config::BehaviorVersion;
use aws_sdk_config::primitives::{DateTime, DateTimeFormat};
use aws_sdk_config::types::{ComplianceType, Evaluation};
use aws_sdk_config::Client as ConfigClient;
use lambda_runtime::Error;
use serde::Serialize;
use tracing::{error, info, warn};

use backup_core::config::Settings;
use backup_core::config_rule::{
    normalize_config_item, parse_invoking_event, ConfigRuleEvent, ConfigurationItem,
};
use backup_core::document::{InvocationContext, UNKNOWN_ACCOUNT};
use backup_core::driver::{BackupDriver, BackupReport};
use backup_core::error::BackupError;
use backup_core::reader::Route53ZoneStore;
use backup_core::trigger::Trigger;
use backup_core::writer::{ObjectWriter, S3ObjectStore};

/// AWS Config rejects evaluation annotations longer than this.
pub const MAX_ANNOTATION_LEN: usize = 256;

/// Lambda response, mirroring what was reported to AWS Config.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RuleResponse {
    pub compliance: String,
    pub annotation: String,
}

/// The evaluation verdict for one configuration item.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplianceOutcome {
    pub compliant: bool,
    pub annotation: String,
}

impl ComplianceOutcome {
    pub fn label(&self) -> &'static str {
        if self.compliant {
            "COMPLIANT"
        } else {
            "NON_COMPLIANT"
        }
    }

    pub fn compliance_type(&self) -> ComplianceType {
        if self.compliant {
            ComplianceType::Compliant
        } else {
            ComplianceType::NonCompliant
        }
    }
}

/// Cap an annotation at the AWS Config limit.
pub fn truncate_annotation(annotation: &str) -> String {
    if annotation.chars().count() <= MAX_ANNOTATION_LEN {
        return annotation.to_string();
    }
    let mut truncated: String = annotation.chars().take(MAX_ANNOTATION_LEN - 3).collect();
    truncated.push_str("...");
    truncated
}

/// Map a finished (or failed) backup run to a compliance outcome.
///
/// A successful run carries the destination bucket alongside the report so
/// the annotation can name the storage location.
pub fn outcome_from_run(
    zone_id: &str,
    run: Result<(String, BackupReport), BackupError>,
) -> ComplianceOutcome {
    let (compliant, annotation) = match run {
        Ok((bucket, report)) => match report.keys.first() {
            Some(key) => (
                true,
                format!("Backed up hosted zone {} to s3://{}/{}", zone_id, bucket, key),
            ),
            None if report.failures.is_empty() => (
                false,
                format!(
                    "No backup was written for hosted zone {} ({} trigger)",
                    zone_id, report.trigger
                ),
            ),
            None => (
                false,
                format!(
                    "Backup of hosted zone {} failed: {}",
                    zone_id,
                    report.failures.join("; ")
                ),
            ),
        },
        Err(err) => (
            false,
            format!("Backup of hosted zone {} failed: {}", zone_id, err),
        ),
    };
    ComplianceOutcome {
        compliant,
        annotation: truncate_annotation(&annotation),
    }
}

/// Ordering timestamp for the evaluation, taken from the configuration
/// item's capture time. An absent or unparseable capture time falls back to
/// the current time so the evaluation still goes out.
pub fn ordering_timestamp(item: &ConfigurationItem) -> DateTime {
    match item.configuration_item_capture_time.as_deref() {
        Some(raw) => match DateTime::from_str(raw, DateTimeFormat::DateTime) {
            Ok(ts) => ts,
            Err(err) => {
                warn!("capture time {:?} does not parse ({}), using now", raw, err);
                DateTime::from(std::time::SystemTime::now())
            }
        },
        None => {
            warn!("configuration item carries no capture time, using now");
            DateTime::from(std::time::SystemTime::now())
        }
    }
}

pub struct ConfigRuleService {
    config_client: ConfigClient,
    route53_client: aws_sdk_route53::Client,
    s3_client: aws_sdk_s3::Client,
}

impl ConfigRuleService {
    pub async fn new() -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        Self {
            config_client: ConfigClient::new(&config),
            route53_client: aws_sdk_route53::Client::new(&config),
            s3_client: aws_sdk_s3::Client::new(&config),
        }
    }

    /// Evaluate one Config rule invocation and report the result.
    ///
    /// Everything past the event parse is absorbed into the evaluation: a
    /// pipeline error becomes a NON_COMPLIANT annotation, never an unhandled
    /// handler failure.
    pub async fn process(&self, event: &ConfigRuleEvent) -> Result<RuleResponse, Error> {
        let invoking = parse_invoking_event(&event.invoking_event)?;
        let item = invoking.configuration_item.ok_or_else(|| {
            BackupError::malformed("invokingEvent carries no configuration item")
        })?;

        let account = item
            .aws_account_id
            .clone()
            .or_else(|| event.account_id.clone())
            .unwrap_or_else(|| {
                warn!("event carries no account id, using {:?}", UNKNOWN_ACCOUNT);
                UNKNOWN_ACCOUNT.to_string()
            });
        let ctx = InvocationContext::new(account);
        let trigger = normalize_config_item(&item);

        let outcome = outcome_from_run(&item.resource_id, self.run_backup(&trigger, &ctx).await);
        if outcome.compliant {
            info!("{}: {}", outcome.label(), outcome.annotation);
        } else {
            error!("{}: {}", outcome.label(), outcome.annotation);
        }

        self.put_evaluation(&item, &event.result_token, &outcome)
            .await?;

        Ok(RuleResponse {
            compliance: outcome.label().to_string(),
            annotation: outcome.annotation,
        })
    }

    /// Run the backup pipeline; returns the bucket written to alongside the
    /// report. The bucket is resolved here so a missing configuration also
    /// folds into the NON_COMPLIANT path.
    async fn run_backup(
        &self,
        trigger: &Trigger,
        ctx: &InvocationContext,
    ) -> Result<(String, BackupReport), BackupError> {
        let settings = Settings::from_env()?;
        let driver = BackupDriver::new(
            Route53ZoneStore::new(self.route53_client.clone()),
            ObjectWriter::new(S3ObjectStore::new(self.s3_client.clone()), settings.bucket()),
        );
        let report = driver.run(trigger, ctx).await?;
        Ok((settings.bucket().to_string(), report))
    }

    async fn put_evaluation(
        &self,
        item: &ConfigurationItem,
        result_token: &str,
        outcome: &ComplianceOutcome,
    ) -> Result<(), Error> {
        let evaluation = Evaluation::builder()
            .compliance_resource_type(&item.resource_type)
            .compliance_resource_id(&item.resource_id)
            .compliance_type(outcome.compliance_type())
            .annotation(&outcome.annotation)
            .ordering_timestamp(ordering_timestamp(item))
            .build()?;

        self.config_client
            .put_evaluations()
            .result_token(result_token)
            .evaluations(evaluation)
            .send()
            .await
            .context("reporting evaluation to AWS Config")?;

        info!(
            "reported {} for {} to AWS Config",
            outcome.label(),
            item.resource_id
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(keys: Vec<&str>, failures: Vec<&str>, trigger: &str) -> BackupReport {
        BackupReport {
            trigger: trigger.to_string(),
            zones_considered: 1,
            documents_written: keys.len(),
            keys: keys.into_iter().map(str::to_string).collect(),
            failures: failures.into_iter().map(str::to_string).collect(),
            timestamp: "20260824T120000.000Z".to_string(),
        }
    }

    #[test]
    fn test_successful_write_is_compliant() {
        let run = Ok((
            "backup-bucket".to_string(),
            report(
                vec!["route53-backup/1/example.com/change-20260824T120000.000Z.json"],
                vec![],
                "change",
            ),
        ));
        let outcome = outcome_from_run("Z123", run);
        assert!(outcome.compliant);
        assert_eq!(outcome.label(), "COMPLIANT");
        assert_eq!(
            outcome.annotation,
            "Backed up hosted zone Z123 to s3://backup-bucket/\
             route53-backup/1/example.com/change-20260824T120000.000Z.json"
        );
    }

    #[test]
    fn test_write_failure_is_non_compliant_with_failures() {
        let run = Ok((
            "backup-bucket".to_string(),
            report(vec![], vec!["writing backup for zone example.com: denied"], "change"),
        ));
        let outcome = outcome_from_run("Z123", run);
        assert!(!outcome.compliant);
        assert_eq!(outcome.label(), "NON_COMPLIANT");
        assert!(outcome.annotation.contains("denied"));
    }

    #[test]
    fn test_unsupported_trigger_is_non_compliant() {
        let run = Ok(("backup-bucket".to_string(), report(vec![], vec![], "unsupported")));
        let outcome = outcome_from_run("Z123", run);
        assert!(!outcome.compliant);
        assert!(outcome.annotation.contains("unsupported trigger"));
    }

    #[test]
    fn test_pipeline_error_is_non_compliant() {
        let run = Err(BackupError::fetch("hosted zone", "Z123", "not found"));
        let outcome = outcome_from_run("Z123", run);
        assert!(!outcome.compliant);
        assert_eq!(
            outcome.annotation,
            "Backup of hosted zone Z123 failed: failed to fetch hosted zone Z123: not found"
        );
    }

    #[test]
    fn test_annotation_is_capped_at_the_config_limit() {
        let long = "x".repeat(400);
        let run = Err(BackupError::config(long));
        let outcome = outcome_from_run("Z123", run);
        assert_eq!(outcome.annotation.chars().count(), MAX_ANNOTATION_LEN);
        assert!(outcome.annotation.ends_with("..."));

        let short = truncate_annotation("short enough");
        assert_eq!(short, "short enough");
    }

    #[test]
    fn test_ordering_timestamp_parses_capture_time() {
        let item: ConfigurationItem = serde_json::from_value(serde_json::json!({
            "resourceId": "Z123",
            "resourceType": "AWS::Route53::HostedZone",
            "configurationItemCaptureTime": "1970-01-01T00:01:00.000Z"
        }))
        .unwrap();
        assert_eq!(ordering_timestamp(&item).secs(), 60);
    }

    #[test]
    fn test_unparseable_capture_time_falls_back_to_now() {
        let item: ConfigurationItem = serde_json::from_value(serde_json::json!({
            "resourceId": "Z123",
            "resourceType": "AWS::Route53::HostedZone",
            "configurationItemCaptureTime": "not a timestamp"
        }))
        .unwrap();
        assert!(ordering_timestamp(&item).secs() > 0);
    }
}
