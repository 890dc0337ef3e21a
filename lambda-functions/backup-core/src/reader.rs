//! Resource Reader: read-only access to Route 53 configuration.
//!
//! The [`ZoneStore`] trait is the seam the rest of the pipeline works
//! against; [`Route53ZoneStore`] is the production implementation. Listings
//! exhaust pagination and return items in provider order. The SDK output
//! types do not serialize, so every item is mapped to JSON here using the
//! provider's documented key casing; optional fields absent from a response
//! are omitted from the JSON.

use async_trait::async_trait;
use aws_sdk_route53::error::DisplayErrorContext;
use aws_sdk_route53::types::{
    CidrBlockSummary, CollectionSummary, HealthCheck, HostedZone, ResourceRecordSet, RrType,
    TrafficPolicy, TrafficPolicySummary,
};
use aws_sdk_route53::Client as Route53Client;
use serde_json::{json, Map, Value};
use tracing::warn;

#[cfg(test)]
use mockall::automock;

use crate::error::{BackupError, Result};
use crate::zone::ZoneSnapshot;

/// Read-only view of the account's Route 53 configuration.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ZoneStore: Send + Sync {
    /// Every hosted zone in the account.
    async fn list_zones(&self) -> Result<Vec<ZoneSnapshot>>;

    /// A single hosted zone by id.
    async fn get_zone(&self, id: &str) -> Result<ZoneSnapshot>;

    /// Every record set in a zone.
    async fn list_record_sets(&self, zone_id: &str) -> Result<Vec<Value>>;

    /// Every health check in the account.
    async fn list_health_checks(&self) -> Result<Vec<Value>>;

    /// Every CIDR collection in the account, each with its blocks.
    async fn list_cidr_collections(&self) -> Result<Vec<Value>>;

    /// Every traffic policy in the account, each with its versions.
    async fn list_traffic_policies(&self) -> Result<Vec<Value>>;

    /// A single traffic policy version, with its document parsed.
    async fn get_traffic_policy(&self, id: &str, version: i32) -> Result<Value>;
}

/// [`ZoneStore`] over the Route 53 API.
pub struct Route53ZoneStore {
    client: Route53Client,
}

impl Route53ZoneStore {
    pub fn new(client: Route53Client) -> Self {
        Self { client }
    }

    async fn collect_cidr_blocks(&self, collection_id: &str) -> Result<Vec<Value>> {
        let mut blocks = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let mut request = self.client.list_cidr_blocks().collection_id(collection_id);
            if let Some(t) = token {
                request = request.next_token(t);
            }

            let page = request
                .send()
                .await
                .map_err(|e| BackupError::listing("CIDR blocks", DisplayErrorContext(&e)))?;

            for block in page.cidr_blocks() {
                blocks.push(map_cidr_block(block));
            }

            token = page.next_token().map(str::to_string);
            if token.is_none() {
                break;
            }
        }

        Ok(blocks)
    }

    async fn collect_policy_versions(&self, policy_id: &str) -> Result<Vec<Value>> {
        let mut versions = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut request = self.client.list_traffic_policy_versions().id(policy_id);
            if let Some(m) = marker {
                request = request.traffic_policy_version_marker(m);
            }

            let page = request.send().await.map_err(|e| {
                BackupError::listing("traffic policy versions", DisplayErrorContext(&e))
            })?;

            for policy in page.traffic_policies() {
                versions.push(map_traffic_policy(policy));
            }

            if !page.is_truncated() {
                break;
            }
            let next = page.traffic_policy_version_marker();
            if next.is_empty() {
                break;
            }
            marker = Some(next.to_string());
        }

        Ok(versions)
    }
}

#[async_trait]
impl ZoneStore for Route53ZoneStore {
    async fn list_zones(&self) -> Result<Vec<ZoneSnapshot>> {
        let mut zones = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut request = self.client.list_hosted_zones();
            if let Some(m) = marker {
                request = request.marker(m);
            }

            let page = request
                .send()
                .await
                .map_err(|e| BackupError::listing("hosted zones", DisplayErrorContext(&e)))?;

            for zone in page.hosted_zones() {
                zones.push(ZoneSnapshot::new(zone.id(), zone.name(), map_hosted_zone(zone)));
            }

            if !page.is_truncated() {
                break;
            }
            match page.next_marker() {
                Some(m) => marker = Some(m.to_string()),
                None => break,
            }
        }

        Ok(zones)
    }

    async fn get_zone(&self, id: &str) -> Result<ZoneSnapshot> {
        let response = self
            .client
            .get_hosted_zone()
            .id(id)
            .send()
            .await
            .map_err(|e| BackupError::fetch("hosted zone", id, DisplayErrorContext(&e)))?;

        let zone = response.hosted_zone().ok_or_else(|| {
            BackupError::fetch("hosted zone", id, "response carried no hosted zone")
        })?;

        Ok(ZoneSnapshot::new(zone.id(), zone.name(), map_hosted_zone(zone)))
    }

    async fn list_record_sets(&self, zone_id: &str) -> Result<Vec<Value>> {
        let mut records = Vec::new();
        let mut cursor: Option<(String, RrType, Option<String>)> = None;

        loop {
            let mut request = self
                .client
                .list_resource_record_sets()
                .hosted_zone_id(zone_id);
            if let Some((name, rr_type, identifier)) = cursor {
                request = request.start_record_name(name).start_record_type(rr_type);
                if let Some(identifier) = identifier {
                    request = request.start_record_identifier(identifier);
                }
            }

            let page = request.send().await.map_err(|e| {
                BackupError::listing("resource record sets", DisplayErrorContext(&e))
            })?;

            for record_set in page.resource_record_sets() {
                records.push(map_record_set(record_set));
            }

            if !page.is_truncated() {
                break;
            }
            cursor = match (page.next_record_name(), page.next_record_type()) {
                (Some(name), Some(rr_type)) => Some((
                    name.to_string(),
                    rr_type.clone(),
                    page.next_record_identifier().map(str::to_string),
                )),
                _ => break,
            };
        }

        Ok(records)
    }

    async fn list_health_checks(&self) -> Result<Vec<Value>> {
        let mut checks = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut request = self.client.list_health_checks();
            if let Some(m) = marker {
                request = request.marker(m);
            }

            let page = request
                .send()
                .await
                .map_err(|e| BackupError::listing("health checks", DisplayErrorContext(&e)))?;

            for check in page.health_checks() {
                checks.push(map_health_check(check));
            }

            if !page.is_truncated() {
                break;
            }
            match page.next_marker() {
                Some(m) => marker = Some(m.to_string()),
                None => break,
            }
        }

        Ok(checks)
    }

    async fn list_cidr_collections(&self) -> Result<Vec<Value>> {
        let mut collections = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let mut request = self.client.list_cidr_collections();
            if let Some(t) = token {
                request = request.next_token(t);
            }

            let page = request
                .send()
                .await
                .map_err(|e| BackupError::listing("CIDR collections", DisplayErrorContext(&e)))?;

            for summary in page.cidr_collections() {
                let id = match summary.id() {
                    Some(id) => id,
                    None => {
                        warn!("CIDR collection summary carries no id, skipping");
                        continue;
                    }
                };
                // Blocks are fetched per collection; one broken collection
                // must not sink the whole listing.
                let blocks = self.collect_cidr_blocks(id).await;
                push_with_children(&mut collections, "CIDR collection", id, blocks, |blocks| {
                    map_cidr_collection(summary, blocks)
                });
            }

            token = page.next_token().map(str::to_string);
            if token.is_none() {
                break;
            }
        }

        Ok(collections)
    }

    async fn list_traffic_policies(&self) -> Result<Vec<Value>> {
        let mut policies = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut request = self.client.list_traffic_policies();
            if let Some(m) = marker {
                request = request.traffic_policy_id_marker(m);
            }

            let page = request
                .send()
                .await
                .map_err(|e| BackupError::listing("traffic policies", DisplayErrorContext(&e)))?;

            for summary in page.traffic_policy_summaries() {
                let versions = self.collect_policy_versions(summary.id()).await;
                push_with_children(&mut policies, "traffic policy", summary.id(), versions, |v| {
                    map_traffic_policy_summary(summary, v)
                });
            }

            if !page.is_truncated() {
                break;
            }
            let next = page.traffic_policy_id_marker();
            if next.is_empty() {
                break;
            }
            marker = Some(next.to_string());
        }

        Ok(policies)
    }

    async fn get_traffic_policy(&self, id: &str, version: i32) -> Result<Value> {
        let response = self
            .client
            .get_traffic_policy()
            .id(id)
            .version(version)
            .send()
            .await
            .map_err(|e| BackupError::fetch("traffic policy", id, DisplayErrorContext(&e)))?;

        let policy = response.traffic_policy().ok_or_else(|| {
            BackupError::fetch("traffic policy", id, "response carried no traffic policy")
        })?;

        Ok(map_traffic_policy(policy))
    }
}

/// Fold one parent's child fetch into a listing. Children are auxiliary: a
/// parent whose child fetch failed is logged and omitted so the rest of the
/// listing survives.
fn push_with_children<F>(
    items: &mut Vec<Value>,
    resource: &'static str,
    id: &str,
    children: Result<Vec<Value>>,
    build: F,
) where
    F: FnOnce(Vec<Value>) -> Value,
{
    match children {
        Ok(children) => items.push(build(children)),
        Err(err) => warn!("skipping {} {}: {}", resource, id, err),
    }
}

fn map_hosted_zone(zone: &HostedZone) -> Value {
    let mut map = Map::new();
    map.insert("Id".to_string(), json!(zone.id()));
    map.insert("Name".to_string(), json!(zone.name()));
    map.insert("CallerReference".to_string(), json!(zone.caller_reference()));
    if let Some(config) = zone.config() {
        let mut config_map = Map::new();
        if let Some(comment) = config.comment() {
            config_map.insert("Comment".to_string(), json!(comment));
        }
        config_map.insert("PrivateZone".to_string(), json!(config.private_zone()));
        map.insert("Config".to_string(), Value::Object(config_map));
    }
    if let Some(count) = zone.resource_record_set_count() {
        map.insert("ResourceRecordSetCount".to_string(), json!(count));
    }
    if let Some(linked) = zone.linked_service() {
        let mut linked_map = Map::new();
        if let Some(principal) = linked.service_principal() {
            linked_map.insert("ServicePrincipal".to_string(), json!(principal));
        }
        if let Some(description) = linked.description() {
            linked_map.insert("Description".to_string(), json!(description));
        }
        map.insert("LinkedService".to_string(), Value::Object(linked_map));
    }
    Value::Object(map)
}

fn map_record_set(record_set: &ResourceRecordSet) -> Value {
    let mut map = Map::new();
    map.insert("Name".to_string(), json!(record_set.name()));
    map.insert("Type".to_string(), json!(record_set.r#type().as_str()));
    if let Some(identifier) = record_set.set_identifier() {
        map.insert("SetIdentifier".to_string(), json!(identifier));
    }
    if let Some(weight) = record_set.weight() {
        map.insert("Weight".to_string(), json!(weight));
    }
    if let Some(region) = record_set.region() {
        map.insert("Region".to_string(), json!(region.as_str()));
    }
    if let Some(geo) = record_set.geo_location() {
        let mut geo_map = Map::new();
        if let Some(continent) = geo.continent_code() {
            geo_map.insert("ContinentCode".to_string(), json!(continent));
        }
        if let Some(country) = geo.country_code() {
            geo_map.insert("CountryCode".to_string(), json!(country));
        }
        if let Some(subdivision) = geo.subdivision_code() {
            geo_map.insert("SubdivisionCode".to_string(), json!(subdivision));
        }
        map.insert("GeoLocation".to_string(), Value::Object(geo_map));
    }
    if let Some(failover) = record_set.failover() {
        map.insert("Failover".to_string(), json!(failover.as_str()));
    }
    if let Some(multi) = record_set.multi_value_answer() {
        map.insert("MultiValueAnswer".to_string(), json!(multi));
    }
    if let Some(ttl) = record_set.ttl() {
        map.insert("TTL".to_string(), json!(ttl));
    }
    let records = record_set.resource_records();
    if !records.is_empty() {
        let values: Vec<Value> = records
            .iter()
            .map(|record| json!({ "Value": record.value() }))
            .collect();
        map.insert("ResourceRecords".to_string(), Value::Array(values));
    }
    if let Some(alias) = record_set.alias_target() {
        map.insert(
            "AliasTarget".to_string(),
            json!({
                "HostedZoneId": alias.hosted_zone_id(),
                "DNSName": alias.dns_name(),
                "EvaluateTargetHealth": alias.evaluate_target_health(),
            }),
        );
    }
    if let Some(health_check) = record_set.health_check_id() {
        map.insert("HealthCheckId".to_string(), json!(health_check));
    }
    if let Some(instance) = record_set.traffic_policy_instance_id() {
        map.insert("TrafficPolicyInstanceId".to_string(), json!(instance));
    }
    if let Some(cidr) = record_set.cidr_routing_config() {
        map.insert(
            "CidrRoutingConfig".to_string(),
            json!({
                "CollectionId": cidr.collection_id(),
                "LocationName": cidr.location_name(),
            }),
        );
    }
    if let Some(geo_proximity) = record_set.geo_proximity_location() {
        let mut prox_map = Map::new();
        if let Some(region) = geo_proximity.aws_region() {
            prox_map.insert("AWSRegion".to_string(), json!(region));
        }
        if let Some(group) = geo_proximity.local_zone_group() {
            prox_map.insert("LocalZoneGroup".to_string(), json!(group));
        }
        if let Some(coordinates) = geo_proximity.coordinates() {
            prox_map.insert(
                "Coordinates".to_string(),
                json!({
                    "Latitude": coordinates.latitude(),
                    "Longitude": coordinates.longitude(),
                }),
            );
        }
        if let Some(bias) = geo_proximity.bias() {
            prox_map.insert("Bias".to_string(), json!(bias));
        }
        map.insert("GeoProximityLocation".to_string(), Value::Object(prox_map));
    }
    Value::Object(map)
}

fn map_health_check(check: &HealthCheck) -> Value {
    let mut map = Map::new();
    map.insert("Id".to_string(), json!(check.id()));
    map.insert("CallerReference".to_string(), json!(check.caller_reference()));
    map.insert(
        "HealthCheckVersion".to_string(),
        json!(check.health_check_version()),
    );
    if let Some(config) = check.health_check_config() {
        let mut config_map = Map::new();
        config_map.insert("Type".to_string(), json!(config.r#type().as_str()));
        if let Some(ip) = config.ip_address() {
            config_map.insert("IPAddress".to_string(), json!(ip));
        }
        if let Some(port) = config.port() {
            config_map.insert("Port".to_string(), json!(port));
        }
        if let Some(path) = config.resource_path() {
            config_map.insert("ResourcePath".to_string(), json!(path));
        }
        if let Some(fqdn) = config.fully_qualified_domain_name() {
            config_map.insert("FullyQualifiedDomainName".to_string(), json!(fqdn));
        }
        if let Some(search) = config.search_string() {
            config_map.insert("SearchString".to_string(), json!(search));
        }
        if let Some(interval) = config.request_interval() {
            config_map.insert("RequestInterval".to_string(), json!(interval));
        }
        if let Some(threshold) = config.failure_threshold() {
            config_map.insert("FailureThreshold".to_string(), json!(threshold));
        }
        if let Some(latency) = config.measure_latency() {
            config_map.insert("MeasureLatency".to_string(), json!(latency));
        }
        if let Some(inverted) = config.inverted() {
            config_map.insert("Inverted".to_string(), json!(inverted));
        }
        if let Some(disabled) = config.disabled() {
            config_map.insert("Disabled".to_string(), json!(disabled));
        }
        if let Some(sni) = config.enable_sni() {
            config_map.insert("EnableSNI".to_string(), json!(sni));
        }
        if let Some(health_threshold) = config.health_threshold() {
            config_map.insert("HealthThreshold".to_string(), json!(health_threshold));
        }
        let children = config.child_health_checks();
        if !children.is_empty() {
            config_map.insert("ChildHealthChecks".to_string(), json!(children));
        }
        let regions: Vec<&str> = config.regions().iter().map(|r| r.as_str()).collect();
        if !regions.is_empty() {
            config_map.insert("Regions".to_string(), json!(regions));
        }
        if let Some(status) = config.insufficient_data_health_status() {
            config_map.insert(
                "InsufficientDataHealthStatus".to_string(),
                json!(status.as_str()),
            );
        }
        if let Some(alarm) = config.alarm_identifier() {
            config_map.insert(
                "AlarmIdentifier".to_string(),
                json!({
                    "Region": alarm.region().as_str(),
                    "Name": alarm.name(),
                }),
            );
        }
        if let Some(arn) = config.routing_control_arn() {
            config_map.insert("RoutingControlArn".to_string(), json!(arn));
        }
        map.insert("HealthCheckConfig".to_string(), Value::Object(config_map));
    }
    if let Some(linked) = check.linked_service() {
        let mut linked_map = Map::new();
        if let Some(principal) = linked.service_principal() {
            linked_map.insert("ServicePrincipal".to_string(), json!(principal));
        }
        if let Some(description) = linked.description() {
            linked_map.insert("Description".to_string(), json!(description));
        }
        map.insert("LinkedService".to_string(), Value::Object(linked_map));
    }
    Value::Object(map)
}

fn map_cidr_collection(summary: &CollectionSummary, blocks: Vec<Value>) -> Value {
    let mut map = Map::new();
    if let Some(id) = summary.id() {
        map.insert("Id".to_string(), json!(id));
    }
    if let Some(name) = summary.name() {
        map.insert("Name".to_string(), json!(name));
    }
    if let Some(arn) = summary.arn() {
        map.insert("Arn".to_string(), json!(arn));
    }
    if let Some(version) = summary.version() {
        map.insert("Version".to_string(), json!(version));
    }
    map.insert("CidrBlocks".to_string(), Value::Array(blocks));
    Value::Object(map)
}

fn map_cidr_block(block: &CidrBlockSummary) -> Value {
    let mut map = Map::new();
    if let Some(cidr) = block.cidr_block() {
        map.insert("CidrBlock".to_string(), json!(cidr));
    }
    if let Some(location) = block.location_name() {
        map.insert("LocationName".to_string(), json!(location));
    }
    Value::Object(map)
}

fn map_traffic_policy_summary(summary: &TrafficPolicySummary, versions: Vec<Value>) -> Value {
    let mut map = Map::new();
    map.insert("Id".to_string(), json!(summary.id()));
    map.insert("Name".to_string(), json!(summary.name()));
    map.insert("Type".to_string(), json!(summary.r#type().as_str()));
    map.insert("LatestVersion".to_string(), json!(summary.latest_version()));
    map.insert(
        "TrafficPolicyCount".to_string(),
        json!(summary.traffic_policy_count()),
    );
    map.insert("Versions".to_string(), Value::Array(versions));
    Value::Object(map)
}

fn map_traffic_policy(policy: &TrafficPolicy) -> Value {
    let mut map = Map::new();
    map.insert("Id".to_string(), json!(policy.id()));
    map.insert("Version".to_string(), json!(policy.version()));
    map.insert("Name".to_string(), json!(policy.name()));
    map.insert("Type".to_string(), json!(policy.r#type().as_str()));
    map.insert("Document".to_string(), parse_policy_document(policy.document()));
    if let Some(comment) = policy.comment() {
        map.insert("Comment".to_string(), json!(comment));
    }
    Value::Object(map)
}

/// Traffic policy documents come back as JSON text; store them structured so
/// the backup is diffable. Unparseable text is kept verbatim.
fn parse_policy_document(raw: &str) -> Value {
    match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(err) => {
            warn!("traffic policy document is not valid JSON ({}), keeping raw text", err);
            Value::String(raw.to_string())
        }
    }
}
