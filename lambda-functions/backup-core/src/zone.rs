//! Hosted zone identity handling.

use serde_json::{json, Value};

/// A hosted zone captured for backup.
///
/// `id` and `name` are normalized at construction; `raw` holds the full
/// provider representation of the zone as it goes into the backup document.
#[derive(Debug, Clone)]
pub struct ZoneSnapshot {
    id: String,
    name: String,
    raw: Value,
}

impl ZoneSnapshot {
    /// Build a snapshot from provider data, normalizing the id and name.
    pub fn new(id: &str, name: &str, raw: Value) -> Self {
        Self {
            id: normalize_zone_id(id).to_string(),
            name: normalize_zone_name(name).to_string(),
            raw,
        }
    }

    /// Build a minimal stand-in snapshot when the real zone could not be
    /// fetched. The raw representation carries just the identity fields.
    pub fn placeholder(id: &str, name: &str) -> Self {
        let id = normalize_zone_id(id);
        let name = normalize_zone_name(name);
        Self {
            id: id.to_string(),
            name: name.to_string(),
            raw: json!({ "Id": id, "Name": name }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn into_raw(self) -> Value {
        self.raw
    }
}

/// Reduce a hosted zone id to its bare form.
///
/// The service reports ids as `/hostedzone/Z123...`; everything up to and
/// including the last `/` is dropped. Ids already in bare form pass through
/// unchanged, as does an id ending in `/` (nothing useful follows it).
pub fn normalize_zone_id(id: &str) -> &str {
    match id.rsplit_once('/') {
        Some((_, tail)) if !tail.is_empty() => tail,
        _ => id,
    }
}

/// Strip the trailing dot from an absolute zone name.
///
/// Exactly one dot is removed, so `example.com.` becomes `example.com` and a
/// (malformed) `example.com..` keeps one dot.
pub fn normalize_zone_name(name: &str) -> &str {
    name.strip_suffix('.').unwrap_or(name)
}
