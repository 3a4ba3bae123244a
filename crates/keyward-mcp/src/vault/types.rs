//! Domain types decoded from backend responses.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Result of `sys/health`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthStatus {
    pub initialized: bool,
    pub sealed: bool,
    pub standby: bool,
    #[serde(default)]
    pub performance_standby: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_time_utc: Option<i64>,
}

/// One entry of a path-keyed table: secret engines, auth methods or audit devices.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MountEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessor: Option<String>,
    #[serde(default)]
    pub local: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
}

impl MountEntry {
    /// Decode a `{ "path/": { "type": ..., ... }, ... }` table, sorted by path.
    ///
    /// Entries that are not objects (response envelope fields such as
    /// `request_id`) are skipped.
    pub fn table_from(map: &Map<String, Value>) -> Result<Vec<MountEntry>, serde_json::Error> {
        let mut entries: Vec<MountEntry> = Vec::new();
        for (path, value) in map {
            let Some(fields) = value.as_object() else {
                continue;
            };
            if !fields.contains_key("type") {
                continue;
            }
            let mut fields = fields.clone();
            fields.insert("path".to_string(), Value::String(path.clone()));
            entries.push(serde_json::from_value(Value::Object(fields))?);
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }
}

/// Body for enabling a secret engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MountSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Map<String, Value>>,
}

/// Key/value engine layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KvVersion {
    V1,
    V2,
}

impl KvVersion {
    /// Path of a secret for read, write and delete.
    pub fn data_path(self, mount: &str, path: &str) -> String {
        match self {
            KvVersion::V1 => format!("{mount}/{path}"),
            KvVersion::V2 => format!("{mount}/data/{path}"),
        }
    }

    /// Path to list keys under.
    pub fn list_path(self, mount: &str, path: &str) -> String {
        let base = match self {
            KvVersion::V1 => mount.to_string(),
            KvVersion::V2 => format!("{mount}/metadata"),
        };
        if path.is_empty() {
            base
        } else {
            format!("{base}/{path}")
        }
    }

    /// Decode the `options.version` field of a mount.
    pub fn from_options(options: Option<&Value>) -> Self {
        match options.and_then(|o| o.get("version")).and_then(Value::as_str) {
            Some("2") => KvVersion::V2,
            _ => KvVersion::V1,
        }
    }
}
