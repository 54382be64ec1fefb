use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::parser::Agency;

const DESCRIPTION: &str = "List of intelligence agencies";
const NAME: &str = "Intelligence Agencies";
const KIND: &str = "intelligence-agency";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Galaxy {
    pub description: String,
    pub icon: String,
    pub name: String,
    pub namespace: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub uuid: Uuid,
    pub version: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub authors: Vec<String>,
    pub category: String,
    pub description: String,
    pub name: String,
    pub source: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub uuid: Uuid,
    pub values: Vec<ClusterValue>,
    pub version: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub meta: Meta,
    pub uuid: Uuid,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refs: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synonyms: Option<Vec<String>>,
}

impl From<Agency> for ClusterValue {
    fn from(a: Agency) -> Self {
        ClusterValue {
            description: Some(a.description),
            meta: Meta {
                country: a.country_code,
                country_name: a.country_name,
                refs: a.reference.map(|r| vec![r]),
                synonyms: a.synonyms,
            },
            uuid: a.uuid,
            value: a.name,
        }
    }
}

impl Galaxy {
    pub fn intelligence_agencies(uuid: Uuid) -> Self {
        Galaxy {
            description: DESCRIPTION.to_string(),
            icon: "ninja".to_string(),
            name: NAME.to_string(),
            namespace: KIND.to_string(),
            kind: KIND.to_string(),
            uuid,
            version: 1,
        }
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        write_json(self, path)
    }
}

impl Cluster {
    pub fn intelligence_agencies(uuid: Uuid, source: String, authors: Vec<String>) -> Self {
        Cluster {
            authors,
            category: NAME.to_string(),
            description: DESCRIPTION.to_string(),
            name: NAME.to_string(),
            source,
            kind: KIND.to_string(),
            uuid,
            values: Vec::new(),
            version: 1,
        }
    }

    pub fn add_value(&mut self, value: ClusterValue) {
        self.values.push(value);
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        write_json(self, path)?;
        info!(path = %path.display(), values = self.values.len(), "cluster written");
        Ok(())
    }
}

pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

// ── Prior registry ──

#[derive(Deserialize)]
struct PriorCluster {
    #[serde(default)]
    values: Vec<PriorValue>,
}

#[derive(Deserialize)]
struct PriorValue {
    value: String,
    uuid: String,
}

/// Name → UUIDs from a previously written cluster file, in file order, so a
/// name written twice keeps both identifiers. `None` when the file does not
/// exist yet.
pub fn load_registry(path: &Path) -> Result<Option<HashMap<String, Vec<Uuid>>>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read prior cluster {}", path.display()))?;
    let prior: PriorCluster = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse prior cluster {}", path.display()))?;

    let mut known: HashMap<String, Vec<Uuid>> = HashMap::with_capacity(prior.values.len());
    for v in prior.values {
        match Uuid::parse_str(&v.uuid) {
            Ok(id) => known.entry(v.value).or_default().push(id),
            Err(e) => warn!(value = %v.value, uuid = %v.uuid, "skipping invalid prior UUID: {}", e),
        }
    }

    info!(path = %path.display(), entries = known.len(), "loaded prior identifiers");
    Ok(Some(known))
}

// ── Tests ──
