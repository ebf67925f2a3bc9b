//! Persisted cross-phase state.
//!
//! The three pipeline phases run as separate OS processes, so everything
//! one phase computes for the next must survive a process boundary. This
//! module models that contract explicitly: a file-backed key/value store
//! with a documented schema, passed into each phase as a dependency.
//!
//! Write contract per phase: Prepare writes endpoint, server version,
//! scanner mode, scanner binary path, report dir and the property map;
//! Analyze rewrites only the (sanitized) property map; Publish writes the
//! quality-gate outcome. A phase never mutates keys it does not own.

use crate::error::{GatewatchError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// State keys, stable across the phases of one pipeline run.
pub mod keys {
    /// Scanner mode name (`cli`, `build`, `other`)
    pub const SCANNER_MODE: &str = "scanner.mode";
    /// Endpoint serialized via its transfer form
    pub const ENDPOINT: &str = "endpoint";
    /// Raw server version string fetched in Prepare
    pub const SERVER_VERSION: &str = "server.version";
    /// Property map handed to the scanner (JSON object, values may be null)
    pub const ANALYSIS_PROPERTIES: &str = "analysis.properties";
    /// Resolved scanner binary path
    pub const SCANNER_BINARY: &str = "scanner.binary";
    /// Directory the task report files are expected under
    pub const REPORT_DIR: &str = "report.dir";
    /// Aggregate quality-gate outcome (`ok` / `failed`)
    pub const QUALITY_GATE: &str = "publish.qualityGate";
}

/// On-disk layout of the state file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    entries: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    updated_at: Option<String>,
}

/// File-backed key/value store shared across phase processes.
///
/// Values are stored as JSON. Each phase runs alone, so reads and writes
/// are plain load/modify/save round-trips with no locking.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Create a store over the given file path. The file is created lazily
    /// on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Store a JSON value under `key`.
    pub fn set(&self, key: &str, value: serde_json::Value) -> Result<()> {
        let mut file = self.read_file()?;
        file.entries.insert(key.to_string(), value);
        file.updated_at = Some(chrono::Utc::now().to_rfc3339());
        self.write_file(&file)?;
        tracing::debug!(key, "persisted state entry");
        Ok(())
    }

    /// Fetch the JSON value stored under `key`, if any.
    pub fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let file = self.read_file()?;
        Ok(file.entries.get(key).cloned())
    }

    /// Store a plain string under `key`.
    pub fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.set(key, serde_json::Value::String(value.to_string()))
    }

    /// Fetch a plain string stored under `key`.
    ///
    /// Returns `Ok(None)` when the key is absent; fails when the stored
    /// value is not a string.
    pub fn get_string(&self, key: &str) -> Result<Option<String>> {
        match self.get(key)? {
            None => Ok(None),
            Some(serde_json::Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(GatewatchError::State(format!(
                "state key '{key}' holds {other} where a string was expected"
            ))),
        }
    }

    /// Fetch a required string, failing with a configuration error naming
    /// the missing prior-phase key.
    pub fn require_string(&self, key: &str) -> Result<String> {
        self.get_string(key)?.ok_or_else(|| {
            GatewatchError::Config(format!(
                "missing state '{key}'; was the prepare phase run for this pipeline?"
            ))
        })
    }

    /// Store the analysis property map. `None` values are kept as explicit
    /// JSON nulls so downstream consumers can tell "absent" from "empty".
    pub fn set_properties(&self, properties: &BTreeMap<String, Option<String>>) -> Result<()> {
        let object: serde_json::Map<String, serde_json::Value> = properties
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    Some(s) => serde_json::Value::String(s.clone()),
                    None => serde_json::Value::Null,
                };
                (k.clone(), value)
            })
            .collect();
        self.set(keys::ANALYSIS_PROPERTIES, serde_json::Value::Object(object))
    }

    /// Fetch the analysis property map persisted by a prior phase.
    pub fn get_properties(&self) -> Result<Option<BTreeMap<String, Option<String>>>> {
        let Some(value) = self.get(keys::ANALYSIS_PROPERTIES)? else {
            return Ok(None);
        };

        let serde_json::Value::Object(object) = value else {
            return Err(GatewatchError::State(
                "persisted property map is not a JSON object".to_string(),
            ));
        };

        let mut properties = BTreeMap::new();
        for (key, value) in object {
            let entry = match value {
                serde_json::Value::String(s) => Some(s),
                serde_json::Value::Null => None,
                other => {
                    return Err(GatewatchError::State(format!(
                        "property '{key}' holds {other} where a string or null was expected"
                    )))
                }
            };
            properties.insert(key, entry);
        }
        Ok(Some(properties))
    }

    fn read_file(&self) -> Result<StateFile> {
        if !self.path.exists() {
            return Ok(StateFile::default());
        }
        let contents = fs::read_to_string(&self.path)?;
        serde_json::from_str(&contents).map_err(|e| {
            GatewatchError::State(format!(
                "corrupt state file {}: {e}",
                self.path.display()
            ))
        })
    }

    fn write_file(&self, file: &StateFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(file)
            .map_err(|e| GatewatchError::State(format!("serialize state: {e}")))?;
        fs::write(&self.path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(tmp: &TempDir) -> StateStore {
        StateStore::new(tmp.path().join("state.json"))
    }

    #[test]
    fn test_set_and_get_string() {
        let tmp = TempDir::new().expect("create temp dir");
        let store = store_in(&tmp);

        store
            .set_string(keys::SCANNER_MODE, "cli")
            .expect("set scanner mode");

        let value = store.get_string(keys::SCANNER_MODE).expect("get mode");
        assert_eq!(value.as_deref(), Some("cli"));
    }

    #[test]
    fn test_get_missing_key() {
        let tmp = TempDir::new().expect("create temp dir");
        let store = store_in(&tmp);

        assert_eq!(store.get_string("absent").expect("get"), None);
    }

    #[test]
    fn test_require_missing_key_is_config_error() {
        let tmp = TempDir::new().expect("create temp dir");
        let store = store_in(&tmp);

        let err = store
            .require_string(keys::ENDPOINT)
            .expect_err("should fail");
        assert!(err.is_config());
        assert!(err.to_string().contains(keys::ENDPOINT));
    }

    #[test]
    fn test_survives_reopening() {
        let tmp = TempDir::new().expect("create temp dir");
        let path = tmp.path().join("state.json");

        StateStore::new(&path)
            .set_string(keys::SERVER_VERSION, "10.4.0")
            .expect("set version");

        // A fresh store over the same path sees the prior phase's write.
        let reopened = StateStore::new(&path);
        assert_eq!(
            reopened
                .get_string(keys::SERVER_VERSION)
                .expect("get version")
                .as_deref(),
            Some("10.4.0")
        );
    }

    #[test]
    fn test_properties_preserve_explicit_nulls() {
        let tmp = TempDir::new().expect("create temp dir");
        let store = store_in(&tmp);

        let mut properties = BTreeMap::new();
        properties.insert(
            "analysis.host.url".to_string(),
            Some("https://analysis.example.com".to_string()),
        );
        properties.insert("analysis.password".to_string(), None);

        store.set_properties(&properties).expect("set properties");

        let restored = store
            .get_properties()
            .expect("get properties")
            .expect("properties present");
        assert_eq!(restored, properties);
        // The null entry is present, not dropped.
        assert!(restored.contains_key("analysis.password"));
        assert_eq!(restored["analysis.password"], None);
    }

    #[test]
    fn test_corrupt_state_file() {
        let tmp = TempDir::new().expect("create temp dir");
        let path = tmp.path().join("state.json");
        fs::write(&path, "not json").expect("write garbage");

        let err = StateStore::new(&path)
            .get_string(keys::ENDPOINT)
            .expect_err("should fail");
        assert!(matches!(err, GatewatchError::State(_)));
    }
}
