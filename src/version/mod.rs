//! Version Manager (spec §4.4): a bounded ring of past configs, addressed by
//! content checksum, supporting rollback and diffing.

use crate::config::hash::checksum;
use crate::config::types::ConfigDocument;
use crate::config::constants::DEFAULT_MAX_VERSIONS;
use serde::Serialize;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionSource {
    FileWatcher,
    ControlApi,
    Rollback,
    Bootstrap,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigVersion {
    pub id: String,
    pub ordinal: u64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub checksum: String,
    #[serde(skip)]
    pub config: ConfigDocument,
    pub is_active: bool,
    pub source: VersionSource,
    pub description: Option<String>,
    pub rollback_supported: bool,
}

/// Bounded ring of `ConfigVersion`s, oldest evicted first once `max_versions` is exceeded.
pub struct VersionManager {
    versions: VecDeque<ConfigVersion>,
    max_versions: usize,
    next_ordinal: u64,
}

impl VersionManager {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_VERSIONS)
    }

    pub fn with_capacity(max_versions: usize) -> Self {
        Self {
            versions: VecDeque::new(),
            max_versions,
            next_ordinal: 0,
        }
    }

    /// Record `config` as the new active version, deactivating the previous one.
    /// Idempotent: if `config`'s canonical checksum matches the current active
    /// version's, no new entry is created and the existing active version is
    /// returned unchanged (spec §8: `addVersion(x); addVersion(x)` yields one
    /// new version, not two).
    pub fn add_version(
        &mut self,
        config: ConfigDocument,
        source: VersionSource,
        description: Option<String>,
    ) -> &ConfigVersion {
        let new_checksum = checksum(&config);
        if let Some(active_id) = self
            .versions
            .iter()
            .find(|v| v.is_active && v.checksum == new_checksum)
            .map(|v| v.id.clone())
        {
            return self.versions.iter().find(|v| v.id == active_id).expect("just found");
        }

        for version in self.versions.iter_mut() {
            version.is_active = false;
        }

        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;

        let version = ConfigVersion {
            id: uuid::Uuid::new_v4().to_string(),
            ordinal,
            timestamp: chrono::Utc::now(),
            checksum: checksum(&config),
            config,
            is_active: true,
            source,
            description,
            rollback_supported: true,
        };

        self.versions.push_back(version);
        if self.versions.len() > self.max_versions {
            self.versions.pop_front();
        }
        self.versions.back().expect("just pushed")
    }

    pub fn active_version(&self) -> Option<&ConfigVersion> {
        self.versions.iter().find(|v| v.is_active)
    }

    pub fn versions(&self) -> impl Iterator<Item = &ConfigVersion> {
        self.versions.iter()
    }

    pub fn max_versions(&self) -> usize {
        self.max_versions
    }

    pub fn find(&self, id: &str) -> Option<&ConfigVersion> {
        self.versions.iter().find(|v| v.id == id)
    }

    /// The newest non-active version still eligible for rollback — the target
    /// `rollbackOnFailure` falls back to when an update is rejected (spec §4.9).
    pub fn most_recent_non_active_rollback_candidate(&self) -> Option<&ConfigVersion> {
        self.versions
            .iter()
            .rev()
            .find(|v| !v.is_active && v.rollback_supported)
    }

    /// Roll back by marking `id` active and returning its config, without evicting
    /// any versions newer than it — history is append-only (spec §4.4: rollback
    /// never truncates the ring). Before switching, the version being replaced is
    /// snapshotted as a `backup-*` audit entry so it remains visible in the list
    /// even if it's later evicted from its original slot (spec §8 scenario 6).
    pub fn rollback_to(
        &mut self,
        id: &str,
    ) -> Result<ConfigDocument, VersionError> {
        let target_supported = self
            .find(id)
            .ok_or_else(|| VersionError::NotFound(id.to_string()))?
            .rollback_supported;
        if !target_supported {
            return Err(VersionError::RollbackUnsupported(id.to_string()));
        }

        if let Some(active) = self.active_version().cloned() {
            if active.id != id {
                let ordinal = self.next_ordinal;
                self.next_ordinal += 1;
                self.versions.push_back(ConfigVersion {
                    id: format!("backup-{}", uuid::Uuid::new_v4()),
                    ordinal,
                    timestamp: chrono::Utc::now(),
                    checksum: active.checksum.clone(),
                    config: active.config.clone(),
                    is_active: false,
                    source: VersionSource::Rollback,
                    description: Some(format!(
                        "audit snapshot of {} before rollback to {}",
                        active.id, id
                    )),
                    rollback_supported: false,
                });
                if self.versions.len() > self.max_versions {
                    self.versions.pop_front();
                }
            }
        }

        for version in self.versions.iter_mut() {
            version.is_active = version.id == id;
        }

        Ok(self.find(id).expect("target exists").config.clone())
    }

    pub fn diff(&self, from_id: &str, to_id: &str) -> Result<ConfigDiff, VersionError> {
        let from = self
            .find(from_id)
            .ok_or_else(|| VersionError::NotFound(from_id.to_string()))?;
        let to = self
            .find(to_id)
            .ok_or_else(|| VersionError::NotFound(to_id.to_string()))?;
        Ok(describe_diff(&from.config, &to.config))
    }

    /// Re-checksum every retained version and flag any whose stored checksum no
    /// longer matches its config, indicating tamper or corruption in memory.
    pub fn validate_integrity(&self) -> Vec<String> {
        self.versions
            .iter()
            .filter(|v| checksum(&v.config) != v.checksum)
            .map(|v| v.id.clone())
            .collect()
    }
}

impl Default for VersionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VersionError {
    #[error("no such config version: {0}")]
    NotFound(String),
    #[error("version {0} does not support rollback")]
    RollbackUnsupported(String),
}

/// A single top-level field whose value differs between two versions.
#[derive(Debug, Clone, Serialize)]
pub struct ModifiedField {
    pub from: serde_json::Value,
    pub to: serde_json::Value,
}

/// Top-level-key diff between two configs (spec §4.4 `getVersionDiff`):
/// `diff(v, v)` is all-`unchanged` with the other three fields empty.
#[derive(Debug, Clone, Serialize, Default)]
pub struct ConfigDiff {
    pub added: serde_json::Map<String, serde_json::Value>,
    pub removed: serde_json::Map<String, serde_json::Value>,
    pub modified: std::collections::HashMap<String, ModifiedField>,
    pub unchanged: Vec<String>,
}

fn config_as_object(config: &ConfigDocument) -> serde_json::Map<String, serde_json::Value> {
    match serde_json::to_value(config) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    }
}

fn describe_diff(from: &ConfigDocument, to: &ConfigDocument) -> ConfigDiff {
    let from_map = config_as_object(from);
    let to_map = config_as_object(to);
    let mut diff = ConfigDiff::default();

    for (key, from_value) in &from_map {
        match to_map.get(key) {
            None => {
                diff.removed.insert(key.clone(), from_value.clone());
            }
            Some(to_value) if to_value == from_value => diff.unchanged.push(key.clone()),
            Some(to_value) => {
                diff.modified.insert(
                    key.clone(),
                    ModifiedField {
                        from: from_value.clone(),
                        to: to_value.clone(),
                    },
                );
            }
        }
    }
    for (key, to_value) in &to_map {
        if !from_map.contains_key(key) {
            diff.added.insert(key.clone(), to_value.clone());
        }
    }

    diff
}
