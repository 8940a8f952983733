use std::{
    collections::{HashMap, HashSet},
    fs,
    path::{Path, PathBuf},
};

use dess_assets::{AssetHandle, AssetType, Dependency};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Per-target-profile values, keyed by `TargetProfile::id()`.
pub type ByTarget<T> = HashMap<String, T>;

const LEGACY_TARGET_KEY: &str = "";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AssetRecordOnDisk {
    guid: AssetHandle,
    #[serde(default, rename = "assetPath")]
    asset_path: String,
    #[serde(default, rename = "type")]
    asset_type: AssetType,
    #[serde(default)]
    deps: Vec<Dependency>,
    #[serde(default, rename = "lastSourceHash")]
    last_source_hash: LastSourceHashRaw,
    #[serde(default, rename = "lastFingerprint")]
    last_fingerprint: ByTarget<String>,
    #[serde(default, rename = "ddcKeys")]
    ddc_keys: ByTarget<Vec<String>>,
    #[serde(default, rename = "lastImportFailed")]
    last_import_failed: bool,
    #[serde(default, rename = "lastErrorSummary")]
    last_error_summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum LastSourceHashRaw {
    Legacy(String),
    Map(ByTarget<String>),
}

impl Default for LastSourceHashRaw {
    fn default() -> Self {
        LastSourceHashRaw::Map(HashMap::new())
    }
}

/// One registered asset's bookkeeping: the strong+weak references recorded
/// by its last import (the forward edges of the dependency graph), its
/// content hash/fingerprint/produced keys per target profile, and failure
/// state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub guid: AssetHandle,
    pub asset_path: String,
    pub asset_type: AssetType,
    pub deps: Vec<Dependency>,
    pub last_source_hash: ByTarget<String>,
    pub last_fingerprint: ByTarget<String>,
    pub ddc_keys: ByTarget<Vec<String>>,
    pub last_import_failed: bool,
    pub last_error_summary: String,
}

impl AssetRecord {
    pub fn new(guid: AssetHandle, asset_path: impl Into<String>, asset_type: AssetType) -> Self {
        Self {
            guid,
            asset_path: asset_path.into(),
            asset_type,
            deps: Vec::new(),
            last_source_hash: HashMap::new(),
            last_fingerprint: HashMap::new(),
            ddc_keys: HashMap::new(),
            last_import_failed: false,
            last_error_summary: String::new(),
        }
    }

    /// The first produced key for `target`, matching the invariant that
    /// `lastFingerprint[t]` equals `ddcKeys[t][0]` when non-empty.
    pub fn last_good_key(&self, target: &str) -> Option<&str> {
        self.ddc_keys
            .get(target)
            .and_then(|keys| keys.first())
            .map(String::as_str)
    }

    fn from_on_disk(raw: AssetRecordOnDisk) -> Self {
        let last_source_hash = match raw.last_source_hash {
            LastSourceHashRaw::Legacy(hash) => {
                let mut map = HashMap::new();
                map.insert(LEGACY_TARGET_KEY.to_string(), hash);
                map
            }
            LastSourceHashRaw::Map(map) => map,
        };
        Self {
            guid: raw.guid,
            asset_path: raw.asset_path,
            asset_type: raw.asset_type,
            deps: raw.deps,
            last_source_hash,
            last_fingerprint: raw.last_fingerprint,
            ddc_keys: raw.ddc_keys,
            last_import_failed: raw.last_import_failed,
            last_error_summary: raw.last_error_summary,
        }
    }

    fn to_on_disk(&self) -> AssetRecordOnDisk {
        AssetRecordOnDisk {
            guid: self.guid,
            asset_path: self.asset_path.clone(),
            asset_type: self.asset_type,
            deps: self.deps.clone(),
            last_source_hash: LastSourceHashRaw::Map(self.last_source_hash.clone()),
            last_fingerprint: self.last_fingerprint.clone(),
            ddc_keys: self.ddc_keys.clone(),
            last_import_failed: self.last_import_failed,
            last_error_summary: self.last_error_summary.clone(),
        }
    }
}

/// Forward (asset -> its dependencies) and reverse (asset -> its
/// dependents) indices over every registered asset, guarded by a single
/// mutex since the two maps must always be updated together.
pub struct Registry {
    path: PathBuf,
    state: Mutex<RegistryState>,
}

struct RegistryState {
    records: HashMap<AssetHandle, AssetRecord>,
    dependents: HashMap<AssetHandle, HashSet<AssetHandle>>,
}

impl RegistryState {
    fn rebuild_dependents(
        records: &HashMap<AssetHandle, AssetRecord>,
    ) -> HashMap<AssetHandle, HashSet<AssetHandle>> {
        let mut dependents: HashMap<AssetHandle, HashSet<AssetHandle>> = HashMap::new();
        for record in records.values() {
            for dep in record.deps.iter().filter(|d| d.is_strong()) {
                dependents
                    .entry(dep.asset.handle)
                    .or_default()
                    .insert(record.guid);
            }
        }
        dependents
    }
}

impl Registry {
    /// Loads the registry from `path` if it exists, or starts empty. A
    /// missing file is normal; an unreadable or corrupt one is logged and
    /// treated the same as an empty registry rather than failing the
    /// caller's construction, since there is no other in-memory state yet
    /// to preserve at this point.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = if path.is_file() {
            Self::read_records(&path).unwrap_or_else(|err| {
                log::warn!("registry at {path:?} is unreadable, starting empty: {err}");
                HashMap::new()
            })
        } else {
            HashMap::new()
        };
        let dependents = RegistryState::rebuild_dependents(&records);
        Ok(Self {
            path,
            state: Mutex::new(RegistryState { records, dependents }),
        })
    }

    fn read_records(path: &Path) -> Result<HashMap<AssetHandle, AssetRecord>> {
        let text = fs::read_to_string(path)?;
        let raw: Vec<AssetRecordOnDisk> = serde_json::from_str(&text)?;
        Ok(raw
            .into_iter()
            .map(AssetRecord::from_on_disk)
            .map(|record| (record.guid, record))
            .collect())
    }

    /// Persists every record as a JSON array, sorted by guid so repeated
    /// saves with no logical change produce byte-identical files. Note
    /// this also self-heals legacy bare-string `lastSourceHash` records:
    /// they are always written back in map form.
    pub fn save(&self) -> Result<()> {
        let state = self.state.lock();
        let mut records: Vec<&AssetRecord> = state.records.values().collect();
        records.sort_by_key(|r| r.guid);
        let on_disk: Vec<AssetRecordOnDisk> = records.iter().map(|r| r.to_on_disk()).collect();
        let text = serde_json::to_string_pretty(&on_disk)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, text)?;
        Ok(())
    }

    pub fn find_record(&self, guid: AssetHandle) -> Option<AssetRecord> {
        self.state.lock().records.get(&guid).cloned()
    }

    /// Creates a record for `guid` if absent; if one already exists, its
    /// non-identity fields (deps, hashes, keys, failure state) are
    /// preserved and only `asset_path`/`asset_type` are overwritten.
    pub fn register(
        &self,
        guid: AssetHandle,
        asset_path: impl Into<String>,
        asset_type: AssetType,
    ) -> AssetRecord {
        let mut state = self.state.lock();
        let record = state
            .records
            .entry(guid)
            .or_insert_with(|| AssetRecord::new(guid, "", AssetType::None));
        record.asset_path = asset_path.into();
        record.asset_type = asset_type;
        record.clone()
    }

    /// Replaces the record for `record.guid` wholesale and rebuilds the
    /// reverse index entries touched by its dependency list.
    pub fn update_record(&self, record: AssetRecord) {
        let mut state = self.state.lock();

        if let Some(previous) = state.records.get(&record.guid) {
            for dep in previous.deps.iter().filter(|d| d.is_strong()) {
                if let Some(set) = state.dependents.get_mut(&dep.asset.handle) {
                    set.remove(&record.guid);
                }
            }
        }
        for dep in record.deps.iter().filter(|d| d.is_strong()) {
            state
                .dependents
                .entry(dep.asset.handle)
                .or_default()
                .insert(record.guid);
        }

        state.records.insert(record.guid, record);
    }

    /// Every asset that records `guid` among its strong dependencies.
    pub fn get_dependents(&self, guid: AssetHandle) -> Vec<AssetHandle> {
        self.state
            .lock()
            .dependents
            .get(&guid)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dess_assets::AssetRef;
    use tempfile::tempdir;

    #[test]
    fn register_then_find_round_trips() {
        let dir = tempdir().unwrap();
        let registry = Registry::load(dir.path().join("registry.json")).unwrap();
        let guid = AssetHandle::new_v4();
        registry.register(guid, "a.png", AssetType::Texture);
        let found = registry.find_record(guid).unwrap();
        assert_eq!(found.guid, guid);
        assert_eq!(found.asset_type, AssetType::Texture);
        assert!(found.deps.is_empty());
    }

    #[test]
    fn register_preserves_existing_non_identity_fields() {
        let dir = tempdir().unwrap();
        let registry = Registry::load(dir.path().join("registry.json")).unwrap();
        let guid = AssetHandle::new_v4();
        registry.register(guid, "a.png", AssetType::Texture);
        let mut record = registry.find_record(guid).unwrap();
        record.last_error_summary = "boom".to_string();
        record.last_import_failed = true;
        registry.update_record(record);

        registry.register(guid, "a_renamed.png", AssetType::Texture);
        let record = registry.find_record(guid).unwrap();
        assert_eq!(record.asset_path, "a_renamed.png");
        assert!(record.last_import_failed);
        assert_eq!(record.last_error_summary, "boom");
    }

    #[test]
    fn dependents_index_tracks_forward_deps() {
        let dir = tempdir().unwrap();
        let registry = Registry::load(dir.path().join("registry.json")).unwrap();
        let texture = AssetHandle::new_v4();
        let material = AssetHandle::new_v4();

        let mut record = AssetRecord::new(material, "m.material.asset", AssetType::Material);
        record.deps.push(Dependency::strong(AssetRef::whole(texture)));
        registry.update_record(record);

        assert_eq!(registry.get_dependents(texture), vec![material]);
        assert!(registry.get_dependents(material).is_empty());
    }

    #[test]
    fn updating_a_record_drops_stale_reverse_edges() {
        let dir = tempdir().unwrap();
        let registry = Registry::load(dir.path().join("registry.json")).unwrap();
        let texture_a = AssetHandle::new_v4();
        let texture_b = AssetHandle::new_v4();
        let material = AssetHandle::new_v4();

        let mut record = AssetRecord::new(material, "m.material.asset", AssetType::Material);
        record.deps.push(Dependency::strong(AssetRef::whole(texture_a)));
        registry.update_record(record);
        assert_eq!(registry.get_dependents(texture_a), vec![material]);

        let mut record = AssetRecord::new(material, "m.material.asset", AssetType::Material);
        record.deps.push(Dependency::strong(AssetRef::whole(texture_b)));
        registry.update_record(record);
        assert!(registry.get_dependents(texture_a).is_empty());
        assert_eq!(registry.get_dependents(texture_b), vec![material]);
    }

    #[test]
    fn save_then_load_preserves_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("registry.json");
        let guid = AssetHandle::new_v4();
        {
            let registry = Registry::load(&path).unwrap();
            let mut record = AssetRecord::new(guid, "a.png", AssetType::Texture);
            record
                .last_source_hash
                .insert("pc|bc7|high".to_string(), "abc123".to_string());
            record
                .last_fingerprint
                .insert("pc|bc7|high".to_string(), "TX|...".to_string());
            record
                .ddc_keys
                .insert("pc|bc7|high".to_string(), vec!["TX|...".to_string()]);
            registry.update_record(record);
            registry.save().unwrap();
        }
        let reloaded = Registry::load(&path).unwrap();
        let record = reloaded.find_record(guid).unwrap();
        assert_eq!(
            record.last_source_hash.get("pc|bc7|high"),
            Some(&"abc123".to_string())
        );
        assert_eq!(record.last_good_key("pc|bc7|high"), Some("TX|..."));
    }

    #[test]
    fn legacy_bare_string_last_source_hash_migrates_to_empty_key() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("registry.json");
        let guid = AssetHandle::new_v4();
        let legacy_json = format!(
            r#"[{{"guid":"{guid}","deps":[],"lastSourceHash":"deadbeef"}}]"#
        );
        fs::write(&path, legacy_json).unwrap();

        let registry = Registry::load(&path).unwrap();
        let record = registry.find_record(guid).unwrap();
        assert_eq!(
            record.last_source_hash.get(""),
            Some(&"deadbeef".to_string())
        );
    }

    #[test]
    fn corrupt_registry_file_loads_empty_instead_of_failing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("registry.json");
        fs::write(&path, b"not json at all").unwrap();

        let registry = Registry::load(&path).unwrap();
        assert!(registry.find_record(AssetHandle::new_v4()).is_none());
        assert_eq!(registry.get_dependents(AssetHandle::new_v4()), Vec::new());
    }
}
