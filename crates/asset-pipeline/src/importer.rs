use std::path::{Path, PathBuf};

use dess_assets::{Asset, AssetRef, TargetProfile};
use parking_lot::Mutex;

use crate::ddc::DdcStore;

/// Append-only sink an importer uses to record every other asset it
/// consulted while cooking. The manager copies the recorded list into the
/// asset's registry record on success; it is never read back mid-import.
#[derive(Debug, Default)]
pub struct DepRecorder {
    strong: Mutex<Vec<AssetRef>>,
    weak: Mutex<Vec<AssetRef>>,
}

impl DepRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_strong(&self, asset: AssetRef) {
        self.strong.lock().push(asset);
    }

    pub fn add_weak(&self, asset: AssetRef) {
        self.weak.lock().push(asset);
    }

    pub fn strong(&self) -> Vec<AssetRef> {
        self.strong.lock().clone()
    }

    pub fn weak(&self) -> Vec<AssetRef> {
        self.weak.lock().clone()
    }
}

/// Everything the manager hands an importer for one cook. Borrows instead
/// of owning so the manager retains the asset and its own DDC/recorder
/// instances across the call.
pub struct ImportContext<'a> {
    pub asset: &'a Asset,
    pub asset_path: &'a Path,
    pub source_path: &'a Path,
    pub target: &'a TargetProfile,
    pub ddc: &'a DdcStore,
    pub deps: &'a DepRecorder,
    pub force_reimport: bool,
}

/// The result of one `Importer::import` call. A non-empty `errors` means
/// failure; `producedKeys` and `warnings` may both be non-empty even on
/// failure (partial work is still reported for diagnostics).
#[derive(Debug, Default, Clone)]
pub struct ImportResult {
    pub produced_keys: Vec<String>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ImportResult {
    pub fn ok(key: String) -> Self {
        Self {
            produced_keys: vec![key],
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            errors: vec![error.into()],
            ..Default::default()
        }
    }

    pub fn is_failure(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn first_key(&self) -> Option<&str> {
        self.produced_keys.first().map(String::as_str)
    }
}

/// One pluggable cook step, dispatched by asset type.
pub trait Importer: Send + Sync {
    fn id(&self) -> &str;
    fn version(&self) -> u32;
    fn supports(&self, asset_type: dess_assets::AssetType) -> bool;
    fn import(&self, ctx: &ImportContext) -> ImportResult;
}

/// Ordered set of importers; `find_importer` is a linear scan, matching the
/// handful (three) of concrete importers this pipeline registers.
#[derive(Default)]
pub struct ImporterRegistry {
    importers: Vec<Box<dyn Importer>>,
}

impl ImporterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, importer: Box<dyn Importer>) {
        self.importers.push(importer);
    }

    pub fn find_importer(&self, asset_type: dess_assets::AssetType) -> Option<&dyn Importer> {
        self.importers
            .iter()
            .find(|importer| importer.supports(asset_type))
            .map(|importer| importer.as_ref())
    }
}

pub(crate) fn guess_asset_path(source_path: &Path) -> PathBuf {
    let mut path = source_path.as_os_str().to_owned();
    path.push(".asset");
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dess_assets::AssetHandle;

    #[test]
    fn dep_recorder_accumulates_in_order() {
        let recorder = DepRecorder::new();
        let a = AssetRef::whole(AssetHandle::new_v4());
        let b = AssetRef::whole(AssetHandle::new_v4());
        recorder.add_strong(a);
        recorder.add_strong(b);
        assert_eq!(recorder.strong(), vec![a, b]);
        assert!(recorder.weak().is_empty());
    }

    #[test]
    fn import_result_ok_has_no_errors() {
        let result = ImportResult::ok("TX|abc".to_string());
        assert!(!result.is_failure());
        assert_eq!(result.first_key(), Some("TX|abc"));
    }

    #[test]
    fn import_result_failed_has_no_key() {
        let result = ImportResult::failed("decode error");
        assert!(result.is_failure());
        assert_eq!(result.first_key(), None);
    }
}
