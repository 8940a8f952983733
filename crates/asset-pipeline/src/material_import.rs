use dess_assets::{AssetType, Dependency};

use crate::fingerprint::{build_ddc_key, hash_dependencies, hash_json, DdcKeyInput};
use crate::importer::{ImportContext, ImportResult, Importer};

pub const MATERIAL_IMPORTER_ID: &str = "material";
pub const MATERIAL_IMPORTER_VERSION: u32 = 1;
const TOOLCHAIN_TAG: &str = "material-json@1";

/// Materials have no external source file: the cooked blob is just the
/// canonical JSON of parameters + texture slots, and every declared texture
/// reference becomes a strong dependency.
#[derive(Debug, Default)]
pub struct MaterialImporter;

impl Importer for MaterialImporter {
    fn id(&self) -> &str {
        MATERIAL_IMPORTER_ID
    }

    fn version(&self) -> u32 {
        MATERIAL_IMPORTER_VERSION
    }

    fn supports(&self, asset_type: AssetType) -> bool {
        matches!(asset_type, AssetType::Material)
    }

    fn import(&self, ctx: &ImportContext) -> ImportResult {
        let (parameters, textures) = match ctx.asset.material_parameters() {
            Some(pair) => pair,
            None => return ImportResult::failed("asset carries no material parameters"),
        };

        let deps: Vec<Dependency> = textures
            .slots()
            .map(|slot| {
                ctx.deps.add_strong(slot.texture_asset_ref);
                Dependency::strong(slot.texture_asset_ref)
            })
            .collect();

        let blob_json = serde_json::json!({
            "parameters": parameters,
            "textures": textures,
        });
        let settings_hash = hash_json(&blob_json);
        let deps_hash = hash_dependencies(&deps);
        let toolchain_hash = crate::fingerprint::hash_toolchain_tag(TOOLCHAIN_TAG);

        let key = build_ddc_key(DdcKeyInput {
            asset_type: AssetType::Material,
            guid: ctx.asset.guid(),
            importer_id: self.id(),
            importer_version: self.version(),
            target: ctx.target,
            settings_hash: &settings_hash,
            source_hash: "",
            deps_hash: &deps_hash,
            toolchain_hash: &toolchain_hash,
        });

        if !ctx.force_reimport && ctx.ddc.exists(&key) {
            return ImportResult {
                produced_keys: vec![key],
                warnings: Vec::new(),
                errors: Vec::new(),
            };
        }

        let text = match serde_json::to_vec(&blob_json) {
            Ok(bytes) => bytes,
            Err(err) => {
                return ImportResult {
                    produced_keys: Vec::new(),
                    warnings: Vec::new(),
                    errors: vec![format!("failed to serialize material blob: {err}")],
                }
            }
        };

        if let Err(err) = ctx.ddc.put(&key, &text) {
            return ImportResult {
                produced_keys: Vec::new(),
                warnings: Vec::new(),
                errors: vec![format!("failed to write ddc entry: {err}")],
            };
        }

        ImportResult {
            produced_keys: vec![key],
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddc::DdcStore;
    use crate::importer::DepRecorder;
    use dess_assets::{Asset, AssetHandle, AssetRef, MaterialParameters, MaterialTextures, TargetProfile, TextureSlot};
    use tempfile::tempdir;

    #[test]
    fn records_strong_deps_for_every_texture_slot() {
        let dir = tempdir().unwrap();
        let ddc = DdcStore::new(dir.path().join("ddc")).unwrap();
        let textures = MaterialTextures {
            base_color: Some(TextureSlot {
                texture_asset_ref: AssetRef::whole(AssetHandle::new_v4()),
                tex_coord_index: 0,
            }),
            ..Default::default()
        };
        let asset = Asset::new_material(MaterialParameters::default(), textures);
        let deps = DepRecorder::new();
        let target = TargetProfile::new("pc", "rgba8", "high");
        let source_path = dir.path().join("unused");
        let ctx = ImportContext {
            asset: &asset,
            asset_path: &source_path,
            source_path: &source_path,
            target: &target,
            ddc: &ddc,
            deps: &deps,
            force_reimport: false,
        };

        let importer = MaterialImporter;
        let result = importer.import(&ctx);
        assert!(!result.is_failure());
        assert_eq!(deps.strong().len(), 1);
    }

    #[test]
    fn identical_parameters_reuse_the_same_key() {
        let dir = tempdir().unwrap();
        let ddc = DdcStore::new(dir.path().join("ddc")).unwrap();
        let asset = Asset::new_material(MaterialParameters::default(), MaterialTextures::default());
        let target = TargetProfile::new("pc", "rgba8", "high");
        let source_path = dir.path().join("unused");

        let deps_a = DepRecorder::new();
        let ctx_a = ImportContext {
            asset: &asset,
            asset_path: &source_path,
            source_path: &source_path,
            target: &target,
            ddc: &ddc,
            deps: &deps_a,
            force_reimport: false,
        };
        let first = MaterialImporter.import(&ctx_a);

        let deps_b = DepRecorder::new();
        let ctx_b = ImportContext {
            asset: &asset,
            asset_path: &source_path,
            source_path: &source_path,
            target: &target,
            ddc: &ddc,
            deps: &deps_b,
            force_reimport: false,
        };
        let second = MaterialImporter.import(&ctx_b);

        assert_eq!(first.first_key(), second.first_key());
    }
}
