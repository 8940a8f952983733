use std::{
    collections::{HashMap, HashSet},
    fs,
    path::{Path, PathBuf},
};

use dess_assets::{
    Asset, AssetHandle, AssetRef, AssetType, Dependency, MaterialParameters, MaterialTextures,
    MeshHeader, MeshSettings, Submesh, TargetProfile, TextureHeader, TextureSettings, TextureSlot,
};
use dess_common::traits::BinaryDeserialization;
use parking_lot::Mutex;

use crate::ddc::DdcStore;
use crate::error::{Error, Result};
use crate::gltf_import;
use crate::importer::{self, DepRecorder, ImportContext, ImporterRegistry};
use crate::material_import::MaterialImporter;
use crate::registry::Registry;
use crate::texture_import::TextureImporter;
use crate::gltf_import::MeshImporter;

/// How `import_asset` should reconcile an existing `.asset` sidecar
/// against the source file it describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportPolicy {
    ReuseIfExists,
    Reimport,
    ReimportIfSourceChanged,
}

/// A texture blob's header plus a view over its pixel bytes, both borrowed
/// from the caller-provided scratch buffer.
#[derive(Debug)]
pub struct TexturePayload<'a> {
    pub header: TextureHeader,
    pub pixels: &'a [u8],
}

/// A mesh blob's header, its small POD submesh table (owned - cheap to
/// copy), and views over the vertex/index byte ranges.
#[derive(Debug)]
pub struct MeshPayload<'a> {
    pub header: MeshHeader,
    pub submeshes: Vec<Submesh>,
    pub vertices: &'a [u8],
    pub indices: &'a [u8],
}

#[derive(Default)]
struct ManagerState {
    asset_paths: HashMap<AssetHandle, PathBuf>,
    loaded: HashMap<AssetHandle, Asset>,
    dirty: HashSet<AssetHandle>,
}

/// The single coordinator-facing entry point: owns the DDC, the
/// dependency registry, the importer set, and the target profile, and
/// exposes `import_asset` / `ensure_imported` / `get*Data` as the public
/// surface everything else in this crate exists to serve.
///
/// Every public method is safe to call from a single coordinator thread
/// without any external locking. `cook_all` is the one method that drives
/// several `ensure_imported` calls concurrently (via `rayon::scope`); the
/// manager's own bookkeeping (`asset_paths`, `loaded`, `dirty`) is mutex-
/// guarded so that convenience does not corrupt state, even though the DDC
/// and registry were already independently thread-safe.
pub struct AssetManager {
    asset_root: PathBuf,
    ddc: DdcStore,
    registry: Registry,
    importers: ImporterRegistry,
    target: TargetProfile,
    state: Mutex<ManagerState>,
}

impl AssetManager {
    pub fn new(
        asset_root: impl Into<PathBuf>,
        cache_root: impl Into<PathBuf>,
        registry_path: impl Into<PathBuf>,
        target: TargetProfile,
    ) -> Result<Self> {
        let ddc = DdcStore::new(cache_root)?;
        let registry = Registry::load(registry_path)?;

        let mut importers = ImporterRegistry::new();
        importers.register(Box::new(TextureImporter));
        importers.register(Box::new(MeshImporter));
        importers.register(Box::new(MaterialImporter));

        Ok(Self {
            asset_root: asset_root.into(),
            ddc,
            registry,
            importers,
            target,
            state: Mutex::new(ManagerState::default()),
        })
    }

    pub fn asset_root(&self) -> &Path {
        &self.asset_root
    }

    pub fn target(&self) -> &TargetProfile {
        &self.target
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn loaded_asset(&self, handle: AssetHandle) -> Option<Asset> {
        self.state.lock().loaded.get(&handle).cloned()
    }

    /// Brings a source file under management: loads or creates its
    /// `.asset` sidecar per `policy`, and for glTF sources runs the
    /// sidecar material hand-off (§4.6) the first time the sidecar is
    /// synthesized.
    pub fn import_asset(&self, source_path: &Path, policy: ImportPolicy) -> Option<Asset> {
        let asset_type = match extension_to_asset_type(source_path) {
            Some(asset_type) => asset_type,
            None => {
                log::warn!("unsupported source extension: {}", source_path.display());
                return None;
            }
        };

        let asset_path = importer::guess_asset_path(source_path);

        let result = match policy {
            ImportPolicy::ReuseIfExists => {
                if asset_path.is_file() {
                    self.load_and_cache(&asset_path)
                } else {
                    self.synthesize_and_register(source_path, &asset_path, asset_type)
                }
            }
            ImportPolicy::Reimport => {
                self.synthesize_and_register(source_path, &asset_path, asset_type)
            }
            ImportPolicy::ReimportIfSourceChanged => {
                self.reimport_if_source_changed(source_path, &asset_path, asset_type)
            }
        };

        match result {
            Ok(asset) => Some(asset),
            Err(err) => {
                log::warn!("failed to import {}: {}", source_path.display(), err);
                None
            }
        }
    }

    fn reimport_if_source_changed(
        &self,
        source_path: &Path,
        asset_path: &Path,
        asset_type: AssetType,
    ) -> Result<Asset> {
        if !asset_path.is_file() {
            return self.synthesize_and_register(source_path, asset_path, asset_type);
        }

        let loaded = self.load_and_cache(asset_path)?;
        let target_id = self.target.id();
        let unchanged = self
            .registry
            .find_record(loaded.guid())
            .and_then(|record| record.last_source_hash.get(&target_id).cloned())
            .map(|hash| hash == crate::fingerprint::hash_file_contents(source_path))
            .unwrap_or(false);

        if unchanged {
            Ok(loaded)
        } else {
            self.synthesize_and_register(source_path, asset_path, asset_type)
        }
    }

    fn synthesize_and_register(
        &self,
        source_path: &Path,
        asset_path: &Path,
        asset_type: AssetType,
    ) -> Result<Asset> {
        let mut asset = match asset_type {
            AssetType::Texture => {
                Asset::new_texture(source_path.to_string_lossy(), TextureSettings::default())
            }
            AssetType::Mesh => {
                Asset::new_mesh(source_path.to_string_lossy(), MeshSettings::default())
            }
            other => return Err(Error::UnsupportedExtension(format!("{other:?}"))),
        };

        // A sidecar that already exists on disk keeps its handle across a
        // reimport - only mint a fresh one when nothing is there yet
        // (matches the original's `if (existingAsset) newAsset = existingAsset`).
        if let Ok(existing) = self.load_asset_file(asset_path) {
            asset.set_guid(existing.guid());
        }

        asset.set_asset_path(asset_path.to_path_buf());
        if let Some(importer) = self.importers.find_importer(asset_type) {
            asset.set_importer(importer.id(), importer.version());
        }

        if asset_type == AssetType::Mesh {
            for warning in self.handoff_gltf_materials(source_path, &mut asset) {
                log::warn!("{}: {}", source_path.display(), warning);
            }
        }

        self.write_asset_file(asset_path, &asset)?;
        self.registry.register(
            asset.guid(),
            asset_path.to_string_lossy().into_owned(),
            asset_type,
        );

        let mut state = self.state.lock();
        state.asset_paths.insert(asset.guid(), asset_path.to_path_buf());
        state.loaded.insert(asset.guid(), asset.clone());

        Ok(asset)
    }

    /// Discovers the glTF's materials, recursively imports every external
    /// texture they reference, writes a sibling `.material.asset` per
    /// material, and sets the mesh asset's own strong-reference list to
    /// the resulting per-slot material references.
    fn handoff_gltf_materials(&self, source_path: &Path, asset: &mut Asset) -> Vec<String> {
        let (materials, mut warnings) = match gltf_import::discover_materials(source_path) {
            Ok(pair) => pair,
            Err(err) => return vec![format!("material discovery failed: {err}")],
        };

        let stem = source_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("mesh");
        let dir = source_path.parent().map(Path::to_path_buf).unwrap_or_default();

        let mut refs = Vec::with_capacity(materials.len());
        for (index, material) in materials.iter().enumerate() {
            let textures = MaterialTextures {
                base_color: self.import_texture_slot(&material.base_color_texture, &mut warnings),
                metallic_roughness: self
                    .import_texture_slot(&material.metallic_roughness_texture, &mut warnings),
                normal: self.import_texture_slot(&material.normal_texture, &mut warnings),
                occlusion: self.import_texture_slot(&material.occlusion_texture, &mut warnings),
                emissive: self.import_texture_slot(&material.emissive_texture, &mut warnings),
            };

            let parameters = MaterialParameters {
                base_color_factor: material.base_color_factor,
                metallic_factor: material.metallic_factor,
                roughness_factor: material.roughness_factor,
                emissive_factor: material.emissive_factor,
                alpha_cutoff: material.alpha_cutoff,
                double_sided: material.double_sided,
                ..MaterialParameters::default()
            };

            let material_path = dir.join(format!("{stem}_{index}.material.asset"));
            // Reuse the sidecar's existing guid across repeated hand-offs
            // (a reimport of the same mesh must not mint a new material
            // handle every time it re-discovers the same glTF material).
            let mut material_asset = self
                .load_asset_file(&material_path)
                .unwrap_or_else(|_| Asset::new_material(parameters.clone(), textures.clone()));
            material_asset.set_asset_path(material_path.clone());
            material_asset.set_parameters(parameters.clone());
            material_asset.set_material_textures(textures.clone());
            if let Some(importer) = self.importers.find_importer(AssetType::Material) {
                material_asset.set_importer(importer.id(), importer.version());
            }

            if let Err(err) = self.write_asset_file(&material_path, &material_asset) {
                warnings.push(format!(
                    "failed to write material sidecar {}: {err}",
                    material_path.display()
                ));
                continue;
            }
            self.registry.register(
                material_asset.guid(),
                material_path.to_string_lossy().into_owned(),
                AssetType::Material,
            );

            let mut state = self.state.lock();
            state
                .asset_paths
                .insert(material_asset.guid(), material_path.clone());
            state.loaded.insert(material_asset.guid(), material_asset.clone());
            drop(state);

            refs.push(AssetRef::whole(material_asset.guid()));
        }

        asset.set_refs(refs);
        warnings
    }

    fn import_texture_slot(
        &self,
        texture_path: &Option<PathBuf>,
        warnings: &mut Vec<String>,
    ) -> Option<TextureSlot> {
        let path = texture_path.as_ref()?;
        match self.import_asset(path, ImportPolicy::ReuseIfExists) {
            Some(texture_asset) => Some(TextureSlot {
                texture_asset_ref: AssetRef::whole(texture_asset.guid()),
                tex_coord_index: 0,
            }),
            None => {
                warnings.push(format!("failed to import referenced texture {}", path.display()));
                None
            }
        }
    }

    /// Turns an asset into a DDC key on demand, the single entry point
    /// behind `getTextureData`/`getMeshData`. See module docs for the flow.
    pub fn ensure_imported(&self, asset: &Asset) -> Option<String> {
        let asset_type = asset.asset_type();
        let importer = match self.importers.find_importer(asset_type) {
            Some(importer) => importer,
            None => {
                log::warn!("no importer registered for asset type {asset_type:?}");
                return None;
            }
        };

        let guid = asset.guid();
        let target_id = self.target.id();
        let mut record = self.registry.register(
            guid,
            asset.asset_path().to_string_lossy().into_owned(),
            asset_type,
        );
        let previous_fingerprint = record.last_fingerprint.get(&target_id).cloned();
        let force_reimport = self.state.lock().dirty.contains(&guid);

        let deps = DepRecorder::new();
        let source_path_buf = PathBuf::from(asset.source_path());
        let ctx = ImportContext {
            asset,
            asset_path: asset.asset_path(),
            source_path: &source_path_buf,
            target: &self.target,
            ddc: &self.ddc,
            deps: &deps,
            force_reimport,
        };

        let result = importer.import(&ctx);
        for warning in &result.warnings {
            log::warn!("{} [{guid}]: {warning}", importer.id());
        }

        if result.is_failure() {
            let error = result.errors.first().cloned().unwrap_or_default();
            log::error!("import failed for {guid}: {error}");
            record.last_import_failed = true;
            record.last_error_summary = error;
            self.registry.update_record(record.clone());
            let _ = self.registry.save();
            return record.last_good_key(&target_id).map(str::to_string);
        }

        let mut combined_deps: Vec<Dependency> =
            deps.strong().into_iter().map(Dependency::strong).collect();
        combined_deps.extend(deps.weak().into_iter().map(Dependency::weak));

        record.deps = combined_deps;
        record.last_import_failed = false;
        record.last_error_summary.clear();
        record
            .ddc_keys
            .insert(target_id.clone(), result.produced_keys.clone());
        let new_fingerprint = result.first_key().map(str::to_string);
        if let Some(fingerprint) = &new_fingerprint {
            record
                .last_fingerprint
                .insert(target_id.clone(), fingerprint.clone());
        }
        let source_hash = crate::fingerprint::hash_file_contents(&source_path_buf);
        record.last_source_hash.insert(target_id, source_hash);

        self.registry.update_record(record);
        let _ = self.registry.save();

        if new_fingerprint != previous_fingerprint {
            self.mark_dependents_dirty(guid);
        }

        if force_reimport {
            self.state.lock().dirty.remove(&guid);
        }

        new_fingerprint
    }

    pub fn get_texture_data<'a>(
        &self,
        asset: &Asset,
        out_blob: &'a mut Vec<u8>,
    ) -> Option<TexturePayload<'a>> {
        let key = self.ensure_imported(asset)?;
        let value = self.ddc.get(&key).ok().flatten()?;
        *out_blob = value.payload;

        if out_blob.len() < TextureHeader::SIZE {
            return None;
        }
        let header = TextureHeader::deserialize(&mut &out_blob[..]).ok()?;
        let pixel_end = TextureHeader::SIZE + header.data_size as usize;
        if pixel_end > out_blob.len() {
            return None;
        }
        let pixels = &out_blob[TextureHeader::SIZE..pixel_end];
        Some(TexturePayload { header, pixels })
    }

    pub fn get_mesh_data<'a>(
        &self,
        asset: &Asset,
        out_blob: &'a mut Vec<u8>,
    ) -> Option<MeshPayload<'a>> {
        let key = self.ensure_imported(asset)?;
        let value = self.ddc.get(&key).ok().flatten()?;
        *out_blob = value.payload;

        let mut cursor: &[u8] = &out_blob[..];
        let header = MeshHeader::deserialize(&mut cursor).ok()?;
        let mut submeshes = Vec::with_capacity(header.submesh_count as usize);
        for _ in 0..header.submesh_count {
            submeshes.push(Submesh::deserialize(&mut cursor).ok()?);
        }

        let consumed = out_blob.len() - cursor.len();
        let vertex_end = consumed + header.vertex_data_size as usize;
        let index_end = vertex_end + header.index_data_size as usize;
        if index_end > out_blob.len() {
            return None;
        }

        let vertices = &out_blob[consumed..vertex_end];
        let indices = &out_blob[vertex_end..index_end];
        Some(MeshPayload {
            header,
            submeshes,
            vertices,
            indices,
        })
    }

    /// Inserts every dependent of `handle` into the dirty set; consumed on
    /// each dependent's next `ensure_imported` call.
    pub fn mark_dependents_dirty(&self, handle: AssetHandle) {
        let dependents = self.registry.get_dependents(handle);
        if dependents.is_empty() {
            return;
        }
        let mut state = self.state.lock();
        for dependent in dependents {
            state.dirty.insert(dependent);
        }
    }

    /// Walks `dir` recursively and loads every `.asset` sidecar found,
    /// registering its handle -> path mapping and caching the asset.
    /// Returns the number of assets successfully loaded.
    pub fn scan_directory(&self, dir: &Path) -> usize {
        let mut count = 0;
        for entry in walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(std::result::Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("asset") {
                continue;
            }
            match self.load_and_cache(path) {
                Ok(_) => count += 1,
                Err(err) => log::warn!("failed to load asset file {}: {err}", path.display()),
            }
        }
        count
    }

    /// Additive convenience over the sequential contract: runs
    /// `ensure_imported` for every handle currently cached in memory,
    /// across a `rayon` scope. Callers may still call `ensure_imported`
    /// one handle at a time from the single coordinator instead.
    pub fn cook_all(&self, handles: &[AssetHandle]) {
        let assets: Vec<Asset> = {
            let state = self.state.lock();
            handles
                .iter()
                .filter_map(|handle| state.loaded.get(handle).cloned())
                .collect()
        };

        rayon::scope(|scope| {
            for asset in &assets {
                scope.spawn(move |_| {
                    self.ensure_imported(asset);
                });
            }
        });
    }

    fn write_asset_file(&self, path: &Path, asset: &Asset) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(asset)?;
        fs::write(path, text)?;
        Ok(())
    }

    fn load_asset_file(&self, path: &Path) -> Result<Asset> {
        let text = fs::read_to_string(path)?;
        let mut asset: Asset = serde_json::from_str(&text)?;
        asset.set_asset_path(path.to_path_buf());
        Ok(asset)
    }

    fn load_and_cache(&self, path: &Path) -> Result<Asset> {
        let asset = self.load_asset_file(path)?;
        self.registry.register(
            asset.guid(),
            path.to_string_lossy().into_owned(),
            asset.asset_type(),
        );
        let mut state = self.state.lock();
        state.asset_paths.insert(asset.guid(), path.to_path_buf());
        state.loaded.insert(asset.guid(), asset.clone());
        Ok(asset)
    }
}

fn extension_to_asset_type(path: &Path) -> Option<AssetType> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "png" | "jpg" | "jpeg" | "tga" => Some(AssetType::Texture),
        "gltf" | "glb" => Some(AssetType::Mesh),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn manager_in(dir: &Path) -> AssetManager {
        AssetManager::new(
            dir.join("assets"),
            dir.join("ddc"),
            dir.join("registry.json"),
            TargetProfile::new("pc", "rgba8", "high"),
        )
        .unwrap()
    }

    fn write_png(path: &Path, width: u32, height: u32) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let image = image::RgbaImage::from_pixel(width, height, image::Rgba([1, 2, 3, 255]));
        image.save(path).unwrap();
    }

    #[test]
    fn unsupported_extension_imports_nothing() {
        let dir = tempdir().unwrap();
        let manager = manager_in(dir.path());
        let path = dir.path().join("a.xyz");
        std::fs::write(&path, b"whatever").unwrap();
        assert!(manager.import_asset(&path, ImportPolicy::ReuseIfExists).is_none());
    }

    #[test]
    fn reuse_if_exists_returns_the_same_handle_twice() {
        let dir = tempdir().unwrap();
        let manager = manager_in(dir.path());
        let path = dir.path().join("a.png");
        write_png(&path, 2, 2);

        let first = manager
            .import_asset(&path, ImportPolicy::ReuseIfExists)
            .unwrap();
        let second = manager
            .import_asset(&path, ImportPolicy::ReuseIfExists)
            .unwrap();
        assert_eq!(first.guid(), second.guid());
    }

    #[test]
    fn ensure_imported_produces_a_fetchable_texture() {
        let dir = tempdir().unwrap();
        let manager = manager_in(dir.path());
        let path = dir.path().join("a.png");
        write_png(&path, 2, 2);

        let asset = manager
            .import_asset(&path, ImportPolicy::ReuseIfExists)
            .unwrap();
        let mut blob = Vec::new();
        let payload = manager.get_texture_data(&asset, &mut blob).unwrap();
        assert_eq!(payload.header.width, 2);
        assert_eq!(payload.pixels.len(), 2 * 2 * 4);
    }

    #[test]
    fn reimport_if_source_changed_reuses_asset_when_content_is_stable() {
        let dir = tempdir().unwrap();
        let manager = manager_in(dir.path());
        let path = dir.path().join("a.png");
        write_png(&path, 2, 2);

        let first = manager
            .import_asset(&path, ImportPolicy::ReimportIfSourceChanged)
            .unwrap();
        manager.ensure_imported(&first);

        let second = manager
            .import_asset(&path, ImportPolicy::ReimportIfSourceChanged)
            .unwrap();
        assert_eq!(first.guid(), second.guid());
    }

    #[test]
    fn reimport_if_source_changed_keeps_the_handle_after_the_source_changes() {
        let dir = tempdir().unwrap();
        let manager = manager_in(dir.path());
        let path = dir.path().join("a.png");
        write_png(&path, 2, 2);

        let first = manager
            .import_asset(&path, ImportPolicy::ReimportIfSourceChanged)
            .unwrap();
        manager.ensure_imported(&first);

        write_png(&path, 4, 4);
        let second = manager
            .import_asset(&path, ImportPolicy::ReimportIfSourceChanged)
            .unwrap();
        assert_eq!(first.guid(), second.guid());
    }

    #[test]
    fn reimport_policy_keeps_the_handle_of_an_existing_sidecar() {
        let dir = tempdir().unwrap();
        let manager = manager_in(dir.path());
        let path = dir.path().join("a.png");
        write_png(&path, 2, 2);

        let first = manager.import_asset(&path, ImportPolicy::ReuseIfExists).unwrap();
        let second = manager.import_asset(&path, ImportPolicy::Reimport).unwrap();
        assert_eq!(first.guid(), second.guid());
    }
}
