use dess_assets::{
    AssetType, PixelFormat, TextureHeader, TextureSettings,
};
use dess_common::traits::BinarySerialization;
use image::GenericImageView;

use crate::fingerprint::{build_ddc_key, hash_file_contents, hash_json, DdcKeyInput};
use crate::importer::{ImportContext, ImportResult, Importer};

pub const TEXTURE_IMPORTER_ID: &str = "texture";
pub const TEXTURE_IMPORTER_VERSION: u32 = 1;
const TOOLCHAIN_TAG: &str = "image-decode@1|texblob@1";

/// Decodes `.png`/`.jpg`/`.jpeg`/`.tga` source files to 8-bit RGBA and
/// cooks a `[TextureHeader][pixels]` blob. Never records dependencies: a
/// texture asset has no references of its own.
#[derive(Debug, Default)]
pub struct TextureImporter;

impl Importer for TextureImporter {
    fn id(&self) -> &str {
        TEXTURE_IMPORTER_ID
    }

    fn version(&self) -> u32 {
        TEXTURE_IMPORTER_VERSION
    }

    fn supports(&self, asset_type: AssetType) -> bool {
        matches!(asset_type, AssetType::Texture)
    }

    fn import(&self, ctx: &ImportContext) -> ImportResult {
        let settings = match ctx.asset.texture_settings() {
            Some(settings) => settings.clone(),
            None => return ImportResult::failed("asset carries no texture settings"),
        };

        let mut warnings = Vec::new();
        warn_unimplemented(&settings, &mut warnings);

        let source_hash = hash_file_contents(ctx.source_path);
        let settings_json = serde_json::to_value(&settings)
            .unwrap_or_else(|_| serde_json::Value::Null);
        let settings_hash = hash_json(&settings_json);
        let deps_hash = crate::fingerprint::hash_dependencies(&[]);
        let toolchain_hash = crate::fingerprint::hash_toolchain_tag(TOOLCHAIN_TAG);

        let key = build_ddc_key(DdcKeyInput {
            asset_type: AssetType::Texture,
            guid: ctx.asset.guid(),
            importer_id: self.id(),
            importer_version: self.version(),
            target: ctx.target,
            settings_hash: &settings_hash,
            source_hash: &source_hash,
            deps_hash: &deps_hash,
            toolchain_hash: &toolchain_hash,
        });

        if !ctx.force_reimport && ctx.ddc.exists(&key) {
            return ImportResult {
                produced_keys: vec![key],
                warnings,
                errors: Vec::new(),
            };
        }

        let bytes = match std::fs::read(ctx.source_path) {
            Ok(bytes) => bytes,
            Err(err) => {
                return ImportResult {
                    produced_keys: Vec::new(),
                    warnings,
                    errors: vec![format!("failed to read source: {err}")],
                }
            }
        };

        let image = match image::load_from_memory(&bytes) {
            Ok(image) => image,
            Err(err) => {
                return ImportResult {
                    produced_keys: Vec::new(),
                    warnings,
                    errors: vec![format!("failed to decode image: {err}")],
                }
            }
        };

        let (width, height) = image.dimensions();
        let rgba = image.to_rgba8();
        let format = PixelFormat::for_srgb(settings.srgb);
        let header = TextureHeader::new(width, height, format);

        let mut blob = Vec::with_capacity(TextureHeader::SIZE + rgba.len());
        if let Err(err) = header.serialize(&mut blob) {
            return ImportResult {
                produced_keys: Vec::new(),
                warnings,
                errors: vec![format!("failed to serialize texture header: {err}")],
            };
        }
        blob.extend_from_slice(rgba.as_raw());

        if let Err(err) = ctx.ddc.put(&key, &blob) {
            return ImportResult {
                produced_keys: Vec::new(),
                warnings,
                errors: vec![format!("failed to write ddc entry: {err}")],
            };
        }

        ImportResult {
            produced_keys: vec![key],
            warnings,
            errors: Vec::new(),
        }
    }
}

fn warn_unimplemented(settings: &TextureSettings, warnings: &mut Vec<String>) {
    if settings.generate_mips {
        warnings.push("mipmap generation requested but not implemented".to_string());
    }
    if !settings.compression.is_empty() && settings.compression != "RGBA8" {
        warnings.push(format!(
            "block compression '{}' requested but not implemented; producing RGBA8",
            settings.compression
        ));
    }
    if (settings.brightness - 1.0).abs() > f32::EPSILON {
        warnings.push(format!(
            "brightness {} requested but not applied",
            settings.brightness
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddc::DdcStore;
    use crate::importer::DepRecorder;
    use dess_assets::{Asset, TargetProfile};
    use tempfile::tempdir;

    fn write_png(path: &std::path::Path, width: u32, height: u32) {
        let image = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        image.save(path).unwrap();
    }

    #[test]
    fn decodes_and_caches_a_texture() {
        let dir = tempdir().unwrap();
        let source_path = dir.path().join("a.png");
        write_png(&source_path, 4, 4);

        let ddc = DdcStore::new(dir.path().join("ddc")).unwrap();
        let asset = Asset::new_texture("a.png", TextureSettings::default());
        let deps = DepRecorder::new();
        let target = TargetProfile::new("pc", "rgba8", "high");
        let ctx = ImportContext {
            asset: &asset,
            asset_path: &source_path,
            source_path: &source_path,
            target: &target,
            ddc: &ddc,
            deps: &deps,
            force_reimport: false,
        };

        let importer = TextureImporter;
        let result = importer.import(&ctx);
        assert!(!result.is_failure());
        let key = result.first_key().unwrap();
        assert!(ddc.exists(key));

        let value = ddc.get(key).unwrap().unwrap();
        assert_eq!(value.payload.len(), TextureHeader::SIZE + 4 * 4 * 4);
    }

    #[test]
    fn missing_source_file_fails_cleanly() {
        let dir = tempdir().unwrap();
        let ddc = DdcStore::new(dir.path().join("ddc")).unwrap();
        let asset = Asset::new_texture("missing.png", TextureSettings::default());
        let deps = DepRecorder::new();
        let target = TargetProfile::new("pc", "rgba8", "high");
        let missing_path = dir.path().join("missing.png");
        let ctx = ImportContext {
            asset: &asset,
            asset_path: &missing_path,
            source_path: &missing_path,
            target: &target,
            ddc: &ddc,
            deps: &deps,
            force_reimport: false,
        };

        let importer = TextureImporter;
        let result = importer.import(&ctx);
        assert!(result.is_failure());
        assert!(result.produced_keys.is_empty());
    }
}
