use serde::{Deserialize, Serialize};

use crate::AssetRef;

/// A single optional texture slot on a material: the referenced texture
/// asset plus which glTF UV set it samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextureSlot {
    #[serde(rename = "textureAssetRef")]
    pub texture_asset_ref: AssetRef,
    #[serde(rename = "texCoordIndex", default)]
    pub tex_coord_index: u32,
}

/// The five PBR metal-roughness texture slots a material may declare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialTextures {
    #[serde(rename = "baseColor", skip_serializing_if = "Option::is_none", default)]
    pub base_color: Option<TextureSlot>,
    #[serde(
        rename = "metallicRoughness",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub metallic_roughness: Option<TextureSlot>,
    #[serde(rename = "normal", skip_serializing_if = "Option::is_none", default)]
    pub normal: Option<TextureSlot>,
    #[serde(rename = "occlusion", skip_serializing_if = "Option::is_none", default)]
    pub occlusion: Option<TextureSlot>,
    #[serde(rename = "emissive", skip_serializing_if = "Option::is_none", default)]
    pub emissive: Option<TextureSlot>,
}

impl MaterialTextures {
    /// Every slot that is actually populated, in a fixed order, used both to
    /// build the material's strong-dependency list and to serialize the
    /// "textures" half of the material blob's JSON.
    pub fn slots(&self) -> impl Iterator<Item = &TextureSlot> {
        [
            &self.base_color,
            &self.metallic_roughness,
            &self.normal,
            &self.occlusion,
            &self.emissive,
        ]
        .into_iter()
        .flatten()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialParameters {
    pub base_color_factor: [f32; 4],
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub emissive_factor: [f32; 3],
    pub occlusion_strength: f32,
    pub normal_scale: f32,
    pub alpha_cutoff: f32,
    pub alpha_mode: AlphaMode,
    pub double_sided: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlphaMode {
    #[serde(rename = "OPAQUE")]
    Opaque,
    #[serde(rename = "MASK")]
    Mask,
    #[serde(rename = "BLEND")]
    Blend,
}

impl Default for MaterialParameters {
    fn default() -> Self {
        Self {
            base_color_factor: [1.0, 1.0, 1.0, 1.0],
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            emissive_factor: [0.0, 0.0, 0.0],
            occlusion_strength: 1.0,
            normal_scale: 1.0,
            alpha_cutoff: 0.5,
            alpha_mode: AlphaMode::Opaque,
            double_sided: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_parameters_match_gltf_defaults() {
        let params = MaterialParameters::default();
        assert_eq!(params.base_color_factor, [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(params.alpha_mode, AlphaMode::Opaque);
        assert!(!params.double_sided);
    }

    #[test]
    fn slots_skips_absent_entries() {
        let textures = MaterialTextures {
            base_color: Some(TextureSlot {
                texture_asset_ref: AssetRef::whole(Default::default()),
                tex_coord_index: 0,
            }),
            ..Default::default()
        };
        assert_eq!(textures.slots().count(), 1);
    }
}
