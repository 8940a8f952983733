use serde::{Deserialize, Serialize};

use crate::AssetHandle;

/// Closed tag for the kinds of asset this pipeline knows how to cook.
/// Persisted by name, matching the `"type"` field of the on-disk `.asset`
/// file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetType {
    Texture,
    Mesh,
    Material,
    Shader,
    None,
}

impl Default for AssetType {
    fn default() -> Self {
        AssetType::None
    }
}

impl AssetType {
    /// The two-letter tag this type contributes to a DDC key.
    pub fn key_prefix(&self) -> &'static str {
        match self {
            AssetType::Texture => "TX",
            AssetType::Mesh => "MS",
            AssetType::Material => "MT",
            AssetType::Shader => "SH",
            AssetType::None => "NA",
        }
    }
}

/// A reference to an asset, optionally selecting a sub-object within it
/// (e.g. a material slot inside a mesh). Every reference this pipeline
/// constructs itself sets `sub_id = 0`: materials and textures are always
/// separate `.asset` files with their own handles, never packed sub-objects
/// of another asset's blob. The field is preserved verbatim on references a
/// caller hands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetRef {
    #[serde(rename = "guid")]
    pub handle: AssetHandle,
    #[serde(rename = "subId", default)]
    pub sub_id: u32,
}

impl AssetRef {
    pub fn new(handle: AssetHandle, sub_id: u32) -> Self {
        Self { handle, sub_id }
    }

    pub fn whole(handle: AssetHandle) -> Self {
        Self { handle, sub_id: 0 }
    }
}

/// Strong dependencies propagate re-cook on fingerprint change; weak
/// dependencies are recorded for observability only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DependencyKind {
    Strong,
    Weak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    pub kind: DependencyKind,
    pub asset: AssetRef,
}

impl Dependency {
    pub fn strong(asset: AssetRef) -> Self {
        Self {
            kind: DependencyKind::Strong,
            asset,
        }
    }

    pub fn weak(asset: AssetRef) -> Self {
        Self {
            kind: DependencyKind::Weak,
            asset,
        }
    }

    pub fn is_strong(&self) -> bool {
        matches!(self.kind, DependencyKind::Strong)
    }
}

/// The output variant being produced: platform, GPU texture/shader format
/// family, and quality tier. Canonicalized to a single id string of the
/// form `"<platform>|<gpuFormat>|<quality>"`; callers must ensure no
/// component contains `|`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetProfile {
    pub platform: String,
    pub gpu_format: String,
    pub quality: String,
}

impl TargetProfile {
    pub fn new(
        platform: impl Into<String>,
        gpu_format: impl Into<String>,
        quality: impl Into<String>,
    ) -> Self {
        Self {
            platform: platform.into(),
            gpu_format: gpu_format.into(),
            quality: quality.into(),
        }
    }

    pub fn id(&self) -> String {
        format!("{}|{}|{}", self.platform, self.gpu_format, self.quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_profile_id_is_pipe_joined() {
        let target = TargetProfile::new("pc", "bc7", "high");
        assert_eq!(target.id(), "pc|bc7|high");
    }

    #[test]
    fn asset_ref_defaults_sub_id_to_zero() {
        let json = format!("{{\"guid\":\"{}\"}}", AssetHandle::new_v4());
        let parsed: AssetRef = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.sub_id, 0);
    }
}
