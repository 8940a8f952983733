// Copyright (C) 2023 gigablaster

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

mod asset;
mod handle;
mod material;
mod mesh;
mod texture;
mod types;

pub use asset::{Asset, AssetCommon, ImporterInfo};
pub use handle::AssetHandle;
pub use material::{AlphaMode, MaterialParameters, MaterialTextures, TextureSlot};
pub use mesh::{MeshHeader, MeshSettings, Submesh, MESH_HEADER_VERSION, MESH_MAGIC, VERTEX_FLOAT_STRIDE};
pub use texture::{PixelFormat, TextureHeader, TextureSettings, TEXTURE_HEADER_VERSION, TEXTURE_MAGIC};
pub use types::{AssetRef, AssetType, Dependency, DependencyKind, TargetProfile};
