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

//! Content-addressed derived-data pipeline: stable fingerprinting, a
//! sharded on-disk cache, a dependency registry with reverse-dependency
//! propagation, and the texture/mesh/material importers that cook source
//! assets into it. `AssetManager` in [`manager`] is the facade everything
//! else in this crate exists to serve.

mod ddc;
mod error;
mod fingerprint;
mod gltf_import;
mod importer;
mod manager;
mod material_import;
mod registry;
mod texture_import;

pub use ddc::{DdcStore, DdcValue};
pub use error::{Error, Result};
pub use fingerprint::{
    build_ddc_key, hash_bytes, hash_dependencies, hash_file_contents, hash_json,
    hash_toolchain_tag, DdcKeyInput,
};
pub use gltf_import::{discover_materials, GltfMaterialData, MeshImporter, MESH_IMPORTER_ID, MESH_IMPORTER_VERSION};
pub use importer::{
    DepRecorder, ImportContext, ImportResult, Importer, ImporterRegistry,
};
pub use manager::{AssetManager, ImportPolicy, MeshPayload, TexturePayload};
pub use material_import::{MaterialImporter, MATERIAL_IMPORTER_ID, MATERIAL_IMPORTER_VERSION};
pub use registry::{AssetRecord, ByTarget, Registry};
pub use texture_import::{TextureImporter, TEXTURE_IMPORTER_ID, TEXTURE_IMPORTER_VERSION};
