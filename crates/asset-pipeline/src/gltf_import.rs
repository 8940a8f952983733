use std::mem::size_of;
use std::path::{Path, PathBuf};

use dess_assets::{AssetType, Dependency, MeshHeader, MeshSettings, Submesh};
use dess_common::{traits::BinarySerialization, Aabb};

use crate::error::{Error, Result};
use crate::fingerprint::{build_ddc_key, hash_file_contents, hash_json, DdcKeyInput};
use crate::importer::{ImportContext, ImportResult, Importer};

pub const MESH_IMPORTER_ID: &str = "mesh";
pub const MESH_IMPORTER_VERSION: u32 = 1;
const TOOLCHAIN_TAG: &str = "gltf@1|meshopt@1|meshblob@1";
const OVERDRAW_THRESHOLD: f32 = 1.05;

/// Interleaved vertex layout this toolchain writes: position, normal,
/// a reserved tangent slot (never computed from geometry), and one uv set.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct Vertex {
    position: [f32; 3],
    normal: [f32; 3],
    tangent: [f32; 4],
    uv: [f32; 2],
}

const RESERVED_TANGENT: [f32; 4] = [1.0, 0.0, 0.0, 1.0];
const DEFAULT_NORMAL: [f32; 3] = [0.0, 1.0, 0.0];
const DEFAULT_UV: [f32; 2] = [0.0, 0.0];

fn vertex_bytes(vertices: &[Vertex]) -> &[u8] {
    // SAFETY: `Vertex` is `repr(C)`, made only of `f32` fields, and has no
    // padding (12 floats, all 4-byte aligned); reinterpreting it as bytes
    // is the same operation `meshopt`'s own `VertexStream` performs
    // internally from a raw pointer.
    unsafe {
        std::slice::from_raw_parts(vertices.as_ptr() as *const u8, std::mem::size_of_val(vertices))
    }
}

struct RawSubmesh {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    material_index: u32,
}

/// Parses a `.gltf`/`.glb` first logical mesh into interleaved vertex/index
/// buffers, optionally runs the full `meshopt` optimization pipeline, and
/// cooks `[MeshHeader][Submesh x N][vertices][indices]`.
#[derive(Debug, Default)]
pub struct MeshImporter;

impl Importer for MeshImporter {
    fn id(&self) -> &str {
        MESH_IMPORTER_ID
    }

    fn version(&self) -> u32 {
        MESH_IMPORTER_VERSION
    }

    fn supports(&self, asset_type: AssetType) -> bool {
        matches!(asset_type, AssetType::Mesh)
    }

    fn import(&self, ctx: &ImportContext) -> ImportResult {
        let settings = match ctx.asset.mesh_settings() {
            Some(settings) => *settings,
            None => return ImportResult::failed("asset carries no mesh settings"),
        };

        let mut warnings = Vec::new();

        let source_hash = hash_file_contents(ctx.source_path);
        let settings_json =
            serde_json::to_value(settings).unwrap_or_else(|_| serde_json::Value::Null);
        let settings_hash = hash_json(&settings_json);

        // The manager's material-slot hand-off already wrote the mesh
        // asset's own strong references before this importer ever runs;
        // mirror them into the recorder so the registry's reverse index
        // picks them up, and hash them the same way for the key.
        let asset_refs: Vec<Dependency> = ctx
            .asset
            .refs()
            .iter()
            .map(|reference| Dependency::strong(*reference))
            .collect();
        for reference in ctx.asset.refs() {
            ctx.deps.add_strong(*reference);
        }
        let deps_hash = crate::fingerprint::hash_dependencies(&asset_refs);
        let toolchain_hash = crate::fingerprint::hash_toolchain_tag(TOOLCHAIN_TAG);

        let key = build_ddc_key(DdcKeyInput {
            asset_type: AssetType::Mesh,
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

        let (document, buffers, _images) = match gltf::import(ctx.source_path) {
            Ok(parsed) => parsed,
            Err(err) => {
                return ImportResult {
                    produced_keys: Vec::new(),
                    warnings,
                    errors: vec![format!("failed to parse glTF: {err}")],
                }
            }
        };

        let mesh = match document.meshes().next() {
            Some(mesh) => mesh,
            None => {
                return ImportResult {
                    produced_keys: Vec::new(),
                    warnings,
                    errors: vec!["glTF document contains no meshes".to_string()],
                }
            }
        };

        let mut raw_submeshes = Vec::new();
        for primitive in mesh.primitives() {
            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|b| b.0.as_slice()));

            let positions: Vec<[f32; 3]> = match reader.read_positions() {
                Some(positions) => positions.collect(),
                None => {
                    warnings.push("primitive has no positions, skipped".to_string());
                    continue;
                }
            };

            let normals: Vec<[f32; 3]> = reader
                .read_normals()
                .map(|n| n.collect())
                .unwrap_or_else(|| vec![DEFAULT_NORMAL; positions.len()]);

            let uvs: Vec<[f32; 2]> = reader
                .read_tex_coords(0)
                .map(|uv| uv.into_f32().collect())
                .unwrap_or_else(|| vec![DEFAULT_UV; positions.len()]);

            let indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => {
                    warnings.push("primitive has no indices, skipped".to_string());
                    continue;
                }
            };

            let vertices: Vec<Vertex> = (0..positions.len())
                .map(|i| Vertex {
                    position: scale_position(positions[i], settings.scale),
                    normal: normals.get(i).copied().unwrap_or(DEFAULT_NORMAL),
                    tangent: RESERVED_TANGENT,
                    uv: uvs.get(i).copied().unwrap_or(DEFAULT_UV),
                })
                .collect();

            let material_index = primitive.material().index().unwrap_or(0) as u32;

            raw_submeshes.push(RawSubmesh {
                vertices,
                indices,
                material_index,
            });
        }

        if raw_submeshes.is_empty() {
            return ImportResult {
                produced_keys: Vec::new(),
                warnings,
                errors: vec!["no usable primitives in glTF mesh".to_string()],
            };
        }

        if settings.optimize {
            for submesh in &mut raw_submeshes {
                optimize_submesh(submesh, &mut warnings);
            }
        }

        let mut combined_vertices = Vec::new();
        let mut combined_indices = Vec::new();
        let mut submesh_headers = Vec::with_capacity(raw_submeshes.len());

        for submesh in raw_submeshes {
            let base_vertex = combined_vertices.len() as u32;
            let index_offset = combined_indices.len() as u32;
            let index_count = submesh.indices.len() as u32;
            combined_indices.extend(submesh.indices.iter().map(|i| i + base_vertex));
            combined_vertices.extend(submesh.vertices);
            submesh_headers.push(Submesh {
                index_offset,
                index_count,
                material_index: submesh.material_index,
            });
        }

        if settings.optimize && !combined_vertices.is_empty() && !combined_indices.is_empty() {
            optimize_combined(&mut combined_vertices, &mut combined_indices, &mut warnings);
        }

        let bounds = compute_bounds(&combined_vertices);

        let header = MeshHeader {
            version: dess_assets::MESH_HEADER_VERSION,
            submesh_count: submesh_headers.len() as u32,
            vertex_data_size: (combined_vertices.len() * size_of::<Vertex>()) as u64,
            index_data_size: (combined_indices.len() * size_of::<u32>()) as u64,
            bounds,
        };

        let mut blob = Vec::new();
        if let Err(err) = header.serialize(&mut blob) {
            return ImportResult {
                produced_keys: Vec::new(),
                warnings,
                errors: vec![format!("failed to serialize mesh header: {err}")],
            };
        }
        for submesh in &submesh_headers {
            if let Err(err) = submesh.serialize(&mut blob) {
                return ImportResult {
                    produced_keys: Vec::new(),
                    warnings,
                    errors: vec![format!("failed to serialize submesh: {err}")],
                };
            }
        }
        blob.extend_from_slice(vertex_bytes(&combined_vertices));
        for index in &combined_indices {
            blob.extend_from_slice(&index.to_le_bytes());
        }

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

fn scale_position(position: [f32; 3], scale: f32) -> [f32; 3] {
    [position[0] * scale, position[1] * scale, position[2] * scale]
}

fn optimize_submesh(submesh: &mut RawSubmesh, warnings: &mut Vec<String>) {
    let vertex_count = submesh.vertices.len();
    if vertex_count == 0 || submesh.indices.is_empty() {
        return;
    }

    let (total_vertex_count, remap) = meshopt::generate_vertex_remap_multi::<u8>(
        vertex_count,
        &[meshopt::VertexStream::new(submesh.vertices.as_ptr())],
        Some(&submesh.indices),
    );
    submesh.vertices = meshopt::remap_vertex_buffer(&submesh.vertices, total_vertex_count, &remap);
    submesh.indices =
        meshopt::remap_index_buffer(Some(&submesh.indices), total_vertex_count, &remap);

    meshopt::optimize_vertex_cache_in_place(&submesh.indices, submesh.vertices.len());

    warnings.push(format!(
        "optimized submesh: {} -> {} vertices",
        vertex_count, total_vertex_count
    ));
}

fn optimize_combined(vertices: &mut Vec<Vertex>, indices: &mut Vec<u32>, warnings: &mut Vec<String>) {
    let stride = size_of::<Vertex>();
    let bytes = vertex_bytes(vertices);
    if let Ok(adapter) = meshopt::VertexDataAdapter::new(bytes, stride, 0) {
        meshopt::optimize_overdraw_in_place(indices, &adapter, OVERDRAW_THRESHOLD);
    } else {
        warnings.push("overdraw optimization skipped: could not build vertex adapter".to_string());
    }

    let remap = meshopt::optimize_vertex_fetch_remap(indices, vertices.len());
    *vertices = meshopt::remap_vertex_buffer(vertices, vertices.len(), &remap);
    *indices = meshopt::remap_index_buffer(Some(indices), vertices.len(), &remap);
}

fn compute_bounds(vertices: &[Vertex]) -> Aabb {
    let mut bounds = Aabb::EMPTY;
    for vertex in vertices {
        bounds.expand(vertex.position);
    }
    bounds
}

/// Material data discovered alongside the cooked mesh blob: name, PBR
/// parameters, and paths (never contents) of externally referenced
/// textures. Produced independently of `import`, since the manager needs
/// it to create sibling `.material.asset` files before the mesh's own
/// dependency list can be finalized.
#[derive(Debug, Clone, Default)]
pub struct GltfMaterialData {
    pub name: Option<String>,
    pub base_color_factor: [f32; 4],
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub emissive_factor: [f32; 3],
    pub alpha_cutoff: f32,
    pub double_sided: bool,
    pub base_color_texture: Option<PathBuf>,
    pub metallic_roughness_texture: Option<PathBuf>,
    pub normal_texture: Option<PathBuf>,
    pub occlusion_texture: Option<PathBuf>,
    pub emissive_texture: Option<PathBuf>,
}

/// Re-parses the glTF document to enumerate its materials. Embedded
/// (buffer-view) and data-URI textures are unsupported: only `Source::Uri`
/// pointing at a relative file on disk is carried through, everything else
/// is dropped with a warning.
pub fn discover_materials(
    source_path: &Path,
) -> Result<(Vec<GltfMaterialData>, Vec<String>)> {
    let (document, _buffers, _images) =
        gltf::import(source_path).map_err(|err| Error::ImportFailed(err.to_string()))?;
    let base_dir = source_path.parent().map(Path::to_path_buf).unwrap_or_default();

    let mut warnings = Vec::new();
    let mut materials = Vec::new();

    for material in document.materials() {
        let pbr = material.pbr_metallic_roughness();
        let mut data = GltfMaterialData {
            name: material.name().map(str::to_owned),
            base_color_factor: pbr.base_color_factor(),
            metallic_factor: pbr.metallic_factor(),
            roughness_factor: pbr.roughness_factor(),
            emissive_factor: material.emissive_factor(),
            alpha_cutoff: material.alpha_cutoff().unwrap_or(0.5),
            double_sided: material.double_sided(),
            ..Default::default()
        };

        data.base_color_texture = pbr
            .base_color_texture()
            .and_then(|info| resolve_texture_path(&base_dir, &info.texture(), &mut warnings));
        data.metallic_roughness_texture = pbr
            .metallic_roughness_texture()
            .and_then(|info| resolve_texture_path(&base_dir, &info.texture(), &mut warnings));
        data.normal_texture = material
            .normal_texture()
            .and_then(|info| resolve_texture_path(&base_dir, &info.texture(), &mut warnings));
        data.occlusion_texture = material
            .occlusion_texture()
            .and_then(|info| resolve_texture_path(&base_dir, &info.texture(), &mut warnings));
        data.emissive_texture = material
            .emissive_texture()
            .and_then(|info| resolve_texture_path(&base_dir, &info.texture(), &mut warnings));

        materials.push(data);
    }

    Ok((materials, warnings))
}

fn resolve_texture_path(
    base_dir: &Path,
    texture: &gltf::Texture,
    warnings: &mut Vec<String>,
) -> Option<PathBuf> {
    match texture.source().source() {
        gltf::image::Source::Uri { uri, .. } => Some(base_dir.join(uri)),
        gltf::image::Source::View { .. } => {
            warnings.push(
                "embedded (buffer-view) glTF texture is unsupported, skipped".to_string(),
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_position_scales_uniformly() {
        let scaled = scale_position([1.0, 2.0, 3.0], 2.0);
        assert_eq!(scaled, [2.0, 4.0, 6.0]);
    }

    #[test]
    fn compute_bounds_of_empty_vertex_list_is_empty_aabb() {
        let bounds = compute_bounds(&[]);
        assert_eq!(bounds, Aabb::EMPTY);
    }

    #[test]
    fn compute_bounds_tracks_min_max() {
        let vertices = vec![
            Vertex {
                position: [-1.0, 0.0, 2.0],
                normal: DEFAULT_NORMAL,
                tangent: RESERVED_TANGENT,
                uv: DEFAULT_UV,
            },
            Vertex {
                position: [3.0, -4.0, 0.0],
                normal: DEFAULT_NORMAL,
                tangent: RESERVED_TANGENT,
                uv: DEFAULT_UV,
            },
        ];
        let bounds = compute_bounds(&vertices);
        assert_eq!(bounds.min, [-1.0, -4.0, 0.0]);
        assert_eq!(bounds.max, [3.0, 0.0, 2.0]);
    }
}
