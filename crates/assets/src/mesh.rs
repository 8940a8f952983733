use std::io;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use dess_common::{traits::{BinaryDeserialization, BinarySerialization}, Aabb};
use serde::{Deserialize, Serialize};

/// Immutable mesh import settings. `generate_tangents` is accepted and
/// round-tripped for forward compatibility with the source format but is
/// otherwise inert: this toolchain never computes real tangent space, it
/// always emits the reserved placeholder (1, 0, 0, 1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshSettings {
    pub optimize: bool,
    pub generate_tangents: bool,
    pub flip_winding_order: bool,
    pub scale: f32,
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self {
            optimize: true,
            generate_tangents: true,
            flip_winding_order: false,
            scale: 1.0,
        }
    }
}

pub const MESH_MAGIC: u32 = u32::from_le_bytes(*b"APMS");
pub const MESH_HEADER_VERSION: u32 = 1;

/// Header prefixed to a cooked mesh blob: `[MeshHeader][Submesh x
/// submeshCount][vertex bytes][index bytes]`. Bounds are carried on the
/// header over the final (possibly meshopt-optimized) positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshHeader {
    pub version: u32,
    pub submesh_count: u32,
    pub vertex_data_size: u64,
    pub index_data_size: u64,
    pub bounds: Aabb,
}

impl BinarySerialization for MeshHeader {
    fn serialize(&self, w: &mut impl io::Write) -> io::Result<()> {
        w.write_u32::<LittleEndian>(MESH_MAGIC)?;
        w.write_u32::<LittleEndian>(self.version)?;
        w.write_u32::<LittleEndian>(self.submesh_count)?;
        w.write_u32::<LittleEndian>(0)?; // reserved, pads to 8-byte alignment
        w.write_u64::<LittleEndian>(self.vertex_data_size)?;
        w.write_u64::<LittleEndian>(self.index_data_size)?;
        self.bounds.serialize(w)?;

        Ok(())
    }
}

impl BinaryDeserialization for MeshHeader {
    fn deserialize(r: &mut impl io::Read) -> io::Result<Self> {
        let magic = r.read_u32::<LittleEndian>()?;
        if magic != MESH_MAGIC {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "bad mesh magic"));
        }
        let version = r.read_u32::<LittleEndian>()?;
        if version != MESH_HEADER_VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "unsupported mesh header version",
            ));
        }
        let submesh_count = r.read_u32::<LittleEndian>()?;
        let _reserved = r.read_u32::<LittleEndian>()?;
        let vertex_data_size = r.read_u64::<LittleEndian>()?;
        let index_data_size = r.read_u64::<LittleEndian>()?;
        let bounds = Aabb::deserialize(r)?;

        Ok(Self {
            version,
            submesh_count,
            vertex_data_size,
            index_data_size,
            bounds,
        })
    }
}

/// A contiguous range of indices sharing a single material slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submesh {
    pub index_offset: u32,
    pub index_count: u32,
    pub material_index: u32,
}

impl Submesh {
    pub const SIZE: usize = 12;
}

impl BinarySerialization for Submesh {
    fn serialize(&self, w: &mut impl io::Write) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.index_offset)?;
        w.write_u32::<LittleEndian>(self.index_count)?;
        w.write_u32::<LittleEndian>(self.material_index)?;

        Ok(())
    }
}

impl BinaryDeserialization for Submesh {
    fn deserialize(r: &mut impl io::Read) -> io::Result<Self> {
        Ok(Self {
            index_offset: r.read_u32::<LittleEndian>()?,
            index_count: r.read_u32::<LittleEndian>()?,
            material_index: r.read_u32::<LittleEndian>()?,
        })
    }
}

/// Fixed-stride interleaved vertex: position(3) + normal(3) + tangent(4,
/// reserved) + uv(2) = 12 floats.
pub const VERTEX_FLOAT_STRIDE: usize = 12;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submesh_is_twelve_bytes() {
        let submesh = Submesh {
            index_offset: 1,
            index_count: 2,
            material_index: 3,
        };
        let mut buf = Vec::new();
        submesh.serialize(&mut buf).unwrap();
        assert_eq!(buf.len(), Submesh::SIZE);
        assert_eq!(submesh, Submesh::deserialize(&mut buf.as_slice()).unwrap());
    }

    #[test]
    fn header_round_trips_with_bounds() {
        let header = MeshHeader {
            version: MESH_HEADER_VERSION,
            submesh_count: 2,
            vertex_data_size: 480,
            index_data_size: 24,
            bounds: Aabb::from_points([[-1.0, -1.0, -1.0], [1.0, 1.0, 1.0]]),
        };
        let mut buf = Vec::new();
        header.serialize(&mut buf).unwrap();
        assert_eq!(header, MeshHeader::deserialize(&mut buf.as_slice()).unwrap());
    }
}
