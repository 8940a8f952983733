use std::io;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::traits::{BinaryDeserialization, BinarySerialization};

/// Axis-aligned bounding box tracked over a mesh's final (possibly optimized)
/// positions. Stored on `MeshHeader` as plain `min`/`max` corners rather than
/// center/extent, matching the produced blob layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Aabb {
    pub const EMPTY: Aabb = Aabb {
        min: [f32::MAX, f32::MAX, f32::MAX],
        max: [f32::MIN, f32::MIN, f32::MIN],
    };

    pub fn expand(&mut self, point: [f32; 3]) {
        for i in 0..3 {
            self.min[i] = self.min[i].min(point[i]);
            self.max[i] = self.max[i].max(point[i]);
        }
    }

    pub fn from_points(points: impl IntoIterator<Item = [f32; 3]>) -> Self {
        let mut bounds = Self::EMPTY;
        for point in points {
            bounds.expand(point);
        }
        bounds
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl BinarySerialization for Aabb {
    fn serialize(&self, w: &mut impl io::Write) -> io::Result<()> {
        for value in self.min {
            w.write_f32::<LittleEndian>(value)?;
        }
        for value in self.max {
            w.write_f32::<LittleEndian>(value)?;
        }

        Ok(())
    }
}

impl BinaryDeserialization for Aabb {
    fn deserialize(r: &mut impl io::Read) -> io::Result<Self> {
        let mut min = [0.0f32; 3];
        let mut max = [0.0f32; 3];
        for value in min.iter_mut() {
            *value = r.read_f32::<LittleEndian>()?;
        }
        for value in max.iter_mut() {
            *value = r.read_f32::<LittleEndian>()?;
        }

        Ok(Self { min, max })
    }
}
