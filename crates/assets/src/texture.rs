use std::io;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use dess_common::traits::{BinaryDeserialization, BinarySerialization};
use serde::{Deserialize, Serialize};

/// Immutable texture import settings. Defaults follow the source's own
/// `TextureImportSettings`: sRGB on, mips requested, BC7 requested - both of
/// the latter are accepted but not honored by this toolchain revision (see
/// `TextureImporter`'s warnings).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextureSettings {
    #[serde(rename = "sRGB")]
    pub srgb: bool,
    pub generate_mips: bool,
    pub compression: String,
    pub brightness: f32,
}

impl Default for TextureSettings {
    fn default() -> Self {
        Self {
            srgb: true,
            generate_mips: true,
            compression: "BC7".to_owned(),
            brightness: 1.0,
        }
    }
}

/// Plain data tag for the pixel layout of a cooked texture blob. Not a
/// GPU-API format: the asset pipeline has no dependency on any graphics API
/// crate, consistent with the GPU renderer being an external collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PixelFormat {
    Rgba8Unorm = 0,
    Rgba8UnormSrgb = 1,
}

impl PixelFormat {
    pub fn for_srgb(srgb: bool) -> Self {
        if srgb {
            PixelFormat::Rgba8UnormSrgb
        } else {
            PixelFormat::Rgba8Unorm
        }
    }

    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(PixelFormat::Rgba8Unorm),
            1 => Some(PixelFormat::Rgba8UnormSrgb),
            _ => None,
        }
    }
}

pub const TEXTURE_MAGIC: u32 = u32::from_le_bytes(*b"APTX");
pub const TEXTURE_HEADER_VERSION: u32 = 1;
const SRGB_FLAG: u32 = 1 << 0;

/// Fixed 40-byte header prefixed to the pixel bytes of a cooked texture
/// blob. Field order is normative (little-endian, packed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureHeader {
    pub version: u32,
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub format: PixelFormat,
    pub mip_levels: u32,
    pub srgb: bool,
    pub data_size: u64,
}

impl TextureHeader {
    pub const SIZE: usize = 40;

    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let data_size = width as u64 * height as u64 * 4;
        Self {
            version: TEXTURE_HEADER_VERSION,
            width,
            height,
            channels: 4,
            format,
            mip_levels: 1,
            srgb: matches!(format, PixelFormat::Rgba8UnormSrgb),
            data_size,
        }
    }
}

impl BinarySerialization for TextureHeader {
    fn serialize(&self, w: &mut impl io::Write) -> io::Result<()> {
        w.write_u32::<LittleEndian>(TEXTURE_MAGIC)?;
        w.write_u32::<LittleEndian>(self.version)?;
        w.write_u32::<LittleEndian>(self.width)?;
        w.write_u32::<LittleEndian>(self.height)?;
        w.write_u32::<LittleEndian>(self.channels)?;
        w.write_u32::<LittleEndian>(self.format as u32)?;
        w.write_u32::<LittleEndian>(self.mip_levels)?;
        let flags = if self.srgb { SRGB_FLAG } else { 0 };
        w.write_u32::<LittleEndian>(flags)?;
        w.write_u64::<LittleEndian>(self.data_size)?;

        Ok(())
    }
}

impl BinaryDeserialization for TextureHeader {
    fn deserialize(r: &mut impl io::Read) -> io::Result<Self> {
        let magic = r.read_u32::<LittleEndian>()?;
        if magic != TEXTURE_MAGIC {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "bad texture magic"));
        }
        let version = r.read_u32::<LittleEndian>()?;
        if version != TEXTURE_HEADER_VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "unsupported texture header version",
            ));
        }
        let width = r.read_u32::<LittleEndian>()?;
        let height = r.read_u32::<LittleEndian>()?;
        let channels = r.read_u32::<LittleEndian>()?;
        let format = PixelFormat::from_u32(r.read_u32::<LittleEndian>()?)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad pixel format"))?;
        let mip_levels = r.read_u32::<LittleEndian>()?;
        let flags = r.read_u32::<LittleEndian>()?;
        let data_size = r.read_u64::<LittleEndian>()?;

        Ok(Self {
            version,
            width,
            height,
            channels,
            format,
            mip_levels,
            srgb: flags & SRGB_FLAG != 0,
            data_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_forty_bytes() {
        let header = TextureHeader::new(64, 64, PixelFormat::Rgba8UnormSrgb);
        let mut buf = Vec::new();
        header.serialize(&mut buf).unwrap();
        assert_eq!(buf.len(), TextureHeader::SIZE);
    }

    #[test]
    fn round_trips() {
        let header = TextureHeader::new(16, 32, PixelFormat::Rgba8Unorm);
        let mut buf = Vec::new();
        header.serialize(&mut buf).unwrap();
        let read_back = TextureHeader::deserialize(&mut buf.as_slice()).unwrap();
        assert_eq!(header, read_back);
    }

    #[test]
    fn rejects_bad_magic() {
        let buf = vec![0u8; TextureHeader::SIZE];
        assert!(TextureHeader::deserialize(&mut buf.as_slice()).is_err());
    }
}
