//! BSP file header and lump directory

use crate::{BspError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

/// `"VBSP"` read as a little-endian integer
pub const IDBSPHEADER: u32 = 0x5053_4256;

/// Version written by the vendor build
pub const CSO2_BSP_VERSION: u32 = 100;

/// Version of the standard layout produced by the transcoder
pub const SOURCE_BSP_VERSION: u32 = 20;

/// Number of lump slots in the header
pub const HEADER_LUMPS: usize = 64;

/// Size of one lump directory entry
pub const LUMP_HEADER_SIZE: usize = 16;

/// Size of the whole header: ident, version, lump directory, map revision
pub const BSP_HEADER_SIZE: usize = 8 + HEADER_LUMPS * LUMP_HEADER_SIZE + 4;

/// Bit of the lump version marking an LZMA compressed lump
pub const LUMP_COMPRESSED: u32 = 0x10000;

/// Lump ids with a dedicated transform
pub mod lump {
    /// Entity key/value text
    pub const ENTITIES: usize = 0;
    /// Planes
    pub const PLANES: usize = 1;
    /// BSP tree nodes
    pub const NODES: usize = 5;
    /// Faces
    pub const FACES: usize = 7;
    /// BSP tree leaves
    pub const LEAFS: usize = 10;
    /// Edges
    pub const EDGES: usize = 12;
    /// Leaf to face index list
    pub const LEAFFACES: usize = 16;
    /// Leaf to brush index list
    pub const LEAFBRUSHES: usize = 17;
    /// Brush sides
    pub const BRUSHSIDES: usize = 19;
    /// Area portals
    pub const AREAPORTALS: usize = 21;
    /// Faces before splitting
    pub const ORIGINALFACES: usize = 27;
    /// Game lump directory and sub-lumps
    pub const GAME_LUMP: usize = 35;
    /// Leaf water data
    pub const LEAFWATERDATA: usize = 36;
    /// Non-polygon primitives
    pub const PRIMITIVES: usize = 37;
    /// Primitive indices
    pub const PRIMINDICES: usize = 39;
    /// Embedded ZIP archive
    pub const PAKFILE: usize = 40;
    /// Cubemap samples
    pub const CUBEMAPS: usize = 42;
    /// Overlays
    pub const OVERLAYS: usize = 45;
    /// Leaf minimum distance to water
    pub const LEAFMINDISTTOWATER: usize = 46;
    /// Water overlays
    pub const WATEROVERLAYS: usize = 50;
    /// HDR faces
    pub const FACES_HDR: usize = 58;
}

static LUMP_NAMES: [&str; HEADER_LUMPS] = [
    "LUMP_ENTITIES",
    "LUMP_PLANES",
    "LUMP_TEXDATA",
    "LUMP_VERTEXES",
    "LUMP_VISIBILITY",
    "LUMP_NODES",
    "LUMP_TEXINFO",
    "LUMP_FACES",
    "LUMP_LIGHTING",
    "LUMP_OCCLUSION",
    "LUMP_LEAFS",
    "LUMP_FACEIDS",
    "LUMP_EDGES",
    "LUMP_SURFEDGES",
    "LUMP_MODELS",
    "LUMP_WORLDLIGHTS",
    "LUMP_LEAFFACES",
    "LUMP_LEAFBRUSHES",
    "LUMP_BRUSHES",
    "LUMP_BRUSHSIDES",
    "LUMP_AREAS",
    "LUMP_AREAPORTALS",
    "LUMP_UNUSED0",
    "LUMP_UNUSED1",
    "LUMP_UNUSED2",
    "LUMP_UNUSED3",
    "LUMP_DISPINFO",
    "LUMP_ORIGINALFACES",
    "LUMP_PHYSDISP",
    "LUMP_PHYSCOLLIDE",
    "LUMP_VERTNORMALS",
    "LUMP_VERTNORMALINDICES",
    "LUMP_DISP_LIGHTMAP_ALPHAS",
    "LUMP_DISP_VERTS",
    "LUMP_DISP_LIGHTMAP_SAMPLE_POSITIONS",
    "LUMP_GAME_LUMP",
    "LUMP_LEAFWATERDATA",
    "LUMP_PRIMITIVES",
    "LUMP_PRIMVERTS",
    "LUMP_PRIMINDICES",
    "LUMP_PAKFILE",
    "LUMP_CLIPPORTALVERTS",
    "LUMP_CUBEMAPS",
    "LUMP_TEXDATA_STRING_DATA",
    "LUMP_TEXDATA_STRING_TABLE",
    "LUMP_OVERLAYS",
    "LUMP_LEAFMINDISTTOWATER",
    "LUMP_FACE_MACRO_TEXTURE_INFO",
    "LUMP_DISP_TRIS",
    "LUMP_PHYSCOLLIDESURFACE",
    "LUMP_WATEROVERLAYS",
    "LUMP_LEAF_AMBIENT_INDEX_HDR",
    "LUMP_LEAF_AMBIENT_INDEX",
    "LUMP_LIGHTING_HDR",
    "LUMP_WORLDLIGHTS_HDR",
    "LUMP_LEAF_AMBIENT_LIGHTING_HDR",
    "LUMP_LEAF_AMBIENT_LIGHTING",
    "LUMP_XZIPPAKFILE",
    "LUMP_FACES_HDR",
    "LUMP_MAP_FLAGS",
    "LUMP_OVERLAY_FADES",
    "LUMP_UNUSED61",
    "LUMP_UNUSED62",
    "LUMP_UNUSED63",
];

/// Human readable name of a lump id
pub fn lump_name(id: usize) -> &'static str {
    LUMP_NAMES.get(id).copied().unwrap_or("LUMP_UNKNOWN")
}

/// One entry of the lump directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LumpHeader {
    /// Offset of the lump data from the start of the file
    pub file_offset: u32,
    /// Length of the lump data as stored
    pub file_length: u32,
    /// Lump format version, with [`LUMP_COMPRESSED`] set on compressed lumps
    pub version: u32,
    /// Four-CC or decoded size, depending on the producer
    pub uncompressed_size: u32,
}

impl LumpHeader {
    /// Whether the lump data is an LZMA frame
    pub fn is_compressed(&self) -> bool {
        self.version & LUMP_COMPRESSED != 0
    }

    /// Version with the compression bit cleared
    pub fn format_version(&self) -> u32 {
        self.version & !LUMP_COMPRESSED
    }
}

/// Parsed BSP header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BspHeader {
    /// File ident, always [`IDBSPHEADER`]
    pub ident: u32,
    /// Format version
    pub version: u32,
    /// Lump directory
    pub lumps: [LumpHeader; HEADER_LUMPS],
    /// Map revision number
    pub map_revision: u32,
}

impl BspHeader {
    /// Parse the header from the start of `data`
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < BSP_HEADER_SIZE {
            return Err(BspError::Truncated {
                what: "BSP header",
                offset: 0,
                needed: BSP_HEADER_SIZE,
                available: data.len(),
            });
        }

        let mut cursor = Cursor::new(data);
        let ident = cursor.read_u32::<LittleEndian>()?;
        let version = cursor.read_u32::<LittleEndian>()?;

        let mut lumps = [LumpHeader::default(); HEADER_LUMPS];
        for lump in &mut lumps {
            lump.file_offset = cursor.read_u32::<LittleEndian>()?;
            lump.file_length = cursor.read_u32::<LittleEndian>()?;
            lump.version = cursor.read_u32::<LittleEndian>()?;
            lump.uncompressed_size = cursor.read_u32::<LittleEndian>()?;
        }

        let map_revision = cursor.read_u32::<LittleEndian>()?;

        Ok(Self {
            ident,
            version,
            lumps,
            map_revision,
        })
    }

    /// Serialize the header
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(BSP_HEADER_SIZE);
        out.write_u32::<LittleEndian>(self.ident)?;
        out.write_u32::<LittleEndian>(self.version)?;
        for lump in &self.lumps {
            out.write_u32::<LittleEndian>(lump.file_offset)?;
            out.write_u32::<LittleEndian>(lump.file_length)?;
            out.write_u32::<LittleEndian>(lump.version)?;
            out.write_u32::<LittleEndian>(lump.uncompressed_size)?;
        }
        out.write_u32::<LittleEndian>(self.map_revision)?;
        Ok(out)
    }

    /// Whether the ident and version identify a vendor map
    pub fn is_vendor_map(&self) -> bool {
        self.ident == IDBSPHEADER && self.version == CSO2_BSP_VERSION
    }
}

/// Check whether `data` is a vendor compiled map
///
/// Only the ident and version are checked. Buffers shorter than eight bytes
/// are rejected.
pub fn is_bsp_file(data: &[u8]) -> bool {
    if data.len() < 8 {
        return false;
    }
    let ident = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    ident == IDBSPHEADER && version == CSO2_BSP_VERSION
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_header() -> BspHeader {
        let mut lumps = [LumpHeader::default(); HEADER_LUMPS];
        lumps[lump::FACES] = LumpHeader {
            file_offset: 1036,
            file_length: 72,
            version: 1 | LUMP_COMPRESSED,
            uncompressed_size: 0,
        };
        BspHeader {
            ident: IDBSPHEADER,
            version: CSO2_BSP_VERSION,
            lumps,
            map_revision: 42,
        }
    }

    #[test]
    fn test_header_size() {
        assert_eq!(BSP_HEADER_SIZE, 1036);
        assert_eq!(sample_header().to_bytes().unwrap().len(), BSP_HEADER_SIZE);
    }

    #[test]
    fn test_header_parse() {
        let bytes = sample_header().to_bytes().unwrap();
        let parsed = BspHeader::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, sample_header());
        assert!(parsed.is_vendor_map());

        let faces = parsed.lumps[lump::FACES];
        assert!(faces.is_compressed());
        assert_eq!(faces.format_version(), 1);
    }

    #[test]
    fn test_is_bsp_file() {
        let bytes = sample_header().to_bytes().unwrap();
        assert!(is_bsp_file(&bytes));

        let mut wrong_version = bytes.clone();
        wrong_version[4..8].copy_from_slice(&20u32.to_le_bytes());
        assert!(!is_bsp_file(&wrong_version));

        let mut wrong_ident = bytes;
        wrong_ident[0..4].copy_from_slice(b"IBSP");
        assert!(!is_bsp_file(&wrong_ident));

        assert!(!is_bsp_file(b"VBSP"));
    }

    #[test]
    fn test_lump_names() {
        assert_eq!(lump_name(lump::GAME_LUMP), "LUMP_GAME_LUMP");
        assert_eq!(lump_name(lump::FACES_HDR), "LUMP_FACES_HDR");
        assert_eq!(lump_name(99), "LUMP_UNKNOWN");
    }
}
