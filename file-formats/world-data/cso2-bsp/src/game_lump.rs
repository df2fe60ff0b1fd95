//! Game lump transcoding
//!
//! The game lump starts with a directory of sub-lumps followed by the static
//! prop and detail prop data. None of the sections are tabulated, each one
//! starts right after the previous section's count and records:
//!
//! ```text
//! i32 count, count x dgamelump_t (16 bytes)
//! i32 count, count x static prop name      (128 bytes)
//! i32 count, count x static prop leaf      (vendor u32, standard u16)
//! i32 count, count x static prop           (vendor 184 or 72, standard 64)
//! i32 count, count x detail model name     (128 bytes)
//! i32 count, count x detail sprite         (32 bytes)
//! i32 count, count x detail object         (vendor 56, standard 52)
//! ```
//!
//! Directory offsets are absolute file offsets, so they are rebased onto the
//! lump's new position.

use crate::fix::FixContext;
use crate::narrow::{FieldRef, to_u16};
use crate::{BspError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

/// Static props sub-lump id, `'sprp'`
pub const GAMELUMP_STATIC_PROPS: u32 = 0x7370_7270;

/// Detail props sub-lump id, `'dprp'`
pub const GAMELUMP_DETAIL_PROPS: u32 = 0x6470_7270;

/// Static props version written to the output
pub const STATIC_PROPS_OUTPUT_VERSION: u16 = 6;

const DIRECTORY_ENTRY_SIZE: usize = 16;
const PROP_NAME_SIZE: usize = 128;
const DETAIL_NAME_SIZE: usize = 128;
const DETAIL_SPRITE_SIZE: usize = 32;

const VENDOR_LEAF_SIZE: usize = 4;
const LEAF_SIZE: usize = 2;

const VENDOR_STATIC_PROP_V7_SIZE: usize = 184;
const VENDOR_STATIC_PROP_V6_SIZE: usize = 72;
const STATIC_PROP_SIZE: usize = 64;

const VENDOR_DETAIL_OBJECT_SIZE: usize = 56;
const DETAIL_OBJECT_SIZE: usize = 52;

/// One entry of the game lump directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameLumpEntry {
    /// Four-CC identifier
    pub id: u32,
    /// Flags
    pub flags: u16,
    /// Sub-lump format version
    pub version: u16,
    /// Absolute file offset
    pub file_offset: i32,
    /// Length in bytes
    pub file_length: i32,
}

impl GameLumpEntry {
    fn read(r: &mut Cursor<&[u8]>) -> Result<Self> {
        Ok(Self {
            id: r.read_u32::<LittleEndian>()?,
            flags: r.read_u16::<LittleEndian>()?,
            version: r.read_u16::<LittleEndian>()?,
            file_offset: r.read_i32::<LittleEndian>()?,
            file_length: r.read_i32::<LittleEndian>()?,
        })
    }

    fn write(&self, w: &mut Vec<u8>) -> Result<()> {
        w.write_u32::<LittleEndian>(self.id)?;
        w.write_u16::<LittleEndian>(self.flags)?;
        w.write_u16::<LittleEndian>(self.version)?;
        w.write_i32::<LittleEndian>(self.file_offset)?;
        w.write_i32::<LittleEndian>(self.file_length)?;
        Ok(())
    }
}

/// A counted section of the chain
#[derive(Debug, Clone, Copy)]
struct Section {
    /// Offset of the count field
    offset: usize,
    /// Count as stored
    count: i32,
    /// Record size in the source
    record_size: usize,
}

impl Section {
    fn read(data: &[u8], offset: usize, record_size: usize, what: &'static str) -> Result<Self> {
        let bytes = data
            .get(offset..offset + 4)
            .ok_or(BspError::Truncated {
                what,
                offset,
                needed: 4,
                available: data.len(),
            })?;
        let count = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if count < 0 {
            log::warn!("game lump {} count is {}", what, count);
        }
        Ok(Self {
            offset,
            count,
            record_size,
        })
    }

    /// Records to process, negative counts hold none
    fn len(&self) -> usize {
        self.count.max(0) as usize
    }

    /// Offset right after this section in the source
    fn end(&self) -> usize {
        self.offset + 4 + self.len() * self.record_size
    }

    fn records<'a>(&self, data: &'a [u8], what: &'static str) -> Result<&'a [u8]> {
        let start = self.offset + 4;
        let needed = self.len() * self.record_size;
        data.get(start..start + needed).ok_or(BspError::Truncated {
            what,
            offset: start,
            needed,
            available: data.len(),
        })
    }
}

/// Read the sub-lump directory at the start of a game lump
pub fn read_directory(data: &[u8]) -> Result<Vec<GameLumpEntry>> {
    let mut cursor = Cursor::new(data);
    let count = cursor.read_i32::<LittleEndian>()?;
    if count < 0 {
        return Err(BspError::game_lump(format!(
            "negative directory count {}",
            count
        )));
    }

    let count = count as usize;
    if 4 + count * DIRECTORY_ENTRY_SIZE > data.len() {
        return Err(BspError::game_lump(format!(
            "directory of {} entries does not fit in {} bytes",
            count,
            data.len()
        )));
    }

    (0..count).map(|_| GameLumpEntry::read(&mut cursor)).collect()
}

pub(crate) fn fix_game_lump(ctx: &FixContext<'_>, id: usize) -> Result<Vec<u8>> {
    let data = ctx.lump(id);
    if data.is_empty() {
        return Ok(Vec::new());
    }

    let directory = read_directory(data)?;

    let static_props_version = directory
        .iter()
        .rev()
        .find(|entry| entry.id == GAMELUMP_STATIC_PROPS)
        .map_or(STATIC_PROPS_OUTPUT_VERSION, |entry| entry.version);
    let vendor_prop_size = if static_props_version == 7 {
        VENDOR_STATIC_PROP_V7_SIZE
    } else {
        VENDOR_STATIC_PROP_V6_SIZE
    };
    log::debug!(
        "game lump: {} sub-lumps, static props version {}",
        directory.len(),
        static_props_version
    );

    let dict_offset = 4 + directory.len() * DIRECTORY_ENTRY_SIZE;
    let prop_names = Section::read(data, dict_offset, PROP_NAME_SIZE, "static prop names")?;
    let prop_leaves = Section::read(
        data,
        prop_names.end(),
        VENDOR_LEAF_SIZE,
        "static prop leaves",
    )?;
    let props = Section::read(data, prop_leaves.end(), vendor_prop_size, "static props")?;
    let detail_names = Section::read(data, props.end(), DETAIL_NAME_SIZE, "detail names")?;
    let detail_sprites =
        Section::read(data, detail_names.end(), DETAIL_SPRITE_SIZE, "detail sprites")?;
    let details = Section::read(
        data,
        detail_sprites.end(),
        VENDOR_DETAIL_OBJECT_SIZE,
        "detail objects",
    )?;

    // offsets of the sections in the narrowed layout
    let new_props_offset = prop_leaves.offset + 4 + prop_leaves.len() * LEAF_SIZE;
    let new_detail_names_offset = new_props_offset + 4 + props.len() * STATIC_PROP_SIZE;
    let new_detail_sprites_offset =
        new_detail_names_offset + 4 + detail_names.len() * DETAIL_NAME_SIZE;
    let new_details_offset =
        new_detail_sprites_offset + 4 + detail_sprites.len() * DETAIL_SPRITE_SIZE;
    let new_size = new_details_offset + 4 + details.len() * DETAIL_OBJECT_SIZE;

    let old_base = ctx.source_offset(id) as i32;
    let new_base = ctx.new_offset(id) as i32;

    let mut out = Vec::with_capacity(new_size);
    out.write_i32::<LittleEndian>(directory.len() as i32)?;
    for entry in &directory {
        let mut entry = *entry;
        match entry.id {
            GAMELUMP_STATIC_PROPS => {
                entry.file_offset = new_base.wrapping_add(dict_offset as i32);
                entry.version = STATIC_PROPS_OUTPUT_VERSION;
            }
            GAMELUMP_DETAIL_PROPS => {
                entry.file_offset = new_base.wrapping_add(new_detail_names_offset as i32);
            }
            _ => {
                entry.file_offset = entry
                    .file_offset
                    .wrapping_sub(old_base)
                    .wrapping_add(new_base);
            }
        }
        entry.write(&mut out)?;
    }

    copy_section(data, &prop_names, &mut out, "static prop names")?;

    write_count(&mut out, &prop_leaves)?;
    for (index, leaf) in prop_leaves
        .records(data, "static prop leaves")?
        .chunks_exact(VENDOR_LEAF_SIZE)
        .enumerate()
    {
        let leaf = u32::from_le_bytes([leaf[0], leaf[1], leaf[2], leaf[3]]);
        let at = FieldRef::new("static prop leaves", index).field("m_Leaf");
        out.write_u16::<LittleEndian>(to_u16(leaf, at))?;
    }

    write_count(&mut out, &props)?;
    for (index, prop) in props
        .records(data, "static props")?
        .chunks_exact(vendor_prop_size)
        .enumerate()
    {
        convert_static_prop(prop, &mut out, FieldRef::new("static props", index))?;
    }

    copy_section(data, &detail_names, &mut out, "detail names")?;
    copy_section(data, &detail_sprites, &mut out, "detail sprites")?;

    write_count(&mut out, &details)?;
    for (index, detail) in details
        .records(data, "detail objects")?
        .chunks_exact(VENDOR_DETAIL_OBJECT_SIZE)
        .enumerate()
    {
        convert_detail_object(detail, &mut out, FieldRef::new("detail objects", index))?;
    }

    debug_assert_eq!(out.len(), new_size);
    if details.end() < data.len() {
        log::debug!(
            "game lump: {} bytes after the detail objects dropped",
            data.len() - details.end()
        );
    }

    Ok(out)
}

/// Dictionaries keep their count and records as stored
fn copy_section(
    data: &[u8],
    section: &Section,
    out: &mut Vec<u8>,
    what: &'static str,
) -> Result<()> {
    out.write_i32::<LittleEndian>(section.count)?;
    out.extend_from_slice(section.records(data, what)?);
    Ok(())
}

/// Narrowed sections with no records keep a zero count
fn write_count(out: &mut Vec<u8>, section: &Section) -> Result<()> {
    out.write_i32::<LittleEndian>(section.count.max(0))?;
    Ok(())
}

fn convert_static_prop(record: &[u8], out: &mut Vec<u8>, at: FieldRef) -> Result<()> {
    let mut r = Cursor::new(record);
    let start = out.len();

    // origin and angles
    out.extend_from_slice(&record[..24]);
    r.set_position(24);
    let prop_type = r.read_u16::<LittleEndian>()?;
    r.set_position(28);
    let first_leaf = r.read_u32::<LittleEndian>()?;
    let leaf_count = r.read_u32::<LittleEndian>()?;
    let solid = r.read_u8()?;
    let flags = r.read_u8()?;
    r.set_position(40);
    let skin = r.read_i32::<LittleEndian>()?;

    out.write_u16::<LittleEndian>(prop_type)?;
    out.write_u16::<LittleEndian>(to_u16(first_leaf, at.field("m_FirstLeaf")))?;
    out.write_u16::<LittleEndian>(to_u16(leaf_count, at.field("m_LeafCount")))?;
    out.write_u8(solid)?;
    out.write_u8(flags)?;
    out.write_i32::<LittleEndian>(skin)?;
    // fade distances, lighting origin, forced fade scale, DX levels
    out.extend_from_slice(&record[44..72]);

    debug_assert_eq!(out.len() - start, STATIC_PROP_SIZE);
    Ok(())
}

fn convert_detail_object(record: &[u8], out: &mut Vec<u8>, at: FieldRef) -> Result<()> {
    let mut r = Cursor::new(record);
    let start = out.len();

    out.extend_from_slice(&record[..24]);
    r.set_position(24);
    let model = r.read_u16::<LittleEndian>()?;
    r.set_position(28);
    let leaf = r.read_u32::<LittleEndian>()?;

    out.write_u16::<LittleEndian>(model)?;
    out.write_u16::<LittleEndian>(to_u16(leaf, at.field("m_Leaf")))?;
    // lighting, light styles, style count, sway, shape angle and size, orientation
    out.extend_from_slice(&record[32..45]);
    out.extend_from_slice(&[0; 3]);
    out.write_u8(record[48])?;
    out.extend_from_slice(&[0; 3]);
    out.extend_from_slice(&record[52..56]);

    debug_assert_eq!(out.len() - start, DETAIL_OBJECT_SIZE);
    Ok(())
}
