//! Embedded pak archive repacking
//!
//! The pak lump is a ZIP archive whose entries may hold Valve LZMA frames or
//! compressed textures. It is rebuilt as a plain stored archive: every entry
//! is decoded, its CRC recomputed, and local headers, central directory and
//! end record written out again.

use crate::fix::FixContext;
use crate::{BspError, Result};
use byteorder::{LittleEndian, WriteBytesExt};
use cso2_vtf::{decompress_vtf, is_compressed_vtf, lzma};

/// `PK\x03\x04`
pub const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x0403_4B50;
/// `PK\x01\x02`
pub const CENTRAL_FILE_HEADER_SIGNATURE: u32 = 0x0201_4B50;
/// `PK\x05\x06`
pub const END_OF_CENTRAL_DIR_SIGNATURE: u32 = 0x0605_4B50;

const LOCAL_FILE_HEADER_SIZE: usize = 30;
const END_OF_CENTRAL_DIR_SIZE: usize = 22;

const VERSION_MADE_BY: u16 = 20;
const VERSION_NEEDED: u16 = 10;

fn u16_at(data: &[u8], offset: usize) -> Option<u16> {
    data.get(offset..offset + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
}

fn u32_at(data: &[u8], offset: usize) -> Option<u32> {
    data.get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Find the end of central directory record by scanning backwards
pub fn find_end_of_central_dir(data: &[u8]) -> Option<usize> {
    let last = data.len().checked_sub(END_OF_CENTRAL_DIR_SIZE)?;
    (0..=last)
        .rev()
        .find(|&offset| u32_at(data, offset) == Some(END_OF_CENTRAL_DIR_SIGNATURE))
}

/// Local file header fields the repacker relies on
#[derive(Debug, Clone, Copy)]
struct LocalEntry {
    compressed_size: u32,
    uncompressed_size: u32,
    name_len: usize,
    extra_len: usize,
}

impl LocalEntry {
    fn parse(data: &[u8], offset: usize) -> Result<Self> {
        if offset + LOCAL_FILE_HEADER_SIZE > data.len() {
            return Err(BspError::Truncated {
                what: "pak local file header",
                offset,
                needed: LOCAL_FILE_HEADER_SIZE,
                available: data.len(),
            });
        }
        let field16 = |at| u16_at(data, offset + at).unwrap_or_default();
        let field32 = |at| u32_at(data, offset + at).unwrap_or_default();
        Ok(Self {
            compressed_size: field32(18),
            uncompressed_size: field32(22),
            name_len: usize::from(field16(26)),
            extra_len: usize::from(field16(28)),
        })
    }

    fn data_offset(&self, header_offset: usize) -> usize {
        header_offset + LOCAL_FILE_HEADER_SIZE + self.name_len + self.extra_len
    }
}

/// Decoded entry ready to be written back
#[derive(Debug)]
struct RepackedEntry {
    name: Vec<u8>,
    crc32: u32,
    size: u32,
    local_offset: u32,
}

fn write_local_header(out: &mut Vec<u8>, entry: &RepackedEntry) -> Result<()> {
    out.write_u32::<LittleEndian>(LOCAL_FILE_HEADER_SIGNATURE)?;
    out.write_u16::<LittleEndian>(VERSION_NEEDED)?;
    out.write_u16::<LittleEndian>(0)?; // flags
    out.write_u16::<LittleEndian>(0)?; // stored
    out.write_u16::<LittleEndian>(0)?; // time
    out.write_u16::<LittleEndian>(0)?; // date
    out.write_u32::<LittleEndian>(entry.crc32)?;
    out.write_u32::<LittleEndian>(entry.size)?;
    out.write_u32::<LittleEndian>(entry.size)?;
    out.write_u16::<LittleEndian>(entry.name.len() as u16)?;
    out.write_u16::<LittleEndian>(0)?;
    out.extend_from_slice(&entry.name);
    Ok(())
}

fn write_central_header(out: &mut Vec<u8>, entry: &RepackedEntry) -> Result<()> {
    out.write_u32::<LittleEndian>(CENTRAL_FILE_HEADER_SIGNATURE)?;
    out.write_u16::<LittleEndian>(VERSION_MADE_BY)?;
    out.write_u16::<LittleEndian>(VERSION_NEEDED)?;
    out.write_u16::<LittleEndian>(0)?; // flags
    out.write_u16::<LittleEndian>(0)?; // stored
    out.write_u16::<LittleEndian>(0)?; // time
    out.write_u16::<LittleEndian>(0)?; // date
    out.write_u32::<LittleEndian>(entry.crc32)?;
    out.write_u32::<LittleEndian>(entry.size)?;
    out.write_u32::<LittleEndian>(entry.size)?;
    out.write_u16::<LittleEndian>(entry.name.len() as u16)?;
    out.write_u16::<LittleEndian>(0)?; // extra
    out.write_u16::<LittleEndian>(0)?; // comment
    out.write_u16::<LittleEndian>(0)?; // disk
    out.write_u16::<LittleEndian>(0)?; // internal attributes
    out.write_u32::<LittleEndian>(0)?; // external attributes
    out.write_u32::<LittleEndian>(entry.local_offset)?;
    out.extend_from_slice(&entry.name);
    Ok(())
}

/// Rebuild a pak archive with every entry stored uncompressed
///
/// Archives without an end of central directory record are returned as is.
pub fn repack(data: &[u8]) -> Result<Vec<u8>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let Some(eocd) = find_end_of_central_dir(data) else {
        log::warn!("pak lump has no end of central directory record, copying it");
        return Ok(data.to_vec());
    };
    let total = usize::from(u16_at(data, eocd + 10).unwrap_or_default());
    log::debug!("pak lump: {} entries, directory end at {}", total, eocd);

    let mut out = Vec::with_capacity(data.len());
    let mut entries = Vec::with_capacity(total);
    let mut cursor = 0usize;

    for index in 0..total {
        let signature = u32_at(data, cursor).unwrap_or_default();
        if signature != LOCAL_FILE_HEADER_SIGNATURE {
            return Err(BspError::BadZipSignature {
                index,
                offset: cursor,
                found: signature,
            });
        }

        let local = LocalEntry::parse(data, cursor)?;
        let name_start = cursor + LOCAL_FILE_HEADER_SIZE;
        let name = data
            .get(name_start..name_start + local.name_len)
            .ok_or(BspError::Truncated {
                what: "pak file name",
                offset: name_start,
                needed: local.name_len,
                available: data.len(),
            })?
            .to_vec();
        let data_start = local.data_offset(cursor);
        let tail = data.get(data_start..).unwrap_or_default();

        let lzma_packed = lzma::is_compressed(tail);
        let (payload, advance) = if lzma_packed {
            (lzma::decompress(tail)?, local.compressed_size)
        } else {
            let size = local.uncompressed_size as usize;
            let stored = tail.get(..size).ok_or(BspError::Truncated {
                what: "pak file data",
                offset: data_start,
                needed: size,
                available: data.len(),
            })?;
            (stored.to_vec(), local.uncompressed_size)
        };

        let payload = if is_compressed_vtf(&payload) {
            decompress_vtf(&payload)?
        } else {
            payload
        };

        log::trace!(
            "pak entry {} '{}': {} bytes{}",
            index,
            String::from_utf8_lossy(&name),
            payload.len(),
            if lzma_packed { ", lzma" } else { "" }
        );

        let entry = RepackedEntry {
            name,
            crc32: crc32fast::hash(&payload),
            size: payload.len() as u32,
            local_offset: out.len() as u32,
        };
        write_local_header(&mut out, &entry)?;
        out.extend_from_slice(&payload);
        entries.push(entry);

        cursor = data_start + advance as usize;
    }

    let central_start = out.len();
    for entry in &entries {
        write_central_header(&mut out, entry)?;
    }
    let central_size = out.len() - central_start;

    out.write_u32::<LittleEndian>(END_OF_CENTRAL_DIR_SIGNATURE)?;
    out.write_u16::<LittleEndian>(0)?;
    out.write_u16::<LittleEndian>(0)?;
    out.write_u16::<LittleEndian>(total as u16)?;
    out.write_u16::<LittleEndian>(total as u16)?;
    out.write_u32::<LittleEndian>(central_size as u32)?;
    out.write_u32::<LittleEndian>(central_start as u32)?;
    out.write_u16::<LittleEndian>(0)?;

    Ok(out)
}

pub(crate) fn fix_pakfile(ctx: &FixContext<'_>, id: usize) -> Result<Vec<u8>> {
    repack(ctx.lump(id))
}
