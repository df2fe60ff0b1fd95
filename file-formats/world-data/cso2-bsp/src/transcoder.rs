//! Vendor map to standard map transcoding
//!
//! Runs in two passes. The first decodes every compressed lump and lays the
//! lumps out back to back in id order. The second runs the per-lump fix
//! table over that layout and assembles a version 20 file.

use crate::fix::{SourceLumps, fix_all};
use crate::header::{
    BSP_HEADER_SIZE, BspHeader, HEADER_LUMPS, IDBSPHEADER, LumpHeader, SOURCE_BSP_VERSION,
    is_bsp_file, lump_name,
};
use crate::{BspError, Result};
use cso2_vtf::lzma;

/// Converts vendor maps to the standard layout
///
/// # Examples
///
/// ```no_run
/// use cso2_bsp::BspTranscoder;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let map = std::fs::read("maps/de_dust2.bsp")?;
/// let fixed = BspTranscoder::new().transcode(&map)?;
/// std::fs::write("de_dust2.bsp", fixed)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BspTranscoder {
    fix_lumps: bool,
}

impl Default for BspTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl BspTranscoder {
    /// Create a transcoder that narrows lump records
    pub fn new() -> Self {
        Self { fix_lumps: true }
    }

    /// Set whether lump records are narrowed
    ///
    /// With fixing disabled, lumps are only decompressed and copied.
    pub fn fix_lumps(mut self, fix: bool) -> Self {
        self.fix_lumps = fix;
        self
    }

    /// Transcode a vendor map
    ///
    /// An empty buffer is returned unchanged.
    pub fn transcode(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.is_empty() {
            log::debug!("empty map buffer, nothing to transcode");
            return Ok(Vec::new());
        }

        if !is_bsp_file(data) {
            let header = BspHeader::from_bytes(data).ok();
            return Err(BspError::InvalidHeader {
                ident: header.as_ref().map_or(0, |h| h.ident),
                version: header.as_ref().map_or(0, |h| h.version),
            });
        }

        let header = BspHeader::from_bytes(data)?;
        let source = decompress_lumps(&header, data)?;

        let lumps = if self.fix_lumps {
            fix_all(&source)?
        } else {
            source.data.clone()
        };

        assemble(&source, header.map_revision, &lumps)
    }
}

/// Decode every lump and lay them out sequentially after the header
pub(crate) fn decompress_lumps(header: &BspHeader, data: &[u8]) -> Result<SourceLumps> {
    let mut headers = [LumpHeader::default(); HEADER_LUMPS];
    let mut lumps = Vec::with_capacity(HEADER_LUMPS);
    let mut offset = BSP_HEADER_SIZE;

    for (id, lump) in header.lumps.iter().enumerate() {
        let start = lump.file_offset as usize;
        let end = start + lump.file_length as usize;
        let stored = data.get(start..end).ok_or(BspError::LumpOutOfBounds {
            lump: lump_name(id),
            offset: lump.file_offset,
            length: lump.file_length,
            file_size: data.len(),
        })?;

        let decoded = if lump.is_compressed() {
            // the stored length may cover padding, the frame header knows its own size
            let frame = data.get(start..).unwrap_or_default();
            if !lzma::is_compressed(frame) {
                return Err(BspError::MissingLzmaFrame(lump_name(id)));
            }
            lzma::decompress(frame)?
        } else {
            stored.to_vec()
        };

        log::debug!(
            "{}: version {}, {} -> {} bytes{}",
            lump_name(id),
            lump.format_version(),
            lump.file_length,
            decoded.len(),
            if lump.is_compressed() { " (lzma)" } else { "" }
        );

        headers[id] = LumpHeader {
            file_offset: offset as u32,
            file_length: decoded.len() as u32,
            version: lump.format_version(),
            uncompressed_size: 0,
        };
        offset += decoded.len();
        lumps.push(decoded);
    }

    Ok(SourceLumps {
        headers,
        data: lumps,
    })
}

fn assemble(source: &SourceLumps, map_revision: u32, lumps: &[Vec<u8>]) -> Result<Vec<u8>> {
    let mut header = BspHeader {
        ident: IDBSPHEADER,
        version: SOURCE_BSP_VERSION,
        lumps: [LumpHeader::default(); HEADER_LUMPS],
        map_revision,
    };

    let mut offset = BSP_HEADER_SIZE;
    for (id, data) in lumps.iter().enumerate() {
        header.lumps[id] = LumpHeader {
            file_offset: offset as u32,
            file_length: data.len() as u32,
            version: source.headers[id].version,
            uncompressed_size: 0,
        };
        offset += data.len();
    }

    let mut out = header.to_bytes()?;
    out.reserve(offset - BSP_HEADER_SIZE);
    for data in lumps {
        out.extend_from_slice(data);
    }
    Ok(out)
}

/// Transcode a vendor map, optionally skipping the record fixes
pub fn decompress_bsp(data: &[u8], fix_lumps: bool) -> Result<Vec<u8>> {
    BspTranscoder::new().fix_lumps(fix_lumps).transcode(data)
}
