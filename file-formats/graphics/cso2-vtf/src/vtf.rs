//! Chunked texture container
//!
//! Layout, little-endian and packed:
//!
//! ```text
//! signature      u8[3]   "CO2"
//! chunk_count    u8
//! original_size  u32
//! chunk_table    u32[2 * chunk_count]
//! ```
//!
//! Each table pair `(a, b)` describes one chunk. When bit 0 of `a` is set,
//! `a >> 1` is the offset of a Valve LZMA frame. Otherwise `a >> 1` is the
//! offset of `b` verbatim bytes.

use crate::{Result, VtfError, lzma};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// Signature at the start of every compressed texture
pub const SIGNATURE: [u8; 3] = *b"CO2";

/// Size of the fixed part of the header
pub const HEADER_SIZE: usize = 8;

/// One entry of the chunk table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chunk {
    /// LZMA frame starting at `offset`
    Lzma {
        /// Byte offset into the container
        offset: usize,
    },
    /// `len` verbatim bytes starting at `offset`
    Raw {
        /// Byte offset into the container
        offset: usize,
        /// Number of bytes to copy
        len: usize,
    },
}

impl Chunk {
    fn from_pair(a: u32, b: u32) -> Self {
        let offset = (a >> 1) as usize;
        if a & 1 == 1 {
            Chunk::Lzma { offset }
        } else {
            Chunk::Raw {
                offset,
                len: b as usize,
            }
        }
    }
}

/// Parsed compressed texture borrowing its source buffer
#[derive(Debug, Clone)]
pub struct CompressedVtf<'a> {
    data: &'a [u8],
    original_size: u32,
    chunks: Vec<Chunk>,
}

impl<'a> CompressedVtf<'a> {
    /// Parse the header and chunk table
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(VtfError::Truncated {
                offset: 0,
                needed: HEADER_SIZE,
                available: data.len(),
            });
        }

        let mut signature = [0u8; 3];
        signature.copy_from_slice(&data[..3]);
        if signature != SIGNATURE {
            return Err(VtfError::InvalidSignature(signature));
        }

        let mut cursor = Cursor::new(&data[3..]);
        let chunk_count = cursor.read_u8()?;
        let original_size = cursor.read_u32::<LittleEndian>()?;

        let table_len = chunk_count as usize * 8;
        if data.len() < HEADER_SIZE + table_len {
            return Err(VtfError::Truncated {
                offset: HEADER_SIZE,
                needed: table_len,
                available: data.len() - HEADER_SIZE,
            });
        }

        let mut cursor = Cursor::new(&data[HEADER_SIZE..HEADER_SIZE + table_len]);
        let mut chunks = Vec::with_capacity(chunk_count as usize);
        for _ in 0..chunk_count {
            let a = cursor.read_u32::<LittleEndian>()?;
            let b = cursor.read_u32::<LittleEndian>()?;
            chunks.push(Chunk::from_pair(a, b));
        }

        Ok(Self {
            data,
            original_size,
            chunks,
        })
    }

    /// Size of the decoded texture
    pub fn original_size(&self) -> u32 {
        self.original_size
    }

    /// The chunk table in file order
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Decode every chunk and concatenate the output
    pub fn decompress(&self) -> Result<Vec<u8>> {
        if self.original_size == 0 {
            return Err(VtfError::EmptyTexture);
        }

        let mut output = Vec::with_capacity(self.original_size as usize);

        for (index, chunk) in self.chunks.iter().enumerate() {
            match *chunk {
                Chunk::Lzma { offset } => {
                    let frame = self.data.get(offset..).ok_or(VtfError::Truncated {
                        offset,
                        needed: lzma::LZMA_HEADER_SIZE,
                        available: 0,
                    })?;
                    let decoded = lzma::decompress(frame)?;
                    log::trace!("chunk {index}: lzma @{offset} -> {} bytes", decoded.len());
                    output.extend_from_slice(&decoded);
                }
                Chunk::Raw { offset, len } => {
                    let bytes = offset
                        .checked_add(len)
                        .and_then(|end| self.data.get(offset..end))
                        .ok_or(VtfError::Truncated {
                            offset,
                            needed: len,
                            available: self.data.len().saturating_sub(offset),
                        })?;
                    log::trace!("chunk {index}: raw @{offset} -> {len} bytes");
                    output.extend_from_slice(bytes);
                }
            }
        }

        if output.len() != self.original_size as usize {
            return Err(VtfError::SizeMismatch {
                expected: u64::from(self.original_size),
                actual: output.len() as u64,
            });
        }

        Ok(output)
    }
}

/// Check whether `data` starts with the compressed texture signature
pub fn is_compressed_vtf(data: &[u8]) -> bool {
    data.len() >= SIGNATURE.len() && data[..SIGNATURE.len()] == SIGNATURE
}

/// Decode a compressed texture
///
/// An empty buffer is returned unchanged.
pub fn decompress_vtf(data: &[u8]) -> Result<Vec<u8>> {
    if data.is_empty() {
        log::debug!("empty texture buffer, nothing to decode");
        return Ok(Vec::new());
    }

    let vtf = CompressedVtf::parse(data)?;
    log::debug!(
        "compressed texture: {} chunks, {} bytes decoded",
        vtf.chunks.len(),
        vtf.original_size
    );
    vtf.decompress()
}
