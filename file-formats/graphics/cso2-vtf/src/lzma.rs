//! Valve LZMA frames
//!
//! Source engine assets store raw LZMA streams behind a 17 byte header
//! instead of the usual `.lzma` header:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 4 | `"LZMA"` |
//! | 4 | 4 | decoded size |
//! | 8 | 4 | compressed stream size |
//! | 12 | 5 | LZMA properties |
//! | 17 | n | compressed stream |
//!
//! The stream has no end marker, so decoding relies on the declared size.

use crate::{Result, VtfError};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{BufReader, Cursor};

/// Frame identifier, `"LZMA"` read as a little-endian integer
pub const LZMA_ID: u32 = 0x414D_5A4C;

/// Size of the frame header in bytes
pub const LZMA_HEADER_SIZE: usize = 17;

/// Size of the `.lzma` header written by `lzma-rs` (properties and size)
const LZMA_ALONE_HEADER_SIZE: usize = 13;

/// Parsed Valve LZMA frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LzmaHeader {
    /// Size of the decoded data
    pub actual_size: u32,
    /// Size of the compressed stream following the header
    pub lzma_size: u32,
    /// Encoded lc/lp/pb byte followed by the dictionary size
    pub properties: [u8; 5],
}

impl LzmaHeader {
    /// Parse a frame header from the start of `data`
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < LZMA_HEADER_SIZE {
            return Err(VtfError::Truncated {
                offset: 0,
                needed: LZMA_HEADER_SIZE,
                available: data.len(),
            });
        }

        let mut cursor = Cursor::new(data);
        let id = cursor.read_u32::<LittleEndian>()?;
        if id != LZMA_ID {
            return Err(VtfError::invalid_frame(format!(
                "expected id 0x{LZMA_ID:08X}, found 0x{id:08X}"
            )));
        }

        let actual_size = cursor.read_u32::<LittleEndian>()?;
        let lzma_size = cursor.read_u32::<LittleEndian>()?;
        let mut properties = [0u8; 5];
        properties.copy_from_slice(&data[12..LZMA_HEADER_SIZE]);

        Ok(Self {
            actual_size,
            lzma_size,
            properties,
        })
    }

    /// Total size of the frame, header included
    pub fn frame_len(&self) -> usize {
        LZMA_HEADER_SIZE + self.lzma_size as usize
    }

    /// Serialize the header
    pub fn to_bytes(&self) -> [u8; LZMA_HEADER_SIZE] {
        let mut out = [0u8; LZMA_HEADER_SIZE];
        out[0..4].copy_from_slice(&LZMA_ID.to_le_bytes());
        out[4..8].copy_from_slice(&self.actual_size.to_le_bytes());
        out[8..12].copy_from_slice(&self.lzma_size.to_le_bytes());
        out[12..17].copy_from_slice(&self.properties);
        out
    }
}

/// Check whether `data` starts with a Valve LZMA frame
pub fn is_compressed(data: &[u8]) -> bool {
    data.len() >= LZMA_HEADER_SIZE && data[0..4] == LZMA_ID.to_le_bytes()
}

/// Decoded size declared by the frame at the start of `data`
pub fn actual_size(data: &[u8]) -> Option<u32> {
    LzmaHeader::from_bytes(data).ok().map(|h| h.actual_size)
}

/// Decode the frame at the start of `data`
///
/// Bytes after the end of the frame are ignored.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let header = LzmaHeader::from_bytes(data)?;
    let end = header.frame_len();
    if end > data.len() {
        return Err(VtfError::Truncated {
            offset: LZMA_HEADER_SIZE,
            needed: header.lzma_size as usize,
            available: data.len() - LZMA_HEADER_SIZE,
        });
    }

    // lzma-rs reads the 5 property bytes itself and takes the size from the options
    let mut input = BufReader::new(Cursor::new(&data[12..end]));
    let mut output = Vec::with_capacity(header.actual_size as usize);
    let options = lzma_rs::decompress::Options {
        unpacked_size: lzma_rs::decompress::UnpackedSize::UseProvided(Some(u64::from(
            header.actual_size,
        ))),
        ..Default::default()
    };

    if let Err(e) = lzma_rs::lzma_decompress_with_options(&mut input, &mut output, &options) {
        log::error!("LZMA frame decompression failed: {:?}", e);
        log::debug!(
            "Frame header: actual {} packed {} props {:02X?}",
            header.actual_size,
            header.lzma_size,
            header.properties
        );
        return Err(VtfError::lzma(format!("{e:?}")));
    }

    if output.len() != header.actual_size as usize {
        return Err(VtfError::SizeMismatch {
            expected: u64::from(header.actual_size),
            actual: output.len() as u64,
        });
    }

    Ok(output)
}

/// Encode `data` as a Valve LZMA frame
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut input = BufReader::new(Cursor::new(data));
    let mut encoded = Vec::new();
    lzma_rs::lzma_compress(&mut input, &mut encoded)
        .map_err(|e| VtfError::lzma(format!("LZMA compression failed: {e:?}")))?;

    if encoded.len() < LZMA_ALONE_HEADER_SIZE {
        return Err(VtfError::lzma("encoder produced a truncated stream"));
    }

    let stream = &encoded[LZMA_ALONE_HEADER_SIZE..];
    let mut properties = [0u8; 5];
    properties.copy_from_slice(&encoded[..5]);

    let header = LzmaHeader {
        actual_size: u32::try_from(data.len())
            .map_err(|_| VtfError::lzma("input larger than 4 GiB"))?,
        lzma_size: u32::try_from(stream.len())
            .map_err(|_| VtfError::lzma("stream larger than 4 GiB"))?,
        properties,
    };

    let mut frame = Vec::with_capacity(header.frame_len());
    frame.extend_from_slice(&header.to_bytes());
    frame.extend_from_slice(stream);
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_frame_round_trip() {
        let original = b"Source engine lumps are compressed one by one, \
                         each with its own LZMA frame header.";

        let frame = compress(original).expect("compression failed");
        assert!(is_compressed(&frame));
        assert_eq!(actual_size(&frame), Some(original.len() as u32));

        let header = LzmaHeader::from_bytes(&frame).unwrap();
        assert_eq!(header.frame_len(), frame.len());

        let decoded = decompress(&frame).expect("decompression failed");
        assert_eq!(decoded, original.to_vec());
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let mut frame = compress(b"payload").unwrap();
        frame.extend_from_slice(&[0xAA; 9]);
        assert_eq!(decompress(&frame).unwrap(), b"payload".to_vec());
    }

    #[test]
    fn test_bad_id() {
        let mut frame = compress(b"payload").unwrap();
        frame[0] = b'X';
        assert!(!is_compressed(&frame));
        assert!(matches!(
            decompress(&frame),
            Err(VtfError::InvalidLzmaFrame(_))
        ));
    }

    #[test]
    fn test_truncated_stream() {
        let frame = compress(b"some data that will be cut short").unwrap();
        let cut = &frame[..frame.len() - 2];
        assert!(matches!(decompress(cut), Err(VtfError::Truncated { .. })));
    }

    #[test]
    fn test_short_header() {
        assert!(!is_compressed(b"LZMA"));
        assert!(matches!(
            LzmaHeader::from_bytes(b"LZMA\0\0"),
            Err(VtfError::Truncated { needed: 17, .. })
        ));
    }
}
