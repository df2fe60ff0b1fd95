//! Decoding multi-chunk textures through the public API

use cso2_vtf::{CompressedVtf, VtfError, decompress_vtf, lzma};
use pretty_assertions::assert_eq;

/// Generate repetitive test data (compresses well)
fn repetitive_data(pattern: &[u8], total_size: usize) -> Vec<u8> {
    pattern.iter().copied().cycle().take(total_size).collect()
}

/// Build a container from a list of chunks, compressing the flagged ones
fn build_texture(parts: &[(&[u8], bool)]) -> Vec<u8> {
    let table_end = 8 + parts.len() * 8;
    let mut table = Vec::new();
    let mut body = Vec::new();
    let mut original_size = 0u32;

    for (bytes, compressed) in parts {
        let offset = (table_end + body.len()) as u32;
        original_size += bytes.len() as u32;
        if *compressed {
            table.push(((offset << 1) | 1, 0u32));
            body.extend_from_slice(&lzma::compress(bytes).unwrap());
        } else {
            table.push((offset << 1, bytes.len() as u32));
            body.extend_from_slice(bytes);
        }
    }

    let mut out = b"CO2".to_vec();
    out.push(parts.len() as u8);
    out.extend_from_slice(&original_size.to_le_bytes());
    for (a, b) in table {
        out.extend_from_slice(&a.to_le_bytes());
        out.extend_from_slice(&b.to_le_bytes());
    }
    out.extend_from_slice(&body);
    out
}

#[test]
fn test_mipmap_chain_decodes_in_order() {
    let header = b"VTF\0\x07\0\0\0\x02\0\0\0".to_vec();
    let large_mip = repetitive_data(&[0x10, 0x20, 0x30, 0x40], 4096);
    let small_mip = repetitive_data(&[0xEE], 256);

    let texture = build_texture(&[
        (&header, false),
        (&large_mip, true),
        (&small_mip, true),
    ]);

    let parsed = CompressedVtf::parse(&texture).unwrap();
    assert_eq!(parsed.chunks().len(), 3);
    assert_eq!(parsed.original_size() as usize, header.len() + 4096 + 256);

    let decoded = decompress_vtf(&texture).unwrap();
    assert_eq!(&decoded[..header.len()], header.as_slice());
    assert_eq!(&decoded[header.len()..header.len() + 4096], large_mip.as_slice());
    assert_eq!(&decoded[header.len() + 4096..], small_mip.as_slice());
}

#[test]
fn test_corrupt_frame_is_reported() {
    let mut texture = build_texture(&[(b"abcdefgh", true)]);
    // break the frame id of the only chunk (table ends at 16)
    texture[16] = 0;
    assert!(matches!(
        decompress_vtf(&texture),
        Err(VtfError::InvalidLzmaFrame(_))
    ));
}
