//! Transcoding synthetic vendor maps end to end

mod common;

use common::{MapBuilder, lump_bytes, u32s};
use cso2_bsp::header::{
    BSP_HEADER_SIZE, LUMP_COMPRESSED, SOURCE_BSP_VERSION, lump,
};
use cso2_bsp::pakfile::find_end_of_central_dir;
use cso2_bsp::{BspError, BspHeader, BspTranscoder, game_lump, is_bsp_file};
use cso2_vtf::lzma;
use pretty_assertions::assert_eq;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn texture(payload: &[u8]) -> Vec<u8> {
    let mut out = b"CO2".to_vec();
    out.push(1);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(&((16u32 << 1) | 1).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend(lzma::compress(payload).unwrap());
    out
}

fn pak_with(name: &str, stored: &[u8]) -> Vec<u8> {
    let mut pak = Vec::new();
    pak.extend_from_slice(&0x0403_4B50u32.to_le_bytes());
    pak.extend_from_slice(&[0u8; 14]);
    pak.extend_from_slice(&(stored.len() as u32).to_le_bytes());
    pak.extend_from_slice(&(stored.len() as u32).to_le_bytes());
    pak.extend_from_slice(&(name.len() as u16).to_le_bytes());
    pak.extend_from_slice(&0u16.to_le_bytes());
    pak.extend_from_slice(name.as_bytes());
    pak.extend_from_slice(stored);
    pak.extend_from_slice(&0x0605_4B50u32.to_le_bytes());
    pak.extend_from_slice(&[0u8; 4]);
    pak.extend_from_slice(&1u16.to_le_bytes());
    pak.extend_from_slice(&1u16.to_le_bytes());
    pak.extend_from_slice(&[0u8; 10]);
    pak
}

#[test]
fn leaf_faces_overflow_is_truncated_not_rejected() {
    init_logging();
    let map = MapBuilder::new()
        .compressed(lump::LEAFFACES, &u32s(&[10, 70000]), 0)
        .build();

    let out = BspTranscoder::new().transcode(&map).unwrap();
    let header = BspHeader::from_bytes(&out).unwrap();
    let faces = lump_bytes(&out, &header, lump::LEAFFACES);
    assert_eq!(faces, &[10, 0, 0x70, 0x11]);
    assert_eq!(u16::from_le_bytes([faces[2], faces[3]]), 4464);
}

#[test]
fn non_vendor_maps_are_rejected_before_any_transform() {
    let mut map = MapBuilder::new().raw(lump::ENTITIES, b"{}".to_vec(), 0).build();
    map[0..4].copy_from_slice(b"IBSP");
    assert!(!is_bsp_file(&map));
    assert!(matches!(
        BspTranscoder::new().transcode(&map),
        Err(BspError::InvalidHeader { .. })
    ));
}

#[test]
fn unknown_leaf_version_is_a_typed_error() {
    init_logging();
    let map = MapBuilder::new()
        .raw(lump::LEAFS, vec![0; 56], 3)
        .build();
    let err = BspTranscoder::new().transcode(&map).unwrap_err();
    assert!(matches!(err, BspError::UnsupportedLeafVersion(3)));
    assert!(!err.is_corruption());
}

#[test]
fn full_map_layout() {
    init_logging();
    let entities = b"{\n\"classname\" \"worldspawn\"\n}\n".to_vec();

    let mut game = Vec::new();
    game.extend_from_slice(&1i32.to_le_bytes());
    game.extend_from_slice(&game_lump::GAMELUMP_STATIC_PROPS.to_le_bytes());
    game.extend_from_slice(&0u16.to_le_bytes());
    game.extend_from_slice(&7u16.to_le_bytes());
    game.extend_from_slice(&0i32.to_le_bytes());
    game.extend_from_slice(&0i32.to_le_bytes());
    // six empty sections
    game.extend(std::iter::repeat_n(0u8, 24));

    let vtf = b"VTF\0 standard texture body".to_vec();
    let pak = pak_with("materials/a.vtf", &texture(&vtf));

    let map = MapBuilder::new()
        .raw(lump::ENTITIES, entities.clone(), 0)
        .compressed(lump::EDGES, &u32s(&[1, 2]), 0)
        .compressed(lump::LEAFS, &[0u8; 56], 1)
        .raw(lump::GAME_LUMP, game, 0)
        .compressed(lump::PAKFILE, &pak, 0)
        .build();

    let out = BspTranscoder::new().transcode(&map).unwrap();
    let header = BspHeader::from_bytes(&out).unwrap();
    assert_eq!(header.version, SOURCE_BSP_VERSION);
    assert_eq!(header.map_revision, 1234);

    let mut expected_offset = BSP_HEADER_SIZE as u32;
    for lump in &header.lumps {
        assert_eq!(lump.file_offset, expected_offset);
        assert_eq!(lump.version & LUMP_COMPRESSED, 0);
        assert_eq!(lump.uncompressed_size, 0);
        expected_offset += lump.file_length;
    }
    assert_eq!(expected_offset as usize, out.len());

    assert_eq!(lump_bytes(&out, &header, lump::ENTITIES), entities.as_slice());
    assert_eq!(lump_bytes(&out, &header, lump::EDGES), &[1, 0, 2, 0]);
    assert_eq!(header.lumps[lump::LEAFS].file_length, 32);
    assert_eq!(header.lumps[lump::LEAFS].version, 1);

    let game = lump_bytes(&out, &header, lump::GAME_LUMP);
    let directory = game_lump::read_directory(game).unwrap();
    assert_eq!(directory[0].version, 6);
    assert_eq!(
        directory[0].file_offset as u32,
        header.lumps[lump::GAME_LUMP].file_offset + 20
    );

    let pak = lump_bytes(&out, &header, lump::PAKFILE);
    assert!(find_end_of_central_dir(pak).is_some());
    let name_len = u16::from_le_bytes([pak[26], pak[27]]) as usize;
    assert_eq!(&pak[30..30 + name_len], b"materials/a.vtf");
    assert_eq!(&pak[30 + name_len..][..vtf.len()], vtf.as_slice());
}

#[test]
fn copy_only_mode_keeps_decoded_lumps() {
    let leafs = vec![0xABu8; 56];
    let map = MapBuilder::new()
        .compressed(lump::LEAFS, &leafs, 1)
        .build();
    let out = BspTranscoder::new().fix_lumps(false).transcode(&map).unwrap();
    let header = BspHeader::from_bytes(&out).unwrap();
    assert_eq!(lump_bytes(&out, &header, lump::LEAFS), leafs.as_slice());
}
