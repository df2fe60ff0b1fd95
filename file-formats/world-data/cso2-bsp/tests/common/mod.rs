//! Synthetic vendor map builder shared by the integration tests

#![allow(dead_code)]

use cso2_bsp::header::{
    BSP_HEADER_SIZE, CSO2_BSP_VERSION, HEADER_LUMPS, IDBSPHEADER, LUMP_COMPRESSED,
};
use cso2_bsp::{BspHeader, LumpHeader};
use cso2_vtf::lzma;

pub fn u32s(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub struct MapBuilder {
    lumps: Vec<(usize, Vec<u8>, u32)>,
}

impl MapBuilder {
    pub fn new() -> Self {
        Self { lumps: Vec::new() }
    }

    pub fn raw(mut self, id: usize, data: Vec<u8>, version: u32) -> Self {
        self.lumps.push((id, data, version));
        self
    }

    pub fn compressed(self, id: usize, data: &[u8], version: u32) -> Self {
        let frame = lzma::compress(data).unwrap();
        self.raw(id, frame, version | LUMP_COMPRESSED)
    }

    pub fn build(self) -> Vec<u8> {
        let mut header = BspHeader {
            ident: IDBSPHEADER,
            version: CSO2_BSP_VERSION,
            lumps: [LumpHeader::default(); HEADER_LUMPS],
            map_revision: 1234,
        };
        let mut body = Vec::new();
        for (id, data, version) in self.lumps {
            header.lumps[id] = LumpHeader {
                file_offset: (BSP_HEADER_SIZE + body.len()) as u32,
                file_length: data.len() as u32,
                version,
                uncompressed_size: 0,
            };
            body.extend(data);
        }
        let mut out = header.to_bytes().unwrap();
        out.extend(body);
        out
    }
}

pub fn lump_bytes<'a>(map: &'a [u8], header: &BspHeader, id: usize) -> &'a [u8] {
    let lump = header.lumps[id];
    &map[lump.file_offset as usize..][..lump.file_length as usize]
}
