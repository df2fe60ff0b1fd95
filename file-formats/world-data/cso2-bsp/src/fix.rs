//! Lump fix dispatch
//!
//! Every lump id maps to one transform. Transforms run in ascending id order
//! so the game lump can compute its own new file offset from the sizes of the
//! lumps already produced before it.

use crate::header::{BSP_HEADER_SIZE, HEADER_LUMPS, LumpHeader, lump};
use crate::{Result, game_lump, pakfile, records};

/// Decompressed lumps and the directory describing them
#[derive(Debug, Clone)]
pub(crate) struct SourceLumps {
    /// Directory with offsets into the decompressed layout and the
    /// compression bit cleared
    pub(crate) headers: [LumpHeader; HEADER_LUMPS],
    /// One decoded buffer per lump slot
    pub(crate) data: Vec<Vec<u8>>,
}

/// Read-only view handed to each transform
#[derive(Debug)]
pub(crate) struct FixContext<'a> {
    source: &'a SourceLumps,
    fixed: &'a [Vec<u8>],
}

impl<'a> FixContext<'a> {
    pub(crate) fn new(source: &'a SourceLumps, fixed: &'a [Vec<u8>]) -> Self {
        Self { source, fixed }
    }

    /// Decoded source data of a lump
    pub(crate) fn lump(&self, id: usize) -> &'a [u8] {
        self.source.data.get(id).map_or(&[], Vec::as_slice)
    }

    /// Format version of a source lump
    pub(crate) fn version(&self, id: usize) -> u32 {
        self.source.headers[id].format_version()
    }

    /// Offset of a lump in the decompressed source layout
    pub(crate) fn source_offset(&self, id: usize) -> u32 {
        self.source.headers[id].file_offset
    }

    /// Offset the lump will have in the output file
    ///
    /// Only valid for the lump currently being fixed, as later lumps have not
    /// been sized yet.
    pub(crate) fn new_offset(&self, id: usize) -> usize {
        BSP_HEADER_SIZE + self.fixed.iter().take(id).map(Vec::len).sum::<usize>()
    }
}

/// Signature shared by every lump transform
pub(crate) type LumpFixFn = fn(&FixContext<'_>, usize) -> Result<Vec<u8>>;

/// Copy a lump unchanged
pub(crate) fn copy_lump(ctx: &FixContext<'_>, id: usize) -> Result<Vec<u8>> {
    Ok(ctx.lump(id).to_vec())
}

const fn build_fix_table() -> [LumpFixFn; HEADER_LUMPS] {
    let mut table = [copy_lump as LumpFixFn; HEADER_LUMPS];
    table[lump::NODES] = records::fix_nodes;
    table[lump::FACES] = records::fix_faces;
    table[lump::LEAFS] = records::fix_leafs;
    table[lump::EDGES] = records::fix_edges;
    table[lump::LEAFFACES] = records::fix_index_list;
    table[lump::LEAFBRUSHES] = records::fix_index_list;
    table[lump::BRUSHSIDES] = records::fix_brush_sides;
    table[lump::AREAPORTALS] = records::fix_area_portals;
    table[lump::ORIGINALFACES] = records::fix_faces;
    table[lump::GAME_LUMP] = game_lump::fix_game_lump;
    table[lump::LEAFWATERDATA] = records::fix_leaf_water_data;
    table[lump::PRIMITIVES] = records::fix_primitives;
    table[lump::PRIMINDICES] = records::fix_index_list;
    table[lump::PAKFILE] = pakfile::fix_pakfile;
    table[lump::CUBEMAPS] = records::fix_cubemaps;
    table[lump::OVERLAYS] = records::fix_overlays;
    table[lump::LEAFMINDISTTOWATER] = records::fix_index_list;
    table[lump::WATEROVERLAYS] = records::fix_water_overlays;
    table[lump::FACES_HDR] = records::fix_faces;
    table
}

/// Transform for each lump id
pub(crate) static FIX_TABLE: [LumpFixFn; HEADER_LUMPS] = build_fix_table();

/// Run every transform in ascending lump order
pub(crate) fn fix_all(source: &SourceLumps) -> Result<Vec<Vec<u8>>> {
    let mut fixed: Vec<Vec<u8>> = Vec::with_capacity(HEADER_LUMPS);
    for (id, fix) in FIX_TABLE.iter().enumerate() {
        let ctx = FixContext::new(source, &fixed);
        let out = fix(&ctx, id)?;
        fixed.push(out);
    }
    Ok(fixed)
}
