//! Fixed-size record narrowing
//!
//! Each function reads the vendor's widened record layout and writes the
//! standard layout. Offsets follow natural alignment with 32-bit `long`.
//!
//! | Lump | Vendor size | Standard size |
//! |------|-------------|---------------|
//! | faces | 72 | 56 |
//! | nodes | 48 | 32 |
//! | leafs v0 | 80 | 56 |
//! | leafs v1 | 56 | 32 |
//! | edges | 8 | 4 |
//! | index lists | 4 | 2 |
//! | brush sides | 12 | 8 |
//! | area portals | 20 | 12 |
//! | leaf water data | 12 | 12 |
//! | primitives | 20 | 10 |
//! | cubemaps | 164 | 16 |
//! | overlays | 356 | 352 |
//! | water overlays | 1124 | 1120 |

use crate::fix::FixContext;
use crate::header::lump_name;
use crate::narrow::{FieldRef, to_i16, to_u8, to_u16};
use crate::{BspError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Seek, SeekFrom};

type Reader<'a> = Cursor<&'a [u8]>;

const OVERLAY_FACE_COUNT: usize = 64;
const WATER_OVERLAY_FACE_COUNT: usize = 256;

/// Floats after the face list of an overlay: U, V, four UV points, origin, normal
const OVERLAY_TRAILING_FLOATS: usize = 2 + 2 + 4 * 3 + 3 + 3;

fn skip(r: &mut Reader<'_>, n: i64) -> Result<()> {
    r.seek(SeekFrom::Current(n))?;
    Ok(())
}

fn copy_bytes(r: &mut Reader<'_>, w: &mut Vec<u8>, n: usize) -> Result<()> {
    let start = r.position() as usize;
    let bytes = r
        .get_ref()
        .get(start..start + n)
        .ok_or(BspError::Truncated {
            what: "record",
            offset: start,
            needed: n,
            available: r.get_ref().len(),
        })?;
    w.extend_from_slice(bytes);
    r.set_position((start + n) as u64);
    Ok(())
}

/// Convert every whole record of a lump, padding output records to `dst_size`
fn narrow_records<F>(
    ctx: &FixContext<'_>,
    id: usize,
    src_size: usize,
    dst_size: usize,
    mut convert: F,
) -> Result<Vec<u8>>
where
    F: FnMut(&mut Reader<'_>, &mut Vec<u8>, FieldRef) -> Result<()>,
{
    let data = ctx.lump(id);
    let name = lump_name(id);

    if data.len() % src_size != 0 {
        log::warn!(
            "{}: size {} is not a multiple of {}, ignoring {} trailing bytes",
            name,
            data.len(),
            src_size,
            data.len() % src_size
        );
    }

    let count = data.len() / src_size;
    let mut out = Vec::with_capacity(count * dst_size);

    for (index, record) in data.chunks_exact(src_size).enumerate() {
        let start = out.len();
        convert(&mut Cursor::new(record), &mut out, FieldRef::new(name, index))?;
        out.resize(start + dst_size, 0);
    }

    log::debug!(
        "{}: {} records, {} -> {} bytes",
        name,
        count,
        data.len(),
        out.len()
    );
    Ok(out)
}

/// Faces, original faces and HDR faces
pub(crate) fn fix_faces(ctx: &FixContext<'_>, id: usize) -> Result<Vec<u8>> {
    narrow_records(ctx, id, 72, 56, |r, w, at| {
        let planenum = r.read_u32::<LittleEndian>()?;
        let side = r.read_u8()?;
        let on_node = r.read_u8()?;
        skip(r, 2)?;
        let first_edge = r.read_i32::<LittleEndian>()?;
        let num_edges = r.read_i32::<LittleEndian>()?;
        let texinfo = r.read_i32::<LittleEndian>()?;
        let dispinfo = r.read_i32::<LittleEndian>()?;
        let fog_volume = r.read_i32::<LittleEndian>()?;

        w.write_u16::<LittleEndian>(to_u16(planenum, at.field("planenum")))?;
        w.write_u8(side)?;
        w.write_u8(on_node)?;
        w.write_i32::<LittleEndian>(first_edge)?;
        w.write_i16::<LittleEndian>(to_i16(num_edges, at.field("numedges")))?;
        w.write_i16::<LittleEndian>(to_i16(texinfo, at.field("texinfo")))?;
        w.write_i16::<LittleEndian>(to_i16(dispinfo, at.field("dispinfo")))?;
        w.write_i16::<LittleEndian>(to_i16(fog_volume, at.field("surfaceFogVolumeID")))?;

        // styles, lightofs, area, lightmap mins and sizes, origFace
        copy_bytes(r, w, 4 + 4 + 4 + 16 + 4)?;

        let num_prims = r.read_u32::<LittleEndian>()?;
        let first_prim = r.read_u32::<LittleEndian>()?;
        let smoothing_groups = r.read_u32::<LittleEndian>()?;

        w.write_u16::<LittleEndian>(to_u16(num_prims, at.field("m_NumPrims")))?;
        w.write_u16::<LittleEndian>(to_u16(first_prim, at.field("firstPrimID")))?;
        w.write_u32::<LittleEndian>(smoothing_groups)?;
        Ok(())
    })
}

pub(crate) fn fix_nodes(ctx: &FixContext<'_>, id: usize) -> Result<Vec<u8>> {
    narrow_records(ctx, id, 48, 32, |r, w, at| {
        // planenum and both children keep their width
        copy_bytes(r, w, 12)?;

        for field in ["mins", "mins", "mins", "maxs", "maxs", "maxs"] {
            let v = r.read_i32::<LittleEndian>()?;
            w.write_i16::<LittleEndian>(to_i16(v, at.field(field)))?;
        }

        let first_face = r.read_u32::<LittleEndian>()?;
        let num_faces = r.read_u32::<LittleEndian>()?;
        let area = r.read_i32::<LittleEndian>()?;

        w.write_u16::<LittleEndian>(to_u16(first_face, at.field("firstface")))?;
        w.write_u16::<LittleEndian>(to_u16(num_faces, at.field("numfaces")))?;
        w.write_i16::<LittleEndian>(to_i16(area, at.field("area")))?;
        Ok(())
    })
}

/// Leafs, laid out by the lump version
///
/// Version 0 embeds a 24 byte ambient light cube in every leaf, version 1
/// moved it to separate lumps.
pub(crate) fn fix_leafs(ctx: &FixContext<'_>, id: usize) -> Result<Vec<u8>> {
    if ctx.lump(id).is_empty() {
        return Ok(Vec::new());
    }

    let version = ctx.version(id);
    log::debug!("leaf lump version {}", version);

    let (src_size, dst_size, has_ambient) = match version {
        0 => (80, 56, true),
        1 => (56, 32, false),
        other => return Err(BspError::UnsupportedLeafVersion(other)),
    };

    narrow_records(ctx, id, src_size, dst_size, |r, w, at| {
        let contents = r.read_i32::<LittleEndian>()?;
        let cluster = r.read_i32::<LittleEndian>()?;
        let area_flags = r.read_u16::<LittleEndian>()?;
        skip(r, 2)?;

        w.write_i32::<LittleEndian>(contents)?;
        w.write_i16::<LittleEndian>(to_i16(cluster, at.field("cluster")))?;
        w.write_u16::<LittleEndian>(area_flags)?;

        for field in ["mins", "mins", "mins", "maxs", "maxs", "maxs"] {
            let v = r.read_i32::<LittleEndian>()?;
            w.write_i16::<LittleEndian>(to_i16(v, at.field(field)))?;
        }

        for field in [
            "firstleafface",
            "numleaffaces",
            "firstleafbrush",
            "numleafbrushes",
        ] {
            let v = r.read_u32::<LittleEndian>()?;
            w.write_u16::<LittleEndian>(to_u16(v, at.field(field)))?;
        }

        let water_id = r.read_i32::<LittleEndian>()?;
        w.write_i16::<LittleEndian>(to_i16(water_id, at.field("leafWaterDataID")))?;

        if has_ambient {
            copy_bytes(r, w, 24)?;
        }
        Ok(())
    })
}

pub(crate) fn fix_edges(ctx: &FixContext<'_>, id: usize) -> Result<Vec<u8>> {
    narrow_records(ctx, id, 8, 4, |r, w, at| {
        for _ in 0..2 {
            let v = r.read_u32::<LittleEndian>()?;
            w.write_u16::<LittleEndian>(to_u16(v, at.field("v")))?;
        }
        Ok(())
    })
}

/// Plain `u32` to `u16` lists: leaf faces, leaf brushes, primitive indices
/// and leaf minimum distances to water
pub(crate) fn fix_index_list(ctx: &FixContext<'_>, id: usize) -> Result<Vec<u8>> {
    narrow_records(ctx, id, 4, 2, |r, w, at| {
        let v = r.read_u32::<LittleEndian>()?;
        w.write_u16::<LittleEndian>(to_u16(v, at.field("index")))?;
        Ok(())
    })
}

pub(crate) fn fix_brush_sides(ctx: &FixContext<'_>, id: usize) -> Result<Vec<u8>> {
    narrow_records(ctx, id, 12, 8, |r, w, at| {
        let planenum = r.read_u32::<LittleEndian>()?;
        let texinfo = r.read_i32::<LittleEndian>()?;

        w.write_u16::<LittleEndian>(to_u16(planenum, at.field("planenum")))?;
        w.write_i16::<LittleEndian>(to_i16(texinfo, at.field("texinfo")))?;
        // dispinfo and bevel are already 16 bits wide
        copy_bytes(r, w, 4)
    })
}

pub(crate) fn fix_area_portals(ctx: &FixContext<'_>, id: usize) -> Result<Vec<u8>> {
    narrow_records(ctx, id, 20, 12, |r, w, at| {
        for field in [
            "m_PortalKey",
            "otherarea",
            "m_FirstClipPortalVert",
            "m_nClipPortalVerts",
        ] {
            let v = r.read_u32::<LittleEndian>()?;
            w.write_u16::<LittleEndian>(to_u16(v, at.field(field)))?;
        }
        copy_bytes(r, w, 4)
    })
}

pub(crate) fn fix_leaf_water_data(ctx: &FixContext<'_>, id: usize) -> Result<Vec<u8>> {
    narrow_records(ctx, id, 12, 12, |r, w, at| {
        // surfaceZ, minZ
        copy_bytes(r, w, 8)?;
        let texinfo = r.read_i32::<LittleEndian>()?;
        w.write_i16::<LittleEndian>(to_i16(texinfo, at.field("surfaceTexInfoID")))?;
        Ok(())
    })
}

pub(crate) fn fix_primitives(ctx: &FixContext<'_>, id: usize) -> Result<Vec<u8>> {
    narrow_records(ctx, id, 20, 10, |r, w, at| {
        let kind = r.read_u32::<LittleEndian>()?;
        w.write_u8(to_u8(kind, at.field("type")))?;
        w.write_u8(0)?;

        for field in ["firstIndex", "indexCount", "firstVert", "vertCount"] {
            let v = r.read_u32::<LittleEndian>()?;
            w.write_u16::<LittleEndian>(to_u16(v, at.field(field)))?;
        }
        Ok(())
    })
}

pub(crate) fn fix_cubemaps(ctx: &FixContext<'_>, id: usize) -> Result<Vec<u8>> {
    narrow_records(ctx, id, 164, 16, |r, w, _| {
        // origin and size, the vendor padding is dropped
        copy_bytes(r, w, 13)
    })
}

fn fix_overlay_record(
    r: &mut Reader<'_>,
    w: &mut Vec<u8>,
    at: FieldRef,
    face_count: usize,
) -> Result<()> {
    let id = r.read_i32::<LittleEndian>()?;
    let texinfo = r.read_i32::<LittleEndian>()?;
    let face_count_and_order = r.read_u32::<LittleEndian>()?;

    w.write_i32::<LittleEndian>(id)?;
    w.write_i16::<LittleEndian>(to_i16(texinfo, at.field("nTexInfo")))?;
    w.write_u16::<LittleEndian>(to_u16(
        face_count_and_order,
        at.field("m_nFaceCountAndRenderOrder"),
    ))?;

    copy_bytes(r, w, face_count * 4 + OVERLAY_TRAILING_FLOATS * 4)
}

pub(crate) fn fix_overlays(ctx: &FixContext<'_>, id: usize) -> Result<Vec<u8>> {
    narrow_records(ctx, id, 356, 352, |r, w, at| {
        fix_overlay_record(r, w, at, OVERLAY_FACE_COUNT)
    })
}

pub(crate) fn fix_water_overlays(ctx: &FixContext<'_>, id: usize) -> Result<Vec<u8>> {
    narrow_records(ctx, id, 1124, 1120, |r, w, at| {
        fix_overlay_record(r, w, at, WATER_OVERLAY_FACE_COUNT)
    })
}
