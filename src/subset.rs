//! Glyph-id preserving TrueType subsetting.
//!
//! Unused outlines are emptied rather than removed, so glyph ids in the
//! subset match the original font and the PDF can keep `/CIDToGIDMap
//! /Identity`.

use std::collections::BTreeSet;

use ttf_parser::{RawFace, Tag};

use crate::error::SubsetError;

/// Tables a PDF TrueType font program needs. Everything else is dropped.
const KEPT_TABLES: [&[u8; 4]; 13] = [
    b"OS/2", b"cmap", b"cvt ", b"fpgm", b"glyf", b"head", b"hhea", b"hmtx", b"loca", b"maxp",
    b"name", b"post", b"prep",
];

const SFNT_TRUETYPE: u32 = 0x0001_0000;
const SFNT_APPLE_TRUE: u32 = 0x7472_7565; // 'true'
const SFNT_CFF: u32 = 0x4F54_544F; // 'OTTO'

const HEAD_CHECKSUM_ADJUSTMENT: usize = 8;
const HEAD_INDEX_TO_LOC_FORMAT: usize = 50;
const CHECKSUM_MAGIC: u32 = 0xB1B0_AFBA;

// composite glyph flags
const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
const WE_HAVE_A_SCALE: u16 = 0x0008;
const MORE_COMPONENTS: u16 = 0x0020;
const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 0x0040;
const WE_HAVE_A_TWO_BY_TWO: u16 = 0x0080;

fn read_u16(data: &[u8], pos: usize) -> Option<u16> {
    data.get(pos..pos + 2).map(|b| u16::from_be_bytes([b[0], b[1]]))
}

fn read_u32(data: &[u8], pos: usize) -> Option<u32> {
    data.get(pos..pos + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn table<'a>(raw: &RawFace<'a>, tag: &[u8; 4]) -> Option<&'a [u8]> {
    raw.table(Tag::from_bytes(tag))
}

fn parse_loca(
    loca: &[u8],
    num_glyphs: usize,
    long_format: bool,
    glyf_len: usize,
) -> Result<Vec<usize>, SubsetError> {
    let mut offsets = Vec::with_capacity(num_glyphs + 1);
    for i in 0..=num_glyphs {
        let offset = if long_format {
            read_u32(loca, i * 4).map(|v| v as usize)
        } else {
            read_u16(loca, i * 2).map(|v| v as usize * 2)
        }
        .ok_or(SubsetError::Malformed("loca table too short"))?;
        if let Some(&prev) = offsets.last() {
            if offset < prev {
                return Err(SubsetError::Malformed("loca offsets not ascending"));
            }
        }
        if offset > glyf_len {
            return Err(SubsetError::Malformed("loca offset past end of glyf"));
        }
        offsets.push(offset);
    }
    Ok(offsets)
}

/// Component glyph ids referenced by a composite glyph; empty for simple glyphs.
fn composite_components(glyph: &[u8]) -> Result<Vec<u16>, SubsetError> {
    let Some(contours) = read_u16(glyph, 0) else {
        return Ok(Vec::new());
    };
    if (contours as i16) >= 0 {
        return Ok(Vec::new());
    }

    let malformed = SubsetError::Malformed("composite glyph");
    let mut components = Vec::new();
    let mut pos = 10;
    loop {
        let flags = read_u16(glyph, pos).ok_or(malformed.clone())?;
        let gid = read_u16(glyph, pos + 2).ok_or(malformed.clone())?;
        components.push(gid);
        pos += 4;
        pos += if flags & ARG_1_AND_2_ARE_WORDS != 0 { 4 } else { 2 };
        if flags & WE_HAVE_A_SCALE != 0 {
            pos += 2;
        } else if flags & WE_HAVE_AN_X_AND_Y_SCALE != 0 {
            pos += 4;
        } else if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
            pos += 8;
        }
        if pos > glyph.len() {
            return Err(malformed);
        }
        if flags & MORE_COMPONENTS == 0 {
            break;
        }
    }
    Ok(components)
}

/// Subset a TrueType font down to `used` glyphs (plus `.notdef` and any
/// composite components), keeping glyph ids stable.
pub(crate) fn subset_truetype(data: &[u8], used: &BTreeSet<u16>) -> Result<Vec<u8>, SubsetError> {
    let raw = RawFace::parse(data, 0).map_err(|_| SubsetError::Malformed("table directory"))?;
    match read_u32(data, 0) {
        Some(SFNT_TRUETYPE | SFNT_APPLE_TRUE) => {}
        Some(SFNT_CFF) => return Err(SubsetError::Unsupported),
        _ => return Err(SubsetError::Malformed("unknown sfnt version")),
    }

    let glyf = table(&raw, b"glyf").ok_or_else(|| {
        if table(&raw, b"CFF ").is_some() {
            SubsetError::Unsupported
        } else {
            SubsetError::MissingTable("glyf")
        }
    })?;
    let loca = table(&raw, b"loca").ok_or(SubsetError::MissingTable("loca"))?;
    let head = table(&raw, b"head").ok_or(SubsetError::MissingTable("head"))?;
    let maxp = table(&raw, b"maxp").ok_or(SubsetError::MissingTable("maxp"))?;

    if head.len() < 54 {
        return Err(SubsetError::Malformed("head table too short"));
    }
    let long_loca = match read_u16(head, HEAD_INDEX_TO_LOC_FORMAT) {
        Some(0) => false,
        Some(1) => true,
        _ => return Err(SubsetError::Malformed("indexToLocFormat")),
    };
    let num_glyphs = read_u16(maxp, 4).ok_or(SubsetError::Malformed("maxp table too short"))? as usize;
    let offsets = parse_loca(loca, num_glyphs, long_loca, glyf.len())?;

    let mut keep = vec![false; num_glyphs];
    let mut pending: Vec<u16> = std::iter::once(0).chain(used.iter().copied()).collect();
    while let Some(gid) = pending.pop() {
        let gid = gid as usize;
        if gid >= num_glyphs || keep[gid] {
            continue;
        }
        keep[gid] = true;
        let outline = &glyf[offsets[gid]..offsets[gid + 1]];
        for component in composite_components(outline)? {
            if component as usize >= num_glyphs {
                return Err(SubsetError::Malformed("composite component out of range"));
            }
            pending.push(component);
        }
    }

    let mut new_glyf = Vec::new();
    let mut new_loca = Vec::with_capacity((num_glyphs + 1) * 4);
    for gid in 0..num_glyphs {
        new_loca.extend_from_slice(&(new_glyf.len() as u32).to_be_bytes());
        if keep[gid] {
            new_glyf.extend_from_slice(&glyf[offsets[gid]..offsets[gid + 1]]);
            while new_glyf.len() % 4 != 0 {
                new_glyf.push(0);
            }
        }
    }
    new_loca.extend_from_slice(&(new_glyf.len() as u32).to_be_bytes());

    let mut new_head = head.to_vec();
    new_head[HEAD_INDEX_TO_LOC_FORMAT..HEAD_INDEX_TO_LOC_FORMAT + 2]
        .copy_from_slice(&1u16.to_be_bytes());

    let mut tables: Vec<([u8; 4], Vec<u8>)> = Vec::new();
    for record in raw.table_records {
        let tag = record.tag.to_bytes();
        if !KEPT_TABLES.contains(&&tag) {
            continue;
        }
        let body = match &tag {
            b"glyf" => std::mem::take(&mut new_glyf),
            b"loca" => std::mem::take(&mut new_loca),
            b"head" => std::mem::take(&mut new_head),
            _ => raw
                .table(record.tag)
                .ok_or(SubsetError::Malformed("table extends past end of file"))?
                .to_vec(),
        };
        tables.push((tag, body));
    }

    Ok(write_sfnt(SFNT_TRUETYPE, tables))
}

fn table_checksum(data: &[u8]) -> u32 {
    data.chunks(4).fold(0u32, |sum, chunk| {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        sum.wrapping_add(u32::from_be_bytes(word))
    })
}

/// Serialize tables into an sfnt file, sorting the directory and filling in
/// checksums and `head.checkSumAdjustment`.
pub(crate) fn write_sfnt(version: u32, mut tables: Vec<([u8; 4], Vec<u8>)>) -> Vec<u8> {
    tables.sort_by(|a, b| a.0.cmp(&b.0));
    for (tag, body) in tables.iter_mut() {
        if tag == b"head" && body.len() >= HEAD_CHECKSUM_ADJUSTMENT + 4 {
            body[HEAD_CHECKSUM_ADJUSTMENT..HEAD_CHECKSUM_ADJUSTMENT + 4].fill(0);
        }
    }

    let num_tables = tables.len() as u16;
    let mut pow2 = 1u16;
    let mut entry_selector = 0u16;
    while pow2 * 2 <= num_tables {
        pow2 *= 2;
        entry_selector += 1;
    }
    let search_range = pow2 * 16;
    let range_shift = num_tables * 16 - search_range;

    let mut out = Vec::new();
    out.extend_from_slice(&version.to_be_bytes());
    out.extend_from_slice(&num_tables.to_be_bytes());
    out.extend_from_slice(&search_range.to_be_bytes());
    out.extend_from_slice(&entry_selector.to_be_bytes());
    out.extend_from_slice(&range_shift.to_be_bytes());

    let mut offset = 12 + tables.len() * 16;
    let mut head_offset = None;
    for (tag, body) in &tables {
        if tag == b"head" {
            head_offset = Some(offset);
        }
        out.extend_from_slice(tag);
        out.extend_from_slice(&table_checksum(body).to_be_bytes());
        out.extend_from_slice(&(offset as u32).to_be_bytes());
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        offset += (body.len() + 3) & !3;
    }
    for (_, body) in &tables {
        out.extend_from_slice(body);
        while out.len() % 4 != 0 {
            out.push(0);
        }
    }

    if let Some(head_offset) = head_offset {
        let adjustment = CHECKSUM_MAGIC.wrapping_sub(table_checksum(&out));
        let pos = head_offset + HEAD_CHECKSUM_ADJUSTMENT;
        out[pos..pos + 4].copy_from_slice(&adjustment.to_be_bytes());
    }
    out
}
