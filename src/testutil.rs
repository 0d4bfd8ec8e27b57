//! In-memory TrueType fonts for tests.

use std::path::{Path, PathBuf};

use crate::subset::write_sfnt;

/// A small but complete TrueType font: `.notdef`, space, every printable
/// ASCII character as a square, a composite `Å` built from `A`, and one
/// unmapped glyph.
#[derive(Debug, Clone)]
pub(crate) struct FixtureFont {
    pub family: String,
    pub full_name: String,
    pub version: String,
    pub copyright: Option<String>,
    pub name_table: bool,
    pub outlines: bool,
    pub corrupt_loca: bool,
}

impl Default for FixtureFont {
    fn default() -> Self {
        FixtureFont {
            family: "Fixture Sans".to_string(),
            full_name: "Fixture Sans Regular".to_string(),
            version: "Version 1.000".to_string(),
            copyright: Some("Copyright (c) Fixture Foundry".to_string()),
            name_table: true,
            outlines: true,
            corrupt_loca: false,
        }
    }
}

impl FixtureFont {
    pub const NUM_GLYPHS: u16 = 98;
    pub const COMPOSITE_GID: u16 = 96;
    pub const SPACE_ADVANCE: u16 = 250;
    pub const GLYPH_ADVANCE: u16 = 600;

    /// Glyph id for a printable ASCII character (or `Å`).
    pub fn gid_for(c: char) -> u16 {
        match c {
            '\u{c5}' => Self::COMPOSITE_GID,
            ' '..='~' => c as u16 - 0x1f,
            _ => 0,
        }
    }

    pub fn named(family: &str, full_name: &str) -> Self {
        FixtureFont {
            family: family.to_string(),
            full_name: full_name.to_string(),
            ..FixtureFont::default()
        }
    }

    pub fn write_to(&self, dir: &Path, file: &str) -> PathBuf {
        let path = dir.join(file);
        std::fs::write(&path, self.build()).unwrap();
        path
    }

    pub fn build(&self) -> Vec<u8> {
        let mut tables: Vec<([u8; 4], Vec<u8>)> = vec![
            (*b"head", head()),
            (*b"hhea", hhea()),
            (*b"maxp", maxp()),
            (*b"hmtx", hmtx()),
            (*b"cmap", cmap()),
            (*b"post", post()),
            (*b"DSIG", vec![0; 1024]),
        ];
        if self.outlines {
            let (glyf, mut loca) = glyf_and_loca();
            if self.corrupt_loca {
                let end = loca.len() - 4;
                loca[end..].copy_from_slice(&(glyf.len() as u32 + 400).to_be_bytes());
            }
            tables.push((*b"glyf", glyf));
            tables.push((*b"loca", loca));
        }
        if self.name_table {
            let mut records = vec![
                (1u16, self.family.as_str()),
                (2, "Regular"),
                (4, self.full_name.as_str()),
                (5, self.version.as_str()),
                (6, "FixtureSans-Regular"),
            ];
            if let Some(copyright) = &self.copyright {
                records.insert(0, (0, copyright.as_str()));
            }
            tables.push((*b"name", name(&records)));
        }
        write_sfnt(0x0001_0000, tables)
    }
}

fn push_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn push_i16(out: &mut Vec<u8>, v: i16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn head() -> Vec<u8> {
    let mut t = Vec::new();
    push_u32(&mut t, 0x0001_0000);
    push_u32(&mut t, 0x0001_0000);
    push_u32(&mut t, 0);
    push_u32(&mut t, 0x5F0F_3CF5);
    push_u16(&mut t, 0x000B);
    push_u16(&mut t, 1000);
    t.extend_from_slice(&[0; 16]);
    for v in [0i16, -200, 600, 800] {
        push_i16(&mut t, v);
    }
    push_u16(&mut t, 0);
    push_u16(&mut t, 8);
    push_i16(&mut t, 2);
    push_i16(&mut t, 1);
    push_i16(&mut t, 0);
    assert_eq!(t.len(), 54);
    t
}

fn hhea() -> Vec<u8> {
    let mut t = Vec::new();
    push_u32(&mut t, 0x0001_0000);
    push_i16(&mut t, 800);
    push_i16(&mut t, -200);
    push_i16(&mut t, 0);
    push_u16(&mut t, FixtureFont::GLYPH_ADVANCE);
    for v in [0i16, 0, 500, 1, 0, 0, 0, 0, 0, 0, 0] {
        push_i16(&mut t, v);
    }
    push_u16(&mut t, FixtureFont::NUM_GLYPHS);
    assert_eq!(t.len(), 36);
    t
}

fn maxp() -> Vec<u8> {
    let mut t = Vec::new();
    push_u32(&mut t, 0x0001_0000);
    push_u16(&mut t, FixtureFont::NUM_GLYPHS);
    for v in [4u16, 1, 4, 1, 2, 0, 0, 0, 0, 0, 0, 1, 1] {
        push_u16(&mut t, v);
    }
    t
}

fn hmtx() -> Vec<u8> {
    let mut t = Vec::new();
    for gid in 0..FixtureFont::NUM_GLYPHS {
        let advance = if gid == FixtureFont::gid_for(' ') {
            FixtureFont::SPACE_ADVANCE
        } else {
            FixtureFont::GLYPH_ADVANCE
        };
        push_u16(&mut t, advance);
        push_i16(&mut t, 0);
    }
    t
}

fn cmap() -> Vec<u8> {
    let segments: [(u16, u16, i16); 3] = [
        (0x20, 0x7E, 1 - 0x20),
        (0xC5, 0xC5, FixtureFont::COMPOSITE_GID as i16 - 0xC5),
        (0xFFFF, 0xFFFF, 1),
    ];
    let seg_count = segments.len() as u16;

    let mut sub = Vec::new();
    push_u16(&mut sub, 4);
    push_u16(&mut sub, 16 + 8 * seg_count);
    push_u16(&mut sub, 0);
    push_u16(&mut sub, seg_count * 2);
    push_u16(&mut sub, 4);
    push_u16(&mut sub, 1);
    push_u16(&mut sub, seg_count * 2 - 4);
    for (_, end, _) in segments {
        push_u16(&mut sub, end);
    }
    push_u16(&mut sub, 0);
    for (start, _, _) in segments {
        push_u16(&mut sub, start);
    }
    for (_, _, delta) in segments {
        push_i16(&mut sub, delta);
    }
    for _ in segments {
        push_u16(&mut sub, 0);
    }

    let mut t = Vec::new();
    push_u16(&mut t, 0);
    push_u16(&mut t, 1);
    push_u16(&mut t, 3);
    push_u16(&mut t, 1);
    push_u32(&mut t, 12);
    t.extend_from_slice(&sub);
    t
}

fn post() -> Vec<u8> {
    let mut t = Vec::new();
    push_u32(&mut t, 0x0003_0000);
    push_u32(&mut t, 0);
    push_i16(&mut t, -100);
    push_i16(&mut t, 50);
    t.extend_from_slice(&[0; 20]);
    t
}

fn square() -> Vec<u8> {
    let mut g = Vec::new();
    push_i16(&mut g, 1);
    for v in [0i16, 0, 400, 600] {
        push_i16(&mut g, v);
    }
    push_u16(&mut g, 3);
    push_u16(&mut g, 0);
    g.extend_from_slice(&[0x01; 4]);
    for dx in [0i16, 400, 0, -400] {
        push_i16(&mut g, dx);
    }
    for dy in [0i16, 0, 600, 0] {
        push_i16(&mut g, dy);
    }
    g
}

fn composite(component: u16) -> Vec<u8> {
    let mut g = Vec::new();
    push_i16(&mut g, -1);
    for v in [0i16, 0, 400, 800] {
        push_i16(&mut g, v);
    }
    push_u16(&mut g, 0x0003);
    push_u16(&mut g, component);
    push_i16(&mut g, 0);
    push_i16(&mut g, 0);
    g
}

fn glyf_and_loca() -> (Vec<u8>, Vec<u8>) {
    let mut glyf = Vec::new();
    let mut loca = Vec::new();
    for gid in 0..FixtureFont::NUM_GLYPHS {
        push_u32(&mut loca, glyf.len() as u32);
        let outline = if gid == FixtureFont::gid_for(' ') {
            Vec::new()
        } else if gid == FixtureFont::COMPOSITE_GID {
            composite(FixtureFont::gid_for('A'))
        } else {
            square()
        };
        glyf.extend_from_slice(&outline);
        while glyf.len() % 4 != 0 {
            glyf.push(0);
        }
    }
    push_u32(&mut loca, glyf.len() as u32);
    (glyf, loca)
}

fn name(records: &[(u16, &str)]) -> Vec<u8> {
    let mut strings = Vec::new();
    let mut t = Vec::new();
    push_u16(&mut t, 0);
    push_u16(&mut t, records.len() as u16);
    push_u16(&mut t, 6 + 12 * records.len() as u16);
    for (name_id, value) in records {
        let encoded: Vec<u8> = value.encode_utf16().flat_map(|u| u.to_be_bytes()).collect();
        push_u16(&mut t, 3);
        push_u16(&mut t, 1);
        push_u16(&mut t, 0x0409);
        push_u16(&mut t, *name_id);
        push_u16(&mut t, encoded.len() as u16);
        push_u16(&mut t, strings.len() as u16);
        strings.extend_from_slice(&encoded);
    }
    t.extend_from_slice(&strings);
    t
}
