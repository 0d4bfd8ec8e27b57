use std::path::{Path, PathBuf};

use ttf_parser::name::name_id;
use unicode_normalization::UnicodeNormalization;

use crate::embed::EmbeddingMode;
use crate::error::FontError;

/// Outline flavour of a font program, which decides how it is embedded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontFormat {
    TrueType,
    OpenTypeCff,
    /// Bitmap-only or otherwise outline-less fonts; these fail validation.
    Other,
}

impl FontFormat {
    pub(crate) fn of_face(face: &ttf_parser::Face) -> FontFormat {
        if face.tables().glyf.is_some() {
            FontFormat::TrueType
        } else if face.tables().cff.is_some() {
            FontFormat::OpenTypeCff
        } else {
            FontFormat::Other
        }
    }
}

/// Everything the catalog needs to know about a font, without its bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct FontInfo {
    pub file: String,
    pub path: PathBuf,
    pub family: String,
    pub name: String,
    pub version: String,
    pub copyright: String,
    pub format: FontFormat,
    /// Set once the font has passed registration.
    pub registered_name: Option<String>,
    /// Forced embedding mode, set when validation found that subsetting fails.
    pub embedding: Option<EmbeddingMode>,
}

impl FontInfo {
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.file
        } else {
            &self.name
        }
    }
}

fn first_name(face: &ttf_parser::Face, id: u16) -> String {
    face.names()
        .into_iter()
        .filter(|name| name.name_id == id)
        .find_map(|name| name.to_string())
        .map(|s| s.nfc().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

/// Parse the font at `path` and pull the descriptive strings out of its
/// `name` table.
pub fn extract_font_info<P: AsRef<Path>>(path: P) -> Result<FontInfo, FontError> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    let mut info = font_info_from_bytes(&data, path)?;
    info.path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    Ok(info)
}

pub(crate) fn font_info_from_bytes(data: &[u8], path: &Path) -> Result<FontInfo, FontError> {
    let face = ttf_parser::Face::parse(data, 0)?;
    if face.tables().name.is_none() {
        return Err(FontError::MissingTable("name"));
    }

    let file = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(FontInfo {
        file,
        path: path.to_path_buf(),
        family: first_name(&face, name_id::FAMILY),
        name: first_name(&face, name_id::FULL_NAME),
        version: first_name(&face, name_id::VERSION),
        copyright: first_name(&face, name_id::COPYRIGHT_NOTICE),
        format: FontFormat::of_face(&face),
        registered_name: None,
        embedding: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FixtureFont;

    #[test]
    fn reads_name_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = FixtureFont::default().write_to(dir.path(), "Fixture.ttf");

        let info = extract_font_info(&path).unwrap();
        assert_eq!(info.file, "Fixture.ttf");
        assert!(info.path.is_absolute());
        assert_eq!(info.family, "Fixture Sans");
        assert_eq!(info.name, "Fixture Sans Regular");
        assert_eq!(info.version, "Version 1.000");
        assert_eq!(info.copyright, "Copyright (c) Fixture Foundry");
        assert_eq!(info.format, FontFormat::TrueType);
        assert_eq!(info.display_name(), "Fixture Sans Regular");
        assert!(info.registered_name.is_none());
    }

    #[test]
    fn missing_records_are_empty() {
        let font = FixtureFont {
            copyright: None,
            ..FixtureFont::named("Bare", "")
        };
        let info = font_info_from_bytes(&font.build(), Path::new("bare.ttf")).unwrap();
        assert_eq!(info.copyright, "");
        assert_eq!(info.display_name(), "bare.ttf");
    }

    #[test]
    fn normalizes_to_nfc() {
        // "Cafe" followed by a combining acute accent
        let font = FixtureFont::named("Cafe\u{301}", "Cafe\u{301} Bold");
        let info = font_info_from_bytes(&font.build(), Path::new("cafe.ttf")).unwrap();
        assert_eq!(info.family, "Caf\u{e9}");
        assert_eq!(info.name, "Caf\u{e9} Bold");
    }

    #[test]
    fn rejects_font_without_name_table() {
        let font = FixtureFont {
            name_table: false,
            ..FixtureFont::default()
        };
        assert!(matches!(
            font_info_from_bytes(&font.build(), Path::new("x.ttf")),
            Err(FontError::MissingTable("name"))
        ));
    }

    #[test]
    fn rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.otf");
        std::fs::write(&path, vec![0xAB; 2048]).unwrap();
        assert!(matches!(extract_font_info(&path), Err(FontError::Parse(_))));
    }

    #[test]
    fn outline_less_font_has_other_format() {
        let font = FixtureFont {
            outlines: false,
            ..FixtureFont::default()
        };
        let info = font_info_from_bytes(&font.build(), Path::new("bitmap.ttf")).unwrap();
        assert_eq!(info.format, FontFormat::Other);
    }
}
