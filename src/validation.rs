//! Registration and pre-flight embedding checks for single fonts.

use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::Path;

use lopdf::{Document, Object, Stream, dictionary};
use tracing::{debug, warn};

use crate::diagnostics;
use crate::embed::{EmbedOutcome, EmbeddedFont, EmbeddingPolicy, prepare_with_policy};
use crate::error::FontError;
use crate::layout::{PageCanvas, PageFont, PagePoint, SPECIMEN_RESOURCE};
use crate::metadata::FontFormat;
use crate::utils::pdf_text_string;

const TEST_TEXT: &str = "Test text";

/// Result of a successful validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Ok,
    /// Subsetting failed with the given error, but the full font embeds.
    SubsettingIssue(String),
}

/// Check that `path` is a readable font file of at least `min_size` bytes and
/// hand out a unique family id for it.
pub fn register_font(path: &Path, min_size: u64) -> Result<String, FontError> {
    let metadata = fs::metadata(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound | ErrorKind::PermissionDenied => FontError::Inaccessible,
        _ => FontError::Io(e),
    })?;
    if !metadata.is_file() {
        return Err(FontError::Inaccessible);
    }
    File::open(path).map_err(|_| FontError::Inaccessible)?;
    if metadata.len() < min_size {
        return Err(FontError::TooSmall(metadata.len()));
    }
    Ok(format!("font_{:08x}", rand::random::<u32>()))
}

/// Embed the font into a throwaway one-line document following `policy`.
///
/// A font that only embeds without subsetting is accepted and reported as
/// [`Validation::SubsettingIssue`].
pub fn validate_font(
    path: &Path,
    family: &str,
    policy: &EmbeddingPolicy,
) -> Result<Validation, FontError> {
    let data = fs::read(path)?;
    let file = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let format = FontFormat::of_face(&ttf_parser::Face::parse(&data, 0)?);
    let (font, outcome) =
        prepare_with_policy(&data, &file, format, &[TEST_TEXT], policy, "VALIDATION")?;
    drop(data);

    let rendered = render_test_document(&font, family)?;
    debug!(file, family, bytes = rendered.len(), "validation document rendered");

    Ok(match outcome {
        EmbedOutcome::FullAfterRetry(reason) => Validation::SubsettingIssue(reason),
        EmbedOutcome::Subset | EmbedOutcome::Full => Validation::Ok,
    })
}

fn render_test_document(font: &EmbeddedFont, family: &str) -> Result<Vec<u8>, FontError> {
    let mut doc = Document::with_version("1.7");
    let font_id = font.write_objects(&mut doc);

    let mut canvas = PageCanvas::new();
    canvas.text(
        PageFont::Specimen(font),
        12.0,
        PagePoint::new(72.0, 720.0),
        TEST_TEXT,
    );
    let page = canvas.finish()?;

    let pages_id = doc.new_object_id();
    let content_id = doc.add_object(Stream::new(dictionary! {}, page.content));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(612),
            Object::Integer(792),
        ],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "Font" => dictionary! { SPECIMEN_RESOURCE => font_id },
        },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! { "Title" => pdf_text_string(family) });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| FontError::Embedding(e.to_string()))?;
    Ok(out)
}

/// Record why a font was turned away, tagged with a short issue type.
pub fn log_font_validation_issue(path: &Path, issue_type: &str, message: &str) {
    let file = path
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();
    warn!(
        category = diagnostics::VALIDATION,
        issue_type,
        "{}: {}",
        file,
        message
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SubsettingMode;
    use crate::testutil::FixtureFont;

    #[test]
    fn registers_readable_fonts_with_unique_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = FixtureFont::default().write_to(dir.path(), "ok.ttf");
        let a = register_font(&path, 1024).unwrap();
        let b = register_font(&path, 1024).unwrap();
        assert!(a.starts_with("font_"));
        assert_eq!(a.len(), "font_".len() + 8);
        assert!(a["font_".len()..].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_small_and_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let small = dir.path().join("small.ttf");
        fs::write(&small, [0u8; 100]).unwrap();
        assert!(matches!(
            register_font(&small, 1024),
            Err(FontError::TooSmall(100))
        ));
        assert!(matches!(
            register_font(&dir.path().join("gone.ttf"), 1024),
            Err(FontError::Inaccessible)
        ));
        assert!(matches!(
            register_font(dir.path(), 0),
            Err(FontError::Inaccessible)
        ));
    }

    #[test_log::test]
    fn healthy_font_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = FixtureFont::default().write_to(dir.path(), "ok.ttf");
        assert_eq!(
            validate_font(&path, "font_00000001", &EmbeddingPolicy::default()).unwrap(),
            Validation::Ok
        );
    }

    #[test_log::test]
    fn subsetting_failure_is_accepted_as_issue() {
        let dir = tempfile::tempdir().unwrap();
        let path = FixtureFont {
            corrupt_loca: true,
            ..FixtureFont::default()
        }
        .write_to(dir.path(), "broken.ttf");
        let result = validate_font(&path, "font_00000002", &EmbeddingPolicy::default()).unwrap();
        assert!(matches!(result, Validation::SubsettingIssue(_)));
    }

    #[test_log::test]
    fn enabled_mode_rejects_unsubsettable_font() {
        let dir = tempfile::tempdir().unwrap();
        let path = FixtureFont {
            corrupt_loca: true,
            ..FixtureFont::default()
        }
        .write_to(dir.path(), "broken.ttf");
        let policy = EmbeddingPolicy {
            mode: SubsettingMode::Enabled,
            retry_without_subsetting: true,
        };
        assert!(matches!(
            validate_font(&path, "font_00000003", &policy),
            Err(FontError::Subset(_))
        ));
    }

    #[test_log::test]
    fn font_without_outlines_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = FixtureFont {
            outlines: false,
            ..FixtureFont::default()
        }
        .write_to(dir.path(), "bitmap.ttf");
        let err = validate_font(&path, "font_00000004", &EmbeddingPolicy::default()).unwrap_err();
        assert_eq!(err.issue_type(), "subsetting_retry_failed");

        let disabled = EmbeddingPolicy {
            mode: SubsettingMode::Disabled,
            retry_without_subsetting: true,
        };
        let err = validate_font(&path, "font_00000004", &disabled).unwrap_err();
        assert_eq!(err.issue_type(), "validation_failed");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = validate_font(
            &dir.path().join("gone.ttf"),
            "font_00000005",
            &EmbeddingPolicy::default(),
        )
        .unwrap_err();
        assert!(!err.is_font_related());
    }
}
