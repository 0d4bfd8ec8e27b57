//! Assembly of the catalog PDF from a stream of validated fonts.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use tracing::{debug, info, warn};

use crate::config::{Config, Scenario};
use crate::embed::{
    EmbedOutcome, EmbeddedFont, EmbeddingMode, EmbeddingPolicy, prepare_with_policy,
};
use crate::error::{CatalogError, FontError};
use crate::layout::{PageContent, SPECIMEN_RESOURCE, UiFont};
use crate::logging::{
    FontStatus, PdfStage, log_font_processing, log_pdf_font_issue, log_pdf_generation,
};
use crate::memory::{MemoryMonitor, MemorySource, MemoryStats, next_batch_size};
use crate::metadata::FontInfo;
use crate::progress::{batch_bar, pdf_spinner, progress_enabled};
use crate::specimen::{render_specimen, specimen_texts};
use crate::toc::{TocEntry, layout_toc, link_annotation, render_toc, write_outline};
use crate::utils::{pdf_date, pdf_text_string};

const DOCUMENT_TITLE: &str = "Font Samples";

const FONT_KEYWORDS: [&str; 10] = [
    "font",
    "subset",
    "glyph",
    "character",
    "unicode",
    "cmap",
    "name table",
    "post table",
    "glyf table",
    "hmtx table",
];

/// What went into a finished catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogSummary {
    pub output: PathBuf,
    pub fonts_included: usize,
    /// Fonts embedded in full because subsetting them failed.
    pub full_after_retry: Vec<String>,
    /// Fonts left out, with the reason.
    pub rejected: Vec<(String, String)>,
    pub page_count: usize,
    pub toc_pages: usize,
    pub memory: MemoryStats,
}

/// Pages and objects of a catalog under construction.
struct CatalogWriter<'c> {
    config: &'c Config,
    scenario: Scenario,
    policy: EmbeddingPolicy,
    doc: Document,
    pages_id: ObjectId,
    ui_fonts: [ObjectId; 2],
    specimen_pages: Vec<ObjectId>,
    entries: Vec<TocEntry>,
}

impl<'c> CatalogWriter<'c> {
    fn new(config: &'c Config) -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let ui_fonts = UiFont::ALL.map(|font| {
            doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => font.metrics().base_font,
                "Encoding" => "WinAnsiEncoding",
            })
        });
        CatalogWriter {
            config,
            scenario: config.scenario(),
            policy: EmbeddingPolicy::from_config(config),
            doc,
            pages_id,
            ui_fonts,
            specimen_pages: Vec::new(),
            entries: Vec::new(),
        }
    }

    fn media_box(&self) -> Vec<Object> {
        vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(self.config.page_width),
            Object::Real(self.config.page_height),
        ]
    }

    fn add_page(
        &mut self,
        page: PageContent,
        specimen_font: Option<ObjectId>,
        annots: Vec<Object>,
    ) -> ObjectId {
        let mut fonts = Dictionary::new();
        for (font, id) in UiFont::ALL.iter().zip(self.ui_fonts) {
            fonts.set(font.resource(), id);
        }
        if let Some(id) = specimen_font.filter(|_| page.uses_specimen_font) {
            fonts.set(SPECIMEN_RESOURCE, id);
        }

        let mut stream = Stream::new(dictionary! {}, page.content);
        if let Err(e) = stream.compress() {
            debug!(error = %e, "content stream left uncompressed");
        }
        let content_id = self.doc.add_object(stream);

        let mut dict = dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => self.media_box(),
            "Contents" => content_id,
            "Resources" => dictionary! { "Font" => fonts },
        };
        if !annots.is_empty() {
            dict.set("Annots", annots);
        }
        self.doc.add_object(dict)
    }

    /// Embed one font and draw its specimen pages. Returns whether the font
    /// ended up embedded in full after subsetting failed.
    fn add_font(&mut self, info: &FontInfo, data: &[u8]) -> Result<bool, FontError> {
        let texts = specimen_texts(self.config, &self.scenario);
        let (font, full_after_retry) = match info.embedding {
            Some(mode) => {
                let fallback = info
                    .file
                    .rsplit_once('.')
                    .map_or(info.file.as_str(), |(stem, _)| stem);
                let font = EmbeddedFont::prepare(data, fallback, mode, &texts)?;
                (font, mode == EmbeddingMode::Full)
            }
            None => {
                let (font, outcome) = prepare_with_policy(
                    data,
                    &info.file,
                    info.format,
                    &texts,
                    &self.policy,
                    "PDF_GENERATION",
                )?;
                (font, matches!(outcome, EmbedOutcome::FullAfterRetry(_)))
            }
        };

        let pages = render_specimen(info, &font, self.config, &self.scenario)?;
        let font_id = font.write_objects(&mut self.doc);
        let first_page = self.specimen_pages.len();
        for page in pages {
            let id = self.add_page(page, Some(font_id), Vec::new());
            self.specimen_pages.push(id);
        }
        self.entries.push(TocEntry {
            title: info.display_name().to_string(),
            first_page,
        });
        debug!(
            file = %info.file,
            base_font = font.base_font(),
            mode = ?font.mode(),
            "specimen rendered"
        );
        Ok(full_after_retry)
    }

    /// Prepend the table of contents, close the page tree and write the file.
    /// Returns the total and TOC page counts.
    fn finish(mut self, output: &Path) -> Result<(usize, usize), CatalogError> {
        let layout = layout_toc(&self.entries, self.config);
        let toc = render_toc(&layout, &self.entries, self.config)?;
        let toc_pages = toc.len();

        let mut toc_ids = Vec::with_capacity(toc_pages);
        for page in toc {
            let annots: Vec<Object> = page
                .links
                .iter()
                .filter_map(|link| {
                    let target = *self.specimen_pages.get(link.target)?;
                    Some(Object::Reference(
                        self.doc.add_object(link_annotation(&link.rect, target)),
                    ))
                })
                .collect();
            toc_ids.push(self.add_page(page, None, annots));
        }

        let kids: Vec<Object> = toc_ids
            .iter()
            .chain(&self.specimen_pages)
            .map(|&id| Object::Reference(id))
            .collect();
        let page_count = kids.len();
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_count as i64,
            }),
        );

        let mut catalog = dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        };
        if let Some(outline) = write_outline(&mut self.doc, &self.entries, &self.specimen_pages) {
            catalog.set("Outlines", outline);
            catalog.set("PageMode", "UseOutlines");
        }
        let catalog_id = self.doc.add_object(catalog);
        let info_id = self.doc.add_object(dictionary! {
            "Title" => pdf_text_string(DOCUMENT_TITLE),
            "Producer" => Object::string_literal(concat!("fontsampler ", env!("CARGO_PKG_VERSION"))),
            "CreationDate" => Object::string_literal(pdf_date(&Local::now())),
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.trailer.set("Info", info_id);

        self.doc.save(output)?;
        Ok((page_count, toc_pages))
    }
}

/// Fonts named in a PDF layer error message.
///
/// Messages without a font-related keyword name no fonts. Otherwise the one
/// font whose file name appears in the message is returned, or every font
/// when none does.
pub fn extract_font_names_from_error(message: &str, fonts: &[FontInfo]) -> Vec<String> {
    let lower = message.to_lowercase();
    if !FONT_KEYWORDS.iter().any(|keyword| lower.contains(keyword)) {
        return Vec::new();
    }
    match fonts
        .iter()
        .find(|font| !font.file.is_empty() && lower.contains(&font.file.to_lowercase()))
    {
        Some(font) => vec![font.file.clone()],
        None => fonts.iter().map(|font| font.file.clone()).collect(),
    }
}

/// Write the catalog for `fonts` to `output`.
///
/// Font metadata is collected first; font programs are then loaded, embedded
/// and drawn in memory-bounded batches.
pub fn generate_pdf_incremental<I>(
    fonts: I,
    output: &Path,
    config: &Config,
    memory: &dyn MemorySource,
) -> Result<CatalogSummary, CatalogError>
where
    I: IntoIterator<Item = Result<FontInfo, CatalogError>>,
{
    let mut monitor = MemoryMonitor::new(memory);
    let show_progress = progress_enabled(config);

    let mut infos = Vec::new();
    for item in fonts {
        infos.push(item?);
        let collected = infos.len();
        if collected % config.update_interval.max(1) == 0 {
            monitor.update_peak();
        }
        if collected % config.processing_interval.max(1) == 0 {
            info!("Collected {} fonts", collected);
        }
    }

    if infos.is_empty() {
        warn!("No valid fonts to include in the catalog");
        log_pdf_generation(PdfStage::Error, "no fonts");
        return Err(CatalogError::NoFonts);
    }
    infos.sort_by_cached_key(|font| font.file.to_lowercase());
    log_pdf_generation(PdfStage::Start, &format!("{} fonts", infos.len()));

    let mut writer = CatalogWriter::new(config);
    let mut full_after_retry = Vec::new();
    let mut rejected = Vec::new();
    let progress = batch_bar(infos.len() as u64, "Rendering", show_progress);

    let mut batch_size = config.initial_batch_size();
    let mut start = 0;
    while start < infos.len() {
        let end = (start + batch_size).min(infos.len());
        let batch = &infos[start..end];

        let mut loaded = Vec::with_capacity(batch.len());
        for info in batch {
            match fs::read(&info.path) {
                Ok(data) => loaded.push((info, data)),
                Err(e) => {
                    progress.inc(1);
                    reject(info, FontError::Io(e), &mut rejected, config)?;
                }
            }
        }
        monitor.update_peak();

        for (info, data) in &loaded {
            match writer.add_font(info, data) {
                Ok(true) => full_after_retry.push(info.file.clone()),
                Ok(false) => {}
                Err(e) => {
                    log_pdf_font_issue(
                        &[info.file.as_str()],
                        e.issue_type(),
                        &e.to_string(),
                        "PDF_GENERATION",
                    );
                    reject(info, e, &mut rejected, config)?;
                }
            }
            progress.inc(1);
        }
        monitor.release_batch("pdf font batch", loaded);

        log_pdf_generation(
            PdfStage::Progress,
            &format!("{}/{} fonts rendered", end, infos.len()),
        );
        if end - start == batch_size && end < infos.len() {
            let next = next_batch_size(memory, config, batch_size);
            if next != batch_size {
                info!("Adjusting batch size: {} → {}", batch_size, next);
                batch_size = next;
            }
        }
        start = end;
    }
    progress.finish_and_clear();

    let fonts_included = writer.entries.len();
    if fonts_included == 0 {
        warn!("Every font was rejected while rendering");
        log_pdf_generation(PdfStage::Error, "no fonts survived rendering");
        return Err(CatalogError::NoFonts);
    }

    let spinner = pdf_spinner("Writing PDF", show_progress);
    let (page_count, toc_pages) = match writer.finish(output) {
        Ok(counts) => counts,
        Err(e) => {
            spinner.abandon();
            let message = e.to_string();
            let names = extract_font_names_from_error(&message, &infos);
            if !names.is_empty() {
                let names: Vec<&str> = names.iter().map(String::as_str).collect();
                log_pdf_font_issue(&names, "pdf_write_failed", &message, "SAVE");
            }
            log_pdf_generation(PdfStage::Error, &message);
            return Err(e);
        }
    };
    spinner.finish_and_clear();

    log_pdf_generation(
        PdfStage::Complete,
        &format!(
            "{} fonts, {} pages written to {}",
            fonts_included,
            page_count,
            output.display()
        ),
    );
    monitor.log_summary("pdf generation");

    Ok(CatalogSummary {
        output: output.to_path_buf(),
        fonts_included,
        full_after_retry,
        rejected,
        page_count,
        toc_pages,
        memory: monitor.stats(),
    })
}

/// Record a font dropped during rendering, or fail the run when problematic
/// fonts are not skipped.
fn reject(
    info: &FontInfo,
    error: FontError,
    rejected: &mut Vec<(String, String)>,
    config: &Config,
) -> Result<(), CatalogError> {
    log_font_processing(&info.path, FontStatus::Failed, &error.to_string());
    if !config.skip_problematic_fonts {
        return Err(CatalogError::ProblematicFont {
            file: info.file.clone(),
            reason: error.to_string(),
        });
    }
    rejected.push((info.file.clone(), error.to_string()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::testing::FixedMemory;
    use crate::metadata::extract_font_info;
    use crate::testutil::FixtureFont;

    fn config() -> Config {
        Config::builder().show_progress(false).build().unwrap()
    }

    fn font(dir: &Path, fixture: FixtureFont, file: &str) -> FontInfo {
        extract_font_info(fixture.write_to(dir, file)).unwrap()
    }

    fn title(doc: &Document) -> Vec<u8> {
        let info_id = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
        match doc.get_dictionary(info_id).unwrap().get(b"Title").unwrap() {
            Object::String(bytes, _) => bytes.clone(),
            other => panic!("unexpected title {:?}", other),
        }
    }

    #[test_log::test]
    fn writes_toc_and_one_page_per_font() {
        let dir = tempfile::tempdir().unwrap();
        let fonts = vec![
            font(dir.path(), FixtureFont::named("Beta", "Beta Regular"), "beta.ttf"),
            font(dir.path(), FixtureFont::named("Alpha", "Alpha Regular"), "Alpha.ttf"),
            font(
                dir.path(),
                FixtureFont {
                    corrupt_loca: true,
                    ..FixtureFont::named("Gamma", "Gamma Regular")
                },
                "gamma.ttf",
            ),
        ];
        let output = dir.path().join("catalog.pdf");
        let memory = FixedMemory::new(100.0, 1000.0, 1000.0);

        let summary =
            generate_pdf_incremental(fonts.into_iter().map(Ok), &output, &config(), &memory)
                .unwrap();
        assert_eq!(summary.fonts_included, 3);
        assert_eq!(summary.toc_pages, 1);
        assert_eq!(summary.page_count, 4);
        assert_eq!(summary.full_after_retry, vec!["gamma.ttf".to_string()]);
        assert!(summary.rejected.is_empty());

        let doc = Document::load(&output).unwrap();
        assert_eq!(doc.get_pages().len(), 4);
        assert_eq!(title(&doc), b"Font Samples");
        let catalog = doc.catalog().unwrap();
        assert!(catalog.has(b"Outlines"));

        let toc_page = doc.get_pages()[&1];
        let annots = doc
            .get_dictionary(toc_page)
            .unwrap()
            .get(b"Annots")
            .unwrap()
            .as_array()
            .unwrap();
        assert_eq!(annots.len(), 3);
    }

    #[test_log::test]
    fn forced_full_embedding_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut info = font(dir.path(), FixtureFont::default(), "fixture.ttf");
        info.embedding = Some(EmbeddingMode::Full);
        let output = dir.path().join("catalog.pdf");
        let memory = FixedMemory::unavailable();

        let summary =
            generate_pdf_incremental([Ok(info)], &output, &config(), &memory).unwrap();
        assert_eq!(summary.full_after_retry, vec!["fixture.ttf".to_string()]);
        assert_eq!(summary.page_count, 2);
    }

    #[test_log::test]
    fn unembeddable_font_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let fonts = vec![
            font(dir.path(), FixtureFont::default(), "good.ttf"),
            font(
                dir.path(),
                FixtureFont {
                    outlines: false,
                    ..FixtureFont::default()
                },
                "bitmap.ttf",
            ),
        ];
        let output = dir.path().join("catalog.pdf");
        let memory = FixedMemory::unavailable();

        let summary =
            generate_pdf_incremental(fonts.into_iter().map(Ok), &output, &config(), &memory)
                .unwrap();
        assert_eq!(summary.fonts_included, 1);
        assert_eq!(summary.rejected.len(), 1);
        assert_eq!(summary.rejected[0].0, "bitmap.ttf");
    }

    #[test_log::test]
    fn unembeddable_font_fails_the_run_when_not_skipping() {
        let dir = tempfile::tempdir().unwrap();
        let fonts = vec![font(
            dir.path(),
            FixtureFont {
                outlines: false,
                ..FixtureFont::default()
            },
            "bitmap.ttf",
        )];
        let config = Config::builder()
            .show_progress(false)
            .skip_problematic_fonts(false)
            .build()
            .unwrap();
        let output = dir.path().join("catalog.pdf");
        let memory = FixedMemory::unavailable();

        let result = generate_pdf_incremental(fonts.into_iter().map(Ok), &output, &config, &memory);
        assert!(matches!(result, Err(CatalogError::ProblematicFont { .. })));
        assert!(!output.exists());
    }

    #[test]
    fn empty_stream_yields_no_fonts() {
        let dir = tempfile::tempdir().unwrap();
        let memory = FixedMemory::unavailable();
        let result = generate_pdf_incremental(
            Vec::<Result<FontInfo, CatalogError>>::new(),
            &dir.path().join("catalog.pdf"),
            &config(),
            &memory,
        );
        assert!(matches!(result, Err(CatalogError::NoFonts)));
    }

    #[test]
    fn stream_errors_are_propagated() {
        let dir = tempfile::tempdir().unwrap();
        let memory = FixedMemory::unavailable();
        let result = generate_pdf_incremental(
            [Err(CatalogError::ProblematicFont {
                file: "bad.ttf".to_string(),
                reason: "broken".to_string(),
            })],
            &dir.path().join("catalog.pdf"),
            &config(),
            &memory,
        );
        assert!(matches!(result, Err(CatalogError::ProblematicFont { .. })));
    }

    #[test]
    fn font_names_from_error_messages() {
        let dir = tempfile::tempdir().unwrap();
        let fonts = vec![
            font(dir.path(), FixtureFont::default(), "one.ttf"),
            font(dir.path(), FixtureFont::default(), "two.ttf"),
        ];
        assert_eq!(
            extract_font_names_from_error("bad glyph in TWO.ttf", &fonts),
            vec!["two.ttf".to_string()]
        );
        assert_eq!(
            extract_font_names_from_error("broken cmap subtable", &fonts).len(),
            2
        );
        assert!(extract_font_names_from_error("disk full", &fonts).is_empty());
    }
}
