use crate::config::{Config, Scenario};
use crate::embed::EmbeddedFont;
use crate::layout::{PageContent, PageFlow, PageFont, UiFont, mm};
use crate::metadata::FontInfo;

/// Every piece of text drawn with the specimen font, for glyph mapping.
pub(crate) fn specimen_texts<'a>(config: &'a Config, scenario: &'a Scenario) -> [&'a str; 3] {
    [&config.glyph_line, &scenario.main, &scenario.paragraph]
}

fn or_na(value: &str) -> &str {
    if value.is_empty() { "N/A" } else { value }
}

/// Lay out the specimen pages for one font. Long metadata or sample text
/// spills onto continuation pages.
pub(crate) fn render_specimen(
    info: &FontInfo,
    font: &EmbeddedFont,
    config: &Config,
    scenario: &Scenario,
) -> Result<Vec<PageContent>, lopdf::Error> {
    let mut flow = PageFlow::new(config);
    let regular = PageFont::Ui(UiFont::Regular);
    let bold = PageFont::Ui(UiFont::Bold);
    let specimen = PageFont::Specimen(font);

    let header = config.header_font_size;
    flow.paragraph(bold, header, header + 6.0, &info.file)?;
    flow.rule(mm(2.0))?;

    let meta = config.metadata_font_size;
    for (label, value) in [
        ("Font Name", info.name.as_str()),
        ("Family", info.family.as_str()),
        ("Version", info.version.as_str()),
        ("Copyright", info.copyright.as_str()),
    ] {
        flow.paragraph(regular, meta, meta + 2.0, &format!("{}: {}", label, or_na(value)))?;
    }
    flow.rule(mm(2.0))?;
    flow.skip(mm(6.0));

    flow.paragraph(specimen, 18.0, 26.0, &config.glyph_line)?;
    flow.skip(mm(4.0));

    for &size in &config.sample_sizes {
        flow.paragraph(specimen, size, size + 8.0, &scenario.main)?;
    }
    flow.skip(mm(10.0));

    flow.paragraph(
        specimen,
        config.paragraph_size,
        config.paragraph_line_height,
        &scenario.paragraph,
    )?;

    flow.finish()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::embed::EmbeddingMode;
    use crate::metadata::FontFormat;
    use crate::testutil::FixtureFont;

    fn info(copyright: &str) -> FontInfo {
        FontInfo {
            file: "Fixture.ttf".to_string(),
            path: PathBuf::from("/fonts/Fixture.ttf"),
            family: "Fixture Sans".to_string(),
            name: "Fixture Sans Regular".to_string(),
            version: "Version 1.000".to_string(),
            copyright: copyright.to_string(),
            format: FontFormat::TrueType,
            registered_name: Some("font_0000abcd".to_string()),
            embedding: None,
        }
    }

    fn prepared(config: &Config, scenario: &Scenario) -> EmbeddedFont {
        let data = FixtureFont::default().build();
        let texts = specimen_texts(config, scenario);
        EmbeddedFont::prepare(&data, "Fixture", EmbeddingMode::Subset, &texts).unwrap()
    }

    #[test]
    fn default_specimen_fits_one_page() {
        let config = Config::default();
        let scenario = config.scenario();
        let font = prepared(&config, &scenario);
        let pages = render_specimen(&info(""), &font, &config, &scenario).unwrap();
        assert_eq!(pages.len(), 1);
        assert!(pages[0].uses_specimen_font);
        let text = String::from_utf8_lossy(&pages[0].content);
        assert!(text.contains("(Fixture.ttf)"));
        assert!(text.contains("(Copyright: N/A)"));
        assert!(text.contains("/F3"));
    }

    #[test]
    fn overflowing_specimen_continues_on_next_page() {
        let config = Config {
            sample_sizes: vec![72.0; 12],
            ..Config::default()
        };
        let scenario = config.scenario();
        let font = prepared(&config, &scenario);
        let pages = render_specimen(&info("(c)"), &font, &config, &scenario).unwrap();
        assert!(pages.len() > 1);
        assert!(pages.iter().all(|p| p.uses_specimen_font));
    }
}
