//! Page geometry, text measurement and content stream building.

use euclid::{Point2D, Rect, Size2D};
use lopdf::content::{Content, Operation};
use lopdf::{Object, StringFormat};

use crate::config::Config;
use crate::data::{CoreFontMetrics, HELVETICA, HELVETICA_BOLD};
use crate::embed::EmbeddedFont;
use crate::utils::win_ansi;

pub struct PageSpace;
pub(crate) type PagePoint = Point2D<f32, PageSpace>;
pub(crate) type PageRect = Rect<f32, PageSpace>;
pub(crate) type PageSize = Size2D<f32, PageSpace>;

/// Millimetres to PDF points.
pub(crate) fn mm(value: f32) -> f32 {
    value * 72.0 / 25.4
}

/// Base-14 faces used for headings, metadata and the table of contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UiFont {
    Regular,
    Bold,
}

impl UiFont {
    pub const ALL: [UiFont; 2] = [UiFont::Regular, UiFont::Bold];

    pub fn metrics(self) -> &'static CoreFontMetrics {
        match self {
            UiFont::Regular => &HELVETICA,
            UiFont::Bold => &HELVETICA_BOLD,
        }
    }

    pub fn resource(self) -> &'static str {
        match self {
            UiFont::Regular => "F1",
            UiFont::Bold => "F2",
        }
    }
}

pub(crate) const SPECIMEN_RESOURCE: &str = "F3";

/// A font as seen from a content stream.
#[derive(Clone, Copy)]
pub(crate) enum PageFont<'a> {
    Ui(UiFont),
    Specimen(&'a EmbeddedFont),
}

impl PageFont<'_> {
    pub fn resource(&self) -> &'static str {
        match self {
            PageFont::Ui(font) => font.resource(),
            PageFont::Specimen(_) => SPECIMEN_RESOURCE,
        }
    }

    pub fn measure(&self, text: &str, size: f32) -> f32 {
        match self {
            PageFont::Ui(font) => {
                let metrics = font.metrics();
                let units: u32 = win_ansi(text)
                    .into_iter()
                    .map(|code| metrics.width(code) as u32)
                    .sum();
                units as f32 * size / 1000.0
            }
            PageFont::Specimen(font) => font.measure(text, size),
        }
    }

    fn text_object(&self, text: &str) -> Object {
        match self {
            PageFont::Ui(_) => Object::String(win_ansi(text), StringFormat::Literal),
            PageFont::Specimen(font) => font.text_object(text),
        }
    }
}

/// Greedy word wrap. Words wider than `max_width` get a line of their own.
pub(crate) fn wrap_text<F>(text: &str, max_width: f32, measure: F) -> Vec<String>
where
    F: Fn(&str) -> f32,
{
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{} {}", current, word);
        if measure(&candidate) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Clickable area on a page pointing at a specimen page by index.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PageLink {
    pub rect: PageRect,
    pub target: usize,
}

/// Content of one finished page.
pub(crate) struct PageContent {
    pub content: Vec<u8>,
    pub links: Vec<PageLink>,
    pub uses_specimen_font: bool,
}

/// Records drawing operations for a single page.
pub(crate) struct PageCanvas {
    operations: Vec<Operation>,
    links: Vec<PageLink>,
    uses_specimen_font: bool,
}

impl PageCanvas {
    pub fn new() -> Self {
        PageCanvas {
            operations: Vec::new(),
            links: Vec::new(),
            uses_specimen_font: false,
        }
    }

    pub fn text(&mut self, font: PageFont, size: f32, at: PagePoint, text: &str) {
        if matches!(font, PageFont::Specimen(_)) {
            self.uses_specimen_font = true;
        }
        self.operations.extend([
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![Object::Name(font.resource().as_bytes().to_vec()), size.into()],
            ),
            Operation::new("Td", vec![at.x.into(), at.y.into()]),
            Operation::new("Tj", vec![font.text_object(text)]),
            Operation::new("ET", vec![]),
        ]);
    }

    /// Draw `text` so that it ends at `right_x`.
    pub fn right_text(&mut self, font: PageFont, size: f32, right_x: f32, y: f32, text: &str) {
        let x = right_x - font.measure(text, size);
        self.text(font, size, PagePoint::new(x, y), text);
    }

    /// Thin grey horizontal line.
    pub fn rule(&mut self, from_x: f32, to_x: f32, y: f32) {
        self.operations.extend([
            Operation::new("q", vec![]),
            Operation::new("w", vec![0.5f32.into()]),
            Operation::new("RG", vec![0.6f32.into(), 0.6f32.into(), 0.6f32.into()]),
            Operation::new("m", vec![from_x.into(), y.into()]),
            Operation::new("l", vec![to_x.into(), y.into()]),
            Operation::new("S", vec![]),
            Operation::new("Q", vec![]),
        ]);
    }

    pub fn link(&mut self, rect: PageRect, target: usize) {
        self.links.push(PageLink { rect, target });
    }

    pub fn finish(self) -> Result<PageContent, lopdf::Error> {
        let content = Content {
            operations: self.operations,
        }
        .encode()?;
        Ok(PageContent {
            content,
            links: self.links,
            uses_specimen_font: self.uses_specimen_font,
        })
    }
}

/// Lays lines out top to bottom, starting a new page when the next line
/// would cross the bottom margin.
pub(crate) struct PageFlow {
    size: PageSize,
    margin: f32,
    top: f32,
    y: f32,
    canvas: PageCanvas,
    pages: Vec<PageContent>,
}

impl PageFlow {
    pub fn new(config: &Config) -> Self {
        let top = config.page_height - config.page_margin;
        PageFlow {
            size: PageSize::new(config.page_width, config.page_height),
            margin: config.page_margin,
            top,
            y: top,
            canvas: PageCanvas::new(),
            pages: Vec::new(),
        }
    }

    pub fn left(&self) -> f32 {
        self.margin
    }

    pub fn right(&self) -> f32 {
        self.size.width - self.margin
    }

    pub fn content_width(&self) -> f32 {
        self.right() - self.left()
    }

    pub fn break_page(&mut self) -> Result<(), lopdf::Error> {
        let canvas = std::mem::replace(&mut self.canvas, PageCanvas::new());
        self.pages.push(canvas.finish()?);
        self.y = self.top;
        Ok(())
    }

    /// Reserve `height` points below the cursor, breaking the page first
    /// when it does not fit. Returns the top of the reserved band.
    pub fn reserve(&mut self, height: f32) -> Result<f32, lopdf::Error> {
        if self.y - height < self.margin && self.y < self.top {
            self.break_page()?;
        }
        let top = self.y;
        self.y -= height;
        Ok(top)
    }

    pub fn skip(&mut self, height: f32) {
        self.y -= height;
    }

    /// One line of text whose baseline sits `size` below the cursor.
    pub fn line(
        &mut self,
        font: PageFont,
        size: f32,
        line_height: f32,
        text: &str,
    ) -> Result<(), lopdf::Error> {
        let top = self.reserve(line_height)?;
        let at = PagePoint::new(self.left(), top - size);
        self.canvas.text(font, size, at, text);
        Ok(())
    }

    /// Wrap `text` to the content width and lay out every line.
    pub fn paragraph(
        &mut self,
        font: PageFont,
        size: f32,
        line_height: f32,
        text: &str,
    ) -> Result<(), lopdf::Error> {
        let width = self.content_width();
        for line in wrap_text(text, width, |s| font.measure(s, size)) {
            self.line(font, size, line_height, &line)?;
        }
        Ok(())
    }

    pub fn rule(&mut self, gap: f32) -> Result<(), lopdf::Error> {
        let top = self.reserve(gap * 2.0)?;
        let (left, right) = (self.left(), self.right());
        self.canvas.rule(left, right, top - gap);
        Ok(())
    }

    pub fn finish(mut self) -> Result<Vec<PageContent>, lopdf::Error> {
        self.break_page()?;
        Ok(self.pages)
    }
}
