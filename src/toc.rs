//! Table of contents pages and the document outline.

use lopdf::{Document, Object, ObjectId, dictionary};

use crate::config::Config;
use crate::layout::{
    PageCanvas, PageContent, PageFont, PagePoint, PageRect, PageSize, UiFont, mm, wrap_text,
};
use crate::utils::pdf_text_string;

const TITLE: &str = "Table of Contents";
const TITLE_SIZE: f32 = 18.0;
const ENTRY_SIZE: f32 = 12.0;

/// One font in the table of contents.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TocEntry {
    pub title: String,
    /// Index of the font's first page among the specimen pages.
    pub first_page: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TocLine {
    pub text: String,
    pub y: f32,
    pub entry: usize,
}

/// Place every entry line on TOC pages. Page numbers are right aligned and
/// never wrap, so the layout does not depend on them.
pub(crate) fn layout_toc(entries: &[TocEntry], config: &Config) -> Vec<Vec<TocLine>> {
    let regular = PageFont::Ui(UiFont::Regular);
    let top = config.page_height - mm(45.0);
    let continued_top = config.page_height - mm(30.0);
    let wrap_width = config.page_width - mm(80.0);

    let mut pages = Vec::new();
    let mut current = Vec::new();
    let mut y = top;
    for (index, entry) in entries.iter().enumerate() {
        for line in wrap_text(&entry.title, wrap_width, |s| regular.measure(s, ENTRY_SIZE)) {
            if y < mm(20.0) {
                pages.push(std::mem::take(&mut current));
                y = continued_top;
            }
            current.push(TocLine {
                text: line,
                y,
                entry: index,
            });
            y -= mm(8.0);
        }
        y -= mm(2.0);
    }
    pages.push(current);
    pages
}

/// Draw the laid out TOC. Specimen page numbers are offset by the number
/// of TOC pages, since those come first in the document.
pub(crate) fn render_toc(
    layout: &[Vec<TocLine>],
    entries: &[TocEntry],
    config: &Config,
) -> Result<Vec<PageContent>, lopdf::Error> {
    let regular = PageFont::Ui(UiFont::Regular);
    let bold = PageFont::Ui(UiFont::Bold);
    let left = mm(25.0);
    let right = config.page_width - mm(25.0);
    let toc_pages = layout.len();

    let mut pages = Vec::with_capacity(layout.len());
    for (page_index, lines) in layout.iter().enumerate() {
        let mut canvas = PageCanvas::new();
        if page_index == 0 {
            let title_y = config.page_height - mm(30.0);
            let title_x = (config.page_width - bold.measure(TITLE, TITLE_SIZE)) / 2.0;
            canvas.text(bold, TITLE_SIZE, PagePoint::new(title_x, title_y), TITLE);
        }
        for line in lines {
            let entry = &entries[line.entry];
            let page_number = (toc_pages + entry.first_page + 1).to_string();
            canvas.text(regular, ENTRY_SIZE, PagePoint::new(left, line.y), &line.text);
            canvas.right_text(regular, ENTRY_SIZE, right, line.y, &page_number);
            canvas.link(
                PageRect::new(
                    PagePoint::new(left, line.y - 3.0),
                    PageSize::new(right - left, ENTRY_SIZE + 3.0),
                ),
                entry.first_page,
            );
        }
        pages.push(canvas.finish()?);
    }
    Ok(pages)
}

/// `/Link` annotation jumping to `target`.
pub(crate) fn link_annotation(rect: &PageRect, target: ObjectId) -> lopdf::Dictionary {
    dictionary! {
        "Type" => "Annot",
        "Subtype" => "Link",
        "Rect" => vec![
            Object::Real(rect.min_x()),
            Object::Real(rect.min_y()),
            Object::Real(rect.max_x()),
            Object::Real(rect.max_y()),
        ],
        "Border" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(0)],
        "Dest" => vec![Object::Reference(target), "Fit".into()],
    }
}

/// Write one outline item per entry and return the outline root.
pub(crate) fn write_outline(
    doc: &mut Document,
    entries: &[TocEntry],
    specimen_pages: &[ObjectId],
) -> Option<ObjectId> {
    if entries.is_empty() {
        return None;
    }
    let root_id = doc.new_object_id();
    let item_ids: Vec<ObjectId> = entries.iter().map(|_| doc.new_object_id()).collect();

    for (i, entry) in entries.iter().enumerate() {
        let Some(&page) = specimen_pages.get(entry.first_page) else {
            continue;
        };
        let mut item = dictionary! {
            "Title" => pdf_text_string(&entry.title),
            "Parent" => root_id,
            "Dest" => vec![Object::Reference(page), "Fit".into()],
        };
        if i > 0 {
            item.set("Prev", item_ids[i - 1]);
        }
        if i + 1 < item_ids.len() {
            item.set("Next", item_ids[i + 1]);
        }
        doc.objects.insert(item_ids[i], Object::Dictionary(item));
    }

    let first = item_ids[0];
    let last = item_ids[item_ids.len() - 1];
    doc.objects.insert(
        root_id,
        Object::Dictionary(dictionary! {
            "Type" => "Outlines",
            "First" => first,
            "Last" => last,
            "Count" => item_ids.len() as i64,
        }),
    );
    Some(root_id)
}
