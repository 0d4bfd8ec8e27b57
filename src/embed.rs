//! Embedding font programs as composite (Type0, Identity-H) PDF fonts.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use lopdf::{Document, Object, ObjectId, Stream, StringFormat, dictionary};
use tracing::debug;
use ttf_parser::GlyphId;
use ttf_parser::name::name_id;

use crate::config::{Config, SubsettingMode};
use crate::error::{FontError, SubsetError};
use crate::logging::{log_pdf_font_issue, log_pdf_font_optimization_retry};
use crate::metadata::FontFormat;
use crate::subset::subset_truetype;

/// How much of a font program ends up in the PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingMode {
    Subset,
    Full,
}

/// The subsetting mode plus whether a failed subset may fall back to full
/// embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddingPolicy {
    pub mode: SubsettingMode,
    pub retry_without_subsetting: bool,
}

impl EmbeddingPolicy {
    pub fn from_config(config: &Config) -> Self {
        EmbeddingPolicy {
            mode: config.font_subsetting,
            retry_without_subsetting: config.retry_without_subsetting,
        }
    }
}

impl Default for EmbeddingPolicy {
    fn default() -> Self {
        EmbeddingPolicy {
            mode: SubsettingMode::Auto,
            retry_without_subsetting: true,
        }
    }
}

/// What the policy ended up doing for a font.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbedOutcome {
    Subset,
    Full,
    /// Subsetting failed with the given error and the full program was used.
    FullAfterRetry(String),
}

// FontDescriptor flags
const FIXED_PITCH: i64 = 1 << 0;
const NONSYMBOLIC: i64 = 1 << 5;
const ITALIC: i64 = 1 << 6;

/// A font program prepared for one PDF, together with the metrics for the
/// characters it will be asked to show.
#[derive(Debug, Clone)]
pub(crate) struct EmbeddedFont {
    base_font: String,
    format: FontFormat,
    mode: EmbeddingMode,
    program: Vec<u8>,
    char_map: HashMap<char, u16>,
    widths: BTreeMap<u16, u16>,
    to_unicode: BTreeMap<u16, String>,
    ascent: i64,
    descent: i64,
    cap_height: i64,
    bbox: [i64; 4],
    italic_angle: f32,
    flags: i64,
}

fn postscript_name(face: &ttf_parser::Face, fallback: &str) -> String {
    let raw = face
        .names()
        .into_iter()
        .filter(|name| name.name_id == name_id::POST_SCRIPT_NAME)
        .find_map(|name| name.to_string())
        .unwrap_or_else(|| fallback.to_string());
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    if cleaned.is_empty() {
        "Font".to_string()
    } else {
        cleaned
    }
}

/// Six uppercase letters derived from the glyph set, as PDF subset names use.
fn subset_tag(gids: &BTreeSet<u16>) -> String {
    let mut hash = gids
        .iter()
        .fold(0x811c_9dc5u32, |h, gid| (h ^ *gid as u32).wrapping_mul(0x0100_0193));
    (0..6)
        .map(|_| {
            let letter = (b'A' + (hash % 26) as u8) as char;
            hash /= 26;
            letter
        })
        .collect()
}

impl EmbeddedFont {
    /// Parse `data`, map every character of `texts` through the font's cmap
    /// and produce the program bytes for `mode`.
    pub fn prepare(
        data: &[u8],
        fallback_name: &str,
        mode: EmbeddingMode,
        texts: &[&str],
    ) -> Result<EmbeddedFont, FontError> {
        let face = ttf_parser::Face::parse(data, 0)?;
        let format = match FontFormat::of_face(&face) {
            FontFormat::Other => {
                return Err(FontError::Embedding(
                    "no TrueType or CFF outlines to embed".to_string(),
                ));
            }
            format => format,
        };

        let scale = 1000.0 / face.units_per_em() as f32;
        let to_pdf = |v: i16| (v as f32 * scale).round() as i64;
        let advance = |gid: u16| {
            let units = face.glyph_hor_advance(GlyphId(gid)).unwrap_or(0);
            (units as f32 * scale).round() as u16
        };

        let mut char_map = HashMap::new();
        let mut widths = BTreeMap::new();
        let mut to_unicode = BTreeMap::new();
        widths.insert(0, advance(0));
        for ch in texts.iter().flat_map(|text| text.chars()) {
            if char_map.contains_key(&ch) {
                continue;
            }
            let gid = face.glyph_index(ch).map(|g| g.0).unwrap_or(0);
            char_map.insert(ch, gid);
            widths.entry(gid).or_insert_with(|| advance(gid));
            if gid != 0 {
                to_unicode.entry(gid).or_insert_with(|| ch.to_string());
            }
        }

        let used: BTreeSet<u16> = widths.keys().copied().collect();
        let mut base_font = postscript_name(&face, fallback_name);
        let program = match (mode, format) {
            (EmbeddingMode::Full, _) => data.to_vec(),
            (EmbeddingMode::Subset, FontFormat::TrueType) => {
                let program = subset_truetype(data, &used)?;
                base_font = format!("{}+{}", subset_tag(&used), base_font);
                program
            }
            (EmbeddingMode::Subset, _) => return Err(SubsetError::Unsupported.into()),
        };

        let bbox = face.global_bounding_box();
        let cap_height = face.capital_height().unwrap_or(face.ascender());
        let italic_angle = face.italic_angle();
        let mut flags = NONSYMBOLIC;
        if face.is_monospaced() {
            flags |= FIXED_PITCH;
        }
        if italic_angle != 0.0 {
            flags |= ITALIC;
        }

        debug!(
            font = %base_font,
            ?mode,
            glyphs = used.len(),
            program_bytes = program.len(),
            "prepared font for embedding"
        );

        Ok(EmbeddedFont {
            base_font,
            format,
            mode,
            program,
            char_map,
            widths,
            to_unicode,
            ascent: to_pdf(face.ascender()),
            descent: to_pdf(face.descender()),
            cap_height: to_pdf(cap_height),
            bbox: [
                to_pdf(bbox.x_min),
                to_pdf(bbox.y_min),
                to_pdf(bbox.x_max),
                to_pdf(bbox.y_max),
            ],
            italic_angle,
            flags,
        })
    }

    pub fn mode(&self) -> EmbeddingMode {
        self.mode
    }

    pub fn base_font(&self) -> &str {
        &self.base_font
    }

    fn gid(&self, ch: char) -> u16 {
        self.char_map.get(&ch).copied().unwrap_or(0)
    }

    /// Glyph ids of `text` as big-endian pairs, ready for a hex `Tj` string.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        text.chars()
            .flat_map(|ch| self.gid(ch).to_be_bytes())
            .collect()
    }

    /// Advance width of `text` in points at `size`.
    pub fn measure(&self, text: &str, size: f32) -> f32 {
        let units: u32 = text
            .chars()
            .map(|ch| {
                let gid = self.gid(ch);
                self.widths.get(&gid).copied().unwrap_or(0) as u32
            })
            .sum();
        units as f32 * size / 1000.0
    }

    /// `/W` array grouping consecutive glyph ids into runs.
    fn widths_array(&self) -> Vec<Object> {
        let mut array = Vec::new();
        let mut run: Vec<Object> = Vec::new();
        let mut run_start = 0u16;
        let mut prev: Option<u16> = None;
        for (&gid, &width) in &self.widths {
            if prev.map_or(true, |p| p + 1 != gid) {
                if !run.is_empty() {
                    array.push(Object::Integer(run_start as i64));
                    array.push(Object::Array(std::mem::take(&mut run)));
                }
                run_start = gid;
            }
            run.push(Object::Integer(width as i64));
            prev = Some(gid);
        }
        if !run.is_empty() {
            array.push(Object::Integer(run_start as i64));
            array.push(Object::Array(run));
        }
        array
    }

    /// Add the font program, descriptor, descendant CIDFont, ToUnicode map
    /// and Type0 font to `doc`, returning the Type0 font's id.
    pub fn write_objects(&self, doc: &mut Document) -> ObjectId {
        let base_font = Object::Name(self.base_font.clone().into_bytes());

        let (file_key, mut file_stream) = match self.format {
            FontFormat::OpenTypeCff => (
                "FontFile3",
                Stream::new(dictionary! { "Subtype" => "OpenType" }, self.program.clone()),
            ),
            _ => (
                "FontFile2",
                Stream::new(
                    dictionary! { "Length1" => self.program.len() as i64 },
                    self.program.clone(),
                ),
            ),
        };
        let _ = file_stream.compress();
        let file_id = doc.add_object(file_stream);

        let bbox: Vec<Object> = self.bbox.iter().map(|v| Object::Integer(*v)).collect();
        let descriptor_id = doc.add_object(dictionary! {
            "Type" => "FontDescriptor",
            "FontName" => base_font.clone(),
            "Flags" => self.flags,
            "FontBBox" => bbox,
            "ItalicAngle" => self.italic_angle,
            "Ascent" => self.ascent,
            "Descent" => self.descent,
            "CapHeight" => self.cap_height,
            "StemV" => 80,
            file_key => file_id,
        });

        let mut cid_font = dictionary! {
            "Type" => "Font",
            "Subtype" => match self.format {
                FontFormat::OpenTypeCff => "CIDFontType0",
                _ => "CIDFontType2",
            },
            "BaseFont" => base_font.clone(),
            "CIDSystemInfo" => dictionary! {
                "Registry" => Object::string_literal("Adobe"),
                "Ordering" => Object::string_literal("Identity"),
                "Supplement" => 0,
            },
            "FontDescriptor" => descriptor_id,
            "DW" => self.widths.get(&0).copied().unwrap_or(0) as i64,
            "W" => self.widths_array(),
        };
        if self.format != FontFormat::OpenTypeCff {
            cid_font.set("CIDToGIDMap", "Identity");
        }
        let cid_font_id = doc.add_object(cid_font);

        let mut cmap_stream = Stream::new(
            dictionary! {},
            to_unicode_cmap(&self.to_unicode).into_bytes(),
        );
        let _ = cmap_stream.compress();
        let cmap_id = doc.add_object(cmap_stream);

        doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => base_font,
            "Encoding" => "Identity-H",
            "DescendantFonts" => vec![Object::Reference(cid_font_id)],
            "ToUnicode" => cmap_id,
        })
    }

    pub fn text_object(&self, text: &str) -> Object {
        Object::String(self.encode(text), StringFormat::Hexadecimal)
    }
}

/// The mode tried first for a font of `format`. CFF outlines cannot be
/// subset here, so `auto` embeds them in full directly.
fn first_attempt(policy: &EmbeddingPolicy, format: FontFormat) -> EmbeddingMode {
    match policy.mode {
        SubsettingMode::Disabled => EmbeddingMode::Full,
        SubsettingMode::Auto if format == FontFormat::OpenTypeCff => EmbeddingMode::Full,
        SubsettingMode::Auto | SubsettingMode::Enabled => EmbeddingMode::Subset,
    }
}

/// Prepare `data` following `policy`: subset first unless disabled, and in
/// `auto` mode fall back to the full program when subsetting fails.
///
/// `format` is the outline flavour found when the font's metadata was read.
/// When the fallback fails as well the error is [`FontError::RetryFailed`].
pub(crate) fn prepare_with_policy(
    data: &[u8],
    file: &str,
    format: FontFormat,
    texts: &[&str],
    policy: &EmbeddingPolicy,
    stage: &str,
) -> Result<(EmbeddedFont, EmbedOutcome), FontError> {
    let fallback = file.rsplit_once('.').map_or(file, |(stem, _)| stem);
    let first = first_attempt(policy, format);

    let error = match EmbeddedFont::prepare(data, fallback, first, texts) {
        Ok(font) => {
            let outcome = match first {
                EmbeddingMode::Subset => EmbedOutcome::Subset,
                EmbeddingMode::Full => EmbedOutcome::Full,
            };
            return Ok((font, outcome));
        }
        Err(e) => e,
    };

    let may_retry = first == EmbeddingMode::Subset
        && policy.mode == SubsettingMode::Auto
        && policy.retry_without_subsetting
        && error.is_font_related();
    if !may_retry {
        return Err(error);
    }

    let message = error.to_string();
    log_pdf_font_issue(&[file], error.issue_type(), &message, stage);
    match EmbeddedFont::prepare(data, fallback, EmbeddingMode::Full, texts) {
        Ok(font) => {
            log_pdf_font_optimization_retry(&message, true, None);
            Ok((font, EmbedOutcome::FullAfterRetry(message)))
        }
        Err(retry_error) => {
            log_pdf_font_optimization_retry(&message, false, Some(&retry_error.to_string()));
            Err(FontError::RetryFailed {
                subset_error: message,
                source: Box::new(retry_error),
            })
        }
    }
}

/// ToUnicode CMap mapping glyph ids to the text they stand for.
pub(crate) fn to_unicode_cmap(glyph_map: &BTreeMap<u16, String>) -> String {
    let entries: Vec<(&u16, &String)> = glyph_map.iter().collect();

    let mut out = String::new();
    out.push_str("/CIDInit /ProcSet findresource begin\n");
    out.push_str("12 dict begin\n");
    out.push_str("begincmap\n");
    out.push_str("/CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n");
    out.push_str("/CMapName /Adobe-Identity-UCS def\n");
    out.push_str("/CMapType 2 def\n");
    out.push_str("1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n");

    // at most 100 entries per bfchar block
    for chunk in entries.chunks(100) {
        out.push_str(&format!("{} beginbfchar\n", chunk.len()));
        for (gid, text) in chunk {
            let utf16: String = text
                .encode_utf16()
                .map(|unit| format!("{:04X}", unit))
                .collect();
            out.push_str(&format!("<{:04X}> <{}>\n", gid, utf16));
        }
        out.push_str("endbfchar\n");
    }

    out.push_str("endcmap\n");
    out.push_str("CMapName currentdict /CMap defineresource pop\n");
    out.push_str("end\nend\n");
    out
}
