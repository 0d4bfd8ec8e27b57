//! Advance widths of the standard Helvetica faces, from the Adobe AFM files.

/// Metrics for one of the standard 14 PDF fonts, restricted to the printable
/// ASCII range. Other WinAnsi codes use `default_width`.
pub(crate) struct CoreFontMetrics {
    pub base_font: &'static str,
    pub ascii_widths: &'static [u16; 95],
    pub default_width: u16,
}

impl CoreFontMetrics {
    /// Width of a WinAnsi code in 1000-unit glyph space.
    pub fn width(&self, code: u8) -> u16 {
        match code {
            0x20..=0x7e => self.ascii_widths[(code - 0x20) as usize],
            _ => self.default_width,
        }
    }
}

pub(crate) const HELVETICA: CoreFontMetrics = CoreFontMetrics {
    base_font: "Helvetica",
    ascii_widths: &HELVETICA_WIDTHS,
    default_width: 556,
};

pub(crate) const HELVETICA_BOLD: CoreFontMetrics = CoreFontMetrics {
    base_font: "Helvetica-Bold",
    ascii_widths: &HELVETICA_BOLD_WIDTHS,
    default_width: 556,
};

#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];
