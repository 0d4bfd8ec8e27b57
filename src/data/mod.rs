mod core_fonts;

pub(crate) use core_fonts::{CoreFontMetrics, HELVETICA, HELVETICA_BOLD};
