use chrono::{DateTime, Offset, TimeZone};
use encoding_rs::WINDOWS_1252;
use lopdf::{Object, StringFormat};

/// Encode `text` as WinAnsi bytes for a simple font, replacing anything
/// windows-1252 cannot represent with `?`.
pub(crate) fn win_ansi(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut buf = [0u8; 4];
    for ch in text.chars() {
        let (bytes, _, had_errors) = WINDOWS_1252.encode(ch.encode_utf8(&mut buf));
        match (had_errors, bytes.as_ref()) {
            (false, [byte]) => out.push(*byte),
            _ => out.push(b'?'),
        }
    }
    out
}

/// A PDF text string: a literal for ASCII, UTF-16BE with a byte order mark
/// otherwise.
pub(crate) fn pdf_text_string(text: &str) -> Object {
    if text.is_ascii() {
        Object::string_literal(text)
    } else {
        let mut bytes = vec![0xfe, 0xff];
        bytes.extend(text.encode_utf16().flat_map(|unit| unit.to_be_bytes()));
        Object::String(bytes, StringFormat::Hexadecimal)
    }
}

/// PDF date string, e.g. `D:20240131120000+01'00'`.
pub(crate) fn pdf_date<Tz: TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let offset = time.offset().fix().local_minus_utc();
    let sign = if offset < 0 { '-' } else { '+' };
    let offset = offset.abs();
    format!(
        "D:{}{}{:02}'{:02}'",
        time.format("%Y%m%d%H%M%S"),
        sign,
        offset / 3600,
        (offset % 3600) / 60
    )
}

/// Cut `text` to at most `max_chars` characters, marking the cut with `...`.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, Utc};

    use super::*;

    #[test]
    fn win_ansi_replaces_unmappable() {
        assert_eq!(win_ansi("Caf\u{e9} \u{20ac}"), vec![b'C', b'a', b'f', 0xe9, b' ', 0x80]);
        assert_eq!(win_ansi("\u{3a9}x"), b"?x".to_vec());
    }

    #[test]
    fn text_strings_use_utf16_only_when_needed() {
        assert!(matches!(
            pdf_text_string("Plain"),
            Object::String(ref bytes, StringFormat::Literal) if bytes == b"Plain"
        ));
        assert!(matches!(
            pdf_text_string("\u{e9}"),
            Object::String(ref bytes, StringFormat::Hexadecimal) if bytes == &[0xfeu8, 0xff, 0x00, 0xe9]
        ));
    }

    #[test]
    fn formats_pdf_dates() {
        let utc = Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 5).unwrap();
        assert_eq!(pdf_date(&utc), "D:20240131120005+00'00'");
        let west = FixedOffset::west_opt(5 * 3600 + 30 * 60).unwrap();
        let local = west.with_ymd_and_hms(2024, 1, 31, 12, 0, 5).unwrap();
        assert_eq!(pdf_date(&local), "D:20240131120005-05'30'");
    }

    #[test]
    fn truncates_on_char_boundaries() {
        assert_eq!(truncate_chars("short", 60), "short");
        assert_eq!(truncate_chars("\u{e9}\u{e9}\u{e9}", 2), "\u{e9}\u{e9}...");
    }
}
