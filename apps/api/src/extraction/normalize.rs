//! Whitespace and character normalization shared by every extractor.
//!
//! Two flavours exist because the sources differ: PDF byte-level output is a
//! soup of Latin-1 decoded bytes where anything outside the Latin script ranges
//! is binary noise, while DOCX/plain text is real Unicode where only control
//! characters are noise.

/// Normalizes text recovered from PDF bytes or OCR.
///
/// `\r\n`/`\r` become `\n`, tabs become spaces, space runs collapse, lines are
/// trimmed, blank-line runs are capped at one, and characters outside the Latin
/// ranges are dropped.
pub fn normalize_pdf_text(raw: &str) -> String {
    let filtered: String = unify_line_breaks(raw)
        .chars()
        .filter_map(|c| match c {
            '\t' => Some(' '),
            '\n' => Some('\n'),
            c if is_latin_text_char(c) => Some(c),
            _ => None,
        })
        .collect();

    collapse_lines(&filtered)
}

/// Cleans DOCX and plain-text output, keeping paragraph breaks.
///
/// Three or more consecutive line breaks collapse to two, intra-line
/// whitespace collapses, and control characters are stripped.
pub fn clean_document_text(raw: &str) -> String {
    let filtered: String = unify_line_breaks(raw)
        .chars()
        .filter_map(|c| match c {
            '\n' => Some('\n'),
            c if c.is_whitespace() => Some(' '),
            c if c.is_control() => None,
            // zero-width and BOM
            '\u{200B}' | '\u{FEFF}' => None,
            c => Some(c),
        })
        .collect();

    collapse_lines(&filtered)
}

fn unify_line_breaks(raw: &str) -> String {
    raw.replace("\r\n", "\n").replace('\r', "\n")
}

/// ASCII printable, Latin-1 supplement, Latin Extended-A/B, combining
/// diacritics, and general punctuation (dashes, quotes, bullets).
fn is_latin_text_char(c: char) -> bool {
    matches!(c as u32,
        0x20..=0x7E
        | 0xA0..=0x24F
        | 0x300..=0x36F
        | 0x1E00..=0x1EFF
        | 0x2010..=0x2027
        | 0x2030..=0x205E
        | 0x20AC)
}

/// Collapses space runs inside each line, trims lines, and limits consecutive
/// line breaks to two. Leading and trailing blank lines are removed.
fn collapse_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_breaks = 0usize;

    for line in text.split('\n') {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            pending_breaks += 1;
            continue;
        }
        if !out.is_empty() {
            let breaks = (pending_breaks + 1).min(2);
            out.extend(std::iter::repeat('\n').take(breaks));
        }
        out.push_str(&collapsed);
        pending_breaks = 0;
    }

    out
}
