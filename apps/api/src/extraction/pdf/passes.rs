//! Independent text-recovery heuristics over a [`PdfSource`].
//!
//! Each pass returns raw fragments; deduplication and normalization happen in
//! the caller. Passes never fail: a pass that finds nothing returns nothing.

use once_cell::sync::Lazy;
use regex::bytes::Regex;

use super::lexer::{Lexer, Token};
use super::literal::{decode_hex_string, has_content_char, latin1, unescape_literal};
use super::PdfSource;

macro_rules! byte_regex {
    ($name:ident, $pattern:expr) => {
        static $name: Lazy<Regex> = Lazy::new(|| Regex::new($pattern).expect($pattern));
    };
}

byte_regex!(QUOTED_RE, r#"(?-u)"([^"\r\n]{2,})""#);
byte_regex!(PRINTABLE_RUN_RE, r"(?-u)[\x20-\x7E]{4,}");
byte_regex!(HEX_STRING_RE, r"(?-u)<([0-9A-Fa-f\s]{2,})>");
byte_regex!(UNICODE_ESCAPE_RE, r"(?-u)(?:\\u[0-9A-Fa-f]{4})+");
byte_regex!(TOKEN_RE, r"(?-u)[A-Za-z0-9@._-]{3,}");

/// Kerning adjustments at or below this value (thousandths of an em) read as
/// a word gap inside a `TJ` array.
const WORD_GAP_KERNING: f32 = -200.0;

/// Content-stream operators that mark a printable run as syntax, not text.
const CONTENT_OPERATORS: &[&str] = &[
    "BT", "ET", "Tj", "TJ", "Td", "TD", "Tm", "Tf", "T*", "Tc", "Tw", "Tz", "TL", "Tr", "cm",
    "re", "rg", "RG", "gs", "Do", "BDC", "EMC", "q", "Q", "f", "S", "w", "W", "n", "g", "G", "m",
    "l", "h",
];

/// Structural keywords and names the aggressive scan must not mistake for text.
const PDF_KEYWORDS: &[&str] = &[
    "obj",
    "endobj",
    "stream",
    "endstream",
    "xref",
    "startxref",
    "trailer",
    "EOF",
    "null",
    "true",
    "false",
];

pub trait TextPass: Send + Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, source: &PdfSource) -> Vec<String>;
}

/// The structured passes, in merge order.
pub fn default_passes() -> Vec<Box<dyn TextPass>> {
    vec![
        Box::new(ParenthesisLiteralPass),
        Box::new(TextObjectPass),
        Box::new(StreamContentPass),
        Box::new(PositioningCommandPass),
        Box::new(HexStringPass),
        Box::new(QuotedStringPass),
        Box::new(XObjectContentPass),
        Box::new(UnicodeEscapePass),
    ]
}

// ────────────────────────────────────────────────────────────────────────────
// Shared scanners
// ────────────────────────────────────────────────────────────────────────────

/// Every `( … )` literal in `content` that carries a content character.
pub fn scan_literals(content: &[u8]) -> Vec<String> {
    Lexer::new(content)
        .filter_map(|(_, token)| match token {
            Token::Literal(body) => Some(unescape_literal(body)),
            _ => None,
        })
        .filter(|s| has_content_char(s))
        .collect()
}

/// Operands collected since the last operator.
#[derive(Default)]
struct Operands {
    strings: Vec<String>,
    array: Option<String>,
    shown_array: Option<String>,
}

impl Operands {
    fn clear(&mut self) {
        *self = Self::default();
    }

    fn push_string(&mut self, text: String) {
        match &mut self.array {
            Some(array) => array.push_str(&text),
            None => self.strings.push(text),
        }
    }
}

/// Show-text operators inside `BT … ET` blocks.
pub fn scan_text_objects(content: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    let mut body_start: Option<usize> = None;
    let mut operands = Operands::default();

    for (offset, token) in Lexer::new(content) {
        match token {
            Token::Operator(b"BT") => {
                body_start = Some(offset + 2);
                operands.clear();
                continue;
            }
            Token::Operator(b"ET") => {
                if let Some(start) = body_start.take() {
                    out.extend(scan_quoted(&content[start..offset]));
                }
                operands.clear();
                continue;
            }
            _ if body_start.is_none() => continue,
            _ => {}
        }

        match token {
            Token::Literal(body) => operands.push_string(unescape_literal(body)),
            Token::Hex(digits) => {
                if let Some(decoded) = decode_hex_string(digits) {
                    operands.push_string(decoded);
                }
            }
            Token::Number(kerning) => {
                if let Some(array) = &mut operands.array {
                    if kerning <= WORD_GAP_KERNING {
                        array.push(' ');
                    }
                }
            }
            Token::ArrayStart => operands.array = Some(String::new()),
            Token::ArrayEnd => operands.shown_array = operands.array.take(),
            Token::Operator(op) => {
                match op {
                    b"Tj" => out.push(operands.strings.concat()),
                    b"TJ" => out.extend(operands.shown_array.take()),
                    b"'" | b"\"" => out.extend(operands.strings.pop()),
                    _ => {}
                }
                operands.clear();
            }
            Token::Other => {}
        }
    }
    // A text object cut off by a truncated stream still counts
    if let Some(start) = body_start {
        out.extend(scan_quoted(&content[start..]));
    }
    out.retain(|s| has_content_char(s));
    out
}

fn scan_quoted(content: &[u8]) -> Vec<String> {
    QUOTED_RE
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|m| latin1(m.as_bytes()))
        .filter(|s| has_content_char(s))
        .collect()
}

/// A run is content-stream syntax when it ends in an operator and every token
/// is an operand number or another operator.
fn is_syntax_run(run: &str) -> bool {
    if run.contains(|c| matches!(c, '/' | '(' | ')' | '[' | ']' | '<' | '>')) {
        return true;
    }
    let tokens: Vec<&str> = run.split_whitespace().collect();
    let Some(last) = tokens.last() else {
        return false;
    };
    CONTENT_OPERATORS.contains(last)
        && tokens
            .iter()
            .all(|token| CONTENT_OPERATORS.contains(token) || token.parse::<f32>().is_ok())
}

// ────────────────────────────────────────────────────────────────────────────
// Passes
// ────────────────────────────────────────────────────────────────────────────

/// `( … )` literal strings anywhere in the document.
pub struct ParenthesisLiteralPass;

impl TextPass for ParenthesisLiteralPass {
    fn name(&self) -> &'static str {
        "parenthesis_literal"
    }

    fn extract(&self, source: &PdfSource) -> Vec<String> {
        source.segments().flat_map(scan_literals).collect()
    }
}

/// `Tj`, `TJ`, `'` and `"` operators inside `BT … ET`.
pub struct TextObjectPass;

impl TextPass for TextObjectPass {
    fn name(&self) -> &'static str {
        "text_object"
    }

    fn extract(&self, source: &PdfSource) -> Vec<String> {
        source.segments().flat_map(scan_text_objects).collect()
    }
}

/// Literal strings and readable ASCII runs inside readable stream bodies.
pub struct StreamContentPass;

impl TextPass for StreamContentPass {
    fn name(&self) -> &'static str {
        "stream_content"
    }

    fn extract(&self, source: &PdfSource) -> Vec<String> {
        let mut out = Vec::new();
        for content in source.streams().iter().filter_map(|s| s.content()) {
            out.extend(scan_literals(content));
            out.extend(
                PRINTABLE_RUN_RE
                    .find_iter(content)
                    .map(|m| latin1(m.as_bytes()))
                    .filter(|run| !run.contains("<<") && !is_syntax_run(run))
                    .filter(|run| run.chars().any(char::is_alphabetic)),
            );
        }
        out
    }
}

/// Literals placed directly after a text-positioning operator.
pub struct PositioningCommandPass;

impl TextPass for PositioningCommandPass {
    fn name(&self) -> &'static str {
        "positioning_command"
    }

    fn extract(&self, source: &PdfSource) -> Vec<String> {
        source
            .segments()
            .flat_map(positioned_literals)
            .filter(|s| has_content_char(s))
            .collect()
    }
}

fn positioned_literals(content: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    let mut after_positioning = false;
    for (_, token) in Lexer::new(content) {
        if let (true, Token::Literal(body)) = (after_positioning, token) {
            out.push(unescape_literal(body));
        }
        after_positioning = matches!(token, Token::Operator(b"Td" | b"TD" | b"Tm" | b"T*"));
    }
    out
}

/// `< … >` hex strings that decode to mostly readable text.
pub struct HexStringPass;

impl TextPass for HexStringPass {
    fn name(&self) -> &'static str {
        "hex_string"
    }

    fn extract(&self, source: &PdfSource) -> Vec<String> {
        source
            .segments()
            .flat_map(|segment| {
                HEX_STRING_RE
                    .captures_iter(segment)
                    .filter_map(|caps| caps.get(1))
                    .filter_map(|m| decode_hex_string(m.as_bytes()))
                    .collect::<Vec<_>>()
            })
            .filter(|s| has_content_char(s) && is_mostly_readable(s))
            .collect()
    }
}

/// Document IDs and binary keys also live in hex strings; only keep decodes
/// with some ASCII letters or digits that are predominantly readable.
fn is_mostly_readable(text: &str) -> bool {
    let total = text.chars().count();
    let ascii_alnum = text.chars().filter(char::is_ascii_alphanumeric).count();
    let readable = text
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || c.is_ascii_punctuation())
        .count();
    ascii_alnum >= 2 && readable * 5 >= total * 4
}

/// `"…"` quoted runs outside text objects.
pub struct QuotedStringPass;

impl TextPass for QuotedStringPass {
    fn name(&self) -> &'static str {
        "quoted_string"
    }

    fn extract(&self, source: &PdfSource) -> Vec<String> {
        source.segments().flat_map(scan_quoted).collect()
    }
}

/// Text drawn inside form XObjects (letterheads, sidebars, templates).
pub struct XObjectContentPass;

impl TextPass for XObjectContentPass {
    fn name(&self) -> &'static str {
        "xobject_content"
    }

    fn extract(&self, source: &PdfSource) -> Vec<String> {
        source
            .streams()
            .iter()
            .filter(|s| s.is_form_xobject())
            .filter_map(|s| s.content())
            .flat_map(|content| {
                let mut found = scan_text_objects(content);
                found.extend(scan_literals(content));
                found
            })
            .collect()
    }
}

/// Runs of `\uXXXX` escapes left behind by some generators.
pub struct UnicodeEscapePass;

impl TextPass for UnicodeEscapePass {
    fn name(&self) -> &'static str {
        "unicode_escape"
    }

    fn extract(&self, source: &PdfSource) -> Vec<String> {
        source
            .segments()
            .flat_map(|segment| {
                UNICODE_ESCAPE_RE
                    .find_iter(segment)
                    .map(|m| decode_unicode_escapes(m.as_bytes()))
                    .collect::<Vec<_>>()
            })
            .filter(|s| has_content_char(s))
            .collect()
    }
}

fn decode_unicode_escapes(run: &[u8]) -> String {
    let units: Vec<u16> = run
        .split(|&b| b == b'\\')
        .filter_map(|chunk| chunk.strip_prefix(b"u"))
        .filter_map(|hex| std::str::from_utf8(hex).ok())
        .filter_map(|hex| u16::from_str_radix(hex, 16).ok())
        .collect();
    String::from_utf16_lossy(&units)
}

/// Last-resort scan: identifier-like tokens outside binary streams, skipping
/// PDF names, structural keywords and pure numbers.
pub struct AggressiveTokenScan;

impl TextPass for AggressiveTokenScan {
    fn name(&self) -> &'static str {
        "aggressive_token_scan"
    }

    fn extract(&self, source: &PdfSource) -> Vec<String> {
        let surface = source.surface();
        TOKEN_RE
            .find_iter(surface)
            .filter(|m| m.start() == 0 || surface[m.start() - 1] != b'/')
            .map(|m| latin1(m.as_bytes()))
            .filter(|token| !token.chars().all(|c| c.is_ascii_digit() || c == '.' || c == '-'))
            .filter(|token| !PDF_KEYWORDS.contains(&token.as_str()))
            .filter(|token| !token.starts_with("PDF-"))
            .collect()
    }
}
