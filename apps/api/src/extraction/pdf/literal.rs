//! Decoding of PDF string objects: `( … )` literals and `< … >` hex strings.

/// Literals longer than this are treated as unterminated.
const MAX_LITERAL_BYTES: usize = 64 * 1024;

/// A `( … )` literal located in a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Literal<'a> {
    /// Raw body between the outer parentheses, escapes unresolved.
    pub body: &'a [u8],
    /// Offset just past the closing parenthesis.
    pub end: usize,
}

/// Reads the literal whose opening parenthesis sits at `open`.
///
/// Balanced unescaped parentheses nest, so `(Engineer (Intern))` is one
/// literal. Returns `None` when `open` is not a `(` or the literal never
/// closes.
pub fn literal_at(bytes: &[u8], open: usize) -> Option<Literal<'_>> {
    if bytes.get(open) != Some(&b'(') {
        return None;
    }
    let limit = bytes.len().min(open.saturating_add(MAX_LITERAL_BYTES));
    let mut depth = 0usize;
    let mut i = open;

    while i < limit {
        match bytes[i] {
            b'\\' => i += 1,
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(Literal {
                        body: &bytes[open + 1..i],
                        end: i + 1,
                    });
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Maps bytes to chars one-to-one (ISO-8859-1). Lossless for any input.
pub fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// True when the fragment holds at least one character worth keeping.
pub fn has_content_char(text: &str) -> bool {
    text.chars()
        .any(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '_' | '-'))
}

/// Resolves the escape sequences of a literal string body (without the
/// surrounding parentheses).
pub fn unescape_literal(raw: &[u8]) -> String {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        let b = raw[i];
        if b != b'\\' {
            out.push(b);
            i += 1;
            continue;
        }

        let Some(&next) = raw.get(i + 1) else {
            break;
        };
        i += 2;
        match next {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0C),
            b'0'..=b'7' => {
                let mut value = u32::from(next - b'0');
                let mut digits = 1;
                while digits < 3 {
                    match raw.get(i) {
                        Some(&d @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(d - b'0');
                            i += 1;
                            digits += 1;
                        }
                        _ => break,
                    }
                }
                out.push((value & 0xFF) as u8);
            }
            // line continuation
            b'\n' => {}
            b'\r' => {
                if raw.get(i) == Some(&b'\n') {
                    i += 1;
                }
            }
            other => out.push(other),
        }
    }

    latin1(&out)
}

/// Decodes a hex string body. UTF-16BE with a BOM first, then UTF-8 when that
/// yields no control characters, otherwise byte-wise keeping printable ranges.
pub fn decode_hex_string(raw: &[u8]) -> Option<String> {
    let mut digits: Vec<u8> = raw
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    if digits.len() % 2 == 1 {
        digits.push(b'0');
    }

    let bytes: Vec<u8> = digits
        .chunks(2)
        .map(|pair| (hex_value(pair[0]) << 4) | hex_value(pair[1]))
        .collect();

    let decoded = if bytes.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = bytes[2..]
            .chunks(2)
            .filter(|c| c.len() == 2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        match std::str::from_utf8(&bytes) {
            Ok(text) if !text.chars().any(|c| c.is_control() && !c.is_whitespace()) => {
                text.to_string()
            }
            _ => bytes
                .iter()
                .filter(|&&b| matches!(b, 32..=126 | 160..=255))
                .map(|&b| b as char)
                .collect(),
        }
    };

    let trimmed = decoded.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        b'A'..=b'F' => digit - b'A' + 10,
        _ => 0,
    }
}
