//! Tokenizer for PDF content streams and object syntax.
//!
//! Only what the text passes need: string operands, numbers, array brackets
//! and operators. Names, dictionaries and stray bytes collapse into
//! [`Token::Other`]. Comments are skipped. String literals are read with
//! [`literal_at`], so operators inside a literal are never seen as operators.

use super::literal::{literal_at, Literal};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token<'a> {
    /// Body of a `( … )` literal, escapes unresolved.
    Literal(&'a [u8]),
    /// Digits of a `< … >` hex string.
    Hex(&'a [u8]),
    Number(f32),
    ArrayStart,
    ArrayEnd,
    Operator(&'a [u8]),
    Other,
}

/// Yields `(offset, token)` pairs; `offset` is where the token starts.
pub struct Lexer<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(&b) = self.bytes.get(self.pos) {
            if is_whitespace(b) {
                self.pos += 1;
            } else if b == b'%' {
                while self
                    .bytes
                    .get(self.pos)
                    .is_some_and(|&b| b != b'\n' && b != b'\r')
                {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn hex_string(&self, open: usize) -> Option<(&'a [u8], usize)> {
        let digits_start = open + 1;
        let mut i = digits_start;
        while self
            .bytes
            .get(i)
            .is_some_and(|&b| b.is_ascii_hexdigit() || is_whitespace(b))
        {
            i += 1;
        }
        (self.bytes.get(i) == Some(&b'>')).then(|| (&self.bytes[digits_start..i], i + 1))
    }

    fn regular_run(&self, start: usize) -> usize {
        let mut end = start;
        while self
            .bytes
            .get(end)
            .is_some_and(|&b| !is_whitespace(b) && !is_delimiter(b))
        {
            end += 1;
        }
        end
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = (usize, Token<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_whitespace_and_comments();
        let start = self.pos;
        let b = *self.bytes.get(start)?;

        let token = match b {
            b'(' => match literal_at(self.bytes, start) {
                Some(Literal { body, end }) => {
                    self.pos = end;
                    Token::Literal(body)
                }
                None => {
                    self.pos += 1;
                    Token::Other
                }
            },
            b'<' | b'>' if self.bytes.get(start + 1) == Some(&b) => {
                self.pos += 2;
                Token::Other
            }
            b'<' => match self.hex_string(start) {
                Some((digits, end)) => {
                    self.pos = end;
                    Token::Hex(digits)
                }
                None => {
                    self.pos += 1;
                    Token::Other
                }
            },
            b'[' => {
                self.pos += 1;
                Token::ArrayStart
            }
            b']' => {
                self.pos += 1;
                Token::ArrayEnd
            }
            b'/' => {
                self.pos = self.regular_run(start + 1);
                Token::Other
            }
            b'\'' | b'"' => {
                self.pos += 1;
                Token::Operator(&self.bytes[start..start + 1])
            }
            _ if is_delimiter(b) => {
                self.pos += 1;
                Token::Other
            }
            _ => {
                let end = self.regular_run(start);
                self.pos = end;
                let word = &self.bytes[start..end];
                match parse_number(word) {
                    Some(number) => Token::Number(number),
                    None => Token::Operator(word),
                }
            }
        };
        Some((start, token))
    }
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | 0x0C | 0x00)
}

fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn parse_number(word: &[u8]) -> Option<f32> {
    if !word
        .iter()
        .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.'))
    {
        return None;
    }
    std::str::from_utf8(word).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(bytes: &[u8]) -> Vec<Token<'_>> {
        Lexer::new(bytes).map(|(_, token)| token).collect()
    }

    #[test]
    fn test_show_text_sequence() {
        assert_eq!(
            tokens(b"BT /F1 12 Tf (Jane) Tj ET"),
            vec![
                Token::Operator(b"BT"),
                Token::Other,
                Token::Number(12.0),
                Token::Operator(b"Tf"),
                Token::Literal(b"Jane"),
                Token::Operator(b"Tj"),
                Token::Operator(b"ET"),
            ]
        );
    }

    #[test]
    fn test_operators_inside_literals_stay_literal() {
        assert_eq!(
            tokens(b"(ET Group (BT)) Tj"),
            vec![Token::Literal(b"ET Group (BT)"), Token::Operator(b"Tj")]
        );
    }

    #[test]
    fn test_arrays_hex_and_dictionaries() {
        assert_eq!(
            tokens(b"<< /Length 5 >> [(A) -250 <4D>] TJ"),
            vec![
                Token::Other,
                Token::Other,
                Token::Number(5.0),
                Token::Other,
                Token::ArrayStart,
                Token::Literal(b"A"),
                Token::Number(-250.0),
                Token::Hex(b"4D"),
                Token::ArrayEnd,
                Token::Operator(b"TJ"),
            ]
        );
    }

    #[test]
    fn test_comments_and_quote_operators() {
        assert_eq!(
            tokens(b"% (hidden) Tj\n(Berlin) '"),
            vec![Token::Literal(b"Berlin"), Token::Operator(b"'")]
        );
    }

    #[test]
    fn test_offsets_point_at_token_start() {
        let offsets: Vec<usize> = Lexer::new(b"BT  (x) Tj").map(|(offset, _)| offset).collect();
        assert_eq!(offsets, vec![0, 4, 8]);
    }
}
