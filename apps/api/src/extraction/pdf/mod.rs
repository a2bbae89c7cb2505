//! Byte-level PDF text extraction.
//!
//! There is no layout engine here. The buffer is scanned by a fixed list of
//! independent [`TextPass`] heuristics (literal strings, text objects, stream
//! contents, hex strings, …); their fragments are folded into an
//! order-preserving set keyed by trimmed value and normalized. When the
//! structured passes come up short, a blunt token scan runs as a last resort.
//!
//! The same bytes always produce the same text: no pass keeps state between
//! calls.

pub mod lexer;
pub mod literal;
pub mod passes;

use std::collections::HashSet;
use std::io::Read;

use flate2::read::ZlibDecoder;
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use tracing::{debug, warn};

use crate::extraction::normalize::normalize_pdf_text;
use crate::extraction::{char_len, ExtractionError, ExtractionMethod};

pub use passes::{default_passes, AggressiveTokenScan, TextPass};

/// Upper bound on a single inflated stream.
const MAX_INFLATED_BYTES: usize = 16 * 1024 * 1024;
/// Upper bound on all inflated streams of one document together.
const INFLATE_BUDGET_BYTES: usize = 32 * 1024 * 1024;
/// How far back from `stream` to look for the owning object's dictionary.
const DICTIONARY_LOOKBACK: usize = 4096;

static STREAM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s-u)\bstream\r?\n(.*?)endstream").expect("valid stream regex"));

/// A `stream … endstream` block with the dictionary that precedes it.
#[derive(Debug, Clone)]
pub struct PdfStream {
    pub dictionary: Vec<u8>,
    pub body: Vec<u8>,
    /// Inflated body for `/FlateDecode` streams that are not images.
    pub decoded: Option<Vec<u8>>,
}

impl PdfStream {
    fn dictionary_has(&self, token: &[u8]) -> bool {
        contains(&self.dictionary, token)
    }

    pub fn is_image(&self) -> bool {
        self.dictionary_has(b"/Image")
    }

    pub fn is_form_xobject(&self) -> bool {
        self.dictionary_has(b"/XObject") && self.dictionary_has(b"/Form")
    }

    /// Filtered, image, or mostly non-printable bodies are opaque binary.
    pub fn is_binary(&self) -> bool {
        self.dictionary_has(b"/Filter") || self.is_image() || !looks_textual(&self.body)
    }

    /// Body to scan as content: the inflated body when available, the raw body
    /// when it is plain text, nothing otherwise.
    pub fn content(&self) -> Option<&[u8]> {
        match &self.decoded {
            Some(decoded) => Some(decoded),
            None if !self.is_binary() => Some(&self.body),
            None => None,
        }
    }
}

/// Pre-scanned view of a PDF buffer shared by every pass.
#[derive(Debug, Clone)]
pub struct PdfSource {
    /// The original bytes with opaque binary stream bodies blanked out.
    surface: Vec<u8>,
    streams: Vec<PdfStream>,
}

impl PdfSource {
    pub fn new(bytes: &[u8]) -> Self {
        Self::with_inflate_budget(bytes, INFLATE_BUDGET_BYTES)
    }

    /// Scans `bytes`, inflating compressed streams until `budget` decoded
    /// bytes have been produced. Later streams stay compressed.
    pub fn with_inflate_budget(bytes: &[u8], mut budget: usize) -> Self {
        let mut surface = bytes.to_vec();
        let mut streams = Vec::new();
        let mut skipped = 0usize;

        for caps in STREAM_RE.captures_iter(bytes) {
            let Some(body) = caps.get(1) else { continue };
            let dictionary = owning_dictionary(bytes, body.start());
            let mut stream = PdfStream {
                dictionary: dictionary.to_vec(),
                body: body.as_bytes().to_vec(),
                decoded: None,
            };
            if stream.dictionary_has(b"/FlateDecode") && !stream.is_image() {
                if budget == 0 {
                    skipped += 1;
                } else {
                    stream.decoded = inflate(&stream.body, budget.min(MAX_INFLATED_BYTES));
                    budget -= stream.decoded.as_ref().map_or(0, Vec::len);
                }
            }
            if stream.is_binary() {
                surface[body.range()].fill(b' ');
            }
            streams.push(stream);
        }
        if skipped > 0 {
            warn!(skipped, "Inflate budget spent, compressed streams left undecoded");
        }

        Self { surface, streams }
    }

    /// The buffer with binary stream bodies blanked.
    pub fn surface(&self) -> &[u8] {
        &self.surface
    }

    pub fn streams(&self) -> &[PdfStream] {
        &self.streams
    }

    /// Everything content passes should read: the surface first, then every
    /// inflated stream body in document order.
    pub fn segments(&self) -> impl Iterator<Item = &[u8]> {
        std::iter::once(self.surface.as_slice()).chain(
            self.streams
                .iter()
                .filter_map(|s| s.decoded.as_deref()),
        )
    }
}

/// Runs every pass over a PDF and merges the result.
pub struct PdfTextExtractor {
    passes: Vec<Box<dyn TextPass>>,
    fallback: AggressiveTokenScan,
    min_text_chars: usize,
}

impl PdfTextExtractor {
    pub fn new(min_text_chars: usize) -> Self {
        Self {
            passes: default_passes(),
            fallback: AggressiveTokenScan,
            min_text_chars,
        }
    }

    /// Extracts normalized text, or `InsufficientText` when even the
    /// aggressive scan cannot reach the threshold.
    pub fn extract(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let source = PdfSource::new(bytes);
        debug!(
            bytes = bytes.len(),
            streams = source.streams().len(),
            "Scanning PDF buffer"
        );

        let mut fragments = FragmentSet::default();
        for pass in &self.passes {
            let found = pass.extract(&source);
            let added = fragments.extend(found);
            debug!(pass = pass.name(), added, "PDF pass finished");
        }

        let mut text = normalize_pdf_text(&fragments.joined());
        if char_len(&text) < self.min_text_chars {
            // Tokens already present in structured output would only repeat it.
            let existing = fragments.joined();
            let tokens: Vec<String> = self
                .fallback
                .extract(&source)
                .into_iter()
                .filter(|token| !existing.contains(token.as_str()))
                .collect();
            let added = fragments.extend(tokens);
            debug!(
                pass = self.fallback.name(),
                added, "Structured passes insufficient, ran aggressive scan"
            );
            text = normalize_pdf_text(&fragments.joined());
        }

        let chars = char_len(&text);
        if chars < self.min_text_chars {
            return Err(ExtractionError::InsufficientText {
                method: ExtractionMethod::PdfByteLevel,
                chars,
                required: self.min_text_chars,
            });
        }
        Ok(text)
    }
}

/// Insertion-ordered set of fragments keyed by their trimmed value.
#[derive(Debug, Default)]
pub struct FragmentSet {
    seen: HashSet<String>,
    ordered: Vec<String>,
}

impl FragmentSet {
    /// Adds fragments, skipping blanks and duplicates. Returns how many were new.
    pub fn extend<I>(&mut self, fragments: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let mut added = 0;
        for fragment in fragments {
            let trimmed = fragment.trim();
            if trimmed.is_empty() || self.seen.contains(trimmed) {
                continue;
            }
            self.seen.insert(trimmed.to_string());
            self.ordered.push(trimmed.to_string());
            added += 1;
        }
        added
    }

    pub fn joined(&self) -> String {
        self.ordered.join(" ")
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// The bytes between the last `obj` keyword and the `stream` keyword.
fn owning_dictionary(bytes: &[u8], body_start: usize) -> &[u8] {
    let window_start = body_start.saturating_sub(DICTIONARY_LOOKBACK);
    let window = &bytes[window_start..body_start];
    let from = window
        .windows(3)
        .rposition(|w| w == b"obj")
        .map(|pos| pos + 3)
        .unwrap_or(0);
    &window[from..]
}

fn looks_textual(body: &[u8]) -> bool {
    if body.is_empty() {
        return true;
    }
    let printable = body
        .iter()
        .filter(|&&b| b.is_ascii_graphic() || b.is_ascii_whitespace())
        .count();
    printable * 10 >= body.len() * 9
}

fn inflate(body: &[u8], limit: usize) -> Option<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(body).take(limit as u64);
    let mut out = Vec::new();
    // Truncated streams still yield their decodable prefix.
    let _ = decoder.read_to_end(&mut out);
    (!out.is_empty()).then_some(out)
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    const RESUME_STREAM: &[u8] = b"BT /F1 12 Tf 72 720 Td (Jane Doe) Tj 0 -14 Td (jane.doe@example.com) Tj \
0 -14 Td [(Senior ) -250 (Software ) 40 (Engineer)] TJ 0 -14 Td (Experience: Acme Corp 2019-2023) Tj ET";

    #[test]
    fn test_extracts_text_from_plain_content_stream() {
        let pdf = pdf_with_streams(&[RESUME_STREAM]);
        let text = PdfTextExtractor::new(50).extract(&pdf).unwrap();
        assert!(text.contains("Jane Doe"));
        assert!(text.contains("jane.doe@example.com"));
        assert!(text.contains("Senior Software Engineer"));
    }

    #[test]
    fn test_adjacent_literals_before_tj_are_concatenated() {
        let content: &[u8] = b"BT 72 700 Td (John)(Smith) Tj ET BT 72 680 Td (Curriculum vitae of a backend developer from Toronto) Tj ET";
        let pdf = pdf_with_streams(&[content]);
        let text = PdfTextExtractor::new(50).extract(&pdf).unwrap();
        assert!(text.contains("JohnSmith"), "got: {text}");
    }

    #[test]
    fn test_extracts_text_from_compressed_stream() {
        let pdf = pdf_with_compressed_stream(RESUME_STREAM);
        let text = PdfTextExtractor::new(50).extract(&pdf).unwrap();
        assert!(text.contains("Jane Doe"));
        assert!(text.contains("Experience: Acme Corp 2019-2023"));
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let pdf = pdf_with_compressed_stream(RESUME_STREAM);
        let extractor = PdfTextExtractor::new(50);
        let first = extractor.extract(&pdf).unwrap();
        let second = extractor.extract(&pdf).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_image_only_pdf_is_insufficient() {
        let err = PdfTextExtractor::new(50)
            .extract(&image_only_pdf())
            .unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::InsufficientText {
                method: ExtractionMethod::PdfByteLevel,
                required: 50,
                ..
            }
        ));
    }

    #[test]
    fn test_threshold_boundary() {
        // 50 chars exactly
        let fifty = "A".repeat(25) + " " + &"B".repeat(24);
        assert_eq!(fifty.chars().count(), 50);
        let content = format!("BT ({fifty}) Tj ET");
        let pdf = pdf_with_streams(&[content.as_bytes()]);
        assert_eq!(PdfTextExtractor::new(50).extract(&pdf).unwrap(), fifty);
        assert!(PdfTextExtractor::new(51).extract(&pdf).is_err());

        let forty_nine = "A".repeat(24) + " " + &"B".repeat(24);
        let content = format!("BT ({forty_nine}) Tj ET");
        let pdf = pdf_with_streams(&[content.as_bytes()]);
        assert!(matches!(
            PdfTextExtractor::new(50).extract(&pdf),
            Err(ExtractionError::InsufficientText { chars: 49, .. })
        ));
    }

    #[test]
    fn test_binary_stream_bodies_are_blanked_on_surface() {
        let source = PdfSource::new(&image_only_pdf());
        assert_eq!(source.streams().len(), 1);
        assert!(source.streams()[0].is_binary());
        assert!(!source.surface().iter().any(|&b| b >= 0x80));
    }

    #[test]
    fn test_dictionary_is_scoped_to_owning_object() {
        let pdf = pdf_with_compressed_stream(b"BT (x) Tj ET");
        let source = PdfSource::new(&pdf);
        let stream = &source.streams()[0];
        assert!(stream.dictionary_has(b"/FlateDecode"));
        assert_eq!(stream.decoded.as_deref(), Some(&b"BT (x) Tj ET"[..]));
    }

    #[test]
    fn test_nested_parentheses_keep_surrounding_text() {
        let pdf = pdf_with_streams(&[
            b"BT 72 700 Td (Software Engineer (Backend Platform Team) at Acme Corporation Berlin) Tj ET",
        ]);
        assert_eq!(
            PdfTextExtractor::new(10).extract(&pdf).unwrap(),
            "Software Engineer (Backend Platform Team) at Acme Corporation Berlin"
        );
    }

    #[test]
    fn test_inflate_budget_caps_total_decoded_bytes() {
        let body = vec![b' '; 1000];
        let pdf = pdf_with_compressed_streams(&[&body, &body, &body]);
        let source = PdfSource::with_inflate_budget(&pdf, 1500);

        let decoded: Vec<usize> = source
            .streams()
            .iter()
            .map(|s| s.decoded.as_ref().map_or(0, Vec::len))
            .collect();
        assert_eq!(decoded, vec![1000, 500, 0]);
        assert!(source.streams()[2].decoded.is_none());
    }

    #[test]
    fn test_fragment_set_dedups_by_trimmed_value() {
        let mut set = FragmentSet::default();
        let added = set.extend(vec![
            " Jane ".to_string(),
            "Jane".to_string(),
            "   ".to_string(),
            "Doe".to_string(),
        ]);
        assert_eq!(added, 2);
        assert_eq!(set.joined(), "Jane Doe");
    }
}
