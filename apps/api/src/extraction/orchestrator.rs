//! Format dispatch and fallback chains.
//!
//! Every supported format except plain text runs an ordered list of strategies.
//! The chain keeps the longest candidate seen so far and stops as soon as that
//! candidate reaches the acceptance threshold of the step that produced it or
//! of a later step.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::extraction::normalize::clean_document_text;
use crate::extraction::ocr::OcrEngine;
use crate::extraction::pdf::PdfTextExtractor;
use crate::extraction::{
    char_len, docx, DocumentKind, ExtractedText, ExtractionError, ExtractionLimits,
    ExtractionMethod, RawDocument,
};

/// One way of turning document bytes into text.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    fn method(&self) -> ExtractionMethod;

    /// Candidate length at which the chain stops after this step.
    fn accept_chars(&self) -> usize;

    async fn attempt(&self, bytes: Bytes) -> anyhow::Result<String>;
}

/// Runs CPU-bound parsing off the async executor.
async fn blocking<F>(bytes: Bytes, parse: F) -> anyhow::Result<String>
where
    F: FnOnce(&[u8]) -> anyhow::Result<String> + Send + 'static,
{
    tokio::task::spawn_blocking(move || parse(&bytes))
        .await
        .context("extraction task panicked")?
}

// ────────────────────────────────────────────────────────────────────────────
// Strategies
// ────────────────────────────────────────────────────────────────────────────

struct PdfByteLevel {
    min_text_chars: usize,
}

#[async_trait]
impl ExtractionStrategy for PdfByteLevel {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::PdfByteLevel
    }

    fn accept_chars(&self) -> usize {
        self.min_text_chars
    }

    async fn attempt(&self, bytes: Bytes) -> anyhow::Result<String> {
        let min_text_chars = self.min_text_chars;
        blocking(bytes, move |bytes| {
            Ok(PdfTextExtractor::new(min_text_chars).extract(bytes)?)
        })
        .await
    }
}

struct Ocr {
    engine: Arc<dyn OcrEngine>,
    min_text_chars: usize,
}

#[async_trait]
impl ExtractionStrategy for Ocr {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Ocr
    }

    fn accept_chars(&self) -> usize {
        self.min_text_chars
    }

    async fn attempt(&self, bytes: Bytes) -> anyhow::Result<String> {
        Ok(self.engine.recognize(&bytes).await?)
    }
}

struct DocxRawText {
    accept_chars: usize,
}

#[async_trait]
impl ExtractionStrategy for DocxRawText {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::DocxRawText
    }

    fn accept_chars(&self) -> usize {
        self.accept_chars
    }

    async fn attempt(&self, bytes: Bytes) -> anyhow::Result<String> {
        blocking(bytes, |bytes| Ok(docx::raw_text(bytes)?)).await
    }
}

struct DocxHtml {
    min_text_chars: usize,
}

#[async_trait]
impl ExtractionStrategy for DocxHtml {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::DocxHtml
    }

    fn accept_chars(&self) -> usize {
        self.min_text_chars
    }

    async fn attempt(&self, bytes: Bytes) -> anyhow::Result<String> {
        blocking(bytes, |bytes| Ok(docx::html_text(bytes)?)).await
    }
}

struct DocxBinaryScan {
    min_text_chars: usize,
}

#[async_trait]
impl ExtractionStrategy for DocxBinaryScan {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::DocxBinaryScan
    }

    fn accept_chars(&self) -> usize {
        self.min_text_chars
    }

    async fn attempt(&self, bytes: Bytes) -> anyhow::Result<String> {
        blocking(bytes, |bytes| Ok(docx::binary_scan(bytes))).await
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Fallback chain
// ────────────────────────────────────────────────────────────────────────────

enum ChainState {
    Trying(usize),
    Success(ExtractedText),
    NextStrategy(usize),
    Exhausted,
}

struct Candidate {
    text: String,
    chars: usize,
    method: ExtractionMethod,
}

pub struct FallbackChain {
    kind: DocumentKind,
    strategies: Vec<Box<dyn ExtractionStrategy>>,
    min_text_chars: usize,
}

impl FallbackChain {
    pub fn new(
        kind: DocumentKind,
        strategies: Vec<Box<dyn ExtractionStrategy>>,
        min_text_chars: usize,
    ) -> Self {
        Self {
            kind,
            strategies,
            min_text_chars,
        }
    }

    pub async fn run(&self, bytes: &Bytes) -> Result<ExtractedText, ExtractionError> {
        let mut attempted = Vec::with_capacity(self.strategies.len());
        let mut best: Option<Candidate> = None;
        let mut last_reason = "no extraction strategy applies".to_string();
        let mut state = ChainState::Trying(0);

        loop {
            state = match state {
                ChainState::Trying(index) => {
                    let Some(strategy) = self.strategies.get(index) else {
                        state = ChainState::Exhausted;
                        continue;
                    };
                    let method = strategy.method();
                    attempted.push(method);

                    match strategy.attempt(bytes.clone()).await {
                        Ok(text) => {
                            let chars = char_len(&text);
                            debug!(%method, chars, "Extraction strategy finished");
                            if best.as_ref().map_or(true, |b| chars > b.chars) {
                                best = Some(Candidate { text, chars, method });
                            }
                            let best_chars = best.as_ref().map_or(0, |b| b.chars);

                            if best_chars >= strategy.accept_chars() {
                                match best.take() {
                                    Some(candidate) => ChainState::Success(ExtractedText {
                                        text: candidate.text,
                                        method: candidate.method,
                                        attempted: attempted.clone(),
                                    }),
                                    None => ChainState::NextStrategy(index),
                                }
                            } else {
                                last_reason = ExtractionError::InsufficientText {
                                    method,
                                    chars,
                                    required: strategy.accept_chars(),
                                }
                                .to_string();
                                ChainState::NextStrategy(index)
                            }
                        }
                        Err(e) => {
                            last_reason = format!("{method} failed: {e:#}");
                            ChainState::NextStrategy(index)
                        }
                    }
                }
                ChainState::NextStrategy(index) => {
                    if index + 1 < self.strategies.len() {
                        warn!(
                            kind = %self.kind,
                            reason = %last_reason,
                            "Extraction strategy fell short, trying next"
                        );
                    }
                    ChainState::Trying(index + 1)
                }
                ChainState::Success(extracted) => {
                    info!(
                        kind = %self.kind,
                        method = %extracted.method,
                        chars = extracted.char_count(),
                        attempts = extracted.attempted.len(),
                        "Document text extracted"
                    );
                    return Ok(extracted);
                }
                ChainState::Exhausted => {
                    // A candidate above the floor but below its own step threshold still wins
                    if let Some(candidate) = best.take() {
                        if candidate.chars >= self.min_text_chars {
                            state = ChainState::Success(ExtractedText {
                                text: candidate.text,
                                method: candidate.method,
                                attempted: attempted.clone(),
                            });
                            continue;
                        }
                    }
                    warn!(kind = %self.kind, reason = %last_reason, "All extraction strategies failed");
                    return Err(ExtractionError::ExtractionFailed {
                        kind: self.kind,
                        reason: last_reason,
                    });
                }
            };
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Orchestrator
// ────────────────────────────────────────────────────────────────────────────

/// Single entry point from raw upload to normalized text.
pub struct Orchestrator {
    limits: ExtractionLimits,
    ocr: Arc<dyn OcrEngine>,
}

impl Orchestrator {
    pub fn new(limits: ExtractionLimits, ocr: Arc<dyn OcrEngine>) -> Self {
        Self { limits, ocr }
    }

    pub async fn extract(&self, document: &RawDocument) -> Result<ExtractedText, ExtractionError> {
        let kind = DocumentKind::detect(&document.mime_type, &document.file_name);
        info!(
            file_name = %document.file_name,
            mime_type = %document.mime_type,
            %kind,
            bytes = document.bytes.len(),
            "Extracting document text"
        );

        match kind {
            DocumentKind::Unsupported => Err(ExtractionError::UnsupportedFileType {
                mime_type: if document.mime_type.is_empty() {
                    "unknown".to_string()
                } else {
                    document.mime_type.clone()
                },
            }),
            DocumentKind::PlainText => read_plain_text(&document.bytes),
            DocumentKind::Pdf => self.pdf_chain().run(&document.bytes).await,
            DocumentKind::Docx => self.docx_chain().run(&document.bytes).await,
        }
    }

    fn pdf_chain(&self) -> FallbackChain {
        let min = self.limits.min_text_chars;
        FallbackChain::new(
            DocumentKind::Pdf,
            vec![
                Box::new(PdfByteLevel { min_text_chars: min }),
                Box::new(Ocr {
                    engine: self.ocr.clone(),
                    min_text_chars: min,
                }),
            ],
            min,
        )
    }

    fn docx_chain(&self) -> FallbackChain {
        let min = self.limits.min_text_chars;
        FallbackChain::new(
            DocumentKind::Docx,
            vec![
                Box::new(DocxRawText {
                    accept_chars: self.limits.docx_raw_accept_chars,
                }),
                Box::new(DocxHtml { min_text_chars: min }),
                Box::new(DocxBinaryScan { min_text_chars: min }),
            ],
            min,
        )
    }
}

fn read_plain_text(bytes: &[u8]) -> Result<ExtractedText, ExtractionError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let text = clean_document_text(&String::from_utf8_lossy(bytes));
    if text.is_empty() {
        return Err(ExtractionError::ExtractionFailed {
            kind: DocumentKind::PlainText,
            reason: "the file contains no text".to_string(),
        });
    }
    Ok(ExtractedText {
        text,
        method: ExtractionMethod::PlainText,
        attempted: vec![ExtractionMethod::PlainText],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::docx::fixtures::docx_with_paragraphs;
    use crate::extraction::ocr::fakes::FakeOcr;
    use crate::extraction::pdf::fixtures::{image_only_pdf, pdf_with_streams};
    use crate::extraction::{DOCX_MIME, PDF_MIME, TEXT_MIME};

    fn orchestrator(ocr: Arc<FakeOcr>) -> Orchestrator {
        Orchestrator::new(ExtractionLimits::default(), ocr)
    }

    fn text_of_len(len: usize) -> String {
        "abcdefghij".repeat(len / 10 + 1)[..len].to_string()
    }

    #[tokio::test]
    async fn test_plain_text_is_returned_as_is() {
        let ocr = Arc::new(FakeOcr::failing());
        let doc = RawDocument::new("Jane Doe jane@x.com", TEXT_MIME, "cv.txt");

        let extracted = orchestrator(ocr).extract(&doc).await.unwrap();
        assert_eq!(extracted.text, "Jane Doe jane@x.com");
        assert_eq!(extracted.method, ExtractionMethod::PlainText);
        assert_eq!(extracted.attempted, vec![ExtractionMethod::PlainText]);
    }

    #[tokio::test]
    async fn test_plain_text_drops_bom() {
        let ocr = Arc::new(FakeOcr::failing());
        let doc = RawDocument::new(b"\xEF\xBB\xBFJane Doe".to_vec(), TEXT_MIME, "cv.txt");
        assert_eq!(orchestrator(ocr).extract(&doc).await.unwrap().text, "Jane Doe");
    }

    #[tokio::test]
    async fn test_empty_plain_text_fails() {
        let ocr = Arc::new(FakeOcr::failing());
        let doc = RawDocument::new(" \n\t ", TEXT_MIME, "cv.txt");
        let err = orchestrator(ocr).extract(&doc).await.unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::ExtractionFailed {
                kind: DocumentKind::PlainText,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_unsupported_type_never_touches_bytes() {
        let ocr = Arc::new(FakeOcr::returning(&text_of_len(200)));
        let doc = RawDocument::new(image_only_pdf(), "image/png", "scan.png");

        let err = orchestrator(ocr.clone()).extract(&doc).await.unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::UnsupportedFileType { ref mime_type } if mime_type == "image/png"
        ));
        assert_eq!(ocr.call_count(), 0);
    }

    #[tokio::test]
    async fn test_text_pdf_skips_ocr() {
        let ocr = Arc::new(FakeOcr::returning("should not be used"));
        let pdf = pdf_with_streams(&[
            b"BT /F1 12 Tf (Jane Doe, Senior Software Engineer at Acme Corporation, Berlin) Tj ET",
        ]);
        let doc = RawDocument::new(pdf, PDF_MIME, "cv.pdf");

        let extracted = orchestrator(ocr.clone()).extract(&doc).await.unwrap();
        assert_eq!(extracted.method, ExtractionMethod::PdfByteLevel);
        assert_eq!(extracted.attempted, vec![ExtractionMethod::PdfByteLevel]);
        assert!(extracted.text.contains("Senior Software Engineer"));
        assert_eq!(ocr.call_count(), 0);
    }

    #[tokio::test]
    async fn test_scanned_pdf_falls_back_to_ocr() {
        let ocr_text = "Jane Doe\nSenior Software Engineer\nAcme Corporation, Berlin 2019-2024";
        let ocr = Arc::new(FakeOcr::returning(ocr_text));
        let doc = RawDocument::new(image_only_pdf(), PDF_MIME, "scan.pdf");

        let extracted = orchestrator(ocr.clone()).extract(&doc).await.unwrap();
        assert_eq!(extracted.method, ExtractionMethod::Ocr);
        assert_eq!(
            extracted.attempted,
            vec![ExtractionMethod::PdfByteLevel, ExtractionMethod::Ocr]
        );
        assert_eq!(extracted.text, ocr_text);
        assert_eq!(ocr.call_count(), 1);
    }

    #[tokio::test]
    async fn test_scanned_pdf_with_short_ocr_fails() {
        let ocr = Arc::new(FakeOcr::returning("Jane Doe"));
        let doc = RawDocument::new(image_only_pdf(), PDF_MIME, "scan.pdf");

        let err = orchestrator(ocr).extract(&doc).await.unwrap_err();
        match err {
            ExtractionError::ExtractionFailed { kind, reason } => {
                assert_eq!(kind, DocumentKind::Pdf);
                assert!(reason.contains("ocr"), "{reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ocr_engine_error_is_terminal() {
        let ocr = Arc::new(FakeOcr::failing());
        let doc = RawDocument::new(image_only_pdf(), PDF_MIME, "scan.pdf");

        let err = orchestrator(ocr).extract(&doc).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("selectable text"), "{message}");
    }

    #[tokio::test]
    async fn test_docx_raw_text_short_circuits() {
        let ocr = Arc::new(FakeOcr::failing());
        let paragraph = text_of_len(200);
        let doc = RawDocument::new(docx_with_paragraphs(&[paragraph.as_str()]), DOCX_MIME, "cv.docx");

        let extracted = orchestrator(ocr).extract(&doc).await.unwrap();
        assert_eq!(extracted.method, ExtractionMethod::DocxRawText);
        assert_eq!(extracted.attempted, vec![ExtractionMethod::DocxRawText]);
        assert_eq!(extracted.char_count(), 200);
    }

    #[tokio::test]
    async fn test_docx_raw_accept_boundary() {
        let ocr = Arc::new(FakeOcr::failing());
        let orchestrator = orchestrator(ocr);

        let exact = text_of_len(100);
        let doc = RawDocument::new(docx_with_paragraphs(&[exact.as_str()]), DOCX_MIME, "cv.docx");
        let extracted = orchestrator.extract(&doc).await.unwrap();
        assert_eq!(extracted.attempted, vec![ExtractionMethod::DocxRawText]);

        let short = text_of_len(99);
        let doc = RawDocument::new(docx_with_paragraphs(&[short.as_str()]), DOCX_MIME, "cv.docx");
        let extracted = orchestrator.extract(&doc).await.unwrap();
        assert_eq!(
            extracted.attempted,
            vec![ExtractionMethod::DocxRawText, ExtractionMethod::DocxHtml]
        );
        assert_eq!(extracted.char_count(), 99);
    }

    #[tokio::test]
    async fn test_corrupt_docx_uses_binary_scan() {
        let ocr = Arc::new(FakeOcr::failing());
        let bytes = b"PK\x00\x00 Jane\x01Doe\x01Senior\x01Software\x01Engineer\x01jane@example.com\x01Berlin\x01Germany";
        let doc = RawDocument::new(bytes.to_vec(), DOCX_MIME, "broken.docx");

        let extracted = orchestrator(ocr).extract(&doc).await.unwrap();
        assert_eq!(extracted.method, ExtractionMethod::DocxBinaryScan);
        assert_eq!(extracted.attempted.len(), 3);
        assert!(extracted.text.contains("jane@example.com"));
    }

    #[tokio::test]
    async fn test_unreadable_docx_fails_with_advice() {
        let ocr = Arc::new(FakeOcr::failing());
        let doc = RawDocument::new(vec![0u8, 1, 2], DOCX_MIME, "broken.docx");

        let err = orchestrator(ocr).extract(&doc).await.unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::ExtractionFailed {
                kind: DocumentKind::Docx,
                ..
            }
        ));
        assert!(err.to_string().contains("password-protected"));
    }
}
