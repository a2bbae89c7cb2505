// Document text extraction: PDF byte-level heuristics with an OCR fallback,
// DOCX conversion with HTML and binary-scan fallbacks, plain text.
// The orchestrator is the only entry point used by handlers.

pub mod docx;
pub mod normalize;
pub mod ocr;
pub mod orchestrator;
pub mod pdf;

use std::fmt;

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;

pub use orchestrator::Orchestrator;

pub const PDF_MIME: &str = "application/pdf";
pub const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const TEXT_MIME: &str = "text/plain";

/// Acceptance thresholds, in characters of normalized text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionLimits {
    /// Minimum text length for any PDF or DOCX strategy to count as a success.
    pub min_text_chars: usize,
    /// DOCX raw-text conversion short-circuits the chain at this length.
    pub docx_raw_accept_chars: usize,
}

impl Default for ExtractionLimits {
    fn default() -> Self {
        Self {
            min_text_chars: 50,
            docx_raw_accept_chars: 100,
        }
    }
}

/// An uploaded file as received from the client. Consumed once by the orchestrator.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub bytes: Bytes,
    pub mime_type: String,
    pub file_name: String,
}

impl RawDocument {
    pub fn new(bytes: impl Into<Bytes>, mime_type: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
            file_name: file_name.into(),
        }
    }
}

/// Declared document format, resolved once at the orchestrator boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Pdf,
    Docx,
    PlainText,
    Unsupported,
}

impl DocumentKind {
    /// Resolves the kind from the declared MIME type. Falls back to the file
    /// extension only when the browser sent no useful type.
    pub fn detect(mime_type: &str, file_name: &str) -> Self {
        let essence = mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            PDF_MIME => DocumentKind::Pdf,
            DOCX_MIME => DocumentKind::Docx,
            TEXT_MIME => DocumentKind::PlainText,
            "" | "application/octet-stream" => Self::from_extension(file_name),
            _ => DocumentKind::Unsupported,
        }
    }

    fn from_extension(file_name: &str) -> Self {
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "pdf" => DocumentKind::Pdf,
            "docx" => DocumentKind::Docx,
            "txt" => DocumentKind::PlainText,
            _ => DocumentKind::Unsupported,
        }
    }

    /// User-facing advice attached to a terminal extraction failure.
    pub fn failure_advice(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => {
                "Please upload a DOCX or TXT file, or a PDF with selectable text."
            }
            DocumentKind::Docx => {
                "The file may be corrupted, password-protected or image-only. Try saving it as PDF or TXT."
            }
            DocumentKind::PlainText => "The file appears to be empty.",
            DocumentKind::Unsupported => "Supported formats are PDF, DOCX and TXT.",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DocumentKind::Pdf => "PDF",
            DocumentKind::Docx => "DOCX",
            DocumentKind::PlainText => "plain text",
            DocumentKind::Unsupported => "unsupported",
        };
        f.write_str(label)
    }
}

/// Which strategy produced (or was tried for) a piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    PdfByteLevel,
    Ocr,
    DocxRawText,
    DocxHtml,
    DocxBinaryScan,
    PlainText,
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExtractionMethod::PdfByteLevel => "pdf byte-level",
            ExtractionMethod::Ocr => "ocr",
            ExtractionMethod::DocxRawText => "docx raw text",
            ExtractionMethod::DocxHtml => "docx html",
            ExtractionMethod::DocxBinaryScan => "docx binary scan",
            ExtractionMethod::PlainText => "plain text",
        };
        f.write_str(label)
    }
}

/// Normalized text plus provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedText {
    pub text: String,
    pub method: ExtractionMethod,
    /// Every strategy tried, in order. More than one entry means a fallback ran.
    pub attempted: Vec<ExtractionMethod>,
}

impl ExtractedText {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    pub fn used_fallback(&self) -> bool {
        self.attempted.len() > 1
    }
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Unsupported file type '{mime_type}'. Supported formats are PDF, DOCX and TXT.")]
    UnsupportedFileType { mime_type: String },

    #[error("{method} produced {chars} characters, at least {required} required")]
    InsufficientText {
        method: ExtractionMethod,
        chars: usize,
        required: usize,
    },

    #[error("Could not extract text from {kind} file: {reason}. {}", .kind.failure_advice())]
    ExtractionFailed { kind: DocumentKind, reason: String },
}

/// Character count used for every threshold comparison.
pub(crate) fn char_len(text: &str) -> usize {
    text.chars().count()
}
