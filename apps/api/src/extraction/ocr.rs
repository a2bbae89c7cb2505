//! OCR fallback for scanned PDFs.
//!
//! Pages are rasterized with poppler's `pdftoppm` and recognized with the
//! `tesseract` CLI. Everything runs in a per-call temporary directory that is
//! removed when the call returns, on success and failure alike. The directory
//! is created under `OcrSettings::scratch_root`, or the system temp dir.

use std::path::{Path, PathBuf};
use std::process::Output;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::extraction::normalize::normalize_pdf_text;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR workspace error: {0}")]
    Workspace(#[from] std::io::Error),

    #[error("{tool} could not be started: {source}")]
    Spawn {
        tool: String,
        source: std::io::Error,
    },

    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("rasterization produced no pages")]
    NoPages,
}

/// Recognizes the text of a rendered PDF.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Returns normalized text for the first pages of the document.
    async fn recognize(&self, pdf_bytes: &[u8]) -> Result<String, OcrError>;
}

#[derive(Debug, Clone)]
pub struct OcrSettings {
    pub pdftoppm_bin: String,
    pub tesseract_bin: String,
    pub language: String,
    pub dpi: u32,
    pub max_pages: u32,
    /// Parent of the per-call working directories.
    pub scratch_root: Option<PathBuf>,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            pdftoppm_bin: "pdftoppm".to_string(),
            tesseract_bin: "tesseract".to_string(),
            language: "eng".to_string(),
            dpi: 300,
            max_pages: 5,
            scratch_root: None,
        }
    }
}

pub struct TesseractOcr {
    settings: OcrSettings,
}

impl TesseractOcr {
    pub fn new(settings: OcrSettings) -> Self {
        Self { settings }
    }

    /// Renders pages 1..=max_pages to PNG files, returned in page order.
    async fn rasterize(&self, pdf_path: &Path, workdir: &Path) -> Result<Vec<PathBuf>, OcrError> {
        let prefix = workdir.join("page");
        let output = Command::new(&self.settings.pdftoppm_bin)
            .arg("-png")
            .arg("-r")
            .arg(self.settings.dpi.to_string())
            .arg("-f")
            .arg("1")
            .arg("-l")
            .arg(self.settings.max_pages.to_string())
            .arg(pdf_path)
            .arg(&prefix)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| OcrError::Spawn {
                tool: self.settings.pdftoppm_bin.clone(),
                source,
            })?;
        check_status(&self.settings.pdftoppm_bin, &output)?;

        let mut pages = Vec::new();
        let mut entries = tokio::fs::read_dir(workdir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "png") {
                pages.push(path);
            }
        }
        // pdftoppm zero-pads page numbers, so lexical order is page order
        pages.sort();

        if pages.is_empty() {
            return Err(OcrError::NoPages);
        }
        Ok(pages)
    }

    async fn recognize_page(&self, image: &Path) -> Result<String, OcrError> {
        let output = Command::new(&self.settings.tesseract_bin)
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.settings.language)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| OcrError::Spawn {
                tool: self.settings.tesseract_bin.clone(),
                source,
            })?;
        check_status(&self.settings.tesseract_bin, &output)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn check_status(tool: &str, output: &Output) -> Result<(), OcrError> {
    if output.status.success() {
        return Ok(());
    }
    Err(OcrError::ToolFailed {
        tool: tool.to_string(),
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, pdf_bytes: &[u8]) -> Result<String, OcrError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("cv-ocr-");
        let workspace = match &self.settings.scratch_root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        let pdf_path = workspace.path().join("input.pdf");
        tokio::fs::write(&pdf_path, pdf_bytes).await?;

        let pages = self.rasterize(&pdf_path, workspace.path()).await?;
        debug!(pages = pages.len(), dpi = self.settings.dpi, "Rasterized PDF for OCR");

        let mut text = String::new();
        for (index, page) in pages.iter().enumerate() {
            match self.recognize_page(page).await {
                Ok(page_text) => {
                    if !text.is_empty() {
                        text.push_str("\n\n");
                    }
                    text.push_str(&page_text);
                }
                // One unreadable page should not sink the rest
                Err(e) => warn!(page = index + 1, error = %e, "OCR failed for page"),
            }
        }

        let text = normalize_pdf_text(&text);
        info!(
            pages = pages.len(),
            chars = text.chars().count(),
            "OCR recognition finished"
        );
        Ok(text)
    }
}
