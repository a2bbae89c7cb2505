use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::extraction::ocr::OcrSettings;
use crate::extraction::ExtractionLimits;
use crate::llm_client::LlmSettings;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub port: u16,
    pub rust_log: String,
    pub min_text_chars: usize,
    pub docx_raw_accept_chars: usize,
    pub max_upload_bytes: usize,
    pub reveal_delay_ms: u64,
    pub llm_timeout_secs: u64,
    pub llm_max_attempts: u32,
    pub ocr_pdftoppm_bin: String,
    pub ocr_tesseract_bin: String,
    pub ocr_language: String,
    pub ocr_dpi: u32,
    pub ocr_max_pages: u32,
    pub ocr_scratch_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = Env(&lookup);

        Ok(Config {
            gemini_api_key: env.require("GEMINI_API_KEY")?,
            gemini_model: env.string_or("GEMINI_MODEL", "gemini-1.5-flash"),
            port: env.parse_or("PORT", 8080)?,
            rust_log: env.string_or("RUST_LOG", "info"),
            min_text_chars: env.parse_or("MIN_TEXT_CHARS", 50)?,
            docx_raw_accept_chars: env.parse_or("DOCX_RAW_ACCEPT_CHARS", 100)?,
            max_upload_bytes: env.parse_or("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            reveal_delay_ms: env.parse_or("REVEAL_DELAY_MS", 300)?,
            llm_timeout_secs: env.parse_or("LLM_TIMEOUT_SECS", 60)?,
            llm_max_attempts: env.parse_or("LLM_MAX_ATTEMPTS", 2)?,
            ocr_pdftoppm_bin: env.string_or("OCR_PDFTOPPM_BIN", "pdftoppm"),
            ocr_tesseract_bin: env.string_or("OCR_TESSERACT_BIN", "tesseract"),
            ocr_language: env.string_or("OCR_LANGUAGE", "eng"),
            ocr_dpi: env.parse_or("OCR_DPI", 300)?,
            ocr_max_pages: env.parse_or("OCR_MAX_PAGES", 5)?,
            ocr_scratch_dir: env.get("OCR_SCRATCH_DIR").map(PathBuf::from),
        })
    }

    pub fn extraction_limits(&self) -> ExtractionLimits {
        ExtractionLimits {
            min_text_chars: self.min_text_chars,
            docx_raw_accept_chars: self.docx_raw_accept_chars,
        }
    }

    pub fn ocr_settings(&self) -> OcrSettings {
        OcrSettings {
            pdftoppm_bin: self.ocr_pdftoppm_bin.clone(),
            tesseract_bin: self.ocr_tesseract_bin.clone(),
            language: self.ocr_language.clone(),
            dpi: self.ocr_dpi,
            max_pages: self.ocr_max_pages,
            scratch_root: self.ocr_scratch_dir.clone(),
        }
    }

    pub fn llm_settings(&self) -> LlmSettings {
        LlmSettings {
            api_key: self.gemini_api_key.clone(),
            model: self.gemini_model.clone(),
            timeout: Duration::from_secs(self.llm_timeout_secs),
            max_attempts: self.llm_max_attempts,
        }
    }

    pub fn reveal_delay(&self) -> Duration {
        Duration::from_millis(self.reveal_delay_ms)
    }
}

struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    fn require(&self, key: &str) -> Result<String> {
        self.get(key)
            .with_context(|| format!("Required environment variable '{key}' is not set"))
    }

    fn string_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match self.get(key) {
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .with_context(|| format!("{key} has an invalid value '{raw}'")),
            None => Ok(default),
        }
    }
}
