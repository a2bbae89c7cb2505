use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cv::models::ParsedCvData;
use crate::cv::prompts::{CV_EXTRACTION_PROMPT, CV_EXTRACTION_SYSTEM};
use crate::cv::sanitize::sanitize_cv;
use crate::extraction::ExtractedText;
use crate::llm_client::prompts::{JSON_ONLY_SYSTEM, NO_INVENTION_INSTRUCTION};
use crate::llm_client::{extract_json_object, strip_json_fences, CompletionService, LlmError};

/// Resume text beyond this many characters is cut before prompting.
pub const MAX_PROMPT_TEXT_CHARS: usize = 30_000;

#[derive(Debug, Error)]
pub enum StructuringError {
    #[error("AI response could not be parsed: {0}")]
    AiResponseMalformed(String),

    #[error("AI service unavailable: {0}")]
    AiServiceUnavailable(#[from] LlmError),
}

/// Turns extracted resume text into a complete `ParsedCvData` with one
/// completion call. Malformed output is not retried.
pub async fn structure_cv(
    extracted: &ExtractedText,
    file_name: &str,
    llm: &dyn CompletionService,
) -> Result<ParsedCvData, StructuringError> {
    let prompt = build_prompt(&extracted.text, file_name);
    let system = format!("{JSON_ONLY_SYSTEM} {CV_EXTRACTION_SYSTEM} {NO_INVENTION_INSTRUCTION}");

    info!(
        file_name,
        chars = extracted.char_count(),
        method = %extracted.method,
        "Structuring CV text"
    );
    let completion = llm.complete(&prompt, &system).await?;
    debug!(response_chars = completion.len(), "Received CV completion");

    let cv = parse_completion(&completion)?;
    info!(
        education = cv.education.len(),
        experience = cv.experience.len(),
        projects = cv.projects.len(),
        skills = cv.skills.len(),
        "CV structured"
    );
    Ok(cv)
}

pub fn build_prompt(resume_text: &str, file_name: &str) -> String {
    let resume_text = truncate_chars(resume_text, MAX_PROMPT_TEXT_CHARS);
    // file name first, so resume text containing "{file_name}" stays literal
    CV_EXTRACTION_PROMPT
        .replace("{file_name}", file_name)
        .replace("{resume_text}", resume_text)
}

/// Locates the JSON object in a completion and re-shapes it.
pub fn parse_completion(completion: &str) -> Result<ParsedCvData, StructuringError> {
    let unfenced = strip_json_fences(completion);
    let Some(object) = extract_json_object(unfenced) else {
        warn!(
            preview = %preview(completion),
            "CV completion contained no JSON object"
        );
        return Err(StructuringError::AiResponseMalformed(
            "no JSON object found in the response".to_string(),
        ));
    };

    let value: Value = serde_json::from_str(object).map_err(|e| {
        warn!(error = %e, preview = %preview(object), "CV completion is not valid JSON");
        StructuringError::AiResponseMalformed(format!("invalid JSON: {e}"))
    })?;

    Ok(sanitize_cv(&value))
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

fn preview(text: &str) -> &str {
    truncate_chars(text, 200)
}

#[cfg(test)]
pub(crate) mod fakes {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::llm_client::{CompletionService, LlmError};

    /// Canned completion. `None` simulates an unreachable provider.
    pub struct FakeCompletion {
        reply: Option<String>,
        calls: AtomicUsize,
        pub last_prompt: Mutex<Option<String>>,
    }

    impl FakeCompletion {
        pub fn replying(reply: &str) -> Self {
            Self {
                reply: Some(reply.to_string()),
                calls: AtomicUsize::new(0),
                last_prompt: Mutex::new(None),
            }
        }

        pub fn unavailable() -> Self {
            Self {
                reply: None,
                calls: AtomicUsize::new(0),
                last_prompt: Mutex::new(None),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionService for FakeCompletion {
        async fn complete(&self, prompt: &str, _system: &str) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
            self.reply.clone().ok_or(LlmError::Api {
                status: 503,
                message: "model overloaded".to_string(),
            })
        }
    }
}
