use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use tracing::{debug, info};

use crate::cv::models::ParsedCvData;
use crate::cv::reveal::{reveal_steps, CvFormState, RevealStep};
use crate::cv::structuring::structure_cv;
use crate::errors::AppError;
use crate::extraction::{ExtractedText, ExtractionMethod, RawDocument};
use crate::state::AppState;

const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct ExtractionSummary {
    pub method: ExtractionMethod,
    pub attempted: Vec<ExtractionMethod>,
    pub chars: usize,
    pub fallback: bool,
}

impl From<&ExtractedText> for ExtractionSummary {
    fn from(extracted: &ExtractedText) -> Self {
        Self {
            method: extracted.method,
            attempted: extracted.attempted.clone(),
            chars: extracted.char_count(),
            fallback: extracted.used_fallback(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub text: String,
    #[serde(flatten)]
    pub extraction: ExtractionSummary,
}

#[derive(Debug, Serialize)]
pub struct ParseResponse {
    pub extraction: ExtractionSummary,
    pub data: ParsedCvData,
}

#[derive(Debug, Serialize)]
struct CompleteEvent {
    extraction: ExtractionSummary,
    sections: usize,
    data: ParsedCvData,
}

/// Live-parse stream state: steps not yet sent and the form they fill.
struct RevealProgress {
    steps: std::vec::IntoIter<RevealStep>,
    form: CvFormState,
    extraction: Option<ExtractionSummary>,
    delay: Duration,
}

impl RevealProgress {
    async fn next_event(mut self) -> Option<(Result<Event, axum::Error>, Self)> {
        if let Some(step) = self.steps.next() {
            let index = self.form.revealed_sections().len();
            if index > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            debug!(section = step.section(), index, "Revealing CV section");
            let event = Event::default().event("section").json_data(&step);
            self.form.apply(step);
            return Some((event, self));
        }

        let extraction = self.extraction.take()?;
        let form = std::mem::take(&mut self.form);
        let complete = CompleteEvent {
            extraction,
            sections: form.revealed_sections().len(),
            data: form.into_data(),
        };
        Some((Event::default().event("complete").json_data(&complete), self))
    }
}

/// Reads the `file` field of a multipart upload.
async fn read_upload(mut multipart: Multipart) -> Result<RawDocument, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let mime_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(upload_error)?;

        if bytes.is_empty() {
            return Err(AppError::Validation(format!("'{file_name}' is empty")));
        }
        info!(%file_name, %mime_type, bytes = bytes.len(), "Received CV upload");
        return Ok(RawDocument::new(bytes, mime_type, file_name));
    }
    Err(AppError::Validation(format!(
        "Missing '{UPLOAD_FIELD}' field in multipart upload"
    )))
}

fn upload_error(e: axum::extract::multipart::MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::Validation("File exceeds the maximum upload size".to_string())
    } else {
        AppError::Validation(format!("Invalid multipart upload: {}", e.body_text()))
    }
}

/// POST /api/v1/cv/extract
pub async fn handle_extract(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ExtractResponse>, AppError> {
    let document = read_upload(multipart).await?;
    let extracted = state.orchestrator.extract(&document).await?;
    let extraction = ExtractionSummary::from(&extracted);
    Ok(Json(ExtractResponse {
        text: extracted.text,
        extraction,
    }))
}

/// POST /api/v1/cv/parse
pub async fn handle_parse(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ParseResponse>, AppError> {
    let document = read_upload(multipart).await?;
    let extracted = state.orchestrator.extract(&document).await?;
    let data = structure_cv(&extracted, &document.file_name, state.llm.as_ref()).await?;
    Ok(Json(ParseResponse {
        extraction: ExtractionSummary::from(&extracted),
        data,
    }))
}

/// POST /api/v1/cv/parse/live
/// Same pipeline as `/parse`, then streams one `section` event per reveal step
/// followed by a `complete` event. Failures before the first event are plain
/// JSON errors.
pub async fn handle_parse_live(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let document = read_upload(multipart).await?;
    let extracted = state.orchestrator.extract(&document).await?;
    let data = structure_cv(&extracted, &document.file_name, state.llm.as_ref()).await?;

    let progress = RevealProgress {
        steps: reveal_steps(&data).into_iter(),
        form: CvFormState::default(),
        extraction: Some(ExtractionSummary::from(&extracted)),
        delay: state.config.reveal_delay(),
    };

    let events = stream::unfold(progress, RevealProgress::next_event).map(|event| {
        Ok::<_, Infallible>(
            event.unwrap_or_else(|e| Event::default().event("error").data(e.to_string())),
        )
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
