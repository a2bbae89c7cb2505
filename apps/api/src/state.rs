use std::sync::Arc;

use crate::config::Config;
use crate::extraction::Orchestrator;
use crate::llm_client::CompletionService;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Completion backend. Default: Gemini `LlmClient`; tests inject a fake.
    pub llm: Arc<dyn CompletionService>,
    /// Upload → text pipeline, holding the OCR engine and acceptance thresholds.
    pub orchestrator: Arc<Orchestrator>,
    pub config: Config,
}
