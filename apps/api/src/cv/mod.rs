// CV structuring: prompt + completion, sanitization into ParsedCvData,
// and the progressive section reveal streamed to the profile form.
// All LLM calls go through llm_client; nothing here knows the provider.

pub mod handlers;
pub mod models;
pub mod prompts;
pub mod reveal;
pub mod sanitize;
pub mod structuring;
