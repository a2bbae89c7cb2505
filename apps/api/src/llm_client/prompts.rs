// Shared prompt constants.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// System prompt that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Appended to extraction prompts so the model never invents data.
pub const NO_INVENTION_INSTRUCTION: &str = "\
    CRITICAL: Only use information that appears in the provided text. \
    Do NOT infer, interpolate, or invent details. \
    When a value is not present, use an empty string \"\" or an empty array []. \
    NEVER output null.";
