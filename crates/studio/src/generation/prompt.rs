//! Prompt composition.

/// Instruction appended to every prompt so the subject stays recognizable.
pub const IDENTITY_INSTRUCTION: &str = "Preserve the person's facial features and identity exactly.";

/// Build the provider prompt from a style's base prompt and an optional
/// user refinement.
#[must_use]
pub fn compose_prompt(style_prompt: &str, refinement: Option<&str>) -> String {
    let style_prompt = style_prompt.trim();
    match refinement.map(str::trim).filter(|r| !r.is_empty()) {
        Some(refinement) => format!(
            "Transform this person into the following style: {style_prompt}. \
             Additional instructions: {refinement}. {IDENTITY_INSTRUCTION}"
        ),
        None => format!(
            "Transform this person into the following style: {style_prompt}. \
             {IDENTITY_INSTRUCTION} High-quality artistic output."
        ),
    }
}
