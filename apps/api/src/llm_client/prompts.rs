// Shared prompt fragments.
// Each module that needs completions defines its own prompts.rs alongside it;
// this file only holds instructions reused across them.

/// Appended to system prompts whose output is returned to users verbatim.
pub const PLAIN_TEXT_ONLY: &str = "\
Respond with plain text only. \
Do NOT use markdown code fences or JSON. \
Do NOT add introductions, explanations or meta-commentary about what you produced.";
