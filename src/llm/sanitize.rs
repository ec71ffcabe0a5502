//! Cleanup of raw model text before it is parsed or shown.

const FENCE: &str = "```";
const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

/// Unwrap text that is entirely enclosed in one code fence
///
/// The opening line (with any language tag) and everything from the last
/// fence on are dropped. Text not wrapped in a fence is only trimmed.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if !(trimmed.starts_with(FENCE) && trimmed.ends_with(FENCE)) {
        return trimmed;
    }

    let inner = trimmed.split_once('\n').map_or(trimmed, |(_, rest)| rest);
    let inner = inner.rsplit_once(FENCE).map_or(inner, |(body, _)| body);
    inner.trim()
}

/// Remove model reasoning regions
///
/// Everything up to and including the first `</think>` is discarded, then any
/// remaining `<think>...</think>` pairs are cut out. An unclosed `<think>` is
/// kept as-is.
pub fn strip_thinking(text: &str) -> String {
    let mut rest = match text.split_once(THINK_CLOSE) {
        Some((_, after)) => after,
        None => text,
    };

    let mut cleaned = String::with_capacity(rest.len());
    while let Some(start) = rest.find(THINK_OPEN) {
        let body = &rest[start + THINK_OPEN.len()..];
        let Some(end) = body.find(THINK_CLOSE) else {
            break;
        };
        cleaned.push_str(&rest[..start]);
        rest = &body[end + THINK_CLOSE.len()..];
    }
    cleaned.push_str(rest);

    cleaned.trim().to_string()
}

/// Extract the structured payload from a model reply
///
/// Handles a fenced reply, a reasoning block followed by a reply, and a
/// reasoning block followed by a fenced reply.
pub fn extract_payload(raw: &str) -> String {
    let unfenced = strip_code_fence(raw);
    let without_thinking = strip_thinking(unfenced);
    strip_code_fence(&without_thinking).to_string()
}
