//! Fenced-block extraction for chat completions
//!
//! Models often wrap JSON in Markdown code fences. The scanner
//! walks the text once, pairing ``` markers, and picks the payload with the
//! precedence json-tagged fence > any fence > raw text.

use tracing::debug;

const FENCE: &str = "```";
const JSON_TAG: &str = "json";

/// Where the extracted payload came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceKind {
    Json,
    Generic,
    Raw,
}

/// Trimmed payload plus its origin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extracted<'a> {
    pub kind: FenceKind,
    pub body: &'a str,
}

#[derive(Debug, Clone, Copy)]
enum FenceState {
    NoFence,
    InJsonFence { body_start: usize },
    InGenericFence { body_start: usize },
}

/// Extract the most likely JSON payload from a completion
pub fn extract_payload(text: &str) -> Extracted<'_> {
    let mut state = FenceState::NoFence;
    let mut first_json: Option<&str> = None;
    let mut first_generic: Option<&str> = None;
    let mut cursor = 0;

    while let Some(offset) = text[cursor..].find(FENCE) {
        let marker = cursor + offset;
        let after_marker = marker + FENCE.len();

        state = match state {
            FenceState::NoFence => {
                if has_json_tag(&text[after_marker..]) {
                    FenceState::InJsonFence { body_start: after_marker + JSON_TAG.len() }
                } else {
                    FenceState::InGenericFence { body_start: after_marker }
                }
            }
            FenceState::InJsonFence { body_start } => {
                first_json.get_or_insert(&text[body_start..marker]);
                FenceState::NoFence
            }
            FenceState::InGenericFence { body_start } => {
                first_generic.get_or_insert(&text[body_start..marker]);
                FenceState::NoFence
            }
        };

        cursor = after_marker;
    }

    // An unclosed fence contributes nothing
    let extracted = match (first_json, first_generic) {
        (Some(body), _) => Extracted { kind: FenceKind::Json, body: body.trim() },
        (None, Some(body)) => Extracted { kind: FenceKind::Generic, body: body.trim() },
        (None, None) => Extracted { kind: FenceKind::Raw, body: text.trim() },
    };

    debug!(kind = ?extracted.kind, body_length = extracted.body.len(), "Extracted completion payload");
    extracted
}

fn has_json_tag(rest: &str) -> bool {
    let Some(tag) = rest.get(..JSON_TAG.len()) else {
        return false;
    };
    if !tag.eq_ignore_ascii_case(JSON_TAG) {
        return false;
    }
    // "```jsonc" or "```json5" are other languages
    !rest[JSON_TAG.len()..]
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric())
}
