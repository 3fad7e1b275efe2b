//! Extraction of the shader reply from model output.
//!
//! JSON mode is requested on every call, but replies wrapped in markdown
//! fences or surrounded by prose are still accepted.

use serde_json::Value;
use shaderloop_core::Proposal;

use crate::error::{LlmError, Result};

/// Strip markdown code fences from a response
fn strip_markdown_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let clean = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    clean.strip_suffix("```").unwrap_or(clean).trim()
}

/// First balanced `{...}` in `text`, ignoring braces inside strings.
fn extract_json_object(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;
    let mut start_idx = None;

    for (i, c) in text.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        if c == '\\' && in_string {
            escape_next = true;
            continue;
        }
        if c == '"' {
            in_string = !in_string;
            continue;
        }
        if in_string {
            continue;
        }

        if c == '{' {
            if depth == 0 {
                start_idx = Some(i);
            }
            depth += 1;
        } else if c == '}' && depth > 0 {
            depth -= 1;
            if depth == 0 {
                if let Some(start) = start_idx {
                    return Some(&text[start..=i]);
                }
            }
        }
    }
    None
}

/// Parse a `{fragment_shader, notes}` reply.
///
/// The shader must be a string containing `#version`; `notes` is optional and
/// ignored unless it is a string.
pub fn parse_shader_reply(text: &str) -> Result<Proposal> {
    let clean = strip_markdown_fences(text);
    let json = extract_json_object(clean)
        .ok_or_else(|| LlmError::InvalidOutput("no JSON object in reply".to_string()))?;
    let value: Value = serde_json::from_str(json)?;

    let source = value
        .get("fragment_shader")
        .or_else(|| value.get("source"))
        .and_then(Value::as_str)
        .ok_or_else(|| LlmError::InvalidOutput("reply has no fragment_shader string".to_string()))?;
    if !source.contains("#version") {
        return Err(LlmError::InvalidOutput(
            "fragment_shader lacks a #version directive".to_string(),
        ));
    }

    let notes = value
        .get("notes")
        .and_then(Value::as_str)
        .unwrap_or_default();
    Ok(Proposal::new(source, notes))
}
