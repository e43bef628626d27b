//! Extraction of structured JSON from raw model output

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::tasks::OutputSchema;

fn code_fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```").expect("valid regex"))
}

/// Pull the JSON value out of model output
///
/// Markdown code fences are stripped and the outermost JSON object or
/// array is parsed; surrounding prose is ignored.
pub fn extract_json(raw: &str) -> Result<Value, String> {
    let body = match code_fence_re().captures(raw).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => raw,
    };

    let span = outermost_json_span(body).ok_or_else(|| "no JSON object or array found".to_string())?;
    serde_json::from_str(&body[span.0..span.1]).map_err(|e| format!("invalid JSON: {}", e))
}

/// Extract and validate against `schema`
pub fn parse_output(raw: &str, schema: &OutputSchema) -> Result<Value, String> {
    let value = extract_json(raw)?;
    schema.validate(&value)?;
    Ok(value)
}

/// Byte span of the first balanced `{...}` or `[...]`, skipping string contents
fn outermost_json_span(text: &str) -> Option<(usize, usize)> {
    let start = text.find(|c: char| c == '{' || c == '[')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some((start, start + offset + ch.len_utf8()));
                }
            }
            _ => {}
        }
    }

    // Unbalanced: hand everything to the parser for a useful error
    Some((start, text.len()))
}
