//! `{name}` placeholder templates
//!
//! `{{` and `}}` render as literal braces. Placeholder names are ASCII
//! letters, digits and underscores.

use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// A parsed piece of a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Placeholder(String),
}

/// Split a template into literal text and placeholders
pub fn parse(name: &str, template: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
        match ch {
            '{' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                literal.push('{');
            }
            '}' if matches!(chars.peek(), Some((_, '}'))) => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut placeholder = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    placeholder.push(c);
                }

                if !closed {
                    return Err(Error::template(
                        name,
                        format!("unclosed '{{' at byte {}", pos),
                    ));
                }
                if placeholder.is_empty()
                    || !placeholder
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_')
                {
                    return Err(Error::template(
                        name,
                        format!("invalid placeholder '{{{}}}'", placeholder),
                    ));
                }

                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Placeholder(placeholder));
            }
            '}' => {
                return Err(Error::template(
                    name,
                    format!("unmatched '}}' at byte {}", pos),
                ));
            }
            _ => literal.push(ch),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

/// Placeholder names in order of first appearance
pub fn placeholders(name: &str, template: &str) -> Result<Vec<String>> {
    let mut names: Vec<String> = Vec::new();
    for segment in parse(name, template)? {
        if let Segment::Placeholder(p) = segment {
            if !names.contains(&p) {
                names.push(p);
            }
        }
    }
    Ok(names)
}

/// Substitute every placeholder from `values`
pub fn render(name: &str, template: &str, values: &BTreeMap<String, String>) -> Result<String> {
    let mut out = String::with_capacity(template.len());

    for segment in parse(name, template)? {
        match segment {
            Segment::Literal(text) => out.push_str(&text),
            Segment::Placeholder(key) => match values.get(&key) {
                Some(value) => out.push_str(value),
                None => {
                    return Err(Error::template(
                        name,
                        format!("no value for placeholder '{{{}}}'", key),
                    ))
                }
            },
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_with_escapes() {
        let out = render(
            "t",
            "Write {count} items as {{\"items\": [...]}} about {topic}.",
            &values(&[("count", "3"), ("topic", "cells")]),
        )
        .unwrap();
        assert_eq!(out, "Write 3 items as {\"items\": [...]} about cells.");
    }

    #[test]
    fn test_missing_value_is_template_error() {
        let err = render("quiz", "About {topic}", &BTreeMap::new()).unwrap_err();
        match err {
            Error::Template { template, message, .. } => {
                assert_eq!(template, "quiz");
                assert!(message.contains("topic"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_templates() {
        assert!(parse("t", "open {brace").is_err());
        assert!(parse("t", "stray } brace").is_err());
        assert!(parse("t", "bad {place holder}").is_err());
        assert!(parse("t", "empty {}").is_err());
    }

    #[test]
    fn test_placeholders_deduplicated() {
        let names = placeholders("t", "{a} {b} {a} {{c}}").unwrap();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }
}
