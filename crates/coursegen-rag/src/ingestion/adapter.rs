//! Document store adapter: raw source text to normalized documents

use chrono::Utc;
use parking_lot::RwLock;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::OnceLock;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{Document, RawDocument, SourceFormat};

/// Share of control characters above which input is treated as binary
const MAX_CONTROL_RATIO: f64 = 0.05;

fn html_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"))
}

fn html_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)>").expect("valid regex")
    })
}

fn html_break_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)<\s*(br|/p|/div|/li|/h[1-6]|/tr)\s*/?\s*>").expect("valid regex")
    })
}

/// Normalize a raw document
///
/// Rejects empty and binary input, converts line endings, strips HTML tags
/// for HTML sources, trims trailing whitespace and collapses runs of blank
/// lines. The content hash is computed over the normalized text.
pub fn normalize(raw: &RawDocument) -> Result<Document> {
    if raw.text.contains('\0') {
        return Err(Error::invalid_document(&raw.source_id, "input contains NUL bytes"));
    }

    let total = raw.text.chars().count();
    let control = raw
        .text
        .chars()
        .filter(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
        .count();
    if total > 0 && control as f64 / total as f64 > MAX_CONTROL_RATIO {
        return Err(Error::invalid_document(
            &raw.source_id,
            "input does not look like text",
        ));
    }

    let mut text = raw.text.replace("\r\n", "\n").replace('\r', "\n");
    if raw.format == SourceFormat::Html {
        text = strip_html(&text);
    }

    let text = collapse_blank_lines(&text);
    if text.is_empty() {
        return Err(Error::invalid_document(&raw.source_id, "document is empty"));
    }

    Ok(Document {
        id: Document::id_for_source(&raw.source_id),
        source_id: raw.source_id.clone(),
        title: raw.title.clone(),
        content_hash: content_hash(&text),
        text,
        ingested_at: Utc::now(),
        metadata: raw.metadata.clone(),
    })
}

/// SHA-256 of a text, hex encoded
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

fn strip_html(html: &str) -> String {
    let without_blocks = html_block_re().replace_all(html, "");
    let with_breaks = html_break_re().replace_all(&without_blocks, "\n");
    let text = html_tag_re().replace_all(&with_breaks, "");

    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Trim line ends and keep at most one blank line between paragraphs
fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0usize;

    for line in text.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            blank_run += 1;
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
            if blank_run > 0 {
                out.push('\n');
            }
        }
        out.push_str(line);
        blank_run = 0;
    }

    out
}

/// Extract the bodies of `<tag>...</tag>` blocks, in document order
///
/// Used for storyboard-style sources where each scene or slide is wrapped
/// in its own element. Unterminated blocks are ignored.
pub fn extract_tagged_blocks(text: &str, tag: &str) -> Vec<String> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let mut blocks = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find(&open) {
        let body_start = start + open.len();
        let Some(len) = rest[body_start..].find(&close) else {
            break;
        };

        let body = rest[body_start..body_start + len].trim();
        if !body.is_empty() {
            blocks.push(body.to_string());
        }
        rest = &rest[body_start + len + close.len()..];
    }

    blocks
}

/// In-memory document store keyed by document id
#[derive(Default)]
pub struct DocumentStore {
    documents: RwLock<HashMap<Uuid, Document>>,
    by_hash: RwLock<HashMap<String, Uuid>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document, returning the previous version
    pub fn insert(&self, document: Document) -> Option<Document> {
        let mut documents = self.documents.write();
        let mut by_hash = self.by_hash.write();

        let previous = documents.insert(document.id, document.clone());
        if let Some(old) = &previous {
            by_hash.remove(&old.content_hash);
        }
        by_hash.insert(document.content_hash.clone(), document.id);

        previous
    }

    /// Get a document by id
    pub fn get(&self, id: &Uuid) -> Option<Document> {
        self.documents.read().get(id).cloned()
    }

    /// Find the document holding identical normalized content
    pub fn find_by_hash(&self, content_hash: &str) -> Option<Uuid> {
        self.by_hash.read().get(content_hash).copied()
    }

    /// Remove a document; indexed chunks are left in place
    pub fn purge(&self, id: &Uuid) -> Option<Document> {
        let mut documents = self.documents.write();
        let mut by_hash = self.by_hash.write();

        let removed = documents.remove(id)?;
        if by_hash.get(&removed.content_hash) == Some(id) {
            by_hash.remove(&removed.content_hash);
        }
        Some(removed)
    }

    /// List document ids
    pub fn ids(&self) -> Vec<Uuid> {
        self.documents.read().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}
