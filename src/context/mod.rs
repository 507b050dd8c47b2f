//! Context assembly: merging curated source text into the working context.
//!
//! Merging is deterministic. Inputs are visited in the order the caller
//! passes them (sub-query dispatch order, never completion order) and the
//! first occurrence of a paragraph wins.

pub mod chunk;
pub mod iteration;

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

pub use chunk::{ContextChunk, Document, chunk};
pub use iteration::{Iteration, IterationRecord, merge_iterations};

static PARAGRAPH_BREAK: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\r?\n[ \t\r]*\n").ok());

/// Splits text into blank-line-delimited paragraphs, trimmed and non-empty.
fn paragraphs(text: &str) -> Vec<&str> {
    let parts: Vec<&str> = PARAGRAPH_BREAK
        .as_ref()
        .map_or_else(|| text.split("\n\n").collect(), |re| re.split(text).collect());
    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Whitespace-insensitive key for a paragraph.
fn normalize(paragraph: &str) -> String {
    paragraph.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Merges source texts, keeping the first occurrence of every paragraph.
///
/// Paragraphs compare equal when they differ only in whitespace. Output
/// paragraphs are joined with a blank line.
#[must_use]
pub fn combine<S: AsRef<str>>(texts: &[S]) -> String {
    let mut seen = HashSet::new();
    let mut kept: Vec<&str> = Vec::new();
    for text in texts {
        for para in paragraphs(text.as_ref()) {
            if seen.insert(normalize(para)) {
                kept.push(para);
            }
        }
    }
    kept.join("\n\n")
}

/// Item-level variant of [`combine`] for structured context.
///
/// Items are compared by their serialized form; object keys serialize in
/// sorted order, so key order does not affect equality.
#[must_use]
pub fn combine_items(items: &[Value]) -> Vec<Value> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter(|item| seen.insert(item.to_string()))
        .cloned()
        .collect()
}
