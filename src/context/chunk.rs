//! Overlapping chunk windows with source provenance.

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// A document handed to the chunker or a vector store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Full text.
    pub content: String,
    /// Source URL or identifier.
    pub url: String,
    /// Source title.
    #[serde(default)]
    pub title: String,
}

/// A window of a document, sized for the downstream model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextChunk {
    /// Chunk text.
    pub content: String,
    /// URL of the document it came from.
    pub source_url: String,
    /// Title of the document it came from.
    #[serde(default)]
    pub title: String,
    /// Position within its document.
    pub index: usize,
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Sentence units, with any sentence longer than `size` split on grapheme
/// boundaries.
fn units(text: &str, size: usize) -> Vec<String> {
    let mut out = Vec::new();
    for sentence in text.split_sentence_bounds() {
        if char_len(sentence) <= size {
            out.push(sentence.to_string());
            continue;
        }
        let mut piece = String::new();
        let mut len = 0;
        for g in sentence.graphemes(true) {
            let glen = char_len(g);
            if len + glen > size && !piece.is_empty() {
                out.push(std::mem::take(&mut piece));
                len = 0;
            }
            piece.push_str(g);
            len += glen;
        }
        if !piece.is_empty() {
            out.push(piece);
        }
    }
    out
}

/// Splits documents into windows of at most `chunk_size` characters,
/// preferring sentence boundaries. Consecutive windows share up to
/// `chunk_overlap` characters of trailing sentences.
///
/// A zero `chunk_size` yields one chunk per non-empty document.
#[must_use]
pub fn chunk(documents: &[Document], chunk_size: usize, chunk_overlap: usize) -> Vec<ContextChunk> {
    let mut chunks = Vec::new();
    for doc in documents {
        if doc.content.trim().is_empty() {
            continue;
        }
        if chunk_size == 0 {
            chunks.push(ContextChunk {
                content: doc.content.trim().to_string(),
                source_url: doc.url.clone(),
                title: doc.title.clone(),
                index: 0,
            });
            continue;
        }

        let overlap = chunk_overlap.min(chunk_size.saturating_sub(1));
        let mut window: Vec<String> = Vec::new();
        let mut window_len = 0;
        let mut index = 0;
        let mut emit = |window: &[String], index: &mut usize| {
            let text = window.concat();
            let text = text.trim();
            if !text.is_empty() {
                chunks.push(ContextChunk {
                    content: text.to_string(),
                    source_url: doc.url.clone(),
                    title: doc.title.clone(),
                    index: *index,
                });
                *index += 1;
            }
        };

        for unit in units(&doc.content, chunk_size) {
            let ulen = char_len(&unit);
            if window_len + ulen > chunk_size && !window.is_empty() {
                emit(&window, &mut index);
                // Keep trailing units that fit in the overlap and still
                // leave room for the incoming unit.
                let mut tail: Vec<String> = Vec::new();
                let mut tail_len = 0;
                for u in window.iter().rev() {
                    let l = char_len(u);
                    if tail_len + l > overlap || tail_len + l + ulen > chunk_size {
                        break;
                    }
                    tail.push(u.clone());
                    tail_len += l;
                }
                tail.reverse();
                window = tail;
                window_len = tail_len;
            }
            window.push(unit);
            window_len += ulen;
        }
        if !window.is_empty() {
            emit(&window, &mut index);
        }
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(content: &str) -> Document {
        Document {
            content: content.to_string(),
            url: "https://a.com".to_string(),
            title: "A".to_string(),
        }
    }

    #[test]
    fn test_short_document_is_one_chunk() {
        let chunks = chunk(&[doc("One sentence. Two sentences.")], 100, 10);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].source_url, "https://a.com");
        assert_eq!(chunks[0].index, 0);
    }

    #[test]
    fn test_chunks_respect_size_and_keep_provenance() {
        let text = "Alpha beta gamma. ".repeat(20);
        let chunks = chunk(&[doc(&text)], 60, 20);
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert!(c.content.chars().count() <= 60);
            assert_eq!(c.index, i);
            assert_eq!(c.title, "A");
        }
    }

    #[test]
    fn test_overlap_repeats_trailing_sentence() {
        let text = "First one here. Second one here. Third one here.";
        let chunks = chunk(&[doc(text)], 34, 17);
        assert!(chunks.len() >= 2);
        assert!(chunks[1].content.starts_with("Second one here."));
    }

    #[test]
    fn test_long_sentence_is_hard_split() {
        let text = "x".repeat(250);
        let chunks = chunk(&[doc(&text)], 100, 0);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].content.len(), 50);
    }

    #[test]
    fn test_empty_documents_are_skipped() {
        assert!(chunk(&[doc("   ")], 100, 10).is_empty());
    }
}
