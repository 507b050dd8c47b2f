//! Documents on local disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use unicode_segmentation::UnicodeSegmentation;

use super::{Retriever, RetrieverOptions};
use crate::core::RetrievalResult;
use crate::error::RetrieverError;

/// Registry identifier.
pub const NAME: &str = "local";

const EXTENSIONS: &[&str] = &["txt", "md", "markdown", "csv", "json", "html", "htm"];
const MAX_FILE_BYTES: u64 = 4 * 1024 * 1024;

/// Ranks text files under a directory by keyword overlap with the query.
#[derive(Debug)]
pub struct LocalRetriever {
    query: String,
    root: PathBuf,
}

impl LocalRetriever {
    /// Creates the retriever over `options.doc_path`.
    ///
    /// # Errors
    ///
    /// Returns [`RetrieverError::Misconfigured`] when `doc_path` is unset or
    /// is not a directory.
    pub fn new(query: &str, options: &RetrieverOptions) -> Result<Self, RetrieverError> {
        let root = options
            .doc_path
            .clone()
            .ok_or_else(|| RetrieverError::Misconfigured {
                retriever: NAME.to_string(),
                message: "doc_path is not set".to_string(),
            })?;
        if !root.is_dir() {
            return Err(RetrieverError::Misconfigured {
                retriever: NAME.to_string(),
                message: format!("doc_path {} is not a directory", root.display()),
            });
        }
        Ok(Self {
            query: query.to_string(),
            root,
        })
    }
}

fn collect_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            tracing::debug!(dir = %dir.display(), "unreadable directory");
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| EXTENSIONS.contains(&e.to_lowercase().as_str()))
            {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}

fn terms(text: &str) -> Vec<String> {
    text.unicode_words()
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() >= 3)
        .collect()
}

/// Fraction of query terms present in the document.
#[allow(clippy::cast_precision_loss)]
fn overlap(query_terms: &[String], content: &str) -> f64 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let haystack = content.to_lowercase();
    let hits = query_terms.iter().filter(|t| haystack.contains(t.as_str())).count();
    hits as f64 / query_terms.len() as f64
}

fn search_blocking(root: &Path, query: &str, max_results: usize) -> Vec<RetrievalResult> {
    let query_terms = terms(query);
    let mut scored: Vec<(f64, PathBuf, String)> = collect_files(root)
        .into_iter()
        .filter(|p| std::fs::metadata(p).is_ok_and(|m| m.len() <= MAX_FILE_BYTES))
        .filter_map(|p| match std::fs::read_to_string(&p) {
            Ok(content) => Some((overlap(&query_terms, &content), p, content)),
            Err(e) => {
                tracing::debug!(path = %p.display(), error = %e, "skipping unreadable file");
                None
            }
        })
        .filter(|(_, _, content)| !content.trim().is_empty())
        .collect();
    // Stable sort keeps path order among ties.
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored
        .into_iter()
        .take(max_results)
        .map(|(_, path, content)| {
            let title = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            let source = url::Url::from_file_path(&path)
                .map_or_else(|()| format!("file://{}", path.display()), |u| u.to_string());
            RetrievalResult::DirectContent {
                source,
                raw_content: content,
                title,
                image_urls: Vec::new(),
            }
        })
        .collect()
}

#[async_trait]
impl Retriever for LocalRetriever {
    fn name(&self) -> &'static str {
        NAME
    }

    fn requires_scraping(&self) -> bool {
        false
    }

    async fn search(&self, max_results: usize) -> Vec<RetrievalResult> {
        let root = self.root.clone();
        let query = self.query.clone();
        match tokio::task::spawn_blocking(move || search_blocking(&root, &query, max_results)).await {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!(retriever = NAME, error = %e, "document scan failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options_for(dir: &Path) -> RetrieverOptions {
        RetrieverOptions {
            doc_path: Some(dir.to_path_buf()),
            ..RetrieverOptions::default()
        }
    }

    #[test]
    fn test_missing_doc_path_is_misconfigured() {
        let err = LocalRetriever::new("q", &RetrieverOptions::default());
        assert!(matches!(err, Err(RetrieverError::Misconfigured { .. })));
    }

    #[tokio::test]
    async fn test_ranks_by_overlap() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        std::fs::write(dir.path().join("a.md"), "Notes about cooking pasta.").unwrap_or_else(|_| unreachable!());
        std::fs::write(dir.path().join("b.txt"), "Rust ownership and borrowing rules.")
            .unwrap_or_else(|_| unreachable!());
        std::fs::create_dir(dir.path().join("nested")).unwrap_or_else(|_| unreachable!());
        std::fs::write(dir.path().join("nested/c.md"), "Ownership in Rust.").unwrap_or_else(|_| unreachable!());
        std::fs::write(dir.path().join("image.png"), "not text").unwrap_or_else(|_| unreachable!());

        let retriever = LocalRetriever::new("rust ownership borrowing", &options_for(dir.path()))
            .unwrap_or_else(|_| unreachable!());
        let results = retriever.search(2).await;
        assert_eq!(results.len(), 2);
        assert!(results[0].url().starts_with("file://"));
        assert!(results[0].url().ends_with("b.txt"));
        assert!(results[1].url().ends_with("c.md"));
    }

    #[test]
    fn test_overlap_empty_query() {
        assert!(overlap(&[], "anything").abs() < f64::EPSILON);
    }
}
