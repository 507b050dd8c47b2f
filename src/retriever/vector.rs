//! Attached vector store.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::{Retriever, RetrieverOptions};
use crate::core::RetrievalResult;
use crate::error::RetrieverError;
use crate::vectorstore::{META_TITLE, META_URL, VectorHit, VectorStore};

/// Registry identifier.
pub const NAME: &str = "vectorstore";

/// Similarity-searches a caller-provided [`VectorStore`].
pub struct VectorStoreRetriever {
    query: String,
    store: Arc<dyn VectorStore>,
}

impl std::fmt::Debug for VectorStoreRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStoreRetriever")
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

impl VectorStoreRetriever {
    /// Creates the retriever.
    ///
    /// # Errors
    ///
    /// Returns [`RetrieverError::Misconfigured`] when no store is attached.
    pub fn new(query: &str, options: &RetrieverOptions) -> Result<Self, RetrieverError> {
        let store = options
            .vector_store
            .clone()
            .ok_or_else(|| RetrieverError::Misconfigured {
                retriever: NAME.to_string(),
                message: "no vector store attached".to_string(),
            })?;
        Ok(Self {
            query: query.to_string(),
            store,
        })
    }
}

/// Folds hits that share a URL into one result, keeping best-first order.
fn merge_by_url(hits: Vec<VectorHit>) -> Vec<RetrievalResult> {
    let mut order: Vec<String> = Vec::new();
    let mut merged: BTreeMap<String, (String, Vec<String>)> = BTreeMap::new();
    for (i, hit) in hits.into_iter().enumerate() {
        let url = hit
            .metadata
            .get(META_URL)
            .filter(|u| !u.is_empty())
            .cloned()
            .unwrap_or_else(|| format!("vectorstore:{i}"));
        let title = hit.metadata.get(META_TITLE).cloned().unwrap_or_default();
        let slot = merged.entry(url.clone()).or_insert_with(|| {
            order.push(url);
            (title, Vec::new())
        });
        slot.1.push(hit.content);
    }
    order
        .into_iter()
        .filter_map(|url| {
            merged.remove(&url).map(|(title, parts)| RetrievalResult::DirectContent {
                source: url,
                raw_content: parts.join("\n\n"),
                title,
                image_urls: Vec::new(),
            })
        })
        .collect()
}

#[async_trait]
impl Retriever for VectorStoreRetriever {
    fn name(&self) -> &'static str {
        NAME
    }

    fn requires_scraping(&self) -> bool {
        false
    }

    async fn search(&self, max_results: usize) -> Vec<RetrievalResult> {
        let hits = self.store.similarity_search(&self.query, max_results, None).await;
        tracing::debug!(retriever = NAME, hits = hits.len(), "vector search");
        merge_by_url(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Document;
    use crate::vectorstore::InMemoryVectorStore;

    fn hit(url: &str, content: &str) -> VectorHit {
        let mut metadata = BTreeMap::new();
        metadata.insert(META_URL.to_string(), url.to_string());
        VectorHit {
            content: content.to_string(),
            metadata,
            score: 0.5,
        }
    }

    #[test]
    fn test_merge_by_url_keeps_order() {
        let merged = merge_by_url(vec![hit("https://a", "one"), hit("https://b", "two"), hit("https://a", "three")]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].url(), "https://a");
        let RetrievalResult::DirectContent { raw_content, .. } = &merged[0] else {
            unreachable!()
        };
        assert_eq!(raw_content, "one\n\nthree");
    }

    #[test]
    fn test_requires_store() {
        let err = VectorStoreRetriever::new("q", &RetrieverOptions::default());
        assert!(matches!(err, Err(RetrieverError::Misconfigured { .. })));
    }

    #[tokio::test]
    async fn test_searches_attached_store() {
        let store = Arc::new(InMemoryVectorStore::default());
        store
            .load(vec![
                Document {
                    content: "Tokio is an asynchronous runtime for Rust.".to_string(),
                    url: "https://tokio.rs".to_string(),
                    title: "Tokio".to_string(),
                },
                Document {
                    content: "Sourdough bread needs a starter.".to_string(),
                    url: "https://bread.example".to_string(),
                    title: "Bread".to_string(),
                },
            ])
            .await;
        let options = RetrieverOptions {
            vector_store: Some(store),
            ..RetrieverOptions::default()
        };
        let retriever = VectorStoreRetriever::new("asynchronous runtime rust", &options)
            .unwrap_or_else(|_| unreachable!());
        let results = retriever.search(1).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url(), "https://tokio.rs");
    }
}
