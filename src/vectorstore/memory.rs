//! In-memory vector store.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::embedder::{Embedder, HashEmbedder, cosine};
use super::{META_TITLE, META_URL, VectorHit, VectorStore};
use crate::context::{Document, chunk};

struct Entry {
    content: String,
    metadata: BTreeMap<String, String>,
    vector: Vec<f32>,
}

/// Brute-force cosine store held in memory. One per run.
pub struct InMemoryVectorStore {
    embedder: Arc<dyn Embedder>,
    chunk_size: usize,
    chunk_overlap: usize,
    entries: RwLock<Vec<Entry>>,
}

impl InMemoryVectorStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new(embedder: Arc<dyn Embedder>, chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            embedder,
            chunk_size,
            chunk_overlap,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Number of indexed chunks.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether nothing has been indexed.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new(Arc::new(HashEmbedder::default()), 1000, 100)
    }
}

impl std::fmt::Debug for InMemoryVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryVectorStore")
            .field("dimensions", &self.embedder.dimensions())
            .field("chunk_size", &self.chunk_size)
            .field("chunk_overlap", &self.chunk_overlap)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn load(&self, documents: Vec<Document>) {
        let chunks = chunk(&documents, self.chunk_size, self.chunk_overlap);
        let new_entries: Vec<Entry> = chunks
            .into_iter()
            .map(|c| {
                let mut metadata = BTreeMap::new();
                metadata.insert(META_URL.to_string(), c.source_url);
                metadata.insert(META_TITLE.to_string(), c.title);
                Entry {
                    vector: self.embedder.embed(&c.content),
                    content: c.content,
                    metadata,
                }
            })
            .collect();
        tracing::debug!(documents = documents.len(), chunks = new_entries.len(), "indexed documents");
        self.entries.write().await.extend(new_entries);
    }

    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&BTreeMap<String, String>>,
    ) -> Vec<VectorHit> {
        let q = self.embedder.embed(query);
        let entries = self.entries.read().await;
        let mut hits: Vec<(usize, f32)> = entries
            .iter()
            .enumerate()
            .filter(|(_, e)| {
                filter.is_none_or(|f| f.iter().all(|(key, value)| e.metadata.get(key) == Some(value)))
            })
            .map(|(i, e)| (i, cosine(&q, &e.vector)))
            .collect();
        // Ties keep insertion order.
        hits.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        hits.into_iter()
            .take(k)
            .map(|(i, score)| VectorHit {
                content: entries[i].content.clone(),
                metadata: entries[i].metadata.clone(),
                score,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(url: &str, content: &str) -> Document {
        Document {
            content: content.to_string(),
            url: url.to_string(),
            title: String::new(),
        }
    }

    #[tokio::test]
    async fn test_search_ranks_relevant_chunk_first() {
        let store = InMemoryVectorStore::default();
        store
            .load(vec![
                doc("https://a.com", "Battery chemistry and lithium supply chains."),
                doc("https://b.com", "Football league results from the weekend."),
            ])
            .await;
        assert_eq!(store.len().await, 2);
        let hits = store.similarity_search("lithium battery supply", 1, None).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].metadata.get(META_URL).map(String::as_str), Some("https://a.com"));
    }

    #[tokio::test]
    async fn test_filter_restricts_hits() {
        let store = InMemoryVectorStore::default();
        store
            .load(vec![doc("https://a.com", "alpha text"), doc("https://b.com", "alpha text too")])
            .await;
        let mut filter = BTreeMap::new();
        filter.insert(META_URL.to_string(), "https://b.com".to_string());
        let hits = store.similarity_search("alpha", 5, Some(&filter)).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].metadata[META_URL], "https://b.com");
    }

    #[tokio::test]
    async fn test_empty_store_returns_nothing() {
        let store = InMemoryVectorStore::default();
        assert!(store.is_empty().await);
        assert!(store.similarity_search("anything", 3, None).await.is_empty());
    }
}
