//! Vector store capability: index documents, then similarity-search them.
//!
//! Embedding backends are pluggable behind [`Embedder`]. The built-in
//! [`HashEmbedder`] needs no model or network and is what the section
//! drafter uses to narrow assembled context per section.

pub mod embedder;
pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::Document;

pub use embedder::{Embedder, HashEmbedder, create_embedder};
pub use memory::InMemoryVectorStore;

/// Metadata key holding the source URL of a hit.
pub const META_URL: &str = "url";
/// Metadata key holding the source title of a hit.
pub const META_TITLE: &str = "title";

/// One similarity-search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorHit {
    /// Chunk text.
    pub content: String,
    /// Provenance metadata (`url`, `title`).
    pub metadata: BTreeMap<String, String>,
    /// Cosine similarity to the query.
    pub score: f32,
}

/// A store of chunked, embedded documents.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Chunks, embeds and indexes `documents`.
    async fn load(&self, documents: Vec<Document>);

    /// The `k` chunks most similar to `query`, best first. When `filter` is
    /// given, only chunks whose metadata contains every filter pair match.
    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&BTreeMap<String, String>>,
    ) -> Vec<VectorHit>;
}
