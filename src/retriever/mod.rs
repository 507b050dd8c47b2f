//! Retriever adapters and their registry.
//!
//! A retriever is built for one query and searched with a result cap. It
//! never fails at search time: an unreachable backend yields an empty
//! list. Misconfiguration (a missing API key, a missing document path)
//! fails at construction instead, so it surfaces before any work starts.

pub mod arxiv;
pub mod duckduckgo;
pub(crate) mod http;
pub mod local;
pub mod mock;
pub mod tavily;
pub mod urls;
pub mod vector;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::RetrievalResult;
use crate::error::RetrieverError;
use crate::retry::RetryPolicy;
use crate::vectorstore::VectorStore;

pub use arxiv::ArxivRetriever;
pub use duckduckgo::DuckDuckGoRetriever;
pub use local::LocalRetriever;
pub use mock::MockRetriever;
pub use tavily::TavilyRetriever;
pub use urls::StaticUrlRetriever;
pub use vector::VectorStoreRetriever;

/// A search backend bound to one query.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Registry identifier.
    fn name(&self) -> &'static str;

    /// Whether results are links that still have to be scraped.
    fn requires_scraping(&self) -> bool;

    /// Up to `max_results` results, in backend order. Empty on failure.
    async fn search(&self, max_results: usize) -> Vec<RetrievalResult>;
}

/// Construction options shared by every retriever.
#[derive(Clone)]
pub struct RetrieverOptions {
    /// Free-form option map; credentials may be passed here by lowercase
    /// variable name (`tavily_api_key`).
    pub headers: BTreeMap<String, String>,
    /// Restrict web searches to these domains.
    pub query_domains: Vec<String>,
    /// URLs for the `static` retriever.
    pub source_urls: Vec<String>,
    /// Root directory for the `local` retriever.
    pub doc_path: Option<PathBuf>,
    /// Store for the `vectorstore` retriever.
    pub vector_store: Option<Arc<dyn VectorStore>>,
    /// Retry schedule for HTTP calls.
    pub retry: RetryPolicy,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for RetrieverOptions {
    fn default() -> Self {
        Self {
            headers: BTreeMap::new(),
            query_domains: Vec::new(),
            source_urls: Vec::new(),
            doc_path: None,
            vector_store: None,
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(15),
        }
    }
}

impl RetrieverOptions {
    /// Looks up a credential in the option map, then the environment.
    /// Blank values count as missing.
    #[must_use]
    pub fn credential(&self, variable: &str) -> Option<String> {
        self.headers
            .get(&variable.to_lowercase())
            .cloned()
            .or_else(|| std::env::var(variable).ok())
            .filter(|v| !v.trim().is_empty())
    }
}

impl std::fmt::Debug for RetrieverOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrieverOptions")
            .field("header_keys", &self.headers.keys().collect::<Vec<_>>())
            .field("query_domains", &self.query_domains)
            .field("source_urls", &self.source_urls)
            .field("doc_path", &self.doc_path)
            .field("vector_store", &self.vector_store.is_some())
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Builds a retriever for a query.
pub type RetrieverFactory =
    Arc<dyn Fn(&str, &RetrieverOptions) -> Result<Box<dyn Retriever>, RetrieverError> + Send + Sync>;

/// String-keyed retriever factories.
#[derive(Clone, Default)]
pub struct RetrieverRegistry {
    factories: BTreeMap<String, RetrieverFactory>,
}

impl RetrieverRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in retriever.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(tavily::NAME, |q, o| Ok(Box::new(TavilyRetriever::new(q, o)?)));
        registry.register(duckduckgo::NAME, |q, o| Ok(Box::new(DuckDuckGoRetriever::new(q, o)?)));
        registry.register(arxiv::NAME, |q, o| Ok(Box::new(ArxivRetriever::new(q, o)?)));
        registry.register(local::NAME, |q, o| Ok(Box::new(LocalRetriever::new(q, o)?)));
        registry.register(urls::NAME, |q, o| Ok(Box::new(StaticUrlRetriever::new(q, o)?)));
        registry.register(vector::NAME, |q, o| Ok(Box::new(VectorStoreRetriever::new(q, o)?)));
        registry
    }

    /// Registers (or replaces) a factory.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&str, &RetrieverOptions) -> Result<Box<dyn Retriever>, RetrieverError> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_lowercase(), Arc::new(factory));
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Builds the retriever registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RetrieverError::UnknownRetriever`] for unregistered names
    /// and whatever the factory returns for misconfiguration.
    pub fn create(
        &self,
        name: &str,
        query: &str,
        options: &RetrieverOptions,
    ) -> Result<Box<dyn Retriever>, RetrieverError> {
        let key = name.trim().to_lowercase();
        let factory = self
            .factories
            .get(&key)
            .ok_or_else(|| RetrieverError::UnknownRetriever {
                name: name.to_string(),
                supported: self.names().join(", "),
            })?;
        factory(query, options)
    }
}

impl std::fmt::Debug for RetrieverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrieverRegistry")
            .field("names", &self.names())
            .finish()
    }
}
