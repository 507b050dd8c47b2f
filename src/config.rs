//! Run configuration.
//!
//! [`RunConfig`] is a flat set of recognized options. It is built from a
//! string map (`RunConfig::from_options`), from `RESEARCH_<KEY>` environment
//! variables (`RunConfig::from_env`), or programmatically with the `with_*`
//! setters. Unrecognized keys are ignored; recognized keys with malformed
//! values are rejected.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{Query, ReportSource, ReportType, Tone};
use crate::curation::{CurationConfig, CurationStrategy};
use crate::error::ConfigError;
use crate::planner::BudgetLimits;

/// Prefix for environment variables read by [`RunConfig::from_env`].
pub const ENV_PREFIX: &str = "RESEARCH_";

/// Every option key [`RunConfig`] recognizes.
pub const RECOGNIZED_KEYS: &[&str] = &[
    "report_type",
    "report_source",
    "tone",
    "total_words",
    "language",
    "max_subtopics",
    "retrievers",
    "source_urls",
    "query_domains",
    "mcp_server_command",
    "mcp_server_args",
    "mcp_tool_name",
    "embedding_provider",
    "token_limit",
    "web_call_limit",
    "cost_limit",
    "dual_curation",
    "curation_strategy",
    "max_sub_queries",
    "include_original_query",
    "max_search_results_per_query",
    "max_concurrent_iterations",
    "iteration_timeout_secs",
    "scrape_concurrency",
    "min_content_length",
    "min_sources",
    "max_sources",
    "exclude_domains",
    "require_keywords",
    "custom_sub_queries",
    "custom_prompt",
    "agent_role",
    "similarity_k",
    "chunk_size",
    "chunk_overlap",
    "enforce_budget",
    "stream",
    "doc_path",
    "scraper",
    "output_formats",
];

/// Configuration for one research run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct RunConfig {
    /// Report kind.
    pub report_type: ReportType,
    /// Where sources come from.
    pub report_source: ReportSource,
    /// Writing tone.
    pub tone: Tone,
    /// Target length of the report body.
    pub total_words: usize,
    /// Output language.
    pub language: String,
    /// Requested export formats, passed through to external writers.
    pub output_formats: Vec<String>,
    /// Maximum sections drafted for section-drafted report types.
    pub max_subtopics: usize,
    /// Retriever identifiers for web and hybrid runs.
    pub retrievers: Vec<String>,
    /// URLs for the `static` retriever.
    pub source_urls: Vec<String>,
    /// Domains web searches are restricted to.
    pub query_domains: Vec<String>,
    /// Command for an externally registered MCP retriever.
    pub mcp_server_command: Option<String>,
    /// Arguments for `mcp_server_command`.
    pub mcp_server_args: Vec<String>,
    /// Tool the MCP retriever should call.
    pub mcp_tool_name: Option<String>,
    /// Embedder behind the run's vector store.
    pub embedding_provider: String,
    /// Ceilings for the token, web-call and cost budgets.
    pub budget: BudgetLimits,
    /// Whether an exhausted budget halts further work.
    pub enforce_budget: bool,
    /// Full scoring pipeline instead of the relevance-only pass.
    pub dual_curation: bool,
    /// Curation weight and threshold profile.
    pub curation_strategy: CurationStrategy,
    /// Maximum generated sub-queries.
    pub max_sub_queries: usize,
    /// Also research the original query as one of the sub-queries.
    pub include_original_query: bool,
    /// Result cap passed to every retriever search.
    pub max_search_results_per_query: usize,
    /// Sub-query iterations running at once.
    pub max_concurrent_iterations: usize,
    /// Per-iteration timeout in seconds.
    pub iteration_timeout_secs: u64,
    /// Pages scraped at once per sub-query.
    pub scrape_concurrency: usize,
    /// Scraped pages shorter than this many characters are dropped.
    pub min_content_length: usize,
    /// Adaptive curation relaxes thresholds below this count.
    pub min_sources: usize,
    /// Hard cap on curated sources per sub-query.
    pub max_sources: Option<usize>,
    /// Domains whose sources are dropped.
    pub exclude_domains: Vec<String>,
    /// A source must mention at least one of these, when non-empty.
    pub require_keywords: Vec<String>,
    /// Sub-queries to use instead of generating them.
    pub custom_sub_queries: Vec<String>,
    /// Caller-supplied writing instruction.
    pub custom_prompt: Option<String>,
    /// Role prompt that bypasses persona selection.
    pub agent_role: Option<String>,
    /// Chunks retrieved per drafted section.
    pub similarity_k: usize,
    /// Context chunk size in characters.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks.
    pub chunk_overlap: usize,
    /// Stream the report writer's output to the progress sink.
    pub stream: bool,
    /// Root directory for the `local` retriever.
    pub doc_path: Option<PathBuf>,
    /// Scraper used for every link instead of URL-based selection.
    pub scraper: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            report_type: ReportType::default(),
            report_source: ReportSource::default(),
            tone: Tone::default(),
            total_words: 1000,
            language: "english".to_string(),
            output_formats: vec!["markdown".to_string()],
            max_subtopics: 5,
            retrievers: vec!["duckduckgo".to_string()],
            source_urls: Vec::new(),
            query_domains: Vec::new(),
            mcp_server_command: None,
            mcp_server_args: Vec::new(),
            mcp_tool_name: None,
            embedding_provider: "hash".to_string(),
            budget: BudgetLimits::default(),
            enforce_budget: true,
            dual_curation: true,
            curation_strategy: CurationStrategy::default(),
            max_sub_queries: 3,
            include_original_query: true,
            max_search_results_per_query: 5,
            max_concurrent_iterations: 4,
            iteration_timeout_secs: 120,
            scrape_concurrency: 8,
            min_content_length: 100,
            min_sources: 3,
            max_sources: None,
            exclude_domains: Vec::new(),
            require_keywords: Vec::new(),
            custom_sub_queries: Vec::new(),
            custom_prompt: None,
            agent_role: None,
            similarity_k: 6,
            chunk_size: 1000,
            chunk_overlap: 100,
            stream: false,
            doc_path: None,
            scraper: None,
        }
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::invalid(key, value, e.to_string()))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, value, "expected true or false")),
    }
}

/// A JSON array of strings, or a comma-separated list.
fn parse_list(key: &str, value: &str) -> Result<Vec<String>, ConfigError> {
    let trimmed = value.trim();
    if trimmed.starts_with('[') {
        let items: Vec<String> = serde_json::from_str(trimmed)
            .map_err(|e| ConfigError::invalid(key, value, format!("bad JSON list: {e}")))?;
        return Ok(items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect());
    }
    Ok(trimmed
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect())
}

fn parse_limit(key: &str, value: &str) -> Result<Option<f64>, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    let limit: f64 = parse(key, trimmed)?;
    if !limit.is_finite() || limit < 0.0 {
        return Err(ConfigError::invalid(key, value, "must be a non-negative number"));
    }
    Ok(Some(limit))
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl RunConfig {
    /// Builds a configuration from an option map, then validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] for a recognized key whose
    /// value cannot be parsed, or when the result fails validation.
    pub fn from_options<S: std::hash::BuildHasher>(options: &HashMap<String, String, S>) -> Result<Self, ConfigError> {
        // Sorted so that errors are reported deterministically.
        let sorted: BTreeMap<&String, &String> = options.iter().collect();
        let mut config = Self::default();
        for (key, value) in sorted {
            config.set(key, value)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Builds a configuration from `RESEARCH_<KEY>` environment variables.
    ///
    /// # Errors
    ///
    /// Same as [`RunConfig::from_options`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds a configuration by resolving `RESEARCH_<KEY>` through `lookup`.
    ///
    /// # Errors
    ///
    /// Same as [`RunConfig::from_options`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let options: HashMap<String, String> = RECOGNIZED_KEYS
            .iter()
            .filter_map(|key| {
                let var = format!("{ENV_PREFIX}{}", key.to_uppercase());
                lookup(&var).map(|v| ((*key).to_string(), v))
            })
            .collect();
        Self::from_options(&options)
    }

    /// Applies one option. Unrecognized keys are ignored and reported as
    /// `false`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] when the value is malformed.
    pub fn set(&mut self, key: &str, value: &str) -> Result<bool, ConfigError> {
        let key = key.trim().to_lowercase();
        let k = key.as_str();
        match k {
            "report_type" => self.report_type = parse(k, value)?,
            "report_source" => self.report_source = parse(k, value)?,
            "tone" => self.tone = parse(k, value)?,
            "total_words" => self.total_words = parse(k, value)?,
            "language" => self.language = value.trim().to_string(),
            "output_formats" => self.output_formats = parse_list(k, value)?,
            "max_subtopics" => self.max_subtopics = parse(k, value)?,
            "retrievers" => {
                self.retrievers = parse_list(k, value)?
                    .into_iter()
                    .map(|r| r.to_lowercase())
                    .collect();
            }
            "source_urls" => self.source_urls = parse_list(k, value)?,
            "query_domains" => self.query_domains = parse_list(k, value)?,
            "mcp_server_command" => self.mcp_server_command = non_empty(value),
            "mcp_server_args" => self.mcp_server_args = parse_list(k, value)?,
            "mcp_tool_name" => self.mcp_tool_name = non_empty(value),
            "embedding_provider" => self.embedding_provider = value.trim().to_lowercase(),
            "token_limit" => self.budget.tokens = parse_limit(k, value)?,
            "web_call_limit" => self.budget.web_calls = parse_limit(k, value)?,
            "cost_limit" => self.budget.cost = parse_limit(k, value)?,
            "enforce_budget" => self.enforce_budget = parse_bool(k, value)?,
            "dual_curation" => self.dual_curation = parse_bool(k, value)?,
            "curation_strategy" => self.curation_strategy = parse(k, value)?,
            "max_sub_queries" => self.max_sub_queries = parse(k, value)?,
            "include_original_query" => self.include_original_query = parse_bool(k, value)?,
            "max_search_results_per_query" => self.max_search_results_per_query = parse(k, value)?,
            "max_concurrent_iterations" => self.max_concurrent_iterations = parse(k, value)?,
            "iteration_timeout_secs" => self.iteration_timeout_secs = parse(k, value)?,
            "scrape_concurrency" => self.scrape_concurrency = parse(k, value)?,
            "min_content_length" => self.min_content_length = parse(k, value)?,
            "min_sources" => self.min_sources = parse(k, value)?,
            "max_sources" => {
                self.max_sources = if value.trim().is_empty() || value.trim().eq_ignore_ascii_case("none") {
                    None
                } else {
                    Some(parse(k, value)?)
                };
            }
            "exclude_domains" => self.exclude_domains = parse_list(k, value)?,
            "require_keywords" => self.require_keywords = parse_list(k, value)?,
            "custom_sub_queries" => self.custom_sub_queries = parse_list(k, value)?,
            "custom_prompt" => self.custom_prompt = non_empty(value),
            "agent_role" => self.agent_role = non_empty(value),
            "similarity_k" => self.similarity_k = parse(k, value)?,
            "chunk_size" => self.chunk_size = parse(k, value)?,
            "chunk_overlap" => self.chunk_overlap = parse(k, value)?,
            "stream" => self.stream = parse_bool(k, value)?,
            "doc_path" => self.doc_path = non_empty(value).map(PathBuf::from),
            "scraper" => self.scraper = non_empty(value).map(|s| s.to_lowercase()),
            _ => {
                tracing::debug!(key = k, "ignoring unrecognized option");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] naming the first bad option.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("total_words", self.total_words),
            ("max_sub_queries", self.max_sub_queries),
            ("max_search_results_per_query", self.max_search_results_per_query),
            ("max_concurrent_iterations", self.max_concurrent_iterations),
            ("scrape_concurrency", self.scrape_concurrency),
            ("similarity_k", self.similarity_k),
            ("chunk_size", self.chunk_size),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::invalid(key, "0", "must be at least 1"));
            }
        }
        if self.iteration_timeout_secs == 0 {
            return Err(ConfigError::invalid("iteration_timeout_secs", "0", "must be at least 1"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::invalid(
                "chunk_overlap",
                &self.chunk_overlap.to_string(),
                format!("must be smaller than chunk_size ({})", self.chunk_size),
            ));
        }
        if self.max_sources == Some(0) {
            return Err(ConfigError::invalid("max_sources", "0", "must be at least 1"));
        }
        if self.report_source == ReportSource::Web && self.retrievers.is_empty() {
            return Err(ConfigError::invalid("retrievers", "", "at least one retriever is required"));
        }
        Ok(())
    }

    /// Retriever identifiers implied by the report source.
    #[must_use]
    pub fn effective_retrievers(&self) -> Vec<String> {
        match self.report_source {
            ReportSource::Web => self.retrievers.clone(),
            ReportSource::Local => vec![crate::retriever::local::NAME.to_string()],
            ReportSource::Hybrid => {
                let mut names = self.retrievers.clone();
                if !names.iter().any(|n| n == crate::retriever::local::NAME) {
                    names.push(crate::retriever::local::NAME.to_string());
                }
                names
            }
            ReportSource::Static => vec![crate::retriever::urls::NAME.to_string()],
            ReportSource::VectorStore => vec![crate::retriever::vector::NAME.to_string()],
        }
    }

    /// The query for `text` with this run's report parameters.
    #[must_use]
    pub fn query(&self, text: impl Into<String>) -> Query {
        Query {
            text: text.into(),
            report_type: self.report_type,
            tone: self.tone,
            total_words: self.total_words,
            language: self.language.clone(),
            output_formats: self.output_formats.clone(),
        }
    }

    /// Curation knobs.
    #[must_use]
    pub fn curation(&self) -> CurationConfig {
        CurationConfig {
            dual_curation: self.dual_curation,
            strategy: self.curation_strategy,
            min_sources: self.min_sources,
            max_sources: self.max_sources,
            exclude_domains: self.exclude_domains.clone(),
            require_keywords: self.require_keywords.clone(),
        }
    }

    /// Per-iteration timeout.
    #[must_use]
    pub const fn iteration_timeout(&self) -> Duration {
        Duration::from_secs(self.iteration_timeout_secs)
    }

    /// Options forwarded to externally registered retrievers through the
    /// retriever option map.
    #[must_use]
    pub fn retriever_headers(&self) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        if let Some(command) = &self.mcp_server_command {
            headers.insert("mcp_server_command".to_string(), command.clone());
        }
        if !self.mcp_server_args.is_empty() {
            headers.insert("mcp_server_args".to_string(), self.mcp_server_args.join(","));
        }
        if let Some(tool) = &self.mcp_tool_name {
            headers.insert("mcp_tool_name".to_string(), tool.clone());
        }
        headers
    }

    /// Sets the report type.
    #[must_use]
    pub const fn with_report_type(mut self, report_type: ReportType) -> Self {
        self.report_type = report_type;
        self
    }

    /// Sets the report source.
    #[must_use]
    pub const fn with_report_source(mut self, source: ReportSource) -> Self {
        self.report_source = source;
        self
    }

    /// Sets the tone.
    #[must_use]
    pub const fn with_tone(mut self, tone: Tone) -> Self {
        self.tone = tone;
        self
    }

    /// Sets the retriever list.
    #[must_use]
    pub fn with_retrievers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.retrievers = names.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the maximum number of generated sub-queries.
    #[must_use]
    pub const fn with_max_sub_queries(mut self, n: usize) -> Self {
        self.max_sub_queries = n;
        self
    }

    /// Uses these sub-queries instead of generating them.
    #[must_use]
    pub fn with_custom_sub_queries<I, S>(mut self, sub_queries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.custom_sub_queries = sub_queries.into_iter().map(Into::into).collect();
        self
    }

    /// Sets whether the original query is researched too.
    #[must_use]
    pub const fn with_include_original_query(mut self, include: bool) -> Self {
        self.include_original_query = include;
        self
    }

    /// Sets the budget ceilings.
    #[must_use]
    pub const fn with_budget(mut self, budget: BudgetLimits) -> Self {
        self.budget = budget;
        self
    }

    /// Sets the curation strategy.
    #[must_use]
    pub const fn with_curation_strategy(mut self, strategy: CurationStrategy) -> Self {
        self.curation_strategy = strategy;
        self
    }

    /// Enables or disables dual curation.
    #[must_use]
    pub const fn with_dual_curation(mut self, enabled: bool) -> Self {
        self.dual_curation = enabled;
        self
    }

    /// Sets the per-iteration timeout.
    #[must_use]
    pub const fn with_iteration_timeout(mut self, timeout: Duration) -> Self {
        self.iteration_timeout_secs = timeout.as_secs();
        self
    }

    /// Sets the minimum scraped content length.
    #[must_use]
    pub const fn with_min_content_length(mut self, chars: usize) -> Self {
        self.min_content_length = chars;
        self
    }

    /// Sets the custom writing instruction.
    #[must_use]
    pub fn with_custom_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.custom_prompt = non_empty(&prompt.into());
        self
    }

    /// Sets a role prompt that bypasses persona selection.
    #[must_use]
    pub fn with_agent_role(mut self, role: impl Into<String>) -> Self {
        self.agent_role = non_empty(&role.into());
        self
    }

    /// Sets the local document root.
    #[must_use]
    pub fn with_doc_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.doc_path = Some(path.into());
        self
    }

    /// Sets the static source URLs.
    #[must_use]
    pub fn with_source_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_urls = urls.into_iter().map(Into::into).collect();
        self
    }

    /// Enables streaming of the writer output.
    #[must_use]
    pub const fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}
