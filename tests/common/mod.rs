//! Scripted LLM provider and mock retrievers shared by the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use research_rs::agent::prompt::{
    CONCLUSION_PROMPT, FRAME_SYSTEM_PROMPT, INTRODUCTION_PROMPT, OUTLINE_SYSTEM_PROMPT, PERSONA_SYSTEM_PROMPT,
    RELEVANCE_SYSTEM_PROMPT, SUB_QUERIES_SYSTEM_PROMPT,
};
use research_rs::agent::{AgentConfig, ChatRequest, ChatResponse, LlmProvider, PromptSet, TextStream, TokenUsage};
use research_rs::core::RetrievalResult;
use research_rs::error::AgentError;
use research_rs::retriever::{MockRetriever, Retriever, RetrieverRegistry};
use research_rs::{Researcher, RunConfig};
use serde_json::json;

pub const QUERY: &str = "What are the biggest trends in AI lately?";
pub const PERSONA_ROLE: &str = "You are a seasoned technology analyst.";
pub const FRAME_TITLE: &str = "AI Trends Report";
pub const INVENTED_URL: &str = "https://invented.example.org/not-curated";

/// Which kind of call a request is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Persona,
    SubQueries,
    Relevance,
    Outline,
    Frame,
    Introduction,
    Conclusion,
    Section,
    Body,
}

pub fn classify(request: &ChatRequest) -> CallKind {
    let system = request.messages.first().map_or("", |m| m.content.as_str());
    let user = request.messages.last().map_or("", |m| m.content.as_str());
    match system {
        s if s == PERSONA_SYSTEM_PROMPT => CallKind::Persona,
        s if s == SUB_QUERIES_SYSTEM_PROMPT => CallKind::SubQueries,
        s if s == RELEVANCE_SYSTEM_PROMPT => CallKind::Relevance,
        s if s == OUTLINE_SYSTEM_PROMPT => CallKind::Outline,
        s if s == FRAME_SYSTEM_PROMPT => CallKind::Frame,
        _ if user.contains(INTRODUCTION_PROMPT) => CallKind::Introduction,
        _ if user.contains(CONCLUSION_PROMPT) => CallKind::Conclusion,
        _ if user.contains("<section>") => CallKind::Section,
        _ => CallKind::Body,
    }
}

/// Answers every pipeline call with canned, well-formed output and records
/// the requests it saw.
pub struct ScriptedProvider {
    pub sub_queries: Vec<String>,
    pub sections: Vec<String>,
    pub failing: Vec<CallKind>,
    pub break_body_stream: bool,
    pub requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new(sub_queries: &[&str]) -> Self {
        Self {
            sub_queries: sub_queries.iter().map(ToString::to_string).collect(),
            sections: vec!["Model scale".to_string(), "Hardware".to_string()],
            failing: Vec::new(),
            break_body_stream: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(mut self, kinds: &[CallKind]) -> Self {
        self.failing = kinds.to_vec();
        self
    }

    /// Streams the first body paragraph, then fails the stream.
    pub fn breaking_body_stream(mut self) -> Self {
        self.break_body_stream = true;
        self
    }

    pub fn requests_of(&self, kind: CallKind) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|r| r.iter().filter(|req| classify(req) == kind).cloned().collect())
            .unwrap_or_default()
    }

    fn respond(&self, request: &ChatRequest) -> Result<String, AgentError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let kind = classify(request);
        if self.failing.contains(&kind) {
            return Err(AgentError::ApiRequest {
                message: format!("scripted failure for {kind:?}"),
                status: Some(500),
            });
        }
        let user = request.messages.last().map_or("", |m| m.content.as_str());
        let content = match kind {
            CallKind::Persona => json!({"server": "Tech Agent", "agent_role_prompt": PERSONA_ROLE}).to_string(),
            CallKind::SubQueries => json!({ "queries": self.sub_queries }).to_string(),
            CallKind::Relevance => {
                let count = user.matches("<source id=\"").count();
                let verdicts: Vec<_> = (0..count).map(|id| json!({"id": id, "relevance": "high"})).collect();
                json!({ "verdicts": verdicts }).to_string()
            }
            CallKind::Outline => json!({ "sections": self.sections }).to_string(),
            CallKind::Frame => {
                let mut sources: Vec<_> = user
                    .lines()
                    .filter(|line| line.starts_with("- "))
                    .filter_map(|line| line.rsplit_once('<'))
                    .filter_map(|(title, rest)| {
                        rest.strip_suffix('>')
                            .map(|url| json!({"title": title.trim_start_matches("- ").trim(), "url": url}))
                    })
                    .collect();
                sources.push(json!({"title": "Invented", "url": INVENTED_URL}));
                json!({
                    "title": FRAME_TITLE,
                    "table_of_contents": self.sections,
                    "introduction": "Frame introduction.",
                    "conclusion": "Frame conclusion.",
                    "sources": sources,
                })
                .to_string()
            }
            CallKind::Introduction => "AI is moving quickly on several fronts.".to_string(),
            CallKind::Conclusion => "The trends point to cheaper, more capable models.".to_string(),
            CallKind::Section => {
                let heading = user
                    .split_once("<section>")
                    .and_then(|(_, rest)| rest.split_once("</section>"))
                    .map_or("section", |(h, _)| h);
                format!("Drafted text about {heading}.")
            }
            CallKind::Body => "Opening remarks.\n\n## Findings\nModels keep growing.\n\n## Outlook\nAgents are next.\n"
                .to_string(),
        };
        Ok(content)
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        let content = self.respond(request)?;
        Ok(ChatResponse {
            content,
            usage: TokenUsage {
                prompt_tokens: 100,
                completion_tokens: 50,
                total_tokens: 150,
            },
            finish_reason: Some("stop".to_string()),
        })
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<TextStream, AgentError> {
        let content = self.respond(request)?;
        let mut pieces: Vec<Result<String, AgentError>> =
            content.split_inclusive('\n').map(|p| Ok(p.to_string())).collect();
        if self.break_body_stream && classify(request) == CallKind::Body {
            pieces.truncate(1);
            pieces.push(Err(AgentError::Stream {
                message: "connection reset".to_string(),
            }));
        }
        Ok(Box::pin(futures_util::stream::iter(pieces)))
    }
}

/// Long enough to pass the content-length floor, and mentioning the query
/// terms so keyword relevance keeps it.
pub fn source_content(sub_query: &str, n: usize) -> String {
    format!(
        "Source {n} for {sub_query}. The biggest trends in AI lately include larger models, \
         cheaper inference and agents. This study reports data from 2024 surveys."
    )
}

pub fn direct(url: &str, sub_query: &str, n: usize) -> RetrievalResult {
    RetrievalResult::DirectContent {
        source: url.to_string(),
        raw_content: source_content(sub_query, n),
        title: format!("{sub_query} #{n}"),
        image_urls: Vec::new(),
    }
}

pub fn slug(query: &str) -> String {
    query
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect()
}

/// `mock` retriever returning `per_query` unique sources per sub-query.
pub fn unique_sources_registry(per_query: usize) -> RetrieverRegistry {
    let mut registry = RetrieverRegistry::new();
    registry.register("mock", move |q, _| {
        let host = format!("{}.example.com", slug(q));
        let results = (0..per_query)
            .map(|n| direct(&format!("https://{host}/{n}"), q, n))
            .collect();
        Ok(Box::new(MockRetriever::direct(results)))
    });
    registry
}

/// Sleeps far past any iteration timeout.
pub struct SlowRetriever;

#[async_trait]
impl Retriever for SlowRetriever {
    fn name(&self) -> &'static str {
        "slow"
    }

    fn requires_scraping(&self) -> bool {
        false
    }

    async fn search(&self, _max_results: usize) -> Vec<RetrievalResult> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Vec::new()
    }
}

pub fn agent_config() -> AgentConfig {
    AgentConfig::builder()
        .provider("ollama")
        .max_retries(2)
        .retry_backoff(Duration::from_millis(1))
        .prices_per_1k(0.01, 0.03)
        .build()
        .unwrap_or_else(|_| unreachable!())
}

/// A configuration that runs offline against the `mock` retriever.
pub fn run_config() -> RunConfig {
    RunConfig {
        retrievers: vec!["mock".to_string()],
        dual_curation: false,
        include_original_query: false,
        max_sub_queries: 3,
        max_search_results_per_query: 10,
        min_content_length: 20,
        ..RunConfig::default()
    }
}

pub fn researcher(config: RunConfig, provider: Arc<ScriptedProvider>, registry: RetrieverRegistry) -> Researcher {
    Researcher::builder(config, agent_config())
        .provider(provider)
        .prompts(PromptSet::defaults())
        .retrievers(registry)
        .build()
        .unwrap_or_else(|_| unreachable!())
}
