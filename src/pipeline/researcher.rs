//! The research entry point.
//!
//! [`Researcher`] owns everything that outlives a single run (configuration,
//! registries, the LLM provider) and builds a fresh [`RunContext`] for each
//! call to [`Researcher::run`], so independent runs can proceed concurrently
//! on one instance.

use std::sync::Arc;
use std::time::Duration;

use crate::agent::{
    AgentConfig, LlmProvider, MeteredProvider, Persona, PersonaAgent, PromptSet, RelevanceAgent, SubQueryAgent,
    create_provider,
};
use crate::config::RunConfig;
use crate::context::{Document, Iteration, IterationRecord, merge_iterations};
use crate::core::{ReportSection, SourceRecord};
use crate::curation::{
    Collector, CurationEngine, CurationMode, HeuristicScorer, KeywordRelevance, LlmRelevance, RelevanceFilter,
    SourceScorer,
};
use crate::error::{ResearchError, Result};
use crate::planner::{COST, StepStatus, TOKENS};
use crate::retriever::{RetrieverOptions, RetrieverRegistry};
use crate::retry::RetryPolicy;
use crate::scraper::{Scraper, ScraperRegistry};
use crate::vectorstore::{Embedder, InMemoryVectorStore, VectorStore, create_embedder};

use super::outcome::{RejectedSource, ResearchOutcome};
use super::retrieve::{IterationResult, RetrievalPlan, retrieve_all};
use super::run::RunContext;
use super::sink::{ProgressSink, TracingSink};
use super::state::PipelineState;
use super::synthesis::{ReportParts, Synthesizer, assemble};

/// Longest accepted query, in characters.
pub const MAX_QUERY_LEN: usize = 10_000;

const SCRAPE_TIMEOUT: Duration = Duration::from_secs(20);
const OUTLINE_EXCERPT_CHARS: usize = 200;

/// Builder for [`Researcher`].
pub struct ResearcherBuilder {
    config: RunConfig,
    agents: AgentConfig,
    provider: Option<Arc<dyn LlmProvider>>,
    prompts: Option<PromptSet>,
    retrievers: Option<RetrieverRegistry>,
    scrapers: Option<ScraperRegistry>,
    relevance: Option<Arc<dyn RelevanceFilter>>,
    scorer: Option<Arc<dyn SourceScorer>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    sink: Option<Arc<dyn ProgressSink>>,
}

impl ResearcherBuilder {
    /// Uses `provider` instead of one created from the agent configuration.
    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Uses `prompts` instead of loading them from the prompt directory.
    #[must_use]
    pub fn prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = Some(prompts);
        self
    }

    /// Replaces the built-in retriever registry.
    #[must_use]
    pub fn retrievers(mut self, registry: RetrieverRegistry) -> Self {
        self.retrievers = Some(registry);
        self
    }

    /// Replaces the built-in scraper registry.
    #[must_use]
    pub fn scrapers(mut self, registry: ScraperRegistry) -> Self {
        self.scrapers = Some(registry);
        self
    }

    /// Replaces the LLM relevance filter.
    #[must_use]
    pub fn relevance_filter(mut self, filter: Arc<dyn RelevanceFilter>) -> Self {
        self.relevance = Some(filter);
        self
    }

    /// Replaces the heuristic scorer.
    #[must_use]
    pub fn scorer(mut self, scorer: Arc<dyn SourceScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// Store searched by the `vectorstore` retriever.
    #[must_use]
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Progress sink; defaults to [`TracingSink`].
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Validates the configuration and builds the researcher.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::Config`] for an invalid run configuration or
    /// embedding provider, [`ResearchError::Agent`] when no LLM provider can
    /// be created, and [`ResearchError::Retriever`] for an unknown forced
    /// scraper.
    pub fn build(self) -> Result<Researcher> {
        self.config.validate()?;
        let embedder: Arc<dyn Embedder> = Arc::from(create_embedder(&self.config.embedding_provider)?);
        let provider = match self.provider {
            Some(provider) => provider,
            None => create_provider(&self.agents)?,
        };
        let prompts = self
            .prompts
            .unwrap_or_else(|| PromptSet::load(self.agents.prompt_dir.as_deref()));
        let scrapers = match self.scrapers {
            Some(scrapers) => scrapers,
            None => ScraperRegistry::with_defaults(SCRAPE_TIMEOUT, RetryPolicy::default())?,
        };
        let forced: Option<Arc<dyn Scraper>> = self
            .config
            .scraper
            .as_deref()
            .map(|name| scrapers.by_name(name))
            .transpose()?;

        let mut collector = Collector::new(
            scrapers,
            self.config.max_search_results_per_query,
            self.config.scrape_concurrency,
            self.config.min_content_length,
        );
        if let Some(scraper) = forced {
            collector = collector.with_forced_scraper(scraper);
        }

        Ok(Researcher {
            retry: self.agents.retry_policy(),
            config: self.config,
            agents: self.agents,
            provider,
            prompts,
            retrievers: Arc::new(self.retrievers.unwrap_or_else(RetrieverRegistry::with_defaults)),
            collector: Arc::new(collector),
            relevance: self.relevance,
            scorer: self.scorer.unwrap_or_else(|| Arc::new(HeuristicScorer::default())),
            vector_store: self.vector_store,
            embedder,
            sink: self.sink.unwrap_or_else(|| Arc::new(TracingSink)),
        })
    }
}

/// Runs research queries end to end.
pub struct Researcher {
    config: RunConfig,
    agents: AgentConfig,
    retry: RetryPolicy,
    provider: Arc<dyn LlmProvider>,
    prompts: PromptSet,
    retrievers: Arc<RetrieverRegistry>,
    collector: Arc<Collector>,
    relevance: Option<Arc<dyn RelevanceFilter>>,
    scorer: Arc<dyn SourceScorer>,
    vector_store: Option<Arc<dyn VectorStore>>,
    embedder: Arc<dyn Embedder>,
    sink: Arc<dyn ProgressSink>,
}

/// Results accumulated as the run advances; whatever is here when the run
/// stops goes into the outcome.
struct Gathered {
    persona: Persona,
    sub_queries: Vec<String>,
    curated: Vec<SourceRecord>,
    rejected: Vec<RejectedSource>,
    curation_mode: CurationMode,
    iterations: Vec<IterationRecord>,
    parts: ReportParts,
    streamed: bool,
}

impl Default for Gathered {
    fn default() -> Self {
        Self {
            persona: Persona::default(),
            sub_queries: Vec::new(),
            curated: Vec::new(),
            rejected: Vec::new(),
            curation_mode: CurationMode::Raw,
            iterations: Vec::new(),
            parts: ReportParts::default(),
            streamed: false,
        }
    }
}

impl Researcher {
    /// Starts a builder.
    #[must_use]
    pub fn builder(config: RunConfig, agents: AgentConfig) -> ResearcherBuilder {
        ResearcherBuilder {
            config,
            agents,
            provider: None,
            prompts: None,
            retrievers: None,
            scrapers: None,
            relevance: None,
            scorer: None,
            vector_store: None,
            sink: None,
        }
    }

    /// The run configuration.
    #[must_use]
    pub const fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Researches `query` and returns the report with its trace.
    ///
    /// Everything that goes wrong after the run starts degrades into
    /// warnings; an unrecoverable failure still returns the partial report
    /// with [`ResearchOutcome::error`] set.
    ///
    /// # Errors
    ///
    /// Fails before any work for an empty or oversized query, and for a
    /// retriever that cannot be constructed (unknown identifier, missing
    /// credential or option).
    pub async fn run(&self, query: &str) -> Result<ResearchOutcome> {
        let text = validate_query(query)?;
        let options = Arc::new(self.retriever_options());
        let retrievers = self.config.effective_retrievers();
        for name in &retrievers {
            self.retrievers.create(name, &text, &options)?;
        }

        let mut run = RunContext::new(
            self.config.query(text),
            self.config.budget,
            self.config.enforce_budget,
            Arc::clone(&self.sink),
        );
        tracing::info!(query = %run.query.text, report_type = run.query.report_type.as_str(), "research run started");

        let provider: Arc<dyn LlmProvider> = Arc::new(MeteredProvider::new(
            Arc::clone(&self.provider),
            Arc::clone(&run.plan),
            &self.agents,
        ));
        let retrieval = RetrievalPlan {
            retrievers: Arc::new(retrievers),
            registry: Arc::clone(&self.retrievers),
            options,
            collector: Arc::clone(&self.collector),
            max_concurrent: self.config.max_concurrent_iterations,
            timeout: self.config.iteration_timeout(),
            enforce_budget: self.config.enforce_budget,
        };
        let date = chrono::Utc::now().date_naive().to_string();

        let mut gathered = Gathered::default();
        let failure = self
            .drive(&mut run, &provider, &retrieval, &date, &mut gathered)
            .await
            .err();
        Ok(Self::finish(run, gathered, failure, &date))
    }

    fn retriever_options(&self) -> RetrieverOptions {
        RetrieverOptions {
            headers: self.config.retriever_headers(),
            query_domains: self.config.query_domains.clone(),
            source_urls: self.config.source_urls.clone(),
            doc_path: self.config.doc_path.clone(),
            vector_store: self.vector_store.clone(),
            ..RetrieverOptions::default()
        }
    }

    async fn drive(
        &self,
        run: &mut RunContext,
        provider: &Arc<dyn LlmProvider>,
        retrieval: &RetrievalPlan,
        date: &str,
        gathered: &mut Gathered,
    ) -> Result<()> {
        gathered.persona = self.select_persona(run, provider.as_ref()).await;
        run.sink.log(&format!("persona: {}", gathered.persona.server));

        run.transition(PipelineState::SubQueryGen);
        gathered.sub_queries = self.plan_sub_queries(run, provider.as_ref(), date).await;
        for sub_query in &gathered.sub_queries {
            run.plan.add_step(sub_query.clone(), "research sub-query");
        }
        run.sink.log(&format!("sub-queries: {}", gathered.sub_queries.join(" | ")));

        run.transition(PipelineState::Retrieve);
        let results = retrieve_all(&gathered.sub_queries, retrieval, &run.plan, &run.visited).await?;
        let collected = Self::absorb_iterations(run, &results, gathered);
        run.sink.log(&format!("collected {} sources", collected.len()));

        run.transition(PipelineState::Curate);
        let halted = run.should_halt();
        self.curate(run, provider, collected, halted, gathered).await;

        run.transition(PipelineState::AssembleContext);
        let iterations = context_iterations(&results, &gathered.curated);
        gathered.iterations = iterations.iter().map(|i| i.record.clone()).collect();
        let context = merge_iterations(&iterations);

        if run.should_halt() {
            run.note_halt();
            gathered.parts.sections = vec![gathered_context_section(&context)];
            return Ok(());
        }

        let synthesizer = Synthesizer {
            provider: provider.as_ref(),
            agents: &self.agents,
            prompts: &self.prompts,
            retry: &self.retry,
            persona: &gathered.persona,
            custom_prompt: self.config.custom_prompt.as_deref(),
            date,
            stream: self.config.stream,
        };
        let (sections, streamed) = if run.query.report_type.requires_section_drafting() {
            let store = InMemoryVectorStore::new(
                Arc::clone(&self.embedder),
                self.config.chunk_size,
                self.config.chunk_overlap,
            );
            store.load(documents(&gathered.curated)).await;

            run.transition(PipelineState::RagSectionDraft);
            let headings = synthesizer
                .outline(run, &outline_summary(&gathered.curated), self.config.max_subtopics, &gathered.sub_queries)
                .await;
            let sections = synthesizer
                .draft_sections(
                    run,
                    &headings,
                    &store,
                    self.config.similarity_k,
                    self.config.max_concurrent_iterations,
                )
                .await;
            (sections, self.config.stream)
        } else {
            run.transition(PipelineState::Synthesize);
            synthesizer.write_body(run, &context).await
        };
        gathered.parts.sections = sections;
        gathered.streamed = streamed;

        if run.should_halt() {
            run.note_halt();
            return Ok(());
        }
        if run.states().current() != PipelineState::Synthesize {
            run.transition(PipelineState::Synthesize);
        }
        let sections = &gathered.parts.sections;
        gathered.parts.introduction = synthesizer.introduction(run, sections).await;
        gathered.parts.conclusion = synthesizer.conclusion(run, sections).await;
        gathered.parts.frame = synthesizer.frame(run, sections, &gathered.curated).await;
        Ok(())
    }

    async fn select_persona(&self, run: &mut RunContext, provider: &dyn LlmProvider) -> Persona {
        if let Some(role) = self.config.agent_role.as_deref().filter(|r| !r.trim().is_empty()) {
            return Persona::custom(role.trim());
        }
        let agent = PersonaAgent::new(&self.agents, self.prompts.persona.clone());
        match agent.select(provider, &run.query.text, &self.retry).await {
            Ok((persona, _)) => persona,
            Err(e) => {
                run.warn(format!("persona selection failed, using the default persona: {e}"));
                Persona::default()
            }
        }
    }

    async fn plan_sub_queries(&self, run: &mut RunContext, provider: &dyn LlmProvider, date: &str) -> Vec<String> {
        let max = self.config.max_sub_queries.max(1);
        let query = run.query.text.clone();
        let custom: Vec<String> = self
            .config
            .custom_sub_queries
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .take(max)
            .collect();

        let mut sub_queries = if custom.is_empty() {
            let agent = SubQueryAgent::new(&self.agents, self.prompts.sub_queries.clone());
            match agent.generate(provider, &query, max, date, &self.retry).await {
                Ok((generated, _)) => generated,
                Err(e) => {
                    run.warn(format!("sub-query generation failed, researching the query directly: {e}"));
                    Vec::new()
                }
            }
        } else {
            custom
        };

        let has_original = sub_queries.iter().any(|s| s.eq_ignore_ascii_case(query.trim()));
        if sub_queries.is_empty() || (self.config.include_original_query && !has_original) {
            sub_queries.push(query);
        }
        sub_queries
    }

    /// Records per-iteration warnings and failures, returning every
    /// collected source.
    fn absorb_iterations(run: &mut RunContext, results: &[IterationResult], gathered: &mut Gathered) -> Vec<SourceRecord> {
        let mut sources = Vec::new();
        for result in results {
            match result.status {
                StepStatus::Skipped => run.note_halt(),
                StepStatus::Failed => run.warn(format!(
                    "sub-query '{}' failed: {}",
                    result.sub_query,
                    result.error.as_deref().unwrap_or("unknown error")
                )),
                _ => {}
            }
            if let Some(collected) = &result.collected {
                gathered.rejected.extend(collected.failures.iter().map(|f| RejectedSource {
                    url: f.url.clone(),
                    title: String::new(),
                    reason: f.reason.clone(),
                }));
                sources.extend(collected.sources.iter().cloned());
            }
        }
        sources
    }

    async fn curate(
        &self,
        run: &mut RunContext,
        provider: &Arc<dyn LlmProvider>,
        collected: Vec<SourceRecord>,
        halted: bool,
        gathered: &mut Gathered,
    ) {
        let relevance: Arc<dyn RelevanceFilter> = if halted {
            run.note_halt();
            run.warn("curating with keyword relevance because the budget is exhausted");
            Arc::new(KeywordRelevance)
        } else if let Some(filter) = &self.relevance {
            Arc::clone(filter)
        } else {
            Arc::new(LlmRelevance::new(
                RelevanceAgent::new(&self.agents, self.prompts.relevance.clone()),
                Arc::clone(provider),
                self.retry,
            ))
        };

        let engine = CurationEngine::new(relevance, Arc::clone(&self.scorer), self.config.curation());
        let outcome = engine.curate(&run.query.text, collected).await;
        for warning in outcome.warnings {
            run.warn(warning);
        }
        gathered.rejected.extend(outcome.rejected.into_iter().map(|s| RejectedSource {
            reason: s.rejection_reason.unwrap_or_else(|| "rejected".to_string()),
            url: s.url,
            title: s.title,
        }));
        run.sink.log(&format!("curated {} sources", outcome.selected.len()));
        gathered.curated = outcome.selected;
        gathered.curation_mode = outcome.mode;
    }

    fn finish(mut run: RunContext, gathered: Gathered, failure: Option<ResearchError>, date: &str) -> ResearchOutcome {
        let error = failure.map(|e| {
            tracing::error!(error = %e, "research run aborted");
            run.transition(PipelineState::Aborted);
            e.to_string()
        });
        if error.is_none() {
            run.transition(PipelineState::Assemble);
        }

        let report = assemble(&run.query, gathered.parts, &gathered.curated, date);
        let report_text = report.to_markdown();
        if !gathered.streamed {
            run.sink.report(&report_text);
        }
        if error.is_none() {
            run.transition(PipelineState::Done);
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let total_tokens = run.plan.used(TOKENS).round() as u64;
        let total_cost = run.plan.used(COST);
        let states = run.states().history().to_vec();
        let final_state = run.states().current();
        tracing::info!(
            state = ?final_state,
            sources = gathered.curated.len(),
            total_tokens,
            total_cost,
            elapsed_ms = run.elapsed_ms(),
            "research run finished"
        );

        ResearchOutcome {
            query: run.query.clone(),
            persona: gathered.persona,
            sub_queries: gathered.sub_queries,
            report,
            report_text,
            sources: gathered.curated,
            rejected: gathered.rejected,
            curation_mode: gathered.curation_mode,
            iterations: gathered.iterations,
            plan: run.plan.trace(),
            states,
            final_state,
            warnings: run.warnings().to_vec(),
            error,
            total_tokens,
            total_cost,
            elapsed_ms: run.elapsed_ms(),
        }
    }
}

/// Rejects empty and oversized queries, returning the trimmed text.
///
/// # Errors
///
/// Returns [`ResearchError::InvalidQuery`].
pub fn validate_query(query: &str) -> Result<String> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(ResearchError::InvalidQuery {
            message: "query is empty".to_string(),
        });
    }
    let len = trimmed.chars().count();
    if len > MAX_QUERY_LEN {
        return Err(ResearchError::InvalidQuery {
            message: format!("query is {len} characters; the limit is {MAX_QUERY_LEN}"),
        });
    }
    Ok(trimmed.to_string())
}

fn source_text(source: &SourceRecord) -> String {
    format!("Source: {}\nTitle: {}\nContent: {}", source.url, source.title, source.raw_content)
}

/// Regroups curated sources under the iteration that collected them.
fn context_iterations(results: &[IterationResult], curated: &[SourceRecord]) -> Vec<Iteration> {
    results
        .iter()
        .map(|result| {
            let context: Vec<String> = curated
                .iter()
                .filter(|s| s.sub_query_index == result.index)
                .map(source_text)
                .collect();
            Iteration {
                record: IterationRecord {
                    index: result.index,
                    sub_query: result.sub_query.clone(),
                    elapsed_ms: u64::try_from(result.elapsed.as_millis()).unwrap_or(u64::MAX),
                    success: result.status == StepStatus::Done,
                    error: result.error.clone(),
                    sources: context.len(),
                },
                context,
            }
        })
        .collect()
}

fn documents(curated: &[SourceRecord]) -> Vec<Document> {
    curated
        .iter()
        .map(|s| Document {
            content: s.raw_content.clone(),
            url: s.url.clone(),
            title: s.title.clone(),
        })
        .collect()
}

fn outline_summary(curated: &[SourceRecord]) -> String {
    curated
        .iter()
        .map(|s| {
            let excerpt: String = s.raw_content.chars().take(OUTLINE_EXCERPT_CHARS).collect();
            format!("- {} ({}): {excerpt}", s.title, s.url)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn gathered_context_section(context: &str) -> ReportSection {
    let content = if context.trim().is_empty() {
        "_No sources were gathered before the budget ran out._".to_string()
    } else {
        context.to_string()
    };
    ReportSection {
        title: "Gathered context".to_string(),
        content,
        placeholder: true,
    }
}
