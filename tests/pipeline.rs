//! End-to-end runs of the research pipeline against a scripted LLM provider
//! and mock retrievers.

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;

use common::{
    CallKind, FRAME_TITLE, INVENTED_URL, PERSONA_ROLE, QUERY, ScriptedProvider, SlowRetriever, direct, researcher,
    run_config, slug, unique_sources_registry,
};
use research_rs::agent::prompt::SECTION_PROMPT;
use research_rs::core::ReportType;
use research_rs::error::RetrieverError;
use research_rs::pipeline::{ChannelSink, EventKind, PipelineState};
use research_rs::planner::{StepStatus, WEB_CALLS};
use research_rs::retriever::{MockRetriever, RetrieverRegistry};
use research_rs::{ResearchError, ResearchOutcome, Researcher};

const SUB_QUERIES: [&str; 3] = ["AI model scaling 2024", "AI chip market", "AI agents adoption"];

async fn run(researcher: &Researcher) -> ResearchOutcome {
    researcher.run(QUERY).await.unwrap_or_else(|e| unreachable!("{e}"))
}

fn curated_urls(outcome: &ResearchOutcome) -> BTreeSet<String> {
    outcome.sources.iter().map(|s| s.url.clone()).collect()
}

fn five_sub_queries() -> Vec<String> {
    (1..=5).map(|i| format!("AI trend angle {i}")).collect()
}

#[tokio::test]
async fn test_basic_run_produces_complete_report() {
    let provider = Arc::new(ScriptedProvider::new(&SUB_QUERIES));
    let researcher = researcher(run_config(), Arc::clone(&provider), unique_sources_registry(7));
    let outcome = run(&researcher).await;

    assert!(outcome.is_complete());
    assert!(outcome.error.is_none());
    assert_eq!(outcome.sub_queries.len(), 3);
    assert!(!outcome.sources.is_empty());
    assert!(outcome.sources.len() <= 21);

    let report = &outcome.report;
    assert_eq!(report.title, FRAME_TITLE);
    assert!(!report.introduction.trim().is_empty());
    assert!(!report.conclusion.trim().is_empty());
    assert!(!report.sources.is_empty());
    let curated = curated_urls(&outcome);
    assert!(report.sources.iter().all(|c| curated.contains(&c.url)));
    assert!(report.sources.iter().all(|c| c.url != INVENTED_URL));

    let titles: Vec<&str> = report.body_sections.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["Overview", "Findings", "Outlook"]);
    assert_eq!(outcome.persona.role_prompt, PERSONA_ROLE);
    assert!(outcome.report_text.contains("## Findings"));

    let states: Vec<PipelineState> = outcome.states.iter().map(|v| v.state).collect();
    assert_eq!(
        states,
        vec![
            PipelineState::PersonaSelect,
            PipelineState::SubQueryGen,
            PipelineState::Retrieve,
            PipelineState::Curate,
            PipelineState::AssembleContext,
            PipelineState::Synthesize,
            PipelineState::Assemble,
            PipelineState::Done,
        ]
    );
    assert!(outcome.total_tokens > 0);
    assert!(outcome.total_cost > 0.0);
    assert!((outcome.plan.budgets[WEB_CALLS].used - 3.0).abs() < f64::EPSILON);
    assert_eq!(provider.requests_of(CallKind::Body).len(), 1);
}

#[tokio::test]
async fn test_duplicate_url_across_sub_queries_is_curated_once() {
    let mut registry = RetrieverRegistry::new();
    registry.register("mock", |q, _| {
        Ok(Box::new(MockRetriever::direct(vec![
            direct("https://example.com/a", q, 0),
            direct(&format!("https://{}.example.com/1", slug(q)), q, 1),
        ])))
    });
    let provider = Arc::new(ScriptedProvider::new(&SUB_QUERIES[..2]));
    let outcome = run(&researcher(run_config(), provider, registry)).await;

    let shared = outcome
        .sources
        .iter()
        .filter(|s| s.url == "https://example.com/a")
        .count();
    assert_eq!(shared, 1);
    assert_eq!(outcome.sources.len(), 3);
    let cited = outcome
        .report
        .sources
        .iter()
        .filter(|c| c.url == "https://example.com/a")
        .count();
    assert!(cited <= 1);
}

#[tokio::test]
async fn test_all_retrievers_empty_still_reports() {
    let mut registry = RetrieverRegistry::new();
    registry.register("mock", |_, _| Ok(Box::new(MockRetriever::direct(Vec::new()))));
    let provider = Arc::new(ScriptedProvider::new(&SUB_QUERIES));
    let outcome = run(&researcher(run_config(), Arc::clone(&provider), registry)).await;

    assert!(outcome.is_complete());
    assert!(outcome.sources.is_empty());
    assert!(outcome.report.sources.is_empty());
    assert!(!outcome.report_text.trim().is_empty());
    assert!(!outcome.report.introduction.is_empty());

    let body = provider.requests_of(CallKind::Body);
    let user = body[0].messages.last().map_or("", |m| m.content.as_str());
    assert!(user.contains("No external sources were found"));
}

#[tokio::test]
async fn test_web_call_budget_halts_after_two_iterations() {
    let mut config = run_config()
        .with_custom_sub_queries(five_sub_queries())
        .with_max_sub_queries(5);
    config.budget.web_calls = Some(2.0);
    let provider = Arc::new(ScriptedProvider::new(&[]));
    let outcome = run(&researcher(config, Arc::clone(&provider), unique_sources_registry(3))).await;

    assert!(outcome.is_complete());
    let statuses: Vec<StepStatus> = outcome.plan.steps.iter().map(|s| s.status).collect();
    assert_eq!(statuses.iter().filter(|s| **s == StepStatus::Done).count(), 2);
    assert_eq!(statuses.iter().filter(|s| **s == StepStatus::Skipped).count(), 3);
    assert!((outcome.plan.budgets[WEB_CALLS].used - 2.0).abs() < f64::EPSILON);
    assert!(outcome.plan.budgets[WEB_CALLS].exhausted);

    let done: BTreeSet<usize> = outcome
        .iterations
        .iter()
        .filter(|i| i.success)
        .map(|i| i.index)
        .collect();
    assert_eq!(done.len(), 2);
    assert!(!outcome.sources.is_empty());
    assert!(outcome.sources.iter().all(|s| done.contains(&s.sub_query_index)));

    assert!(outcome.warnings.iter().any(|w| w.contains("budget exhausted")));
    assert_eq!(outcome.report.body_sections[0].title, "Gathered context");
    assert!(provider.requests_of(CallKind::Body).is_empty());
    assert!(provider.requests_of(CallKind::Relevance).is_empty());
    assert!(
        !outcome
            .states
            .iter()
            .any(|v| v.state == PipelineState::Synthesize)
    );
}

#[tokio::test]
async fn test_timed_out_sub_query_does_not_fail_run() {
    let mut registry = RetrieverRegistry::new();
    registry.register("mock", |q, _| {
        if q.contains("slow") {
            return Ok(Box::new(SlowRetriever));
        }
        let host = format!("{}.example.com", slug(q));
        Ok(Box::new(MockRetriever::direct(vec![
            direct(&format!("https://{host}/0"), q, 0),
            direct(&format!("https://{host}/1"), q, 1),
        ])))
    });
    let mut sub_queries = five_sub_queries();
    sub_queries[2] = "slow lane".to_string();
    let mut config = run_config()
        .with_custom_sub_queries(sub_queries)
        .with_max_sub_queries(5);
    config.iteration_timeout_secs = 1;
    config.max_concurrent_iterations = 5;

    let outcome = run(&researcher(config, Arc::new(ScriptedProvider::new(&[])), registry)).await;

    assert!(outcome.is_complete());
    let failed: Vec<_> = outcome.iterations.iter().filter(|i| !i.success).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].index, 2);
    assert!(failed[0].error.as_deref().unwrap_or_default().contains("timed out"));

    let contributing: BTreeSet<usize> = outcome.sources.iter().map(|s| s.sub_query_index).collect();
    assert_eq!(contributing, BTreeSet::from([0, 1, 3, 4]));
    assert!(!outcome.report.sources.is_empty());
    assert!(outcome.warnings.iter().any(|w| w.contains("slow lane")));
}

#[tokio::test]
async fn test_detailed_report_drafts_sections_over_vector_store() {
    let config = run_config().with_report_type(ReportType::DetailedReport);
    let provider = Arc::new(ScriptedProvider::new(&SUB_QUERIES));
    let outcome = run(&researcher(config, Arc::clone(&provider), unique_sources_registry(4))).await;

    assert!(outcome.is_complete());
    let titles: Vec<&str> = outcome.report.body_sections.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["Model scale", "Hardware"]);
    assert_eq!(outcome.report.table_of_contents, vec!["Model scale".to_string(), "Hardware".to_string()]);
    assert!(outcome.report.body_sections[0].content.contains("Model scale"));

    let sections = provider.requests_of(CallKind::Section);
    assert_eq!(sections.len(), 2);
    for request in &sections {
        let user = request.messages.last().map_or("", |m| m.content.as_str());
        assert!(user.contains("Source: https://"));
    }
    assert!(provider.requests_of(CallKind::Body).is_empty());
    assert_eq!(provider.requests_of(CallKind::Introduction).len(), 1);
    assert!(
        outcome
            .states
            .iter()
            .any(|v| v.state == PipelineState::RagSectionDraft)
    );
}

#[tokio::test]
async fn test_outline_failure_falls_back_to_sub_queries() {
    let config = run_config().with_report_type(ReportType::Deep);
    let provider = Arc::new(ScriptedProvider::new(&SUB_QUERIES).failing(&[CallKind::Outline]));
    let outcome = run(&researcher(config, provider, unique_sources_registry(2))).await;

    let titles: Vec<&str> = outcome.report.body_sections.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, SUB_QUERIES.to_vec());
    assert!(outcome.warnings.iter().any(|w| w.contains("outline failed")));
}

#[tokio::test]
async fn test_custom_prompt_replaces_single_call_instruction() {
    let custom = "Answer in exactly three bullet points.";
    let config = run_config().with_custom_prompt(custom);
    let provider = Arc::new(ScriptedProvider::new(&SUB_QUERIES));
    run(&researcher(config, Arc::clone(&provider), unique_sources_registry(2))).await;

    let body = provider.requests_of(CallKind::Body);
    let system = body[0].messages.first().map_or("", |m| m.content.as_str());
    let user = body[0].messages.last().map_or("", |m| m.content.as_str());
    assert_eq!(system, PERSONA_ROLE);
    assert!(user.contains(custom));
    assert!(!user.contains("Write a detailed, well-structured"));
}

#[tokio::test]
async fn test_custom_prompt_appended_to_section_instruction() {
    let custom = "Cite at least one number per section.";
    let config = run_config()
        .with_report_type(ReportType::DetailedReport)
        .with_custom_prompt(custom);
    let provider = Arc::new(ScriptedProvider::new(&SUB_QUERIES));
    run(&researcher(config, Arc::clone(&provider), unique_sources_registry(2))).await;

    let sections = provider.requests_of(CallKind::Section);
    assert!(!sections.is_empty());
    for request in &sections {
        let user = request.messages.last().map_or("", |m| m.content.as_str());
        assert!(user.contains(SECTION_PROMPT));
        assert!(user.contains(custom));
    }
}

#[tokio::test]
async fn test_agent_role_skips_persona_selection() {
    let role = "You are a skeptical hardware engineer.";
    let config = run_config().with_agent_role(role);
    let provider = Arc::new(ScriptedProvider::new(&SUB_QUERIES));
    let outcome = run(&researcher(config, Arc::clone(&provider), unique_sources_registry(2))).await;

    assert!(provider.requests_of(CallKind::Persona).is_empty());
    assert_eq!(outcome.persona.role_prompt, role);
    let body = provider.requests_of(CallKind::Body);
    assert_eq!(body[0].messages.first().map(|m| m.content.as_str()), Some(role));
}

#[tokio::test]
async fn test_persona_failure_uses_default_persona() {
    let provider = Arc::new(ScriptedProvider::new(&SUB_QUERIES).failing(&[CallKind::Persona]));
    let outcome = run(&researcher(run_config(), provider, unique_sources_registry(2))).await;

    assert!(outcome.is_complete());
    assert_eq!(outcome.persona.server, "Default Agent");
    assert!(outcome.warnings.iter().any(|w| w.contains("persona selection failed")));
}

#[tokio::test]
async fn test_writer_failures_degrade_to_placeholders() {
    let provider = Arc::new(
        ScriptedProvider::new(&SUB_QUERIES).failing(&[CallKind::Body, CallKind::Introduction, CallKind::Frame]),
    );
    let outcome = run(&researcher(run_config(), provider, unique_sources_registry(2))).await;

    assert!(outcome.is_complete());
    assert!(outcome.report.body_sections[0].placeholder);
    assert!(!outcome.report.introduction.is_empty());
    assert_eq!(outcome.report.title, QUERY);
    assert_eq!(outcome.report.sources.len(), outcome.sources.len());
    assert!(outcome.warnings.len() >= 3);
}

#[tokio::test]
async fn test_relevance_failure_falls_back_to_raw_sources() {
    let provider = Arc::new(ScriptedProvider::new(&SUB_QUERIES).failing(&[CallKind::Relevance]));
    let outcome = run(&researcher(run_config(), provider, unique_sources_registry(2))).await;

    assert!(outcome.is_complete());
    assert_eq!(outcome.sources.len(), 6);
    assert!(outcome.warnings.iter().any(|w| w.contains("relevance curation failed")));
}

#[tokio::test]
async fn test_streaming_forwards_body_paragraphs() {
    let (sink, mut events) = ChannelSink::new();
    let config = run_config().with_stream(true);
    let researcher = Researcher::builder(config, common::agent_config())
        .provider(Arc::new(ScriptedProvider::new(&SUB_QUERIES)))
        .prompts(research_rs::PromptSet::defaults())
        .retrievers(unique_sources_registry(2))
        .sink(Arc::new(sink))
        .build()
        .unwrap_or_else(|_| unreachable!());
    run(&researcher).await;

    let mut reports = Vec::new();
    while let Ok(event) = events.try_recv() {
        if event.kind == EventKind::Report {
            reports.push(event.output);
        }
    }
    assert!(reports.iter().any(|r| r == "Models keep growing."));
    assert!(reports.iter().all(|r| !r.starts_with("# ")));
}

#[tokio::test]
async fn test_broken_body_stream_reports_assembled_markdown() {
    let (sink, mut events) = ChannelSink::new();
    let config = run_config().with_stream(true);
    let provider = Arc::new(ScriptedProvider::new(&SUB_QUERIES).breaking_body_stream());
    let researcher = Researcher::builder(config, common::agent_config())
        .provider(Arc::<ScriptedProvider>::clone(&provider))
        .prompts(research_rs::PromptSet::defaults())
        .retrievers(unique_sources_registry(2))
        .sink(Arc::new(sink))
        .build()
        .unwrap_or_else(|_| unreachable!());
    let outcome = run(&researcher).await;

    let mut reports = Vec::new();
    while let Ok(event) = events.try_recv() {
        if event.kind == EventKind::Report {
            reports.push(event.output);
        }
    }
    assert_eq!(provider.requests_of(CallKind::Body).len(), 1);
    assert_eq!(reports.iter().filter(|r| r.as_str() == "Opening remarks.").count(), 1);
    assert!(outcome.report.body_sections[0].placeholder);
    assert!(outcome.warnings.iter().any(|w| w.contains("report body could not be written")));
    assert_eq!(reports.last(), Some(&outcome.report_text));
}

#[tokio::test]
async fn test_missing_credential_fails_fast() {
    let mut registry = RetrieverRegistry::new();
    registry.register("keyed", |_, _| {
        Err(RetrieverError::MissingCredential {
            retriever: "keyed".to_string(),
            variable: "KEYED_API_KEY".to_string(),
        })
    });
    let config = run_config().with_retrievers(["keyed"]);
    let provider = Arc::new(ScriptedProvider::new(&SUB_QUERIES));
    let result = researcher(config, Arc::clone(&provider), registry).run(QUERY).await;

    assert!(matches!(
        result,
        Err(ResearchError::Retriever(RetrieverError::MissingCredential { .. }))
    ));
    assert!(provider.requests.lock().map(|r| r.is_empty()).unwrap_or(false));
}

#[tokio::test]
async fn test_empty_query_rejected() {
    let researcher = researcher(
        run_config(),
        Arc::new(ScriptedProvider::new(&SUB_QUERIES)),
        unique_sources_registry(1),
    );
    assert!(matches!(
        researcher.run("   ").await,
        Err(ResearchError::InvalidQuery { .. })
    ));
}

#[tokio::test]
async fn test_concurrent_runs_are_independent() {
    let researcher = researcher(
        run_config(),
        Arc::new(ScriptedProvider::new(&SUB_QUERIES)),
        unique_sources_registry(3),
    );
    let (a, b) = tokio::join!(researcher.run(QUERY), researcher.run("Solid-state battery trends lately"));
    let (a, b) = (
        a.unwrap_or_else(|_| unreachable!()),
        b.unwrap_or_else(|_| unreachable!()),
    );

    assert_eq!(a.sources.len(), b.sources.len());
    assert!((a.plan.budgets[WEB_CALLS].used - 3.0).abs() < f64::EPSILON);
    assert!((b.plan.budgets[WEB_CALLS].used - 3.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_dual_curation_selects_from_collected() {
    let mut config = run_config();
    config.dual_curation = true;
    let outcome = run(&researcher(
        config,
        Arc::new(ScriptedProvider::new(&SUB_QUERIES)),
        unique_sources_registry(5),
    ))
    .await;

    assert!(outcome.is_complete());
    let rejected: BTreeSet<&str> = outcome.rejected.iter().map(|r| r.url.as_str()).collect();
    assert!(outcome.sources.iter().all(|s| !rejected.contains(s.url.as_str())));
    assert_eq!(outcome.sources.len() + outcome.rejected.len(), 15);
}

#[tokio::test]
async fn test_outcome_serializes() {
    let outcome = run(&researcher(
        run_config(),
        Arc::new(ScriptedProvider::new(&SUB_QUERIES)),
        unique_sources_registry(1),
    ))
    .await;
    let value = serde_json::to_value(&outcome).unwrap_or_default();
    assert_eq!(value["final_state"], "done");
    assert_eq!(value["report"]["title"], FRAME_TITLE);
    assert!(value["plan"]["budgets"]["web_calls"].is_object());
    assert!(value.get("error").is_none());
}
