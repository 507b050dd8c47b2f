//! Writing stages: body, RAG section drafts, introduction, conclusion and
//! the structured frame, plus final assembly.
//!
//! Every LLM call here degrades instead of failing: an exhausted retry
//! becomes a placeholder section or a deterministic fallback text and a
//! warning on the run.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use futures_util::{StreamExt, stream};

use crate::agent::prompt::{
    WritingStyle, build_frame_prompt, build_outline_prompt, build_report_prompt, build_section_prompt,
    build_summary_prompt, report_instruction,
};
use crate::agent::{
    AgentConfig, FrameAgent, LlmProvider, OutlineAgent, ParagraphSink, Persona, PromptSet, ReportFrame, WriterAgent,
};
use crate::context::combine;
use crate::core::{Query, Report, ReportHeaders, ReportSection, SourceCitation, SourceRecord};
use crate::curation::normalize_url;
use crate::retry::RetryPolicy;
use crate::vectorstore::{META_URL, VectorStore};

use super::run::RunContext;

/// Title of body text that precedes the first heading.
pub const OVERVIEW_TITLE: &str = "Overview";

/// Characters of each section shown in summaries.
const SUMMARY_CHARS: usize = 600;

/// Everything the writing stages need besides the run itself.
pub struct Synthesizer<'a> {
    /// Metered provider.
    pub provider: &'a dyn LlmProvider,
    /// Model configuration.
    pub agents: &'a AgentConfig,
    /// Prompt templates.
    pub prompts: &'a PromptSet,
    /// Retry schedule for every call.
    pub retry: &'a RetryPolicy,
    /// Persona whose role prompt is the system prompt.
    pub persona: &'a Persona,
    /// Caller-supplied writing instruction.
    pub custom_prompt: Option<&'a str>,
    /// Report date.
    pub date: &'a str,
    /// Whether to stream the body to the sink.
    pub stream: bool,
}

enum SectionDraft {
    Written(ReportSection),
    Failed(ReportSection, String),
    Skipped(String),
}

impl Synthesizer<'_> {
    fn writer(&self) -> WriterAgent {
        WriterAgent::new(self.agents, self.persona.role_prompt.clone())
    }

    fn style<'q>(&'q self, query: &'q Query) -> WritingStyle<'q> {
        WritingStyle {
            tone: query.tone,
            language: &query.language,
            date: self.date,
        }
    }

    fn custom(&self) -> Option<&str> {
        self.custom_prompt.filter(|p| !p.trim().is_empty())
    }

    /// Writing instruction for single-call report types. A custom prompt
    /// replaces the report-type default.
    #[must_use]
    pub fn body_instruction(&self, query: &Query) -> String {
        self.custom().map_or_else(
            || report_instruction(query.report_type, query.total_words),
            str::to_string,
        )
    }

    /// Instruction for one RAG section. A custom prompt is appended.
    #[must_use]
    pub fn section_instruction(&self) -> String {
        match self.custom() {
            Some(custom) => format!("{}\n\n{custom}", self.prompts.section),
            None => self.prompts.section.clone(),
        }
    }

    /// Writes the whole body in one call. The flag is true when the body
    /// reached the sink paragraph by paragraph and completed.
    pub async fn write_body(&self, run: &mut RunContext, context: &str) -> (Vec<ReportSection>, bool) {
        let query = run.query.clone();
        let user_msg = build_report_prompt(
            &query.text,
            &context_or_notice(context),
            &self.body_instruction(&query),
            &self.prompts.report_guidelines,
            &self.style(&query),
        );
        let on_paragraph: Option<ParagraphSink> = self.stream.then(|| {
            let sink = Arc::clone(&run.sink);
            Arc::new(move |paragraph: &str| sink.report(paragraph)) as ParagraphSink
        });

        match self.writer().write(self.provider, &user_msg, self.retry, on_paragraph).await {
            Ok(response) => (split_sections(&response.content, OVERVIEW_TITLE), self.stream),
            Err(e) => {
                run.warn(format!("report body could not be written: {e}"));
                (vec![placeholder_section(&query.text, &e.to_string())], false)
            }
        }
    }

    /// Plans section headings, falling back to `fallback` when the outline
    /// call fails.
    pub async fn outline(
        &self,
        run: &mut RunContext,
        context_summary: &str,
        max_sections: usize,
        fallback: &[String],
    ) -> Vec<String> {
        let agent = OutlineAgent::new(self.agents, self.prompts.outline.clone());
        let user_msg = build_outline_prompt(&run.query.text, context_summary, max_sections);
        match agent.outline(self.provider, &user_msg, max_sections, self.retry).await {
            Ok((sections, _)) => sections,
            Err(e) => {
                run.warn(format!("outline failed, using sub-queries as sections: {e}"));
                fallback.iter().take(max_sections.max(1)).cloned().collect()
            }
        }
    }

    /// Drafts each heading over its own similarity-searched context.
    ///
    /// The budget is checked before every section call; sections refused by
    /// the budget are left out. Output follows heading order.
    pub async fn draft_sections(
        &self,
        run: &mut RunContext,
        headings: &[String],
        store: &dyn VectorStore,
        k: usize,
        concurrency: usize,
    ) -> Vec<ReportSection> {
        let query = run.query.clone();
        let plan = Arc::clone(&run.plan);
        let enforce = run.enforce_budget;
        let writer = self.writer();
        let instruction = self.section_instruction();
        let style = self.style(&query);

        let drafts: Vec<SectionDraft> = stream::iter(headings)
            .map(|heading| {
                let plan = Arc::clone(&plan);
                let writer = &writer;
                let instruction = &instruction;
                let query = &query;
                async move {
                    if plan.should_halt(enforce) {
                        return SectionDraft::Skipped(heading.clone());
                    }
                    let hits = store
                        .similarity_search(&format!("{heading} {}", query.text), k, None)
                        .await;
                    let texts: Vec<String> = hits
                        .iter()
                        .map(|h| {
                            let url = h.metadata.get(META_URL).map_or("", String::as_str);
                            format!("Source: {url}\n{}", h.content)
                        })
                        .collect();
                    let context = combine(&texts);
                    let user_msg =
                        build_section_prompt(&query.text, heading, &context_or_notice(&context), instruction, &style);
                    match writer.write(self.provider, &user_msg, self.retry, None).await {
                        Ok(response) => SectionDraft::Written(ReportSection {
                            title: heading.clone(),
                            content: response.content,
                            placeholder: false,
                        }),
                        Err(e) => SectionDraft::Failed(placeholder_section(heading, &e.to_string()), e.to_string()),
                    }
                }
            })
            .buffered(concurrency.max(1))
            .collect()
            .await;

        let mut sections = Vec::with_capacity(drafts.len());
        for draft in drafts {
            match draft {
                SectionDraft::Written(section) => {
                    if self.stream {
                        run.sink.report(&section.content);
                    }
                    sections.push(section);
                }
                SectionDraft::Failed(section, error) => {
                    run.warn(format!("section '{}' could not be drafted: {error}", section.title));
                    if self.stream {
                        run.sink.report(&section.content);
                    }
                    sections.push(section);
                }
                SectionDraft::Skipped(heading) => {
                    tracing::info!(heading = %heading, "section skipped, budget exhausted");
                    run.note_halt();
                }
            }
        }
        sections
    }

    async fn summary_text(&self, run: &mut RunContext, sections: &[ReportSection], instruction: &str, what: &str) -> Option<String> {
        let query = run.query.clone();
        let user_msg = build_summary_prompt(&query.text, &sections_summary(sections), instruction, &self.style(&query));
        match self.writer().write(self.provider, &user_msg, self.retry, None).await {
            Ok(response) => Some(response.content.trim().to_string()),
            Err(e) => {
                run.warn(format!("{what} could not be written: {e}"));
                None
            }
        }
    }

    /// Writes the introduction from a summary of the drafted sections.
    pub async fn introduction(&self, run: &mut RunContext, sections: &[ReportSection]) -> Option<String> {
        self.summary_text(run, sections, &self.prompts.introduction, "introduction").await
    }

    /// Writes the conclusion from a summary of the drafted sections.
    pub async fn conclusion(&self, run: &mut RunContext, sections: &[ReportSection]) -> Option<String> {
        self.summary_text(run, sections, &self.prompts.conclusion, "conclusion").await
    }

    /// Produces the structured frame.
    pub async fn frame(&self, run: &mut RunContext, sections: &[ReportSection], sources: &[SourceRecord]) -> Option<ReportFrame> {
        let agent = FrameAgent::new(self.agents, self.prompts.frame.clone());
        let listed: Vec<(&str, &str)> = sources.iter().map(|s| (s.title.as_str(), s.url.as_str())).collect();
        let user_msg = build_frame_prompt(&run.query.text, &sections_summary(sections), &listed);
        match agent.frame(self.provider, &user_msg, self.retry).await {
            Ok((frame, _)) => Some(frame),
            Err(e) => {
                run.warn(format!("report frame could not be generated: {e}"));
                None
            }
        }
    }
}

/// Pieces of a report gathered by the pipeline, any of which may be missing.
#[derive(Debug, Default)]
pub struct ReportParts {
    /// Drafted body sections.
    pub sections: Vec<ReportSection>,
    /// Written introduction.
    pub introduction: Option<String>,
    /// Written conclusion.
    pub conclusion: Option<String>,
    /// Structured frame.
    pub frame: Option<ReportFrame>,
}

/// Builds the final report. Missing parts get deterministic fallbacks, and
/// citations are restricted to the curated set.
#[must_use]
pub fn assemble(query: &Query, parts: ReportParts, curated: &[SourceRecord], date: &str) -> Report {
    let frame = parts.frame.unwrap_or_default();
    let title = non_blank(frame.title).unwrap_or_else(|| query.text.trim().to_string());

    let introduction = parts
        .introduction
        .and_then(non_blank)
        .or_else(|| non_blank(frame.introduction))
        .unwrap_or_else(|| fallback_introduction(query, curated.len()));
    let conclusion = parts
        .conclusion
        .and_then(non_blank)
        .or_else(|| non_blank(frame.conclusion))
        .unwrap_or_else(|| fallback_conclusion(curated.len()));

    let table_of_contents = parts.sections.iter().map(|s| s.title.clone()).collect();
    let sources = cited_sources(&frame.sources, curated);

    Report {
        headers: ReportHeaders::for_title(title.clone()),
        title,
        table_of_contents,
        introduction,
        body_sections: parts.sections,
        conclusion,
        sources,
        date: date.to_string(),
    }
}

/// Citations from the frame that point into the curated set, deduplicated
/// by URL. Falls back to every curated source when none survive.
#[must_use]
pub fn cited_sources(frame_sources: &[SourceCitation], curated: &[SourceRecord]) -> Vec<SourceCitation> {
    let by_url: BTreeMap<String, &SourceRecord> = curated.iter().map(|s| (normalize_url(&s.url), s)).collect();
    let mut seen = HashSet::new();
    let mut cited: Vec<SourceCitation> = frame_sources
        .iter()
        .filter_map(|c| {
            let key = normalize_url(&c.url);
            let source = by_url.get(&key)?;
            seen.insert(key).then(|| SourceCitation {
                title: if c.title.trim().is_empty() {
                    source.title.clone()
                } else {
                    c.title.clone()
                },
                url: source.url.clone(),
            })
        })
        .collect();
    if cited.is_empty() {
        cited = curated
            .iter()
            .filter(|s| seen.insert(normalize_url(&s.url)))
            .map(|s| SourceCitation {
                title: s.title.clone(),
                url: s.url.clone(),
            })
            .collect();
    }
    cited
}

/// Splits a markdown body on level-2 headings. Text before the first
/// heading becomes a section titled `fallback_title`.
#[must_use]
pub fn split_sections(body: &str, fallback_title: &str) -> Vec<ReportSection> {
    let mut sections: Vec<ReportSection> = Vec::new();
    let mut current: Option<(String, String)> = None;
    let mut preamble = String::new();

    for line in body.lines() {
        if let Some(heading) = line.strip_prefix("## ") {
            if let Some((title, content)) = current.take() {
                sections.push(section_from(title, &content));
            }
            current = Some((heading.trim().to_string(), format!("{line}\n")));
        } else if let Some((_, content)) = current.as_mut() {
            content.push_str(line);
            content.push('\n');
        } else if !line.starts_with("# ") {
            preamble.push_str(line);
            preamble.push('\n');
        }
    }
    if let Some((title, content)) = current {
        sections.push(section_from(title, &content));
    }
    if !preamble.trim().is_empty() {
        sections.insert(0, section_from(fallback_title.trim().to_string(), &preamble));
    }
    sections
}

fn section_from(title: String, content: &str) -> ReportSection {
    ReportSection {
        title,
        content: content.trim().to_string(),
        placeholder: false,
    }
}

/// Section a failed draft is replaced with.
#[must_use]
pub fn placeholder_section(title: &str, error: &str) -> ReportSection {
    ReportSection {
        title: title.trim().to_string(),
        content: format!("_This section could not be generated ({error})._"),
        placeholder: true,
    }
}

/// Headings and leading text of each section.
#[must_use]
pub fn sections_summary(sections: &[ReportSection]) -> String {
    sections
        .iter()
        .map(|s| {
            let excerpt: String = s.content.chars().take(SUMMARY_CHARS).collect();
            format!("### {}\n{excerpt}", s.title)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn context_or_notice(context: &str) -> String {
    if context.trim().is_empty() {
        "No external sources were found for this question. Say so explicitly and answer only with \
         well-established general knowledge."
            .to_string()
    } else {
        context.to_string()
    }
}

fn non_blank(text: String) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn fallback_introduction(query: &Query, sources: usize) -> String {
    format!(
        "This report examines the question: {}. It draws on {sources} curated source{}.",
        query.text.trim(),
        if sources == 1 { "" } else { "s" }
    )
}

fn fallback_conclusion(sources: usize) -> String {
    if sources == 0 {
        "No external sources could be retrieved for this question, so the findings above are \
         unverified."
            .to_string()
    } else {
        format!("The findings above are drawn from {sources} curated sources listed in the references.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(url: &str, title: &str) -> SourceRecord {
        SourceRecord::new(url, title, "content", "mock")
    }

    #[test]
    fn test_split_sections() {
        let body = "# Title\nLead paragraph.\n\n## Models\nBigger.\n\n## Chips\nFaster.\n";
        let sections = split_sections(body, "Overview");
        let titles: Vec<&str> = sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Overview", "Models", "Chips"]);
        assert_eq!(sections[1].content, "## Models\nBigger.");
        assert_eq!(sections[0].content, "Lead paragraph.");
    }

    #[test]
    fn test_split_sections_without_headings() {
        let sections = split_sections("Just prose.", "AI trends");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, "AI trends");
    }

    #[test]
    fn test_cited_sources_restricted_to_curated() {
        let curated = vec![source("https://a.com/x", "A"), source("https://b.com", "B")];
        let frame = vec![
            SourceCitation {
                title: String::new(),
                url: "https://a.com/x/".to_string(),
            },
            SourceCitation {
                title: "Invented".to_string(),
                url: "https://made-up.org".to_string(),
            },
            SourceCitation {
                title: "A again".to_string(),
                url: "https://a.com/x".to_string(),
            },
        ];
        let cited = cited_sources(&frame, &curated);
        assert_eq!(cited.len(), 1);
        assert_eq!(cited[0].url, "https://a.com/x");
        assert_eq!(cited[0].title, "A");
    }

    #[test]
    fn test_cited_sources_fall_back_to_curated() {
        let curated = vec![source("https://a.com", "A"), source("https://b.com", "B")];
        assert_eq!(cited_sources(&[], &curated).len(), 2);
    }

    #[test]
    fn test_assemble_fills_missing_parts() {
        let query = Query::new("What changed in AI?");
        let report = assemble(&query, ReportParts::default(), &[], "2026-10-16");
        assert_eq!(report.title, "What changed in AI?");
        assert!(report.introduction.contains("0 curated sources"));
        assert!(!report.conclusion.is_empty());
        assert!(report.sources.is_empty());
        assert!(report.to_markdown().starts_with("# What changed in AI?"));
    }

    #[test]
    fn test_assemble_prefers_written_parts() {
        let query = Query::new("q");
        let parts = ReportParts {
            sections: vec![placeholder_section("Models", "timeout")],
            introduction: Some("Written intro".to_string()),
            conclusion: None,
            frame: Some(ReportFrame {
                title: "Framed".to_string(),
                conclusion: "Frame conclusion".to_string(),
                ..ReportFrame::default()
            }),
        };
        let report = assemble(&query, parts, &[source("https://a.com", "A")], "2026-10-16");
        assert_eq!(report.title, "Framed");
        assert_eq!(report.introduction, "Written intro");
        assert_eq!(report.conclusion, "Frame conclusion");
        assert_eq!(report.table_of_contents, vec!["Models".to_string()]);
        assert!(report.body_sections[0].placeholder);
    }
}
