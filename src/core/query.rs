//! The research query and its report parameters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of report the pipeline produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    /// Single-pass research report (default).
    #[default]
    ResearchReport,
    /// Annotated bibliography of the curated sources.
    ResourceReport,
    /// Structured outline instead of prose.
    OutlineReport,
    /// Report driven entirely by a caller-supplied prompt.
    CustomReport,
    /// Long-form report drafted section by section.
    DetailedReport,
    /// Report on one subtopic of a larger report.
    SubtopicReport,
    /// Deep multi-section research, drafted like a detailed report.
    Deep,
}

impl ReportType {
    /// All report types, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::ResearchReport,
        Self::ResourceReport,
        Self::OutlineReport,
        Self::CustomReport,
        Self::DetailedReport,
        Self::SubtopicReport,
        Self::Deep,
    ];

    /// Returns the snake-case identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ResearchReport => "research_report",
            Self::ResourceReport => "resource_report",
            Self::OutlineReport => "outline_report",
            Self::CustomReport => "custom_report",
            Self::DetailedReport => "detailed_report",
            Self::SubtopicReport => "subtopic_report",
            Self::Deep => "deep",
        }
    }

    /// Whether the body is too long for one completion and must be drafted
    /// section by section over similarity-searched context.
    #[must_use]
    pub const fn requires_section_drafting(self) -> bool {
        matches!(self, Self::DetailedReport | Self::Deep)
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == needle)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|t| t.as_str()).collect();
                format!("expected one of: {}", names.join(", "))
            })
    }
}

/// Writing tone requested for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum Tone {
    #[default]
    Objective,
    Formal,
    Analytical,
    Persuasive,
    Informative,
    Explanatory,
    Descriptive,
    Critical,
    Comparative,
    Speculative,
    Reflective,
    Narrative,
    Humorous,
    Optimistic,
    Pessimistic,
}

impl Tone {
    const ALL: [Self; 15] = [
        Self::Objective,
        Self::Formal,
        Self::Analytical,
        Self::Persuasive,
        Self::Informative,
        Self::Explanatory,
        Self::Descriptive,
        Self::Critical,
        Self::Comparative,
        Self::Speculative,
        Self::Reflective,
        Self::Narrative,
        Self::Humorous,
        Self::Optimistic,
        Self::Pessimistic,
    ];

    /// Lowercase identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Objective => "objective",
            Self::Formal => "formal",
            Self::Analytical => "analytical",
            Self::Persuasive => "persuasive",
            Self::Informative => "informative",
            Self::Explanatory => "explanatory",
            Self::Descriptive => "descriptive",
            Self::Critical => "critical",
            Self::Comparative => "comparative",
            Self::Speculative => "speculative",
            Self::Reflective => "reflective",
            Self::Narrative => "narrative",
            Self::Humorous => "humorous",
            Self::Optimistic => "optimistic",
            Self::Pessimistic => "pessimistic",
        }
    }

    /// Instruction fragment inserted into writer prompts.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Objective => "impartial and unbiased presentation of facts and findings",
            Self::Formal => "adheres to academic standards with sophisticated language and structure",
            Self::Analytical => "critical evaluation and detailed examination of data and theories",
            Self::Persuasive => "convincing the audience of a particular viewpoint or argument",
            Self::Informative => "clear and comprehensive information on the topic",
            Self::Explanatory => "clarifying complex concepts and processes",
            Self::Descriptive => "detailed depiction of phenomena, experiments, or case studies",
            Self::Critical => "judging the validity and relevance of the research and its conclusions",
            Self::Comparative => "juxtaposing different theories, data, or methods to highlight differences and similarities",
            Self::Speculative => "exploring hypotheses and potential implications or future research directions",
            Self::Reflective => "considering the research process and personal insights or experiences",
            Self::Narrative => "telling a story to illustrate research findings or methodologies",
            Self::Humorous => "light-hearted and engaging, to make the content more relatable",
            Self::Optimistic => "highlighting positive findings and potential benefits",
            Self::Pessimistic => "focusing on limitations, challenges, or negative outcomes",
        }
    }
}

impl FromStr for Tone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == needle)
            .ok_or_else(|| format!("unknown tone '{s}'"))
    }
}

/// Where sources come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportSource {
    /// Configured web/API retrievers.
    #[default]
    Web,
    /// Local documents under `doc_path`.
    Local,
    /// Web retrievers plus local documents.
    Hybrid,
    /// Only the caller-supplied `source_urls`.
    Static,
    /// Only the attached vector store.
    VectorStore,
}

impl FromStr for ReportSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "web" => Ok(Self::Web),
            "local" => Ok(Self::Local),
            "hybrid" => Ok(Self::Hybrid),
            "static" => Ok(Self::Static),
            "vectorstore" | "vector_store" | "langchain_vectorstore" => Ok(Self::VectorStore),
            other => Err(format!(
                "unknown report source '{other}' (expected web, local, hybrid, static, vectorstore)"
            )),
        }
    }
}

/// The user's research question plus report parameters.
///
/// Immutable once a run starts; the pipeline only ever borrows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// The research question.
    pub text: String,
    /// Report kind.
    pub report_type: ReportType,
    /// Writing tone.
    pub tone: Tone,
    /// Target length of the report body.
    pub total_words: usize,
    /// Output language.
    pub language: String,
    /// Requested export formats (handled by external writers).
    pub output_formats: Vec<String>,
}

impl Query {
    /// Creates a query with default report parameters.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            report_type: ReportType::default(),
            tone: Tone::default(),
            total_words: 1000,
            language: "english".to_string(),
            output_formats: vec!["markdown".to_string()],
        }
    }
}
