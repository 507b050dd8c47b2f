//! LLM client layer and role agents.
//!
//! Provides a pluggable provider abstraction backed by OpenAI-compatible
//! APIs, plus one agent per pipeline stage that needs a model.
//!
//! # Architecture
//!
//! ```text
//! Research run
//!   ├── PersonaAgent     (query → persona + role prompt)
//!   ├── SubQueryAgent    (query → search queries)
//!   ├── RelevanceAgent   (sources → relevance verdicts)
//!   ├── WriterAgent      (context → report body / sections / intro / conclusion)
//!   ├── OutlineAgent     (context summary → section headings)
//!   └── FrameAgent       (body + sources → title, TOC, citations)
//!
//! every call → MeteredProvider → LlmProvider (OpenAiProvider)
//! ```

pub mod client;
pub mod config;
pub mod message;
pub mod metered;
pub mod persona;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod relevance;
pub mod subquery;
pub mod synthesizer;
pub mod traits;
pub mod writer;

// Re-export key types
pub use client::{ProviderSpec, create_provider, provider_spec, supported_providers};
pub use config::AgentConfig;
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
pub use metered::MeteredProvider;
pub use persona::{Persona, PersonaAgent};
pub use prompt::PromptSet;
pub use provider::{LlmProvider, TextStream, collect_stream};
pub use relevance::{Candidate, RelevanceAgent, Verdict};
pub use subquery::SubQueryAgent;
pub use synthesizer::{FrameAgent, OutlineAgent, ReportFrame};
pub use traits::{Agent, AgentResponse, ParagraphSink, run_with_retry};
pub use writer::WriterAgent;
