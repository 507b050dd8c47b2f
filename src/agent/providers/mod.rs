//! Concrete LLM provider bindings.

pub mod openai;

pub use openai::OpenAiProvider;
