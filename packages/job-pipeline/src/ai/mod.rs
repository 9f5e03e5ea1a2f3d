//! LLM implementations for the extraction dispatcher.

#[cfg(feature = "openai")]
mod openai;

#[cfg(feature = "openai")]
pub use openai::OpenAiLlm;
