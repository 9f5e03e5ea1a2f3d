//! Core trait abstractions: HTTP transport, durable store, LLM.

pub mod llm;
pub mod store;
pub mod transport;

pub use llm::Llm;
pub use store::{BlacklistStore, DeadLetterStore, ExtractedJobStore, JobStore, RawJobStore};
pub use transport::{RawResponse, RequestHeaders, Transport};
