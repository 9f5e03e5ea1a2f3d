//! LLM completion seam used by the extraction dispatcher.

use async_trait::async_trait;

use crate::error::Result;

/// A completion endpoint that answers in strict JSON mode.
///
/// Implementations return the raw reply text; validation against the
/// extraction schema happens in [`crate::pipeline::schema`].
#[async_trait]
pub trait Llm: Send + Sync {
    /// Complete `user` under `system`, requesting a single JSON object.
    async fn complete_json(&self, system: &str, user: &str) -> Result<String>;

    /// Model identifier, for logs.
    fn model(&self) -> &str;
}
