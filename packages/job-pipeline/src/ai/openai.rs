//! OpenAI implementation of the `Llm` trait.
//!
//! # Example
//!
//! ```rust,ignore
//! use job_pipeline::ai::OpenAiLlm;
//!
//! let llm = OpenAiLlm::from_env()?.with_model("gpt-4o-mini");
//! let report = ExtractionDispatcher::new(&store, &llm, &snapshot).run().await?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use openai_client::{ChatRequest, OpenAIClient, OpenAIError};
use tracing::warn;

use crate::error::{PipelineError, Result};
use crate::traits::llm::Llm;
use crate::types::config::RetryPolicy;

const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// JSON-mode chat completions over `openai-client`.
///
/// Transient failures (network, 429, 5xx) are retried with backoff,
/// honoring the server's retry-after. Anything else is returned at once.
#[derive(Clone)]
pub struct OpenAiLlm {
    client: OpenAIClient,
    model: String,
    temperature: Option<f32>,
    retry: RetryPolicy,
}

impl OpenAiLlm {
    pub fn new(client: OpenAIClient) -> Self {
        Self {
            client,
            model: DEFAULT_MODEL.to_string(),
            temperature: Some(0.0),
            retry: RetryPolicy::new()
                .with_base_delay(Duration::from_secs(1))
                .with_max_delay(Duration::from_secs(30))
                .with_max_retries(3),
        }
    }

    /// Create from `OPENAI_API_KEY` (and `OPENAI_BASE_URL` when set).
    pub fn from_env() -> Result<Self> {
        let client =
            OpenAIClient::from_env().map_err(|e| PipelineError::Config(e.to_string()))?;
        Ok(Self::new(client))
    }

    /// Set the chat model (default: gpt-4o-mini).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn request(&self, system: &str, user: &str) -> ChatRequest {
        let request = ChatRequest::json(self.model.as_str(), system, user);
        match self.temperature {
            Some(t) => request.temperature(t),
            None => request,
        }
    }
}

#[async_trait]
impl Llm for OpenAiLlm {
    async fn complete_json(&self, system: &str, user: &str) -> Result<String> {
        let mut attempt = 0;
        loop {
            match self.client.json_completion(self.request(system, user)).await {
                Ok(reply) => return Ok(reply),
                Err(e) if e.is_transient() && self.retry.can_retry(attempt) => {
                    let retry_after = match &e {
                        OpenAIError::RateLimited { retry_after } => *retry_after,
                        _ => None,
                    };
                    let delay = self.retry.delay_for(attempt, retry_after);
                    warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "LLM call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(PipelineError::Llm(Box::new(e))),
            }
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_is_json_mode() {
        let llm = OpenAiLlm::new(OpenAIClient::new("sk-test")).with_model("gpt-4o");
        let request = llm.request("system", "user");

        assert_eq!(request.model, "gpt-4o");
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.temperature, Some(0.0));
        assert!(request.response_format.is_some());
        assert_eq!(llm.model(), "gpt-4o");
    }
}
