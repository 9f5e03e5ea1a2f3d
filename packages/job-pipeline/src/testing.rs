//! Testing utilities including mock implementations.
//!
//! These are useful for exercising the pipeline stages without real network
//! or LLM calls.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{FetchError, FetchResult, PipelineError, Result};
use crate::traits::{
    llm::Llm,
    transport::{RawResponse, RequestHeaders, Transport},
};

/// Record of a request made to the mock transport.
#[derive(Debug, Clone)]
pub struct TransportCall {
    pub url: String,
    pub headers: RequestHeaders,
}

/// A scripted transport.
///
/// Responses are queued per URL and consumed in order. URLs with an empty
/// queue get the fallback response (404 unless overridden).
pub struct MockTransport {
    scripts: Mutex<HashMap<String, VecDeque<FetchResult<RawResponse>>>>,
    fallback: RawResponse,
    calls: Arc<Mutex<Vec<TransportCall>>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            fallback: RawResponse::new(404, ""),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a response for `url`.
    pub fn respond(self, url: impl Into<String>, response: RawResponse) -> Self {
        self.push(url.into(), Ok(response));
        self
    }

    /// Queue a transport failure for `url`.
    pub fn fail(self, url: impl Into<String>, error: FetchError) -> Self {
        self.push(url.into(), Err(error));
        self
    }

    /// Response for URLs whose queue is empty.
    pub fn with_fallback(mut self, response: RawResponse) -> Self {
        self.fallback = response;
        self
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.url == url)
            .count()
    }

    fn push(&self, url: String, result: FetchResult<RawResponse>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(url)
            .or_default()
            .push_back(result);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, url: &str, headers: &RequestHeaders) -> FetchResult<RawResponse> {
        self.calls.lock().unwrap().push(TransportCall {
            url: url.to_string(),
            headers: headers.clone(),
        });

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(|queue| queue.pop_front());

        scripted.unwrap_or_else(|| Ok(self.fallback.clone()))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// A mock LLM with canned replies.
///
/// A reply is chosen by the first registered substring found in the user
/// content; otherwise the default reply is returned.
pub struct MockLlm {
    replies: Vec<(String, std::result::Result<String, String>)>,
    default_reply: std::result::Result<String, String>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl Default for MockLlm {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLlm {
    pub fn new() -> Self {
        Self {
            replies: Vec::new(),
            default_reply: Ok(sample_extraction_json()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Reply with `reply` when the user content contains `needle`.
    pub fn with_reply(mut self, needle: impl Into<String>, reply: impl Into<String>) -> Self {
        self.replies.push((needle.into(), Ok(reply.into())));
        self
    }

    /// Fail the call when the user content contains `needle`.
    pub fn with_failure(mut self, needle: impl Into<String>, message: impl Into<String>) -> Self {
        self.replies.push((needle.into(), Err(message.into())));
        self
    }

    pub fn with_default_reply(mut self, reply: impl Into<String>) -> Self {
        self.default_reply = Ok(reply.into());
        self
    }

    /// User contents received so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Llm for MockLlm {
    async fn complete_json(&self, _system: &str, user: &str) -> Result<String> {
        self.calls.lock().unwrap().push(user.to_string());

        let reply = self
            .replies
            .iter()
            .find(|(needle, _)| user.contains(needle.as_str()))
            .map(|(_, reply)| reply)
            .unwrap_or(&self.default_reply);

        reply
            .clone()
            .map_err(|message| PipelineError::Llm(message.into()))
    }

    fn model(&self) -> &str {
        "mock"
    }
}

/// One search-result card as served by the listing endpoint.
pub fn listing_card_html(job_id: i64, title: &str, company: &str) -> String {
    format!(
        r#"<li>
  <div class="base-card base-search-card job-search-card" data-entity-urn="urn:li:jobPosting:{job_id}">
    <a class="base-card__full-link" href="https://www.linkedin.com/jobs/view/{job_id}"></a>
    <div class="base-search-card__info">
      <h3 class="base-search-card__title">
        {title}
      </h3>
      <h4 class="base-search-card__subtitle">
        <a class="hidden-nested-link">{company}</a>
      </h4>
    </div>
  </div>
</li>"#
    )
}

/// A listing page fragment wrapping `cards`.
pub fn listing_page_html(cards: &[String]) -> String {
    format!("<html><body><ul>{}</ul></body></html>", cards.concat())
}

/// A detail page with company, location and description paragraphs.
pub fn detail_page_html(company: &str, location: &str, paragraphs: &[&str]) -> String {
    let body: String = paragraphs.iter().map(|p| format!("<p>{p}</p>\n")).collect();
    format!(
        r#"<html><body>
  <section class="top-card-layout">
    <h4 class="top-card-layout__second-subline">
      <span class="topcard__flavor"><a class="topcard__org-name-link topcard__flavor--black-link">{company}</a></span>
      <span class="topcard__flavor topcard__flavor--bullet">{location}</span>
    </h4>
  </section>
  <div class="description__text">
    <div class="show-more-less-html__markup">
{body}    </div>
  </div>
</body></html>"#
    )
}

/// A well-formed extraction reply.
pub fn sample_extraction_json() -> String {
    serde_json::json!({
        "summary": "Backend engineer building data pipelines in Rust.",
        "industries": ["Software", "Recruiting"],
        "soft_skills": ["Communication"],
        "hard_skills": ["Distributed systems"],
        "tech_stack": ["PostgreSQL", "Kafka"],
        "programming_languages": ["Rust", "Python"],
        "education": {"min_degree": "Bachelor", "fields": ["Computer Science"]},
        "salary": {"min": 90000, "max": 120000},
        "benefits": ["Remote work"]
    })
    .to_string()
}
