//! Single-attempt HTTP transport.
//!
//! A transport performs exactly one GET and reports what came back. Retry,
//! backoff and identity rotation live in
//! [`RateLimitedFetcher`](crate::fetch::RateLimitedFetcher), so they can be
//! tested against a scripted transport.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::FetchResult;

/// Response of one attempt, whatever its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,

    /// Parsed `Retry-After` header, when present in seconds form
    pub retry_after: Option<Duration>,

    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            retry_after: None,
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Request headers for one attempt, in send order.
pub type RequestHeaders = Vec<(String, String)>;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue one GET. Non-2xx statuses are `Ok`; only transport failures are `Err`.
    async fn get(&self, url: &str, headers: &RequestHeaders) -> FetchResult<RawResponse>;

    /// Human-readable name for logs.
    fn name(&self) -> &str;
}
