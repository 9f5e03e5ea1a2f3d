//! Bounded retry loop over a [`Transport`].
//!
//! Every attempt waits for the optional governor quota, rotates the
//! User-Agent, and classifies the response:
//! - 2xx: [`FetchOutcome::Success`]
//! - 400/404: [`FetchOutcome::Terminal`], never retried
//! - 429: retried after `max(Retry-After, backoff(attempt))`
//! - anything else, including transport errors and timeouts: one attempt
//!   consumed, retried after `backoff(attempt)`
//!
//! Once `max_retries` retries are spent the loop gives up with
//! [`FetchOutcome::Retryable`].

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{Quota, RateLimiter};
use tracing::{debug, warn};

use crate::fetch::user_agent::UserAgentPool;
use crate::traits::transport::Transport;
use crate::types::config::RetryPolicy;

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Tagged result of a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// 2xx body, with the number of attempts it took
    Success { body: String, attempts: u32 },

    /// 400 or 404: the resource does not exist; do not retry
    Terminal { status: u16 },

    /// Retry budget exhausted; the caller may try again in a later run
    Retryable { attempts: u32, reason: String },
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Success { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Statuses that mean "not found" and must not be retried.
pub fn is_terminal_status(status: u16) -> bool {
    matches!(status, 400 | 404)
}

/// Fetcher with backoff, identity rotation and an optional request quota.
pub struct RateLimitedFetcher<T: Transport> {
    transport: T,
    policy: RetryPolicy,
    agents: UserAgentPool,
    limiter: Option<Arc<DefaultRateLimiter>>,
}

impl<T: Transport> RateLimitedFetcher<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            agents: UserAgentPool::default(),
            limiter: None,
        }
    }

    /// Cap outgoing attempts at `requests_per_second`. Zero disables the quota.
    pub fn with_rate_limit(mut self, requests_per_second: u32) -> Self {
        self.limiter = NonZeroU32::new(requests_per_second)
            .map(|rps| Arc::new(RateLimiter::direct(Quota::per_second(rps))));
        self
    }

    pub fn with_user_agents(mut self, agents: UserAgentPool) -> Self {
        self.agents = agents;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetch `url`, retrying within the policy's budget.
    pub async fn fetch(&self, url: &str) -> FetchOutcome {
        let mut attempt: u32 = 0;

        loop {
            if let Some(limiter) = &self.limiter {
                limiter.until_ready().await;
            }

            let headers = self.agents.headers();
            let (reason, retry_after) = match self.transport.get(url, &headers).await {
                Ok(response) if response.is_success() => {
                    debug!(url = %url, attempt, status = response.status, "Fetch succeeded");
                    return FetchOutcome::Success {
                        body: response.body,
                        attempts: attempt + 1,
                    };
                }
                Ok(response) if is_terminal_status(response.status) => {
                    debug!(url = %url, attempt, status = response.status, "Fetch terminal");
                    return FetchOutcome::Terminal {
                        status: response.status,
                    };
                }
                Ok(response) => (format!("HTTP {}", response.status), response.retry_after),
                Err(e) => (e.to_string(), None),
            };

            if !self.policy.can_retry(attempt) {
                warn!(
                    url = %url,
                    attempts = attempt + 1,
                    reason = %reason,
                    "Retries exhausted"
                );
                return FetchOutcome::Retryable {
                    attempts: attempt + 1,
                    reason,
                };
            }

            let delay = self.policy.delay_for(attempt, retry_after);
            warn!(
                url = %url,
                attempt,
                reason = %reason,
                delay_ms = delay.as_millis() as u64,
                "Fetch failed, backing off"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Total time the policy would sleep if every attempt failed without a
    /// server hint.
    pub fn worst_case_delay(&self) -> Duration {
        (0..self.policy.max_retries).map(|a| self.policy.backoff(a)).sum()
    }
}
