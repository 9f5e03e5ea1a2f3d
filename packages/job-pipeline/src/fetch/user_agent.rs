//! Rotating browser identities for outgoing requests.

use rand::seq::SliceRandom;

use crate::traits::transport::RequestHeaders;

const DESKTOP_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
];

/// Pool of User-Agent strings; one is picked at random per attempt.
#[derive(Debug, Clone)]
pub struct UserAgentPool {
    agents: Vec<String>,
}

impl Default for UserAgentPool {
    fn default() -> Self {
        Self {
            agents: DESKTOP_AGENTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl UserAgentPool {
    /// A pool with custom agents; falls back to the built-in list when empty.
    pub fn new(agents: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let agents: Vec<String> = agents.into_iter().map(Into::into).collect();
        if agents.is_empty() {
            Self::default()
        } else {
            Self { agents }
        }
    }

    pub fn pick(&self) -> &str {
        self.agents
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
            .unwrap_or(DESKTOP_AGENTS[0])
    }

    /// Browser-like header set carrying a freshly picked identity.
    pub fn headers(&self) -> RequestHeaders {
        vec![
            ("User-Agent".to_string(), self.pick().to_string()),
            (
                "Accept".to_string(),
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
            ),
            ("Accept-Language".to_string(), "en-US,en;q=0.5".to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_carry_pool_agent() {
        let pool = UserAgentPool::new(["agent-a", "agent-b"]);
        let headers = pool.headers();
        let ua = &headers.iter().find(|(k, _)| k == "User-Agent").unwrap().1;
        assert!(ua == "agent-a" || ua == "agent-b");
    }

    #[test]
    fn test_empty_pool_uses_builtin_agents() {
        let pool = UserAgentPool::new(Vec::<String>::new());
        assert!(pool.pick().starts_with("Mozilla/5.0"));
    }
}
