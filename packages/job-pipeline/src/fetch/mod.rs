//! Rate-limited HTTP fetching.

pub mod http;
pub mod rate_limited;
pub mod retry;
pub mod user_agent;

pub use http::HttpTransport;
pub use rate_limited::{FetchOutcome, RateLimitedFetcher};
pub use user_agent::UserAgentPool;
