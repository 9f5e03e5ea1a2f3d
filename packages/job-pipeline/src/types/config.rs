//! Configuration types for fetching, crawling, enrichment and extraction.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Retry behaviour of the rate-limited fetcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Delay before the first retry; doubled on each further attempt.
    pub base_delay: Duration,

    /// Upper bound for a single computed backoff delay.
    pub max_delay: Duration,

    /// Retries after the first attempt. Default: 8.
    pub max_retries: u32,

    /// Per-request timeout. Default: 5s.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(120),
            max_retries: 8,
            timeout: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Listing and detail endpoints of the job site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoints {
    /// Paginated search endpoint (query: keywords, location, geoId, start)
    pub listing_url: String,

    /// Detail page prefix; the numeric job id is appended as a path segment
    pub detail_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            listing_url: "https://www.linkedin.com/jobs-guest/jobs/api/seeMoreJobPostings/search"
                .to_string(),
            detail_url: "https://www.linkedin.com/jobs/view".to_string(),
        }
    }
}

impl Endpoints {
    /// Point both endpoints at one base URL (tests, proxies).
    pub fn at(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            listing_url: format!("{base}/jobs-guest/jobs/api/seeMoreJobPostings/search"),
            detail_url: format!("{base}/jobs/view"),
        }
    }

    /// Detail page URL for a job id.
    pub fn detail_for(&self, job_id: i64) -> String {
        format!("{}/{}", self.detail_url.trim_end_matches('/'), job_id)
    }
}

/// Configuration for the listing crawl.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    pub keywords: Vec<String>,
    pub locations: Vec<String>,

    /// Geo id query parameter (empty lets the site resolve `location`)
    #[serde(default)]
    pub geo_id: String,

    /// Offset increment between pages. Default: 10.
    pub page_step: u32,

    /// Offset ceiling; non-success beyond it ends the pair. Default: 990.
    pub max_offset: u32,

    /// Fixed delay between page requests. Default: 1.2s.
    pub page_delay: Duration,

    /// Consecutive failed pages before a pair is abandoned. Default: 3.
    pub max_page_failures: u32,

    #[serde(default)]
    pub endpoints: Endpoints,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            locations: Vec::new(),
            geo_id: String::new(),
            page_step: 10,
            max_offset: 990,
            page_delay: Duration::from_millis(1200),
            max_page_failures: 3,
            endpoints: Endpoints::default(),
        }
    }
}

impl CrawlConfig {
    pub fn new(
        keywords: impl IntoIterator<Item = impl Into<String>>,
        locations: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
            locations: locations.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_max_offset(mut self, max_offset: u32) -> Self {
        self.max_offset = max_offset;
        self
    }

    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_geo_id(mut self, geo_id: impl Into<String>) -> Self {
        self.geo_id = geo_id.into();
        self
    }

    /// Reject settings that would page forever.
    pub fn validate(&self) -> Result<()> {
        if self.page_step == 0 {
            return Err(PipelineError::Config("page_step must be positive".into()));
        }
        Ok(())
    }
}

/// Configuration for detail-page enrichment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichConfig {
    /// Concurrent detail fetches. Default: 2.
    pub concurrency: usize,

    /// Records buffered before a merge write. Default: 50.
    pub batch_size: usize,

    /// Cap on records enriched in one run (None = all pending)
    pub limit: Option<usize>,

    #[serde(default)]
    pub endpoints: Endpoints,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            batch_size: 50,
            limit: None,
            endpoints: Endpoints::default(),
        }
    }
}

impl EnrichConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }
}

/// Configuration for the extraction dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Pending records pulled, and successes merged, per batch. Default: 100.
    pub batch_size: usize,

    /// Stop after this many batches (None = until nothing is pending)
    pub max_batches: Option<usize>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_batches: None,
        }
    }
}

impl ExtractConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_max_batches(mut self, max_batches: usize) -> Self {
        self.max_batches = Some(max_batches);
        self
    }
}

/// Names of the four logical tables of the durable store.
///
/// Names may be schema-qualified (`raw_data.jobs`); each dot-separated part
/// must be a plain identifier since names are interpolated into SQL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableNames {
    pub raw: String,
    pub extracted: String,
    pub bad: String,
    pub blacklist: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            raw: "raw_jobs".to_string(),
            extracted: "extracted_jobs".to_string(),
            bad: "bad_jobs".to_string(),
            blacklist: "blacklist".to_string(),
        }
    }
}

impl TableNames {
    /// Check every name is a safe SQL identifier.
    pub fn validate(&self) -> Result<()> {
        for name in [&self.raw, &self.extracted, &self.bad, &self.blacklist] {
            let valid = !name.is_empty()
                && name.split('.').all(|part| {
                    !part.is_empty()
                        && part
                            .chars()
                            .next()
                            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                        && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                });
            if !valid {
                return Err(PipelineError::Config(format!("invalid table name: {name:?}")));
            }
        }
        Ok(())
    }
}
