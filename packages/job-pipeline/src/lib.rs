//! Job Posting Scrape and Extraction Pipeline
//!
//! Crawls a public job-search site, lands postings in a raw table, enriches
//! them from their detail pages, deduplicates, and turns descriptions into
//! structured fields with an LLM.
//!
//! # Stages
//!
//! 1. **Collect** - page through listing results per keyword and location,
//!    skipping known ids and blacklisted companies
//! 2. **Enrich** - fetch detail pages for records never enriched
//! 3. **Dedup** - windowed ranking over raw and extracted tables
//! 4. **Extract** - LLM in JSON mode, validated against a typed schema;
//!    failures land in a dead-letter table
//!
//! Extracted jobs whose location was never resolved can be refreshed from
//! their detail pages with [`refresh_locations`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use job_pipeline::{
//!     collect_listings, CrawlConfig, HttpTransport, RateLimitedFetcher, RetryPolicy,
//!     RunSnapshot, SqliteStore,
//! };
//!
//! let store = SqliteStore::new("sqlite://jobs.db?mode=rwc").await?;
//! let snapshot = RunSnapshot::load(&store).await?;
//!
//! let policy = RetryPolicy::new();
//! let fetcher = RateLimitedFetcher::new(HttpTransport::new(policy.timeout)?, policy);
//! let config = CrawlConfig::new(["data engineer"], ["United States"]);
//!
//! let report = collect_listings(&config, &fetcher, &store, &snapshot).await?;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Seams: HTTP transport, durable store, LLM
//! - [`types`] - Records, configuration, run snapshot, reports
//! - [`fetch`] - Rate-limited fetcher with backoff and Retry-After
//! - [`parse`] - Listing and detail page parsers
//! - [`stores`] - Storage implementations (MemoryStore, SqliteStore)
//! - [`pipeline`] - Stage drivers and the extraction dispatcher
//! - [`testing`] - Mock implementations for testing

pub mod error;
pub mod fetch;
pub mod parse;
pub mod pipeline;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

#[cfg(feature = "openai")]
pub mod ai;

// Re-export core types at crate root
pub use error::{FetchError, ParseError, PipelineError, Result, SchemaError};
pub use traits::{
    llm::Llm,
    store::{BlacklistStore, DeadLetterStore, ExtractedJobStore, JobStore, RawJobStore},
    transport::{RawResponse, Transport},
};
pub use types::{
    config::{CrawlConfig, Endpoints, EnrichConfig, ExtractConfig, RetryPolicy, TableNames},
    job::{
        BadJob, Education, ExtractedFields, ExtractedJob, ExtractedRow, JobRecord, ListField,
        SalaryRange, JOB_NOT_FOUND, LOCATION_NOT_FOUND,
    },
    report::{build_report, mean_salary, term_frequency, JobFilter, Report},
    snapshot::{normalize_company, Blacklist, RunSnapshot},
};

// Re-export fetcher and parsers
pub use fetch::{FetchOutcome, HttpTransport, RateLimitedFetcher, UserAgentPool};
pub use parse::{
    normalize_description, parse_detail, parse_job_id, parse_listing, JobDetail, ListingContext,
    ListingPage,
};

// Re-export stage drivers
pub use pipeline::{
    collect_listings, enrich_details, refresh_locations, run_dedup, validate_extraction,
    CollectReport, DedupReport, EnrichReport, ExtractReport, ExtractionDispatcher, LocationReport,
    RecordOutcome,
};

// Re-export stores
pub use stores::MemoryStore;

#[cfg(feature = "sqlite")]
pub use stores::SqliteStore;

#[cfg(feature = "openai")]
pub use ai::OpenAiLlm;

// Re-export testing utilities
pub use testing::{MockLlm, MockTransport};
