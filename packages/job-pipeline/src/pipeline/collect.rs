//! Listing crawl: page through search results for every keyword and
//! location pair and land new records in the raw table.

use std::collections::HashSet;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{FetchError, Result};
use crate::fetch::{FetchOutcome, RateLimitedFetcher};
use crate::parse::listing::{ListingContext, ListingPage};
use crate::traits::{store::JobStore, transport::Transport};
use crate::types::{config::CrawlConfig, job::JobRecord, snapshot::RunSnapshot};

const TRACKING_PARAM: &str = "public_jobs_jobs-search-bar_search-submit";

/// Result of a listing crawl.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectReport {
    /// Keyword and location pairs crawled
    pub pairs: usize,

    /// Pages fetched successfully
    pub pages: usize,

    /// Result cards seen, including filtered and malformed ones
    pub cards: usize,

    /// New records merged into the raw table
    pub records_written: usize,

    /// Cards dropped as blacklisted, already known, or seen earlier in the run
    pub skipped: usize,

    /// Cards that could not be parsed
    pub parse_errors: usize,

    /// Page requests that ended without a body
    pub failed_pages: usize,
}

/// Search URL for one page of results.
pub fn listing_url(config: &CrawlConfig, keyword: &str, location: &str, start: u32) -> Result<String> {
    let start = start.to_string();
    let url = url::Url::parse_with_params(
        &config.endpoints.listing_url,
        &[
            ("keywords", keyword),
            ("location", location),
            ("geoId", config.geo_id.as_str()),
            ("trk", TRACKING_PARAM),
            ("start", start.as_str()),
        ],
    )
    .map_err(|_| FetchError::InvalidUrl {
        url: config.endpoints.listing_url.clone(),
    })?;
    Ok(url.into())
}

/// Crawl every keyword and location pair.
///
/// Each pair gets its own task id. Pages advance by `page_step`; a failed
/// page is retried at the same offset after `page_delay`. A pair ends when
/// a page has no cards, when the offset passes `max_offset`, when a page
/// fails at or beyond `max_offset`, or after `max_page_failures` failures
/// in a row. Records are merged with one write per pair.
pub async fn collect_listings<T, S>(
    config: &CrawlConfig,
    fetcher: &RateLimitedFetcher<T>,
    store: &S,
    snapshot: &RunSnapshot,
) -> Result<CollectReport>
where
    T: Transport,
    S: JobStore + ?Sized,
{
    config.validate()?;
    let mut report = CollectReport::default();
    let mut seen: HashSet<i64> = HashSet::new();

    for keyword in &config.keywords {
        for location in &config.locations {
            let ctx = ListingContext::new(
                keyword.as_str(),
                location.as_str(),
                Uuid::new_v4().simple().to_string(),
            );
            info!(
                task_id = %ctx.task_id,
                keyword = %keyword,
                location = %location,
                "Collecting listings"
            );

            let records = crawl_pair(config, fetcher, snapshot, &ctx, &mut seen, &mut report).await?;
            report.pairs += 1;

            if !records.is_empty() {
                report.records_written += store.append_batch(&records).await?;
            }
            info!(
                task_id = %ctx.task_id,
                new_records = records.len(),
                "Pair complete"
            );
        }
    }

    info!(
        pairs = report.pairs,
        pages = report.pages,
        written = report.records_written,
        skipped = report.skipped,
        failed_pages = report.failed_pages,
        "Collect complete"
    );
    Ok(report)
}

async fn crawl_pair<T: Transport>(
    config: &CrawlConfig,
    fetcher: &RateLimitedFetcher<T>,
    snapshot: &RunSnapshot,
    ctx: &ListingContext,
    seen: &mut HashSet<i64>,
    report: &mut CollectReport,
) -> Result<Vec<JobRecord>> {
    let mut records = Vec::new();
    let mut start: u32 = 0;
    let mut failures: u32 = 0;

    while start <= config.max_offset {
        let url = listing_url(config, &ctx.keyword, &ctx.location, start)?;

        let body = match fetcher.fetch(&url).await {
            FetchOutcome::Success { body, .. } => body,
            outcome => {
                report.failed_pages += 1;
                if start >= config.max_offset {
                    debug!(task_id = %ctx.task_id, start, "Offset ceiling reached");
                    break;
                }
                failures += 1;
                if failures >= config.max_page_failures {
                    warn!(
                        task_id = %ctx.task_id,
                        start,
                        failures,
                        outcome = ?outcome,
                        "Giving up on pair"
                    );
                    break;
                }
                warn!(task_id = %ctx.task_id, start, outcome = ?outcome, "Page failed, retrying");
                tokio::time::sleep(config.page_delay).await;
                continue;
            }
        };

        failures = 0;
        report.pages += 1;

        let page = ListingPage::parse(&body);
        if page.card_count() == 0 {
            debug!(task_id = %ctx.task_id, start, "No more results");
            break;
        }
        report.cards += page.card_count();

        let mut admitted = 0;
        for result in page.records(ctx, snapshot) {
            match result {
                Ok(record) => {
                    if seen.insert(record.job_id) {
                        admitted += 1;
                        records.push(record);
                    }
                }
                Err(e) => {
                    warn!(task_id = %ctx.task_id, start, error = %e, "Skipping malformed card");
                    report.parse_errors += 1;
                }
            }
        }
        let errors_on_page = page.cards().iter().filter(|c| c.is_err()).count();
        report.skipped += page.card_count() - admitted - errors_on_page;

        debug!(task_id = %ctx.task_id, start, admitted, "Page parsed");
        start += config.page_step;
        tokio::time::sleep(config.page_delay).await;
    }

    Ok(records)
}
