//! Detail enrichment: fetch the detail page of every raw record that has
//! never been enriched and merge description, location and URL back.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::fetch::{FetchOutcome, RateLimitedFetcher};
use crate::parse::{detail::parse_detail, text::normalize_description};
use crate::traits::{store::JobStore, transport::Transport};
use crate::types::{
    config::EnrichConfig,
    job::{JobRecord, JOB_NOT_FOUND},
    snapshot::RunSnapshot,
};

/// Result of an enrichment run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichReport {
    /// Records selected for enrichment
    pub pending: usize,

    /// Records updated from a detail page
    pub enriched: usize,

    /// Detail pages that answered 400/404; recorded with the sentinel
    pub not_found: usize,

    /// Records dropped because the detail page names a blacklisted company
    pub blacklisted: usize,

    /// Records left untouched after the retry budget ran out
    pub failed: usize,

    /// Merge writes issued
    pub batches: usize,
}

/// Enrich pending raw records with up to `concurrency` fetches in flight.
///
/// Results are collected as they complete and merged once `batch_size`
/// have accumulated, plus a final partial batch.
pub async fn enrich_details<T, S>(
    config: &EnrichConfig,
    fetcher: &RateLimitedFetcher<T>,
    store: &S,
    snapshot: &RunSnapshot,
) -> Result<EnrichReport>
where
    T: Transport,
    S: JobStore + ?Sized,
{
    let pending = store.pending_enrichment(config.limit).await?;
    let mut report = EnrichReport {
        pending: pending.len(),
        ..Default::default()
    };
    info!(pending = report.pending, concurrency = config.concurrency, "Enriching job details");

    let mut results = stream::iter(pending)
        .map(|record| {
            let url = config.endpoints.detail_for(record.job_id);
            async move {
                let started = std::time::Instant::now();
                let outcome = fetcher.fetch(&url).await;
                debug!(
                    job_id = record.job_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Detail fetched"
                );
                (record, url, outcome)
            }
        })
        .buffer_unordered(config.concurrency.max(1));

    let mut batch: Vec<JobRecord> = Vec::with_capacity(config.batch_size);
    let mut dropped: Vec<i64> = Vec::new();

    while let Some((mut record, url, outcome)) = results.next().await {
        match outcome {
            FetchOutcome::Success { body, attempts } => {
                let detail = parse_detail(&body);
                let company = detail.company.as_deref().unwrap_or(&record.company);
                if snapshot.is_blacklisted(company) || snapshot.is_blacklisted(&record.company) {
                    info!(job_id = record.job_id, company = %company, "Dropping blacklisted job");
                    dropped.push(record.job_id);
                    report.blacklisted += 1;
                    continue;
                }

                let description = normalize_description(&detail.description);
                if description.is_empty() {
                    warn!(job_id = record.job_id, attempts, "Detail page has no description");
                }
                record.description = Some(description);
                record.location = detail.location;
                record.url = Some(url);
                record.created_on = Utc::now();
                report.enriched += 1;
                batch.push(record);
            }
            FetchOutcome::Terminal { status } => {
                warn!(job_id = record.job_id, status, "Job not found");
                record.description = Some(String::new());
                record.location = JOB_NOT_FOUND.to_string();
                record.url = Some(url);
                record.created_on = Utc::now();
                report.not_found += 1;
                batch.push(record);
            }
            FetchOutcome::Retryable { attempts, reason } => {
                warn!(
                    job_id = record.job_id,
                    attempts,
                    reason = %reason,
                    "Detail fetch failed, leaving for next run"
                );
                report.failed += 1;
            }
        }

        if batch.len() >= config.batch_size {
            store.append_batch(&batch).await?;
            report.batches += 1;
            debug!(records = batch.len(), "Flushed enrichment batch");
            batch.clear();
        }
    }

    if !batch.is_empty() {
        store.append_batch(&batch).await?;
        report.batches += 1;
    }
    if !dropped.is_empty() {
        store.remove_raw(&dropped).await?;
    }

    info!(
        enriched = report.enriched,
        not_found = report.not_found,
        blacklisted = report.blacklisted,
        failed = report.failed,
        "Enrichment complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryStore;
    use crate::testing::{detail_page_html, MockTransport};
    use crate::traits::store::{BlacklistStore, RawJobStore};
    use crate::traits::transport::RawResponse;
    use crate::types::config::{Endpoints, RetryPolicy};
    use crate::types::job::LOCATION_NOT_FOUND;
    use crate::types::snapshot::Blacklist;
    use std::collections::HashSet;
    use std::time::Duration;

    fn endpoints() -> Endpoints {
        Endpoints::at("https://jobs.test")
    }

    fn config() -> EnrichConfig {
        EnrichConfig::new().with_endpoints(endpoints()).with_batch_size(2)
    }

    async fn seeded(ids: &[i64]) -> MemoryStore {
        let store = MemoryStore::new();
        let records: Vec<JobRecord> = ids
            .iter()
            .map(|id| JobRecord::new(*id, "Engineer", "Acme").with_search("rust", "Berlin"))
            .collect();
        store.append_batch(&records).await.unwrap();
        store
    }

    #[tokio::test(start_paused = true)]
    async fn test_enriches_and_records_not_found() {
        let store = seeded(&[1, 2, 3]).await;
        let transport = MockTransport::new()
            .respond(
                endpoints().detail_for(1),
                RawResponse::ok(detail_page_html("Acme", "Berlin, DE", &["Line one", "Line two"])),
            )
            .respond(endpoints().detail_for(2), RawResponse::new(404, ""))
            .respond(endpoints().detail_for(3), RawResponse::ok("<html></html>"));
        let fetcher = RateLimitedFetcher::new(transport, RetryPolicy::new());

        let report = enrich_details(&config(), &fetcher, &store, &RunSnapshot::default())
            .await
            .unwrap();

        assert_eq!(report.enriched, 2);
        assert_eq!(report.not_found, 1);
        assert_eq!(report.batches, 2);

        let rows = store.raw_jobs().await.unwrap();
        let one = rows.iter().find(|r| r.job_id == 1).unwrap();
        assert_eq!(one.description.as_deref(), Some("Line one Line two"));
        assert_eq!(one.location, "Berlin, DE");
        assert_eq!(one.url.as_deref(), Some("https://jobs.test/jobs/view/1"));

        let two = rows.iter().find(|r| r.job_id == 2).unwrap();
        assert_eq!(two.description.as_deref(), Some(""));
        assert_eq!(two.location, JOB_NOT_FOUND);

        let three = rows.iter().find(|r| r.job_id == 3).unwrap();
        assert_eq!(three.location, LOCATION_NOT_FOUND);

        assert!(store.pending_enrichment(None).await.unwrap().is_empty());
        assert!(store.pending_extraction(10).await.unwrap().iter().all(|r| r.job_id == 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_blacklisted_detail_company_is_dropped() {
        let store = seeded(&[5]).await;
        let transport = MockTransport::new().respond(
            endpoints().detail_for(5),
            RawResponse::ok(detail_page_html("SynergisticIT", "Remote", &["Apply now"])),
        );
        let fetcher = RateLimitedFetcher::new(transport, RetryPolicy::new());
        let snapshot = RunSnapshot::new(HashSet::new(), Blacklist::new(["synergisticit"]));

        let report = enrich_details(&config(), &fetcher, &store, &snapshot).await.unwrap();

        assert_eq!(report.blacklisted, 1);
        assert_eq!(store.count_raw().await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_is_fixed_for_the_run() {
        let store = seeded(&[6]).await;
        let snapshot = RunSnapshot::load(&store).await.unwrap();
        store.add_to_blacklist("Acme").await.unwrap();
        let transport = MockTransport::new().respond(
            endpoints().detail_for(6),
            RawResponse::ok(detail_page_html("Acme", "Remote", &["Role"])),
        );
        let fetcher = RateLimitedFetcher::new(transport, RetryPolicy::new());

        let report = enrich_details(&config(), &fetcher, &store, &snapshot).await.unwrap();

        assert_eq!(report.enriched, 1);
        assert_eq!(report.blacklisted, 0);
        let next_run = RunSnapshot::load(&store).await.unwrap();
        assert!(next_run.is_blacklisted("Acme"));
        assert!(next_run.is_known(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_leave_record_pending() {
        let store = seeded(&[8]).await;
        let transport = MockTransport::new().with_fallback(RawResponse::new(429, ""));
        let policy = RetryPolicy::new()
            .with_max_retries(2)
            .with_base_delay(Duration::from_millis(10));
        let fetcher = RateLimitedFetcher::new(transport, policy);

        let report = enrich_details(&config(), &fetcher, &store, &RunSnapshot::default())
            .await
            .unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.batches, 0);
        assert_eq!(store.pending_enrichment(None).await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_is_honored_before_success() {
        let store = seeded(&[42]).await;
        let transport = MockTransport::new()
            .respond(
                endpoints().detail_for(42),
                RawResponse::new(429, "").with_retry_after(Duration::from_secs(3)),
            )
            .respond(
                endpoints().detail_for(42),
                RawResponse::ok(detail_page_html("Acme", "Austin, TX", &["Ship Rust services."])),
            );
        let fetcher = RateLimitedFetcher::new(transport, RetryPolicy::new());

        let start = tokio::time::Instant::now();
        let report = enrich_details(&config(), &fetcher, &store, &RunSnapshot::default())
            .await
            .unwrap();

        assert!(start.elapsed() >= Duration::from_secs(3));
        assert_eq!(report.enriched, 1);
        let row = &store.raw_jobs().await.unwrap()[0];
        assert_eq!(row.description.as_deref(), Some("Ship Rust services."));
        assert_eq!(row.location, "Austin, TX");
        assert!(row.url.is_some());
    }
}
