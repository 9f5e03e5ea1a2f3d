//! Location refresh: refetch the detail page of extracted jobs whose
//! location was never resolved and write the location back.

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::fetch::{FetchOutcome, RateLimitedFetcher};
use crate::parse::detail::parse_detail;
use crate::traits::{store::ExtractedJobStore, transport::Transport};
use crate::types::{
    config::EnrichConfig,
    job::{JOB_NOT_FOUND, LOCATION_NOT_FOUND},
};

/// Result of a location refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationReport {
    /// Jobs whose detail page was requested
    pub checked: usize,

    /// Rows given a new location
    pub updated: usize,

    /// Pages that still show no location, or the same one
    pub unchanged: usize,

    /// Detail pages that answered 400/404; recorded with the sentinel
    pub not_found: usize,

    /// Fetches that ran out of retries
    pub failed: usize,
}

/// Refresh locations for `job_ids`, or for every extracted job still at
/// [`LOCATION_NOT_FOUND`] when `job_ids` is empty.
///
/// Uses the concurrency, limit and endpoints of `config`.
pub async fn refresh_locations<T, S>(
    config: &EnrichConfig,
    fetcher: &RateLimitedFetcher<T>,
    store: &S,
    job_ids: &[i64],
) -> Result<LocationReport>
where
    T: Transport,
    S: ExtractedJobStore + ?Sized,
{
    let ids = if job_ids.is_empty() {
        store.missing_location(config.limit).await?
    } else {
        job_ids.to_vec()
    };
    let mut report = LocationReport {
        checked: ids.len(),
        ..Default::default()
    };
    info!(jobs = report.checked, "Refreshing locations");

    let mut results = stream::iter(ids)
        .map(|job_id| {
            let url = config.endpoints.detail_for(job_id);
            async move { (job_id, fetcher.fetch(&url).await) }
        })
        .buffer_unordered(config.concurrency.max(1));

    while let Some((job_id, outcome)) = results.next().await {
        match outcome {
            FetchOutcome::Success { body, .. } => {
                let location = parse_detail(&body).location;
                if location != LOCATION_NOT_FOUND && store.update_location(job_id, &location).await? {
                    debug!(job_id, location = %location, "Location updated");
                    report.updated += 1;
                } else {
                    report.unchanged += 1;
                }
            }
            FetchOutcome::Terminal { status } => {
                warn!(job_id, status, "Job not found");
                store.update_location(job_id, JOB_NOT_FOUND).await?;
                report.not_found += 1;
            }
            FetchOutcome::Retryable { attempts, reason } => {
                warn!(job_id, attempts, reason = %reason, "Location fetch failed");
                report.failed += 1;
            }
        }
    }

    info!(
        updated = report.updated,
        unchanged = report.unchanged,
        not_found = report.not_found,
        failed = report.failed,
        "Location refresh complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryStore;
    use crate::testing::{detail_page_html, MockTransport};
    use crate::traits::transport::RawResponse;
    use crate::types::config::{Endpoints, RetryPolicy};
    use crate::types::job::{ExtractedFields, ExtractedJob, JobRecord};

    fn endpoints() -> Endpoints {
        Endpoints::at("https://jobs.test")
    }

    fn config() -> EnrichConfig {
        EnrichConfig::new().with_endpoints(endpoints())
    }

    async fn seeded(locations: &[(i64, &str)]) -> MemoryStore {
        let store = MemoryStore::new();
        let jobs: Vec<ExtractedJob> = locations
            .iter()
            .map(|(id, location)| {
                let mut record = JobRecord::new(*id, "Engineer", "Acme").with_description("text");
                record.location = location.to_string();
                ExtractedJob {
                    record,
                    fields: ExtractedFields::default(),
                }
            })
            .collect();
        store.save_extracted(&jobs).await.unwrap();
        store
    }

    fn location_of(jobs: &[ExtractedJob], id: i64) -> &str {
        &jobs.iter().find(|j| j.record.job_id == id).unwrap().record.location
    }

    #[tokio::test(start_paused = true)]
    async fn test_refreshes_unresolved_locations_only() {
        let store = seeded(&[
            (1, LOCATION_NOT_FOUND),
            (2, LOCATION_NOT_FOUND),
            (3, LOCATION_NOT_FOUND),
            (4, "Austin, TX"),
        ])
        .await;
        let transport = MockTransport::new()
            .respond(
                endpoints().detail_for(1),
                RawResponse::ok(detail_page_html("Acme", "Denver, CO", &["Role"])),
            )
            .respond(endpoints().detail_for(2), RawResponse::ok("<html></html>"))
            .respond(endpoints().detail_for(3), RawResponse::new(404, ""));
        let fetcher = RateLimitedFetcher::new(transport, RetryPolicy::new());

        let report = refresh_locations(&config(), &fetcher, &store, &[]).await.unwrap();

        assert_eq!(report.checked, 3);
        assert_eq!(report.updated, 1);
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.not_found, 1);
        assert_eq!(fetcher.transport().calls_to(&endpoints().detail_for(4)), 0);

        let jobs = store.extracted_jobs().await.unwrap();
        assert_eq!(location_of(&jobs, 1), "Denver, CO");
        assert_eq!(location_of(&jobs, 2), LOCATION_NOT_FOUND);
        assert_eq!(location_of(&jobs, 3), JOB_NOT_FOUND);
        assert_eq!(store.missing_location(None).await.unwrap(), vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_ids_and_exhausted_retries() {
        let store = seeded(&[(7, "Remote"), (8, LOCATION_NOT_FOUND)]).await;
        let transport = MockTransport::new()
            .respond(
                endpoints().detail_for(7),
                RawResponse::ok(detail_page_html("Acme", "Remote", &["Role"])),
            )
            .with_fallback(RawResponse::new(503, ""));
        let policy = RetryPolicy::new().with_max_retries(0);
        let fetcher = RateLimitedFetcher::new(transport, policy);

        let report = refresh_locations(&config(), &fetcher, &store, &[7, 8]).await.unwrap();

        assert_eq!(report.checked, 2);
        assert_eq!(report.updated, 0);
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(store.missing_location(None).await.unwrap(), vec![8]);
    }
}
