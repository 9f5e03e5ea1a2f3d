//! Storage traits for the ingest gateway.
//!
//! The durable store is split into focused traits:
//! - `RawJobStore`: landing table for crawled records, plus its dedup passes
//! - `ExtractedJobStore`: records enriched with LLM fields
//! - `DeadLetterStore`: records whose extraction failed permanently
//! - `BlacklistStore`: persisted set of excluded companies
//! - `JobStore`: composite trait combining all four

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    job::{BadJob, ExtractedJob, JobRecord},
    snapshot::Blacklist,
};

/// The raw landing table. May hold several rows per `job_id` until deduplicated.
#[async_trait]
pub trait RawJobStore: Send + Sync {
    /// Merge records keyed by `job_id`.
    ///
    /// Matched rows take the incoming `created_on`, and the incoming
    /// `description`, `url` and `location` where those are present.
    /// Unmatched records are inserted. Re-applying a batch is a no-op or a
    /// benign overwrite. Returns the number of records written.
    async fn append_batch(&self, records: &[JobRecord]) -> Result<usize>;

    /// Delete every raw row for the given ids.
    async fn remove_raw(&self, job_ids: &[i64]) -> Result<usize>;

    /// All distinct ids in the raw table.
    async fn raw_ids(&self) -> Result<HashSet<i64>>;

    /// Records never enriched (`description IS NULL`), oldest first.
    async fn pending_enrichment(&self, limit: Option<usize>) -> Result<Vec<JobRecord>>;

    /// Records with a non-empty description that are in neither the
    /// extracted nor the bad-job table, oldest first.
    ///
    /// Computed on every call; never cached.
    async fn pending_extraction(&self, limit: usize) -> Result<Vec<JobRecord>>;

    /// Keep the most recent row per description; rows without a description
    /// are keyed by their own id and never collapse into each other.
    /// Returns rows removed.
    async fn dedupe_raw_by_description(&self) -> Result<usize>;

    /// Keep the most recent row per `job_id`. Returns rows removed.
    async fn dedupe_raw_by_id(&self) -> Result<usize>;

    /// Drop raw rows whose id is already in the extracted table. Returns rows removed.
    async fn remove_promoted(&self) -> Result<usize>;

    async fn raw_jobs(&self) -> Result<Vec<JobRecord>>;

    async fn count_raw(&self) -> Result<usize>;
}

/// Records enriched with extracted fields; at most one row per `job_id`.
#[async_trait]
pub trait ExtractedJobStore: Send + Sync {
    /// Merge a batch keyed by `job_id` in one write. Returns rows written.
    async fn save_extracted(&self, jobs: &[ExtractedJob]) -> Result<usize>;

    async fn extracted_ids(&self) -> Result<HashSet<i64>>;

    /// Keep the most recent row per description. Returns rows removed.
    async fn dedupe_extracted(&self) -> Result<usize>;

    async fn extracted_jobs(&self) -> Result<Vec<ExtractedJob>>;

    /// Ids whose location was never resolved, lowest first.
    async fn missing_location(&self, limit: Option<usize>) -> Result<Vec<i64>>;

    /// Set the location of one row. Returns false when no row changed.
    async fn update_location(&self, job_id: i64, location: &str) -> Result<bool>;

    async fn count_extracted(&self) -> Result<usize>;
}

/// Dead-letter set for failed extractions.
#[async_trait]
pub trait DeadLetterStore: Send + Sync {
    /// Record the failure and remove the record from the raw table, atomically.
    async fn move_to_bad(&self, record: &JobRecord, error: &str) -> Result<()>;

    async fn bad_ids(&self) -> Result<HashSet<i64>>;

    async fn bad_jobs(&self) -> Result<Vec<BadJob>>;

    async fn count_bad(&self) -> Result<usize>;
}

/// Persisted company blacklist.
#[async_trait]
pub trait BlacklistStore: Send + Sync {
    async fn blacklist(&self) -> Result<Blacklist>;

    /// Add a company (normalized). Returns false if it was already present.
    async fn add_to_blacklist(&self, company: &str) -> Result<bool>;

    /// Remove a company. Returns false if it was not present.
    async fn remove_from_blacklist(&self, company: &str) -> Result<bool>;
}

/// Composite storage trait: the ingest gateway used by every stage.
#[async_trait]
pub trait JobStore: RawJobStore + ExtractedJobStore + DeadLetterStore + BlacklistStore {
    /// Union of ids across raw, extracted and bad-job tables.
    async fn known_ids(&self) -> Result<HashSet<i64>> {
        let mut ids = self.raw_ids().await?;
        ids.extend(self.extracted_ids().await?);
        ids.extend(self.bad_ids().await?);
        Ok(ids)
    }
}

// Blanket implementation: anything implementing all four traits is a JobStore
impl<T: RawJobStore + ExtractedJobStore + DeadLetterStore + BlacklistStore> JobStore for T {}
