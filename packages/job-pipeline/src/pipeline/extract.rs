//! Extraction dispatcher.
//!
//! Each pending record ends in exactly one of two places: the extracted
//! table (merged in bulk, once per batch) or the bad-job table with the
//! error that stopped it. Dead-lettered records are never retried
//! automatically. Pending records are re-queried for every batch, so
//! concurrent runs see each other's progress.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::parse::text::normalize_description;
use crate::pipeline::prompts::EXTRACTION_SYSTEM_PROMPT;
use crate::pipeline::schema::validate_extraction;
use crate::traits::{llm::Llm, store::JobStore};
use crate::types::{
    config::ExtractConfig,
    job::{ExtractedJob, JobRecord},
    snapshot::RunSnapshot,
};

/// Error recorded for records of blacklisted companies.
pub const BLACKLISTED_ERROR: &str = "company is blacklisted";

/// What happened to one record.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// Fields extracted; not yet written
    Extracted(ExtractedJob),

    /// Moved to the bad-job table with this error
    DeadLettered { error: String },
}

/// Result of a dispatcher run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractReport {
    /// Batches processed
    pub batches: usize,

    /// Records merged into the extracted table
    pub extracted: usize,

    /// Records moved to the bad-job table
    pub dead_lettered: usize,
}

/// Drives pending records through the LLM into the extracted table.
pub struct ExtractionDispatcher<'a, S: ?Sized, L: ?Sized> {
    store: &'a S,
    llm: &'a L,
    snapshot: &'a RunSnapshot,
    config: ExtractConfig,
}

impl<'a, S, L> ExtractionDispatcher<'a, S, L>
where
    S: JobStore + ?Sized,
    L: Llm + ?Sized,
{
    pub fn new(store: &'a S, llm: &'a L, snapshot: &'a RunSnapshot) -> Self {
        Self {
            store,
            llm,
            snapshot,
            config: ExtractConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ExtractConfig) -> Self {
        self.config = config;
        self
    }

    /// Process batches until nothing is pending or `max_batches` is reached.
    ///
    /// A failed merge write aborts the run; records of that batch stay
    /// pending and are picked up again next time.
    pub async fn run(&self) -> Result<ExtractReport> {
        let mut report = ExtractReport::default();
        info!(model = self.llm.model(), batch_size = self.config.batch_size, "Extracting fields");

        loop {
            if self.config.max_batches.is_some_and(|max| report.batches >= max) {
                debug!(batches = report.batches, "Batch limit reached");
                break;
            }

            let pending = self.store.pending_extraction(self.config.batch_size).await?;
            if pending.is_empty() {
                break;
            }

            let total = pending.len();
            let mut extracted = Vec::with_capacity(total);
            for (i, record) in pending.into_iter().enumerate() {
                let job_id = record.job_id;
                match self.process_record(record).await? {
                    RecordOutcome::Extracted(job) => {
                        debug!(job_id, progress = i + 1, total, "Extracted");
                        extracted.push(job);
                    }
                    RecordOutcome::DeadLettered { .. } => report.dead_lettered += 1,
                }
            }

            if !extracted.is_empty() {
                report.extracted += self.store.save_extracted(&extracted).await?;
            }
            report.batches += 1;
            info!(
                batch = report.batches,
                extracted = extracted.len(),
                dead_lettered = report.dead_lettered,
                "Batch complete"
            );
        }

        info!(
            batches = report.batches,
            extracted = report.extracted,
            dead_lettered = report.dead_lettered,
            "Extraction complete"
        );
        Ok(report)
    }

    /// Extract one record, dead-lettering it on any failure.
    ///
    /// Only store errors are returned as `Err`.
    pub async fn process_record(&self, mut record: JobRecord) -> Result<RecordOutcome> {
        if self.snapshot.is_blacklisted(&record.company) {
            return self.dead_letter(&record, BLACKLISTED_ERROR.to_string()).await;
        }

        let description = normalize_description(record.description.as_deref().unwrap_or_default());
        if description.is_empty() {
            return self
                .dead_letter(&record, "description is empty".to_string())
                .await;
        }

        let started = std::time::Instant::now();
        let reply = match self.llm.complete_json(EXTRACTION_SYSTEM_PROMPT, &description).await {
            Ok(reply) => reply,
            Err(e) => return self.dead_letter(&record, format!("llm: {e}")).await,
        };

        let fields = match validate_extraction(&reply) {
            Ok(fields) => fields,
            Err(e) => return self.dead_letter(&record, format!("schema: {e}")).await,
        };

        debug!(
            job_id = record.job_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "LLM reply validated"
        );
        record.description = Some(description);
        record.created_on = Utc::now();
        Ok(RecordOutcome::Extracted(ExtractedJob { record, fields }))
    }

    async fn dead_letter(&self, record: &JobRecord, error: String) -> Result<RecordOutcome> {
        warn!(job_id = record.job_id, stage = "extract", error = %error, "Moving job to bad jobs");
        self.store.move_to_bad(record, &error).await?;
        Ok(RecordOutcome::DeadLettered { error })
    }
}
