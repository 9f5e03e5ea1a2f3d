//! Periodic dedup of the raw and extracted tables.
//!
//! Description dedup is a lossy heuristic: distinct postings that share
//! boilerplate text collapse into one.

use tracing::info;

use crate::error::Result;
use crate::traits::store::JobStore;

/// Rows removed by each pass, and what remains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupReport {
    pub raw_by_description: usize,
    pub raw_by_id: usize,
    pub raw_promoted: usize,
    pub extracted_by_description: usize,
    pub raw_remaining: usize,
    pub extracted_remaining: usize,
}

impl DedupReport {
    pub fn removed(&self) -> usize {
        self.raw_by_description + self.raw_by_id + self.raw_promoted + self.extracted_by_description
    }
}

/// Run the passes in order: raw by description, raw by id, raw rows already
/// promoted to extracted, then extracted by description. Re-running with no
/// new data removes nothing.
pub async fn run_dedup<S: JobStore + ?Sized>(store: &S) -> Result<DedupReport> {
    let raw_by_description = store.dedupe_raw_by_description().await?;
    info!(removed = raw_by_description, "Raw dedup by description");

    let raw_by_id = store.dedupe_raw_by_id().await?;
    info!(removed = raw_by_id, "Raw dedup by job id");

    let raw_promoted = store.remove_promoted().await?;
    info!(removed = raw_promoted, "Removed raw rows already extracted");

    let extracted_by_description = store.dedupe_extracted().await?;
    info!(removed = extracted_by_description, "Extracted dedup by description");

    Ok(DedupReport {
        raw_by_description,
        raw_by_id,
        raw_promoted,
        extracted_by_description,
        raw_remaining: store.count_raw().await?,
        extracted_remaining: store.count_extracted().await?,
    })
}
