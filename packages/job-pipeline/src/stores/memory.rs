//! In-memory storage implementation for testing and development.
//!
//! Mirrors the SQLite semantics: the raw table may hold several rows per id,
//! extracted and bad-job tables are keyed by id, and "most recent" ties are
//! broken by insertion order. Locks are always taken in the order
//! raw, extracted, bad.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::traits::store::{BlacklistStore, DeadLetterStore, ExtractedJobStore, RawJobStore};
use crate::types::{
    job::{BadJob, ExtractedJob, JobRecord, LOCATION_NOT_FOUND},
    snapshot::{normalize_company, Blacklist},
};

#[derive(Debug, Clone)]
struct Row<T> {
    seq: u64,
    value: T,
}

/// Partition key of the description dedup pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DescriptionKey {
    Text(String),
    Id(i64),
}

fn description_key(record: &JobRecord) -> DescriptionKey {
    match record.description.as_deref() {
        Some(d) if !d.is_empty() => DescriptionKey::Text(d.to_string()),
        _ => DescriptionKey::Id(record.job_id),
    }
}

/// In-memory storage for raw, extracted and bad jobs plus the blacklist.
///
/// Not suitable for production as data is lost on restart.
pub struct MemoryStore {
    raw: RwLock<Vec<Row<JobRecord>>>,
    extracted: RwLock<BTreeMap<i64, Row<ExtractedJob>>>,
    bad: RwLock<BTreeMap<i64, BadJob>>,
    blacklist: RwLock<BTreeMap<String, DateTime<Utc>>>,
    next_seq: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            raw: RwLock::new(Vec::new()),
            extracted: RwLock::new(BTreeMap::new()),
            bad: RwLock::new(BTreeMap::new()),
            blacklist: RwLock::new(BTreeMap::new()),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Seed the blacklist.
    pub fn with_blacklist(self, companies: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        {
            let mut blacklist = self.blacklist.write().unwrap();
            for company in companies {
                let name = normalize_company(company.as_ref());
                if !name.is_empty() {
                    blacklist.insert(name, Utc::now());
                }
            }
        }
        self
    }

    /// Append rows without merging, as a bulk load would.
    pub fn import_raw(&self, records: &[JobRecord]) -> usize {
        let mut raw = self.raw.write().unwrap();
        for record in records {
            raw.push(Row {
                seq: self.seq(),
                value: record.clone(),
            });
        }
        records.len()
    }

    fn seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }
}

/// Keep the most recent row per key, by `(created_on, seq)`.
fn keep_latest<T, K: std::hash::Hash + Eq>(
    rows: &mut Vec<Row<T>>,
    key: impl Fn(&T) -> K,
    created_on: impl Fn(&T) -> DateTime<Utc>,
) -> usize {
    let mut winners: HashMap<K, (DateTime<Utc>, u64)> = HashMap::new();
    for row in rows.iter() {
        let rank = (created_on(&row.value), row.seq);
        winners
            .entry(key(&row.value))
            .and_modify(|best| {
                if rank > *best {
                    *best = rank;
                }
            })
            .or_insert(rank);
    }

    let before = rows.len();
    rows.retain(|row| winners.get(&key(&row.value)).map(|w| w.1) == Some(row.seq));
    before - rows.len()
}

/// Most recent row per id, by `(created_on, seq)`, then the winners
/// oldest first by `(created_on, job_id)`.
fn latest_per_id<'a>(
    rows: impl Iterator<Item = &'a Row<JobRecord>>,
    limit: Option<usize>,
) -> Vec<JobRecord> {
    let mut latest: HashMap<i64, &Row<JobRecord>> = HashMap::new();
    for row in rows {
        latest
            .entry(row.value.job_id)
            .and_modify(|best| {
                if (row.value.created_on, row.seq) > (best.value.created_on, best.seq) {
                    *best = row;
                }
            })
            .or_insert(row);
    }

    let mut winners: Vec<JobRecord> = latest.into_values().map(|r| r.value.clone()).collect();
    winners.sort_by_key(|r| (r.created_on, r.job_id));
    winners.truncate(limit.unwrap_or(usize::MAX));
    winners
}

#[async_trait]
impl RawJobStore for MemoryStore {
    async fn append_batch(&self, records: &[JobRecord]) -> Result<usize> {
        let mut raw = self.raw.write().unwrap();
        for record in records {
            let mut matched = false;
            for row in raw.iter_mut().filter(|r| r.value.job_id == record.job_id) {
                matched = true;
                let existing = &mut row.value;
                existing.created_on = record.created_on;
                if record.description.is_some() {
                    existing.description = record.description.clone();
                }
                if record.url.is_some() {
                    existing.url = record.url.clone();
                }
                if !record.location.is_empty() {
                    existing.location = record.location.clone();
                }
            }
            if !matched {
                raw.push(Row {
                    seq: self.seq(),
                    value: record.clone(),
                });
            }
        }
        Ok(records.len())
    }

    async fn remove_raw(&self, job_ids: &[i64]) -> Result<usize> {
        let ids: HashSet<i64> = job_ids.iter().copied().collect();
        let mut raw = self.raw.write().unwrap();
        let before = raw.len();
        raw.retain(|r| !ids.contains(&r.value.job_id));
        Ok(before - raw.len())
    }

    async fn raw_ids(&self) -> Result<HashSet<i64>> {
        Ok(self.raw.read().unwrap().iter().map(|r| r.value.job_id).collect())
    }

    async fn pending_enrichment(&self, limit: Option<usize>) -> Result<Vec<JobRecord>> {
        let raw = self.raw.read().unwrap();
        Ok(latest_per_id(
            raw.iter().filter(|r| r.value.description.is_none()),
            limit,
        ))
    }

    async fn pending_extraction(&self, limit: usize) -> Result<Vec<JobRecord>> {
        let raw = self.raw.read().unwrap();
        let extracted = self.extracted.read().unwrap();
        let bad = self.bad.read().unwrap();
        let pending = raw
            .iter()
            .filter(|r| r.value.has_description())
            .filter(|r| !extracted.contains_key(&r.value.job_id) && !bad.contains_key(&r.value.job_id));
        Ok(latest_per_id(pending, Some(limit)))
    }

    async fn dedupe_raw_by_description(&self) -> Result<usize> {
        let mut raw = self.raw.write().unwrap();
        Ok(keep_latest(&mut *raw, description_key, |r: &JobRecord| r.created_on))
    }

    async fn dedupe_raw_by_id(&self) -> Result<usize> {
        let mut raw = self.raw.write().unwrap();
        Ok(keep_latest(&mut *raw, |r: &JobRecord| r.job_id, |r: &JobRecord| r.created_on))
    }

    async fn remove_promoted(&self) -> Result<usize> {
        let mut raw = self.raw.write().unwrap();
        let extracted = self.extracted.read().unwrap();
        let before = raw.len();
        raw.retain(|r| !extracted.contains_key(&r.value.job_id));
        Ok(before - raw.len())
    }

    async fn raw_jobs(&self) -> Result<Vec<JobRecord>> {
        Ok(self.raw.read().unwrap().iter().map(|r| r.value.clone()).collect())
    }

    async fn count_raw(&self) -> Result<usize> {
        Ok(self.raw.read().unwrap().len())
    }
}

#[async_trait]
impl ExtractedJobStore for MemoryStore {
    async fn save_extracted(&self, jobs: &[ExtractedJob]) -> Result<usize> {
        let mut extracted = self.extracted.write().unwrap();
        for job in jobs {
            let id = job.record.job_id;
            match extracted.get_mut(&id) {
                Some(row) => row.value = job.clone(),
                None => {
                    extracted.insert(
                        id,
                        Row {
                            seq: self.seq(),
                            value: job.clone(),
                        },
                    );
                }
            }
        }
        Ok(jobs.len())
    }

    async fn extracted_ids(&self) -> Result<HashSet<i64>> {
        Ok(self.extracted.read().unwrap().keys().copied().collect())
    }

    async fn dedupe_extracted(&self) -> Result<usize> {
        let mut extracted = self.extracted.write().unwrap();
        let mut rows: Vec<Row<ExtractedJob>> = extracted.values().cloned().collect();
        let removed = keep_latest(
            &mut rows,
            |j: &ExtractedJob| description_key(&j.record),
            |j: &ExtractedJob| j.record.created_on,
        );
        let survivors: HashSet<i64> = rows.iter().map(|r| r.value.record.job_id).collect();
        extracted.retain(|id, _| survivors.contains(id));
        Ok(removed)
    }

    async fn extracted_jobs(&self) -> Result<Vec<ExtractedJob>> {
        Ok(self
            .extracted
            .read()
            .unwrap()
            .values()
            .map(|r| r.value.clone())
            .collect())
    }

    async fn missing_location(&self, limit: Option<usize>) -> Result<Vec<i64>> {
        Ok(self
            .extracted
            .read()
            .unwrap()
            .values()
            .filter(|r| r.value.record.location == LOCATION_NOT_FOUND)
            .map(|r| r.value.record.job_id)
            .take(limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn update_location(&self, job_id: i64, location: &str) -> Result<bool> {
        let mut extracted = self.extracted.write().unwrap();
        match extracted.get_mut(&job_id) {
            Some(row) if row.value.record.location != location => {
                row.value.record.location = location.to_string();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn count_extracted(&self) -> Result<usize> {
        Ok(self.extracted.read().unwrap().len())
    }
}

#[async_trait]
impl DeadLetterStore for MemoryStore {
    async fn move_to_bad(&self, record: &JobRecord, error: &str) -> Result<()> {
        // Both locks held so readers never see the record in neither table
        let mut raw = self.raw.write().unwrap();
        let mut bad = self.bad.write().unwrap();
        bad.insert(
            record.job_id,
            BadJob {
                record: record.clone(),
                error: error.to_string(),
                failed_on: Utc::now(),
            },
        );
        raw.retain(|r| r.value.job_id != record.job_id);
        Ok(())
    }

    async fn bad_ids(&self) -> Result<HashSet<i64>> {
        Ok(self.bad.read().unwrap().keys().copied().collect())
    }

    async fn bad_jobs(&self) -> Result<Vec<BadJob>> {
        Ok(self.bad.read().unwrap().values().cloned().collect())
    }

    async fn count_bad(&self) -> Result<usize> {
        Ok(self.bad.read().unwrap().len())
    }
}

#[async_trait]
impl BlacklistStore for MemoryStore {
    async fn blacklist(&self) -> Result<Blacklist> {
        Ok(Blacklist::new(self.blacklist.read().unwrap().keys()))
    }

    async fn add_to_blacklist(&self, company: &str) -> Result<bool> {
        let name = normalize_company(company);
        if name.is_empty() {
            return Ok(false);
        }
        let mut blacklist = self.blacklist.write().unwrap();
        if blacklist.contains_key(&name) {
            return Ok(false);
        }
        blacklist.insert(name, Utc::now());
        Ok(true)
    }

    async fn remove_from_blacklist(&self, company: &str) -> Result<bool> {
        Ok(self
            .blacklist
            .write()
            .unwrap()
            .remove(&normalize_company(company))
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::store::JobStore;
    use crate::types::job::ExtractedFields;
    use chrono::Duration;
    use proptest::prelude::*;

    fn at(minutes: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap() + Duration::minutes(minutes)
    }

    fn job(id: i64, description: Option<&str>, minutes: i64) -> JobRecord {
        let mut record = JobRecord::new(id, "Engineer", "Acme").with_created_on(at(minutes));
        record.description = description.map(String::from);
        record
    }

    fn extracted(record: JobRecord) -> ExtractedJob {
        ExtractedJob {
            record,
            fields: ExtractedFields::default(),
        }
    }

    #[tokio::test]
    async fn test_append_batch_merges_by_id() {
        let store = MemoryStore::new();
        store.append_batch(&[job(1, None, 0)]).await.unwrap();

        let enriched = job(1, Some("Writes Rust"), 5).with_url("https://jobs.test/1");
        store.append_batch(&[enriched.clone()]).await.unwrap();
        store.append_batch(&[enriched]).await.unwrap();

        let rows = store.raw_jobs().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].description.as_deref(), Some("Writes Rust"));
        assert_eq!(rows[0].url.as_deref(), Some("https://jobs.test/1"));
        assert_eq!(rows[0].created_on, at(5));
    }

    #[tokio::test]
    async fn test_description_dedup_keeps_most_recent_and_spares_empty() {
        let store = MemoryStore::new();
        store.import_raw(&[
            job(1, Some("same text"), 0),
            job(2, Some("same text"), 10),
            job(3, None, 0),
            job(4, None, 0),
            job(5, Some(""), 0),
            job(6, Some(""), 0),
        ]);

        let removed = store.dedupe_raw_by_description().await.unwrap();

        assert_eq!(removed, 1);
        let ids = store.raw_ids().await.unwrap();
        assert_eq!(ids, HashSet::from([2, 3, 4, 5, 6]));
    }

    #[tokio::test]
    async fn test_id_dedup_keeps_latest_row() {
        let store = MemoryStore::new();
        store.import_raw(&[job(1, Some("old"), 0), job(1, Some("new"), 3), job(1, None, 1)]);

        assert_eq!(store.dedupe_raw_by_id().await.unwrap(), 2);
        let rows = store.raw_jobs().await.unwrap();
        assert_eq!(rows[0].description.as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_pending_extraction_anti_joins() {
        let store = MemoryStore::new();
        store
            .append_batch(&[
                job(1, Some("a"), 0),
                job(2, Some("b"), 1),
                job(3, Some("c"), 2),
                job(4, Some(" "), 3),
                job(5, None, 4),
            ])
            .await
            .unwrap();
        store.save_extracted(&[extracted(job(1, Some("a"), 0))]).await.unwrap();
        store.move_to_bad(&job(2, Some("b"), 1), "bad reply").await.unwrap();

        let pending = store.pending_extraction(10).await.unwrap();

        assert_eq!(pending.iter().map(|r| r.job_id).collect::<Vec<_>>(), vec![3]);
    }

    #[tokio::test]
    async fn test_pending_queries_take_latest_row_per_id() {
        let store = MemoryStore::new();
        store.import_raw(&[
            job(1, Some("old"), 0),
            job(1, Some("new"), 5),
            job(2, Some("only"), 1),
            JobRecord::new(3, "Old title", "Acme").with_created_on(at(2)),
            JobRecord::new(3, "New title", "Acme").with_created_on(at(4)),
        ]);

        let pending = store.pending_extraction(10).await.unwrap();
        let seen: Vec<_> = pending
            .iter()
            .map(|r| (r.job_id, r.description.as_deref()))
            .collect();
        assert_eq!(seen, vec![(2, Some("only")), (1, Some("new"))]);

        let to_enrich = store.pending_enrichment(None).await.unwrap();
        assert_eq!(to_enrich.len(), 1);
        assert_eq!(to_enrich[0].title, "New title");
    }

    #[tokio::test]
    async fn test_move_to_bad_removes_raw() {
        let store = MemoryStore::new();
        store.append_batch(&[job(9, Some("x"), 0)]).await.unwrap();

        store.move_to_bad(&job(9, Some("x"), 0), "invalid JSON").await.unwrap();

        assert_eq!(store.count_raw().await.unwrap(), 0);
        let bad = store.bad_jobs().await.unwrap();
        assert_eq!(bad.len(), 1);
        assert_eq!(bad[0].error, "invalid JSON");
        assert!(store.known_ids().await.unwrap().contains(&9));
    }

    #[tokio::test]
    async fn test_remove_promoted_and_extracted_dedup() {
        let store = MemoryStore::new();
        store
            .append_batch(&[job(1, Some("dup"), 0), job(2, Some("dup"), 5), job(3, Some("solo"), 0)])
            .await
            .unwrap();
        store
            .save_extracted(&[extracted(job(1, Some("dup"), 0)), extracted(job(2, Some("dup"), 5))])
            .await
            .unwrap();

        assert_eq!(store.remove_promoted().await.unwrap(), 2);
        assert_eq!(store.dedupe_extracted().await.unwrap(), 1);
        assert_eq!(store.extracted_ids().await.unwrap(), HashSet::from([2]));
        assert_eq!(store.raw_ids().await.unwrap(), HashSet::from([3]));
    }

    #[tokio::test]
    async fn test_blacklist_roundtrip() {
        let store = MemoryStore::new().with_blacklist(["Acme"]);

        assert!(store.add_to_blacklist(" SynergisticIT ").await.unwrap());
        assert!(!store.add_to_blacklist("synergisticit").await.unwrap());
        assert!(store.remove_from_blacklist("ACME").await.unwrap());
        assert!(!store.remove_from_blacklist("acme").await.unwrap());

        let blacklist = store.blacklist().await.unwrap();
        assert_eq!(blacklist.sorted(), vec!["synergisticit".to_string()]);
    }

    fn arb_rows() -> impl Strategy<Value = Vec<(i64, Option<u8>, i64)>> {
        prop::collection::vec((0i64..8, prop::option::of(0u8..4), 0i64..5), 0..24)
    }

    proptest! {
        #[test]
        fn dedup_passes_are_idempotent(rows in arb_rows()) {
            tokio_test::block_on(async {
                let store = MemoryStore::new();
                let records: Vec<JobRecord> = rows
                    .iter()
                    .map(|(id, d, m)| job(*id, d.map(|d| format!("text {d}")).as_deref(), *m))
                    .collect();
                store.import_raw(&records);

                store.dedupe_raw_by_description().await.unwrap();
                store.dedupe_raw_by_id().await.unwrap();
                let once = store.raw_jobs().await.unwrap();

                assert_eq!(store.dedupe_raw_by_description().await.unwrap(), 0);
                assert_eq!(store.dedupe_raw_by_id().await.unwrap(), 0);
                assert_eq!(store.raw_jobs().await.unwrap(), once);

                let ids: Vec<i64> = once.iter().map(|r| r.job_id).collect();
                let unique: HashSet<i64> = ids.iter().copied().collect();
                assert_eq!(ids.len(), unique.len());
            });
        }
    }
}
