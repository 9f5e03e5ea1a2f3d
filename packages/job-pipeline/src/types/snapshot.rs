//! Per-run immutable view of known ids and the company blacklist.
//!
//! Built once at process start and borrowed by every stage and worker of
//! the run. Ids inserted by the run itself are not added here.

use std::collections::HashSet;

use crate::error::Result;
use crate::traits::store::JobStore;

/// Case-insensitive set of blacklisted company names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blacklist {
    companies: HashSet<String>,
}

impl Blacklist {
    pub fn new(companies: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        Self {
            companies: companies
                .into_iter()
                .map(|c| normalize_company(c.as_ref()))
                .filter(|c| !c.is_empty())
                .collect(),
        }
    }

    pub fn contains(&self, company: &str) -> bool {
        self.companies.contains(&normalize_company(company))
    }

    pub fn len(&self) -> usize {
        self.companies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.companies.is_empty()
    }

    /// Sorted names, for display.
    pub fn sorted(&self) -> Vec<String> {
        let mut names: Vec<_> = self.companies.iter().cloned().collect();
        names.sort();
        names
    }
}

/// Normalized form used for blacklist storage and comparison.
pub fn normalize_company(company: &str) -> String {
    company.trim().to_lowercase()
}

/// Known ids and blacklist, frozen for the duration of a run.
#[derive(Debug, Clone, Default)]
pub struct RunSnapshot {
    known_ids: HashSet<i64>,
    blacklist: Blacklist,
}

impl RunSnapshot {
    pub fn new(known_ids: HashSet<i64>, blacklist: Blacklist) -> Self {
        Self {
            known_ids,
            blacklist,
        }
    }

    /// Read the union of raw, extracted and bad ids plus the blacklist.
    pub async fn load<S: JobStore + ?Sized>(store: &S) -> Result<Self> {
        let known_ids = store.known_ids().await?;
        let blacklist = store.blacklist().await?;
        tracing::info!(
            known_ids = known_ids.len(),
            blacklisted = blacklist.len(),
            "Run snapshot loaded"
        );
        Ok(Self::new(known_ids, blacklist))
    }

    pub fn is_known(&self, job_id: i64) -> bool {
        self.known_ids.contains(&job_id)
    }

    pub fn is_blacklisted(&self, company: &str) -> bool {
        self.blacklist.contains(company)
    }

    pub fn blacklist(&self) -> &Blacklist {
        &self.blacklist
    }

    pub fn known_count(&self) -> usize {
        self.known_ids.len()
    }
}
