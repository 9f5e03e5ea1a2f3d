//! Aggregates over the extracted table for read-only consumers.
//!
//! An empty filtered set is a normal result ([`Report::is_empty`]), never an
//! error.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::job::{ExtractedJob, ListField};

/// Filter applied before aggregation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobFilter {
    /// Only jobs crawled for one of these keywords (empty = all)
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Only jobs from one of these companies (empty = all)
    #[serde(default)]
    pub companies: Vec<String>,
}

impl JobFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keywords.push(keyword.into());
        self
    }

    pub fn company(mut self, company: impl Into<String>) -> Self {
        self.companies.push(company.into());
        self
    }

    pub fn matches(&self, job: &ExtractedJob) -> bool {
        let any_eq = |wanted: &[String], value: &str| {
            wanted.is_empty() || wanted.iter().any(|w| w.eq_ignore_ascii_case(value.trim()))
        };
        any_eq(&self.keywords, &job.record.keyword) && any_eq(&self.companies, &job.record.company)
    }
}

/// Term frequencies for one list field plus salary summary.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    pub field: Option<ListField>,
    pub jobs: usize,
    pub terms: Vec<(String, usize)>,
    pub mean_salary: Option<(f64, f64)>,
}

impl Report {
    pub fn is_empty(&self) -> bool {
        self.jobs == 0
    }
}

/// Count how many filtered jobs mention each value of `field`, top `n` first.
///
/// Values are compared case-insensitively; the first spelling seen is kept.
pub fn term_frequency(
    jobs: &[ExtractedJob],
    filter: &JobFilter,
    field: ListField,
    n: usize,
) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, (String, usize)> = HashMap::new();

    for job in jobs.iter().filter(|j| filter.matches(j)) {
        let mut seen_in_job = std::collections::HashSet::new();
        for value in field.values(&job.fields) {
            let value = value.trim();
            let key = value.to_lowercase();
            if key.is_empty() || !seen_in_job.insert(key.clone()) {
                continue;
            }
            counts
                .entry(key)
                .or_insert_with(|| (value.to_string(), 0))
                .1 += 1;
        }
    }

    let mut terms: Vec<(String, usize)> = counts.into_values().collect();
    terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    terms.truncate(n);
    terms
}

/// Mean (min, max) salary over filtered jobs that state one.
pub fn mean_salary(jobs: &[ExtractedJob], filter: &JobFilter) -> Option<(f64, f64)> {
    let stated: Vec<_> = jobs
        .iter()
        .filter(|j| filter.matches(j) && j.fields.salary.is_stated())
        .map(|j| j.fields.salary)
        .collect();

    if stated.is_empty() {
        return None;
    }
    let n = stated.len() as f64;
    let min = stated.iter().map(|s| s.min as f64).sum::<f64>() / n;
    let max = stated.iter().map(|s| s.max as f64).sum::<f64>() / n;
    Some((min, max))
}

/// Build a full report for one field.
pub fn build_report(jobs: &[ExtractedJob], filter: &JobFilter, field: ListField, n: usize) -> Report {
    Report {
        field: Some(field),
        jobs: jobs.iter().filter(|j| filter.matches(j)).count(),
        terms: term_frequency(jobs, filter, field, n),
        mean_salary: mean_salary(jobs, filter),
    }
}
