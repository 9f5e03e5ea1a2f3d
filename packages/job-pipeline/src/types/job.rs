//! Job records as they move through the raw, extracted and bad-job stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Location recorded when a detail page has no location node.
pub const LOCATION_NOT_FOUND: &str = "Location not found";

/// Location recorded when the detail endpoint answers 400/404.
pub const JOB_NOT_FOUND: &str = "Job not found";

/// A crawled job posting in the raw store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Natural key from the listing site
    pub job_id: i64,

    /// Crawl run that produced the record
    pub task_id: String,

    pub keyword: String,
    pub location: String,
    pub title: String,
    pub company: String,

    /// Absent until detail enrichment succeeds
    pub description: Option<String>,

    /// Canonical detail-page URL
    pub url: Option<String>,

    /// Time of the last write, not the posting time
    pub created_on: DateTime<Utc>,
}

impl JobRecord {
    /// Create a listing-stage record (no description yet).
    pub fn new(job_id: i64, title: impl Into<String>, company: impl Into<String>) -> Self {
        Self {
            job_id,
            task_id: String::new(),
            keyword: String::new(),
            location: String::new(),
            title: title.into(),
            company: company.into(),
            description: None,
            url: None,
            created_on: Utc::now(),
        }
    }

    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = task_id.into();
        self
    }

    pub fn with_search(mut self, keyword: impl Into<String>, location: impl Into<String>) -> Self {
        self.keyword = keyword.into();
        self.location = location.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_created_on(mut self, created_on: DateTime<Utc>) -> Self {
        self.created_on = created_on;
        self
    }

    /// True when the record can be handed to the extraction dispatcher.
    pub fn has_description(&self) -> bool {
        self.description
            .as_deref()
            .is_some_and(|d| !d.trim().is_empty())
    }
}

/// Minimum education requirement extracted from a description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Education {
    pub min_degree: String,
    pub fields: Vec<String>,
}

/// Salary range; zero means "not mentioned".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryRange {
    pub min: i64,
    pub max: i64,
}

impl SalaryRange {
    pub fn is_stated(&self) -> bool {
        self.min > 0 || self.max > 0
    }
}

/// Structured fields produced by the LLM for one description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFields {
    pub summary: String,
    pub industries: Vec<String>,
    pub soft_skills: Vec<String>,
    pub hard_skills: Vec<String>,
    pub tech_stack: Vec<String>,
    pub programming_languages: Vec<String>,
    pub education: Education,
    pub salary: SalaryRange,
    pub benefits: Vec<String>,
}

/// List-typed columns of the extracted table, by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListField {
    Industries,
    SoftSkills,
    HardSkills,
    TechStack,
    ProgrammingLanguages,
    Benefits,
    EducationFields,
}

impl ListField {
    pub fn values<'a>(&self, fields: &'a ExtractedFields) -> &'a [String] {
        match self {
            Self::Industries => &fields.industries,
            Self::SoftSkills => &fields.soft_skills,
            Self::HardSkills => &fields.hard_skills,
            Self::TechStack => &fields.tech_stack,
            Self::ProgrammingLanguages => &fields.programming_languages,
            Self::Benefits => &fields.benefits,
            Self::EducationFields => &fields.education.fields,
        }
    }
}

/// A raw record promoted with its extracted fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedJob {
    pub record: JobRecord,
    pub fields: ExtractedFields,
}

/// Flat, tabular form of [`ExtractedJob`] as stored.
///
/// Lists are delimiter-joined strings; a delimiter or backslash inside an
/// item is escaped with a backslash, and an empty delimiter means ",".
/// Education and salary are embedded JSON strings.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedRow {
    pub job_id: i64,
    pub task_id: String,
    pub keyword: String,
    pub location: String,
    pub title: String,
    pub company: String,
    pub description: String,
    pub url: Option<String>,
    pub created_on: DateTime<Utc>,
    pub summary: String,
    pub industries: String,
    pub soft_skills: String,
    pub hard_skills: String,
    pub tech_stack: String,
    pub programming_languages: String,
    pub education: String,
    pub salary: String,
    pub benefits: String,
}

impl ExtractedJob {
    /// Flatten for a tabular store.
    pub fn to_row(&self, delimiter: &str) -> Result<ExtractedRow, serde_json::Error> {
        let join = |items: &[String]| join_list(items, delimiter);
        let r = &self.record;
        let f = &self.fields;

        Ok(ExtractedRow {
            job_id: r.job_id,
            task_id: r.task_id.clone(),
            keyword: r.keyword.clone(),
            location: r.location.clone(),
            title: r.title.clone(),
            company: r.company.clone(),
            description: r.description.clone().unwrap_or_default(),
            url: r.url.clone(),
            created_on: r.created_on,
            summary: f.summary.clone(),
            industries: join(&f.industries),
            soft_skills: join(&f.soft_skills),
            hard_skills: join(&f.hard_skills),
            tech_stack: join(&f.tech_stack),
            programming_languages: join(&f.programming_languages),
            education: serde_json::to_string(&f.education)?,
            salary: serde_json::to_string(&f.salary)?,
            benefits: join(&f.benefits),
        })
    }

    /// Rebuild from the flat form.
    pub fn from_row(row: ExtractedRow, delimiter: &str) -> Result<Self, serde_json::Error> {
        let split = |s: &str| split_list(s, delimiter);

        let fields = ExtractedFields {
            summary: row.summary,
            industries: split(&row.industries),
            soft_skills: split(&row.soft_skills),
            hard_skills: split(&row.hard_skills),
            tech_stack: split(&row.tech_stack),
            programming_languages: split(&row.programming_languages),
            education: serde_json::from_str(&row.education)?,
            salary: serde_json::from_str(&row.salary)?,
            benefits: split(&row.benefits),
        };

        let record = JobRecord {
            job_id: row.job_id,
            task_id: row.task_id,
            keyword: row.keyword,
            location: row.location,
            title: row.title,
            company: row.company,
            description: Some(row.description),
            url: row.url,
            created_on: row.created_on,
        };

        Ok(Self { record, fields })
    }
}

const DEFAULT_DELIMITER: &str = ",";

fn join_list(items: &[String], delimiter: &str) -> String {
    let delimiter = if delimiter.is_empty() { DEFAULT_DELIMITER } else { delimiter };
    let escaped_delimiter = format!("\\{delimiter}");
    items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.replace('\\', "\\\\").replace(delimiter, &escaped_delimiter))
        .collect::<Vec<_>>()
        .join(delimiter)
}

fn split_list(s: &str, delimiter: &str) -> Vec<String> {
    let delimiter = if delimiter.is_empty() { DEFAULT_DELIMITER } else { delimiter };
    let mut items = Vec::new();
    let mut current = String::new();
    let mut rest = s;

    while let Some(c) = rest.chars().next() {
        if let Some(after) = rest.strip_prefix(delimiter) {
            items.push(std::mem::take(&mut current));
            rest = after;
        } else if c == '\\' {
            let escaped = &rest[1..];
            if let Some(after) = escaped.strip_prefix(delimiter) {
                current.push_str(delimiter);
                rest = after;
            } else {
                let mut chars = escaped.chars();
                current.extend(chars.next());
                rest = chars.as_str();
            }
        } else {
            current.push(c);
            rest = &rest[c.len_utf8()..];
        }
    }
    items.push(current);

    items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// A record whose extraction failed permanently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BadJob {
    pub record: JobRecord,
    pub error: String,
    pub failed_on: DateTime<Utc>,
}
