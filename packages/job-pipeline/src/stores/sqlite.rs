//! SQLite storage implementation.
//!
//! The raw table has no key: it can hold several rows per `job_id`, and the
//! dedup passes reduce it with `ROW_NUMBER() OVER (PARTITION BY ...)`.
//! Extracted and bad-job tables are unique on `job_id` and written with
//! `ON CONFLICT` upserts. Timestamps are RFC 3339 text with fixed
//! microsecond precision, so they sort lexicographically.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::traits::store::{BlacklistStore, DeadLetterStore, ExtractedJobStore, RawJobStore};
use crate::types::{
    config::TableNames,
    job::{BadJob, ExtractedJob, ExtractedRow, JobRecord, LOCATION_NOT_FOUND},
    snapshot::{normalize_company, Blacklist},
};

const RECORD_COLUMNS: &str =
    "job_id, task_id, keyword, location, title, company, description, url, created_on";

const EXTRACTED_COLUMNS: &str = "job_id, task_id, keyword, location, title, company, description, \
     url, created_on, summary, industries, soft_skills, hard_skills, tech_stack, \
     programming_languages, education, salary, benefits";

/// Partition key of the description passes: rows without a description get
/// a key of their own id, so they never collapse into each other.
const DESCRIPTION_KEY: &str =
    "CASE WHEN description IS NULL OR description = '' THEN 'id:' || job_id ELSE 'd:' || description END";

/// Whitespace characters ignored when deciding whether a description is empty.
const BLANK: &str = "' ' || char(9) || char(10) || char(13)";

fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PipelineError::storage(format!("invalid timestamp {s:?}: {e}")))
}

/// Split an optionally schema-qualified name into (schema prefix, bare name).
fn split_qualified(table: &str) -> (String, &str) {
    match table.rsplit_once('.') {
        Some((schema, name)) => (format!("{schema}."), name),
        None => (String::new(), table),
    }
}

/// SQLite-based job store.
pub struct SqliteStore {
    pool: SqlitePool,
    tables: TableNames,
    list_delimiter: String,
}

impl SqliteStore {
    /// Open (and migrate) the database at `database_url` with default table names.
    ///
    /// # Example URLs
    /// - `sqlite::memory:` - In-memory database (use [`SqliteStore::in_memory`])
    /// - `sqlite://jobs.db?mode=rwc` - Create if not exists
    pub async fn new(database_url: &str) -> Result<Self> {
        Self::with_tables(database_url, TableNames::default()).await
    }

    /// Open with custom table names.
    pub async fn with_tables(database_url: &str, tables: TableNames) -> Result<Self> {
        tables.validate()?;
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(PipelineError::storage)?;
        Self::from_pool(pool, tables).await
    }

    /// In-memory database on a single long-lived connection (for testing).
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(PipelineError::storage)?;
        Self::from_pool(pool, TableNames::default()).await
    }

    async fn from_pool(pool: SqlitePool, tables: TableNames) -> Result<Self> {
        let store = Self {
            pool,
            tables,
            list_delimiter: ",".to_string(),
        };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Separator for list-typed columns of the extracted table. Default: ",".
    pub fn with_list_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.list_delimiter = delimiter.into();
        self
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    async fn run_migrations(&self) -> Result<()> {
        let TableNames {
            raw,
            extracted,
            bad,
            blacklist,
        } = &self.tables;
        let (raw_schema, raw_name) = split_qualified(raw);

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {raw} (
                job_id INTEGER NOT NULL,
                task_id TEXT NOT NULL DEFAULT '',
                keyword TEXT NOT NULL DEFAULT '',
                location TEXT NOT NULL DEFAULT '',
                title TEXT NOT NULL DEFAULT '',
                company TEXT NOT NULL DEFAULT '',
                description TEXT,
                url TEXT,
                created_on TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS {raw_schema}idx_{raw_name}_job_id ON {raw_name}(job_id);
            "#
        ))
        .execute(&self.pool)
        .await
        .map_err(PipelineError::storage)?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {extracted} (
                job_id INTEGER NOT NULL UNIQUE,
                task_id TEXT NOT NULL DEFAULT '',
                keyword TEXT NOT NULL DEFAULT '',
                location TEXT NOT NULL DEFAULT '',
                title TEXT NOT NULL DEFAULT '',
                company TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL,
                url TEXT,
                created_on TEXT NOT NULL,
                summary TEXT NOT NULL DEFAULT '',
                industries TEXT NOT NULL DEFAULT '',
                soft_skills TEXT NOT NULL DEFAULT '',
                hard_skills TEXT NOT NULL DEFAULT '',
                tech_stack TEXT NOT NULL DEFAULT '',
                programming_languages TEXT NOT NULL DEFAULT '',
                education TEXT NOT NULL DEFAULT '{{}}',
                salary TEXT NOT NULL DEFAULT '{{}}',
                benefits TEXT NOT NULL DEFAULT ''
            );
            "#
        ))
        .execute(&self.pool)
        .await
        .map_err(PipelineError::storage)?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {bad} (
                job_id INTEGER NOT NULL UNIQUE,
                task_id TEXT NOT NULL DEFAULT '',
                keyword TEXT NOT NULL DEFAULT '',
                location TEXT NOT NULL DEFAULT '',
                title TEXT NOT NULL DEFAULT '',
                company TEXT NOT NULL DEFAULT '',
                description TEXT,
                url TEXT,
                created_on TEXT NOT NULL,
                error TEXT NOT NULL,
                failed_on TEXT NOT NULL
            );
            "#
        ))
        .execute(&self.pool)
        .await
        .map_err(PipelineError::storage)?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {blacklist} (
                company TEXT PRIMARY KEY,
                added_on TEXT NOT NULL
            );
            "#
        ))
        .execute(&self.pool)
        .await
        .map_err(PipelineError::storage)?;

        Ok(())
    }

    /// Append rows without merging, as a bulk load would.
    pub async fn import_raw(&self, records: &[JobRecord]) -> Result<usize> {
        let mut tx = self.pool.begin().await.map_err(PipelineError::storage)?;
        for record in records {
            self.insert_raw(&mut tx, record).await?;
        }
        tx.commit().await.map_err(PipelineError::storage)?;
        Ok(records.len())
    }

    async fn insert_raw(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        record: &JobRecord,
    ) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO {} ({RECORD_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            self.tables.raw
        ))
        .bind(record.job_id)
        .bind(&record.task_id)
        .bind(&record.keyword)
        .bind(&record.location)
        .bind(&record.title)
        .bind(&record.company)
        .bind(&record.description)
        .bind(&record.url)
        .bind(timestamp(&record.created_on))
        .execute(&mut **tx)
        .await
        .map_err(PipelineError::storage)?;
        Ok(())
    }

    /// Delete ranked duplicates from `table`, keeping `rn = 1` per partition.
    async fn delete_ranked(&self, table: &str, partition: &str) -> Result<usize> {
        let result = sqlx::query(&format!(
            r#"
            DELETE FROM {table} WHERE rowid IN (
                SELECT rid FROM (
                    SELECT rowid AS rid,
                           ROW_NUMBER() OVER (
                               PARTITION BY {partition}
                               ORDER BY created_on DESC, rowid DESC
                           ) AS rn
                    FROM {table}
                )
                WHERE rn > 1
            )
            "#
        ))
        .execute(&self.pool)
        .await
        .map_err(PipelineError::storage)?;

        Ok(result.rows_affected() as usize)
    }

    async fn count(&self, table: &str) -> Result<usize> {
        let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.pool)
            .await
            .map_err(PipelineError::storage)?;
        Ok(count as usize)
    }

    async fn ids(&self, table: &str) -> Result<HashSet<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as(&format!("SELECT DISTINCT job_id FROM {table}"))
            .fetch_all(&self.pool)
            .await
            .map_err(PipelineError::storage)?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

// Row types for sqlx queries
#[derive(Debug, FromRow)]
struct RecordRow {
    job_id: i64,
    task_id: String,
    keyword: String,
    location: String,
    title: String,
    company: String,
    description: Option<String>,
    url: Option<String>,
    created_on: String,
}

impl RecordRow {
    fn into_record(self) -> Result<JobRecord> {
        Ok(JobRecord {
            job_id: self.job_id,
            task_id: self.task_id,
            keyword: self.keyword,
            location: self.location,
            title: self.title,
            company: self.company,
            description: self.description,
            url: self.url,
            created_on: parse_timestamp(&self.created_on)?,
        })
    }
}

#[derive(Debug, FromRow)]
struct ExtractedSqlRow {
    job_id: i64,
    task_id: String,
    keyword: String,
    location: String,
    title: String,
    company: String,
    description: String,
    url: Option<String>,
    created_on: String,
    summary: String,
    industries: String,
    soft_skills: String,
    hard_skills: String,
    tech_stack: String,
    programming_languages: String,
    education: String,
    salary: String,
    benefits: String,
}

impl ExtractedSqlRow {
    fn into_job(self, delimiter: &str) -> Result<ExtractedJob> {
        let row = ExtractedRow {
            job_id: self.job_id,
            task_id: self.task_id,
            keyword: self.keyword,
            location: self.location,
            title: self.title,
            company: self.company,
            description: self.description,
            url: self.url,
            created_on: parse_timestamp(&self.created_on)?,
            summary: self.summary,
            industries: self.industries,
            soft_skills: self.soft_skills,
            hard_skills: self.hard_skills,
            tech_stack: self.tech_stack,
            programming_languages: self.programming_languages,
            education: self.education,
            salary: self.salary,
            benefits: self.benefits,
        };
        Ok(ExtractedJob::from_row(row, delimiter)?)
    }
}

#[derive(Debug, FromRow)]
struct BadRow {
    #[sqlx(flatten)]
    record: RecordRow,
    error: String,
    failed_on: String,
}

impl BadRow {
    fn into_bad_job(self) -> Result<BadJob> {
        Ok(BadJob {
            record: self.record.into_record()?,
            error: self.error,
            failed_on: parse_timestamp(&self.failed_on)?,
        })
    }
}

#[async_trait]
impl RawJobStore for SqliteStore {
    async fn append_batch(&self, records: &[JobRecord]) -> Result<usize> {
        let raw = &self.tables.raw;
        let mut tx = self.pool.begin().await.map_err(PipelineError::storage)?;

        for record in records {
            let updated = sqlx::query(&format!(
                r#"
                UPDATE {raw} SET
                    created_on = ?,
                    description = COALESCE(?, description),
                    url = COALESCE(?, url),
                    location = CASE WHEN ? = '' THEN location ELSE ? END
                WHERE job_id = ?
                "#
            ))
            .bind(timestamp(&record.created_on))
            .bind(&record.description)
            .bind(&record.url)
            .bind(&record.location)
            .bind(&record.location)
            .bind(record.job_id)
            .execute(&mut *tx)
            .await
            .map_err(PipelineError::storage)?;

            if updated.rows_affected() == 0 {
                self.insert_raw(&mut tx, record).await?;
            }
        }

        tx.commit().await.map_err(PipelineError::storage)?;
        debug!(records = records.len(), table = %raw, "Merged raw batch");
        Ok(records.len())
    }

    async fn remove_raw(&self, job_ids: &[i64]) -> Result<usize> {
        let mut tx = self.pool.begin().await.map_err(PipelineError::storage)?;
        let mut removed = 0;
        for id in job_ids {
            let result = sqlx::query(&format!("DELETE FROM {} WHERE job_id = ?", self.tables.raw))
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(PipelineError::storage)?;
            removed += result.rows_affected() as usize;
        }
        tx.commit().await.map_err(PipelineError::storage)?;
        Ok(removed)
    }

    async fn raw_ids(&self) -> Result<HashSet<i64>> {
        self.ids(&self.tables.raw).await
    }

    async fn pending_enrichment(&self, limit: Option<usize>) -> Result<Vec<JobRecord>> {
        let rows = sqlx::query_as::<_, RecordRow>(&format!(
            r#"
            SELECT {RECORD_COLUMNS} FROM (
                SELECT {RECORD_COLUMNS},
                       ROW_NUMBER() OVER (
                           PARTITION BY job_id ORDER BY created_on DESC, rowid DESC
                       ) AS rn
                FROM {raw}
                WHERE description IS NULL
            )
            WHERE rn = 1
            ORDER BY created_on ASC, job_id ASC
            LIMIT ?
            "#,
            raw = self.tables.raw
        ))
        .bind(limit.map(|l| l as i64).unwrap_or(-1))
        .fetch_all(&self.pool)
        .await
        .map_err(PipelineError::storage)?;

        rows.into_iter().map(RecordRow::into_record).collect()
    }

    async fn pending_extraction(&self, limit: usize) -> Result<Vec<JobRecord>> {
        let TableNames {
            raw,
            extracted,
            bad,
            ..
        } = &self.tables;

        let rows = sqlx::query_as::<_, RecordRow>(&format!(
            r#"
            SELECT r.job_id, r.task_id, r.keyword, r.location, r.title, r.company,
                   r.description, r.url, r.created_on
            FROM (
                SELECT {RECORD_COLUMNS},
                       ROW_NUMBER() OVER (
                           PARTITION BY job_id ORDER BY created_on DESC, rowid DESC
                       ) AS rn
                FROM {raw}
                WHERE description IS NOT NULL AND TRIM(description, {BLANK}) <> ''
            ) AS r
            LEFT JOIN {extracted} AS e ON e.job_id = r.job_id
            LEFT JOIN {bad} AS b ON b.job_id = r.job_id
            WHERE r.rn = 1 AND e.job_id IS NULL AND b.job_id IS NULL
            ORDER BY r.created_on ASC, r.job_id ASC
            LIMIT ?
            "#
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(PipelineError::storage)?;

        rows.into_iter().map(RecordRow::into_record).collect()
    }

    async fn dedupe_raw_by_description(&self) -> Result<usize> {
        self.delete_ranked(&self.tables.raw, DESCRIPTION_KEY).await
    }

    async fn dedupe_raw_by_id(&self) -> Result<usize> {
        self.delete_ranked(&self.tables.raw, "job_id").await
    }

    async fn remove_promoted(&self) -> Result<usize> {
        let result = sqlx::query(&format!(
            r#"
            DELETE FROM {raw} WHERE rowid IN (
                SELECT r.rowid FROM {raw} AS r
                LEFT JOIN {extracted} AS e ON e.job_id = r.job_id
                WHERE e.job_id IS NOT NULL
            )
            "#,
            raw = self.tables.raw,
            extracted = self.tables.extracted
        ))
        .execute(&self.pool)
        .await
        .map_err(PipelineError::storage)?;

        Ok(result.rows_affected() as usize)
    }

    async fn raw_jobs(&self) -> Result<Vec<JobRecord>> {
        let rows = sqlx::query_as::<_, RecordRow>(&format!(
            "SELECT {RECORD_COLUMNS} FROM {} ORDER BY rowid",
            self.tables.raw
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(PipelineError::storage)?;

        rows.into_iter().map(RecordRow::into_record).collect()
    }

    async fn count_raw(&self) -> Result<usize> {
        self.count(&self.tables.raw).await
    }
}

#[async_trait]
impl ExtractedJobStore for SqliteStore {
    async fn save_extracted(&self, jobs: &[ExtractedJob]) -> Result<usize> {
        let sql = format!(
            r#"
            INSERT INTO {} ({EXTRACTED_COLUMNS})
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(job_id) DO UPDATE SET
                task_id = excluded.task_id,
                keyword = excluded.keyword,
                location = excluded.location,
                title = excluded.title,
                company = excluded.company,
                description = excluded.description,
                url = excluded.url,
                created_on = excluded.created_on,
                summary = excluded.summary,
                industries = excluded.industries,
                soft_skills = excluded.soft_skills,
                hard_skills = excluded.hard_skills,
                tech_stack = excluded.tech_stack,
                programming_languages = excluded.programming_languages,
                education = excluded.education,
                salary = excluded.salary,
                benefits = excluded.benefits
            "#,
            self.tables.extracted
        );

        let mut tx = self.pool.begin().await.map_err(PipelineError::storage)?;
        for job in jobs {
            let row = job.to_row(&self.list_delimiter)?;
            sqlx::query(&sql)
                .bind(row.job_id)
                .bind(&row.task_id)
                .bind(&row.keyword)
                .bind(&row.location)
                .bind(&row.title)
                .bind(&row.company)
                .bind(&row.description)
                .bind(&row.url)
                .bind(timestamp(&row.created_on))
                .bind(&row.summary)
                .bind(&row.industries)
                .bind(&row.soft_skills)
                .bind(&row.hard_skills)
                .bind(&row.tech_stack)
                .bind(&row.programming_languages)
                .bind(&row.education)
                .bind(&row.salary)
                .bind(&row.benefits)
                .execute(&mut *tx)
                .await
                .map_err(PipelineError::storage)?;
        }
        tx.commit().await.map_err(PipelineError::storage)?;

        debug!(jobs = jobs.len(), table = %self.tables.extracted, "Merged extracted batch");
        Ok(jobs.len())
    }

    async fn extracted_ids(&self) -> Result<HashSet<i64>> {
        self.ids(&self.tables.extracted).await
    }

    async fn dedupe_extracted(&self) -> Result<usize> {
        self.delete_ranked(&self.tables.extracted, DESCRIPTION_KEY).await
    }

    async fn extracted_jobs(&self) -> Result<Vec<ExtractedJob>> {
        let rows = sqlx::query_as::<_, ExtractedSqlRow>(&format!(
            "SELECT {EXTRACTED_COLUMNS} FROM {} ORDER BY job_id",
            self.tables.extracted
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(PipelineError::storage)?;

        rows.into_iter()
            .map(|r| r.into_job(&self.list_delimiter))
            .collect()
    }

    async fn missing_location(&self, limit: Option<usize>) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as(&format!(
            "SELECT job_id FROM {} WHERE location = ? ORDER BY job_id LIMIT ?",
            self.tables.extracted
        ))
        .bind(LOCATION_NOT_FOUND)
        .bind(limit.map(|l| l as i64).unwrap_or(-1))
        .fetch_all(&self.pool)
        .await
        .map_err(PipelineError::storage)?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn update_location(&self, job_id: i64, location: &str) -> Result<bool> {
        let result = sqlx::query(&format!(
            "UPDATE {} SET location = ? WHERE job_id = ? AND location <> ?",
            self.tables.extracted
        ))
        .bind(location)
        .bind(job_id)
        .bind(location)
        .execute(&self.pool)
        .await
        .map_err(PipelineError::storage)?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_extracted(&self) -> Result<usize> {
        self.count(&self.tables.extracted).await
    }
}

#[async_trait]
impl DeadLetterStore for SqliteStore {
    async fn move_to_bad(&self, record: &JobRecord, error: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(PipelineError::storage)?;

        sqlx::query(&format!(
            r#"
            INSERT INTO {} ({RECORD_COLUMNS}, error, failed_on)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(job_id) DO UPDATE SET
                description = excluded.description,
                url = excluded.url,
                created_on = excluded.created_on,
                error = excluded.error,
                failed_on = excluded.failed_on
            "#,
            self.tables.bad
        ))
        .bind(record.job_id)
        .bind(&record.task_id)
        .bind(&record.keyword)
        .bind(&record.location)
        .bind(&record.title)
        .bind(&record.company)
        .bind(&record.description)
        .bind(&record.url)
        .bind(timestamp(&record.created_on))
        .bind(error)
        .bind(timestamp(&Utc::now()))
        .execute(&mut *tx)
        .await
        .map_err(PipelineError::storage)?;

        sqlx::query(&format!("DELETE FROM {} WHERE job_id = ?", self.tables.raw))
            .bind(record.job_id)
            .execute(&mut *tx)
            .await
            .map_err(PipelineError::storage)?;

        tx.commit().await.map_err(PipelineError::storage)?;
        Ok(())
    }

    async fn bad_ids(&self) -> Result<HashSet<i64>> {
        self.ids(&self.tables.bad).await
    }

    async fn bad_jobs(&self) -> Result<Vec<BadJob>> {
        let rows = sqlx::query_as::<_, BadRow>(&format!(
            "SELECT {RECORD_COLUMNS}, error, failed_on FROM {} ORDER BY job_id",
            self.tables.bad
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(PipelineError::storage)?;

        rows.into_iter().map(BadRow::into_bad_job).collect()
    }

    async fn count_bad(&self) -> Result<usize> {
        self.count(&self.tables.bad).await
    }
}

#[async_trait]
impl BlacklistStore for SqliteStore {
    async fn blacklist(&self) -> Result<Blacklist> {
        let rows: Vec<(String,)> =
            sqlx::query_as(&format!("SELECT company FROM {}", self.tables.blacklist))
                .fetch_all(&self.pool)
                .await
                .map_err(PipelineError::storage)?;

        Ok(Blacklist::new(rows.into_iter().map(|(company,)| company)))
    }

    async fn add_to_blacklist(&self, company: &str) -> Result<bool> {
        let name = normalize_company(company);
        if name.is_empty() {
            return Ok(false);
        }

        let result = sqlx::query(&format!(
            "INSERT INTO {} (company, added_on) VALUES (?, ?) ON CONFLICT(company) DO NOTHING",
            self.tables.blacklist
        ))
        .bind(&name)
        .bind(timestamp(&Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(PipelineError::storage)?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_from_blacklist(&self, company: &str) -> Result<bool> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE company = ?",
            self.tables.blacklist
        ))
        .bind(normalize_company(company))
        .execute(&self.pool)
        .await
        .map_err(PipelineError::storage)?;

        Ok(result.rows_affected() > 0)
    }
}
