//! Memory and SQLite stores answer the pending queries the same way.

#![cfg(feature = "sqlite")]

use chrono::{DateTime, Duration, Utc};
use job_pipeline::{JobRecord, MemoryStore, RawJobStore, SqliteStore};

fn at(seconds: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap() + Duration::seconds(seconds)
}

fn rows() -> Vec<JobRecord> {
    vec![
        JobRecord::new(1, "Engineer", "Acme").with_description("old").with_created_on(at(0)),
        JobRecord::new(1, "Engineer", "Acme").with_description("new").with_created_on(at(5)),
        JobRecord::new(2, "Analyst", "Globex").with_description("same time a").with_created_on(at(3)),
        JobRecord::new(2, "Analyst", "Globex").with_description("same time b").with_created_on(at(3)),
        JobRecord::new(3, "Old title", "Initech").with_created_on(at(1)),
        JobRecord::new(3, "New title", "Initech").with_created_on(at(2)),
        JobRecord::new(4, "Engineer", "Hooli").with_created_on(at(4)),
    ]
}

fn summary(records: &[JobRecord]) -> Vec<(i64, String, Option<String>)> {
    records
        .iter()
        .map(|r| (r.job_id, r.title.clone(), r.description.clone()))
        .collect()
}

#[tokio::test]
async fn test_pending_queries_agree_on_duplicate_rows() {
    let memory = MemoryStore::new();
    memory.import_raw(&rows());
    let sqlite = SqliteStore::in_memory().await.unwrap();
    sqlite.import_raw(&rows()).await.unwrap();

    let from_memory = memory.pending_extraction(10).await.unwrap();
    let from_sqlite = sqlite.pending_extraction(10).await.unwrap();
    assert_eq!(summary(&from_memory), summary(&from_sqlite));
    assert_eq!(
        summary(&from_memory),
        vec![
            (2, "Analyst".to_string(), Some("same time b".to_string())),
            (1, "Engineer".to_string(), Some("new".to_string())),
        ]
    );

    let from_memory = memory.pending_enrichment(None).await.unwrap();
    let from_sqlite = sqlite.pending_enrichment(None).await.unwrap();
    assert_eq!(summary(&from_memory), summary(&from_sqlite));
    assert_eq!(
        from_memory.iter().map(|r| r.title.as_str()).collect::<Vec<_>>(),
        vec!["New title", "Engineer"]
    );

    assert_eq!(
        summary(&memory.pending_enrichment(Some(1)).await.unwrap()),
        summary(&sqlite.pending_enrichment(Some(1)).await.unwrap())
    );
}
