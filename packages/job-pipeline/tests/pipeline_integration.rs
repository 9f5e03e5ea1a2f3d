//! Full collect, enrich, dedup and extract run against a mock job site
//! and a mock completions endpoint, persisted in SQLite.

#![cfg(all(feature = "sqlite", feature = "openai"))]

use std::time::Duration;

use job_pipeline::testing::{
    detail_page_html, listing_card_html, listing_page_html, sample_extraction_json,
};
use job_pipeline::{
    collect_listings, enrich_details, run_dedup, BlacklistStore, CrawlConfig, DeadLetterStore,
    Endpoints, EnrichConfig, ExtractedJobStore, ExtractionDispatcher, HttpTransport, OpenAiLlm,
    RateLimitedFetcher, RawJobStore, RetryPolicy, RunSnapshot, SqliteStore,
};
use openai_client::OpenAIClient;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LISTING_PATH: &str = "/jobs-guest/jobs/api/seeMoreJobPostings/search";

fn completion(content: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-1",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

async fn mount_site(server: &MockServer) {
    let cards = vec![
        listing_card_html(101, "Data Engineer", "Acme"),
        listing_card_html(102, "Java Trainee", "SynergisticIT"),
        listing_card_html(103, "Platform Engineer", "Globex"),
    ];
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("start", "0"))
        .and(query_param("keywords", "data engineer"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page_html(&cards)))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("start", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body></body></html>"))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/jobs/view/101"))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail_page_html(
            "Acme",
            "Minneapolis, MN",
            &["Own the warehouse.", "PostgreSQL and Kafka daily."],
        )))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/jobs/view/103"))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail_page_html(
            "Globex",
            "Remote",
            &["Broken reply expected."],
        )))
        .mount(server)
        .await;
}

async fn mount_llm(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("Broken reply"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("{not json")))
        .with_priority(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(completion(&sample_extraction_json())),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_run() {
    let site = MockServer::start().await;
    let llm_server = MockServer::start().await;
    mount_site(&site).await;
    mount_llm(&llm_server).await;

    let store = SqliteStore::in_memory().await.unwrap();
    store.add_to_blacklist("  SynergisticIT ").await.unwrap();

    let policy = RetryPolicy::new()
        .with_max_retries(1)
        .with_base_delay(Duration::from_millis(10));
    let fetcher = RateLimitedFetcher::new(HttpTransport::new(policy.timeout).unwrap(), policy);
    let endpoints = Endpoints::at(&site.uri());

    // Collect
    let snapshot = RunSnapshot::load(&store).await.unwrap();
    let crawl = CrawlConfig::new(["data engineer"], ["Minnesota"])
        .with_endpoints(endpoints.clone())
        .with_max_offset(10)
        .with_page_delay(Duration::from_millis(5));
    let collected = collect_listings(&crawl, &fetcher, &store, &snapshot)
        .await
        .unwrap();
    assert_eq!(collected.records_written, 2);
    assert!(!store.raw_ids().await.unwrap().contains(&102));

    // A second crawl in a fresh run adds nothing.
    let snapshot = RunSnapshot::load(&store).await.unwrap();
    let again = collect_listings(&crawl, &fetcher, &store, &snapshot)
        .await
        .unwrap();
    assert_eq!(again.records_written, 0);

    // Enrich
    let enrich = EnrichConfig::new().with_endpoints(endpoints);
    let enriched = enrich_details(&enrich, &fetcher, &store, &snapshot)
        .await
        .unwrap();
    assert_eq!(enriched.enriched, 2);

    // Dedup
    let dedup = run_dedup(&store).await.unwrap();
    assert_eq!(dedup.raw_remaining, 2);

    // Extract
    let llm = OpenAiLlm::new(OpenAIClient::new("sk-test").with_base_url(llm_server.uri()));
    let report = ExtractionDispatcher::new(&store, &llm, &snapshot)
        .run()
        .await
        .unwrap();
    assert_eq!(report.extracted, 1);
    assert_eq!(report.dead_lettered, 1);

    let extracted = store.extracted_jobs().await.unwrap();
    assert_eq!(extracted.len(), 1);
    assert_eq!(extracted[0].record.job_id, 101);
    assert_eq!(extracted[0].record.location, "Minneapolis, MN");
    assert_eq!(extracted[0].fields.tech_stack, vec!["PostgreSQL", "Kafka"]);
    assert_eq!(extracted[0].fields.salary.max, 120_000);

    let bad = store.bad_jobs().await.unwrap();
    assert_eq!(bad.len(), 1);
    assert_eq!(bad[0].record.job_id, 103);
    assert!(bad[0].error.starts_with("schema: "));

    // Both records left the pending set; raw keeps only what was not dead-lettered.
    assert!(store.pending_extraction(10).await.unwrap().is_empty());
    let dedup = run_dedup(&store).await.unwrap();
    assert_eq!(dedup.raw_promoted, 1);
    assert_eq!(dedup.raw_remaining, 0);
}
