#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

use std::sync::Arc;
use std::time::Duration;

use admatch::config::{CacheConfig, CrawlConfig, EmbeddingConfig};
use admatch::context::ContextEnricher;
use admatch::crawler::CrawlBackendClient;
use admatch::crawler::coordinator::CrawlCoordinator;
use admatch::database::sqlite::Database;
use admatch::embeddings::EmbeddingClient;
use admatch::models::AdRequestContext;
use admatch::storage::PageContextStore;
use anyhow::Result;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ACTOR_ID: &str = "acme~page-extractor";

struct TestHarness {
    _dir: TempDir,
    store: Arc<PageContextStore>,
    coordinator: Arc<CrawlCoordinator>,
    enricher: ContextEnricher,
}

/// Wire a coordinator and enricher against a mock backend serving both
/// the crawl API (under /v2) and the embedding API (under /api).
async fn harness(server: &MockServer, timeout_seconds: u64) -> Result<TestHarness> {
    let dir = TempDir::new()?;
    let database = Database::new(dir.path().join("test.db")).await?;
    let store = Arc::new(PageContextStore::load(&database, &CacheConfig::default()).await?);

    let server_url = url::Url::parse(&server.uri())?;
    let embedding_config = EmbeddingConfig {
        protocol: "http".to_string(),
        host: server_url.host_str().unwrap_or("127.0.0.1").to_string(),
        port: server_url.port().unwrap_or(80),
        model: "test-model".to_string(),
        batch_size: 4,
        embedding_dimension: 4,
    };
    let embedder = EmbeddingClient::new(&embedding_config)?
        .with_timeout(Duration::from_secs(2))
        .with_retry_attempts(1);

    let crawl_config = CrawlConfig {
        base_url: format!("{}/v2", server.uri()),
        actor_id: ACTOR_ID.to_string(),
        api_token: Some("test-token".to_string()),
        timeout_seconds,
        poll_interval_seconds: 1,
    };
    let client = CrawlBackendClient::new(&crawl_config)?;

    let coordinator = Arc::new(CrawlCoordinator::new(
        client,
        embedder.clone(),
        Arc::clone(&store),
        &crawl_config,
    ));
    let enricher = ContextEnricher::new(Arc::clone(&store), Arc::clone(&coordinator), embedder);

    Ok(TestHarness {
        _dir: dir,
        store,
        coordinator,
        enricher,
    })
}

async fn mount_trigger(server: &MockServer, run_id: &str, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(format!("/v2/acts/{ACTOR_ID}/runs")))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": {
                "id": run_id,
                "status": "READY",
                "defaultDatasetId": format!("ds-{run_id}")
            }
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn mount_status(server: &MockServer, run_id: &str, status: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/v2/actor-runs/{run_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "id": run_id,
                "status": status,
                "defaultDatasetId": format!("ds-{run_id}")
            }
        })))
        .mount(server)
        .await;
}

async fn mount_dataset(server: &MockServer, run_id: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/v2/datasets/ds-{run_id}/items")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "title": "Camping Gear Guide",
            "headings": ["Tents", "Lighting"],
            "mainContent": "Everything you need for a weekend outdoors.",
            "description": "Annual roundup",
            "keywords": ["camping", "gear"],
            "topics": ["outdoor"],
            "visualStyles": {"primaryColor": "#335577"},
            "systemInfo": {"renderer": "ssr"}
        }])))
        .mount(server)
        .await;
}

async fn mount_embed(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embedding": [0.1, 0.2, 0.3, 0.4]
        })))
        .mount(server)
        .await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn successful_crawl_stores_and_returns_enriched_context() -> Result<()> {
    let server = MockServer::start().await;
    mount_trigger(&server, "run-1", 1).await;
    mount_status(&server, "run-1", "SUCCEEDED").await;
    mount_dataset(&server, "run-1").await;
    mount_embed(&server).await;

    let harness = harness(&server, 30).await?;

    let context = harness
        .coordinator
        .crawl_and_wait("https://example.com/gear")
        .await
        .expect("crawl should produce a context");

    assert_eq!(context.title.as_deref(), Some("Camping Gear Guide"));
    assert_eq!(context.topics, vec!["outdoor".to_string()]);
    assert_eq!(context.embedding, Some(vec![0.1, 0.2, 0.3, 0.4]));
    assert_eq!(context.crawl_run_id.as_deref(), Some("run-1"));

    // The cache write is visible and the crawl state was reset
    let cached = harness
        .store
        .get_enriched("https://example.com/gear")
        .expect("context should be cached");
    assert_eq!(cached.title, context.title);
    assert!(!harness.store.is_being_crawled("https://example.com/gear"));

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failed_run_clears_flag_and_returns_none() -> Result<()> {
    let server = MockServer::start().await;
    mount_trigger(&server, "run-2", 1).await;
    mount_status(&server, "run-2", "FAILED").await;

    let harness = harness(&server, 30).await?;

    let context = harness
        .coordinator
        .crawl_and_wait("https://example.com/broken")
        .await;

    assert!(context.is_none());
    assert!(!harness.store.is_being_crawled("https://example.com/broken"));
    assert!(
        harness
            .store
            .get_enriched("https://example.com/broken")
            .is_none()
    );

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn aborted_and_timed_out_statuses_are_terminal() -> Result<()> {
    for status in ["ABORTED", "TIMED-OUT"] {
        let server = MockServer::start().await;
        mount_trigger(&server, "run-3", 1).await;
        mount_status(&server, "run-3", status).await;

        let harness = harness(&server, 30).await?;
        let context = harness
            .coordinator
            .crawl_and_wait("https://example.com/gone")
            .await;

        assert!(context.is_none(), "status {status} should yield no context");
        assert!(!harness.store.is_being_crawled("https://example.com/gone"));
    }

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overall_deadline_stops_waiting_on_a_stuck_run() -> Result<()> {
    let server = MockServer::start().await;
    mount_trigger(&server, "run-4", 1).await;
    // The run never leaves RUNNING
    mount_status(&server, "run-4", "RUNNING").await;

    let harness = harness(&server, 2).await?;

    let context = harness
        .coordinator
        .crawl_and_wait("https://example.com/slow")
        .await;

    assert!(context.is_none());
    assert!(!harness.store.is_being_crawled("https://example.com/slow"));

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_enrich_calls_trigger_exactly_one_crawl() -> Result<()> {
    let server = MockServer::start().await;
    // expect(1) makes the mock server verify the single-flight guarantee
    mount_trigger(&server, "run-5", 1).await;
    mount_status(&server, "run-5", "SUCCEEDED").await;
    mount_dataset(&server, "run-5").await;
    mount_embed(&server).await;

    let harness = harness(&server, 30).await?;

    let request = AdRequestContext::for_url("https://example.com/cold", "slot-1");
    let merged = futures::future::join_all(
        (0..3).map(|_| harness.enricher.get_or_enrich(&request)),
    )
    .await;

    assert!(merged.iter().all(|m| m.has_enriched));
    assert_eq!(merged[0].title, merged[1].title);
    assert_eq!(merged[1].title, merged[2].title);
    assert!(
        !harness
            .coordinator
            .has_in_flight("https://example.com/cold")
    );

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn second_enrich_is_served_from_cache() -> Result<()> {
    let server = MockServer::start().await;
    mount_trigger(&server, "run-6", 1).await;
    mount_status(&server, "run-6", "SUCCEEDED").await;
    mount_dataset(&server, "run-6").await;
    mount_embed(&server).await;

    let harness = harness(&server, 30).await?;
    let request = AdRequestContext::for_url("https://example.com/warm", "slot-1");

    let first = harness.enricher.get_or_enrich(&request).await;
    assert!(first.has_enriched);

    // A second call must not trigger another run (expect(1) above)
    let second = harness.enricher.get_or_enrich(&request).await;
    assert!(second.has_enriched);
    assert_eq!(first.visible_text, second.visible_text);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn embedding_failure_still_stores_context() -> Result<()> {
    let server = MockServer::start().await;
    mount_trigger(&server, "run-7", 1).await;
    mount_status(&server, "run-7", "SUCCEEDED").await;
    mount_dataset(&server, "run-7").await;
    // Embedding service is down for this test
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let harness = harness(&server, 30).await?;

    let context = harness
        .coordinator
        .crawl_and_wait("https://example.com/no-embed")
        .await
        .expect("crawl should still produce a context");

    assert_eq!(context.embedding, None);
    let cached = harness
        .store
        .get_enriched("https://example.com/no-embed")
        .expect("context should be cached without an embedding");
    assert_eq!(cached.embedding, None);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn enricher_backfills_missing_embedding_from_cache() -> Result<()> {
    let server = MockServer::start().await;
    mount_embed(&server).await;

    let harness = harness(&server, 30).await?;

    // Seed a cached context that has no embedding yet
    let context = admatch::models::EnrichedPageContext {
        url: "https://example.com/backfill".to_string(),
        title: Some("Cached Article".to_string()),
        headings: Vec::new(),
        main_content: Some("body".to_string()),
        keywords: Vec::new(),
        topics: vec!["outdoor".to_string()],
        visual_styles: Default::default(),
        system_info: Default::default(),
        description: None,
        author: None,
        embedding: None,
        crawl_run_id: None,
        crawled_at: chrono::Utc::now(),
    };
    harness.store.store_enriched_context(context).await?;

    let request = AdRequestContext::for_url("https://example.com/backfill", "slot-1");
    let merged = harness.enricher.get_or_enrich(&request).await;

    assert!(merged.has_enriched);
    assert_eq!(merged.embedding, Some(vec![0.1, 0.2, 0.3, 0.4]));

    // The back-filled embedding was persisted
    let cached = harness
        .store
        .get_enriched("https://example.com/backfill")
        .expect("context should remain cached");
    assert_eq!(cached.embedding, Some(vec![0.1, 0.2, 0.3, 0.4]));

    Ok(())
}
