use super::*;
use crate::config::{CacheConfig, CrawlConfig, EmbeddingConfig};
use crate::database::sqlite::Database;
use tempfile::TempDir;

fn crawl_config(base_url: &str, token: Option<&str>) -> CrawlConfig {
    CrawlConfig {
        base_url: base_url.to_string(),
        actor_id: "acme~page-extractor".to_string(),
        api_token: token.map(str::to_string),
        timeout_seconds: 10,
        poll_interval_seconds: 1,
    }
}

async fn coordinator_for(dir: &TempDir, crawl: &CrawlConfig) -> CrawlCoordinator {
    let database = Database::new(dir.path().join("test.db"))
        .await
        .expect("database should open");
    let store = Arc::new(
        PageContextStore::load(&database, &CacheConfig::default())
            .await
            .expect("store should load"),
    );
    let client = CrawlBackendClient::new(crawl).expect("client should build");
    let embedder =
        EmbeddingClient::new(&EmbeddingConfig::default()).expect("embedder should build");

    CrawlCoordinator::new(client, embedder, store, crawl)
}

#[tokio::test]
#[serial_test::serial]
async fn disabled_backend_skips_crawl_without_touching_store() {
    // SAFETY: test-scoped env mutation, serialized with other env tests
    unsafe {
        std::env::remove_var("ADMATCH_CRAWL_TOKEN");
    }

    let dir = TempDir::new().expect("tempdir should be created");
    let config = crawl_config("http://127.0.0.1:9", None);
    let coordinator = coordinator_for(&dir, &config).await;

    let result = coordinator.crawl_and_wait("https://example.com/page").await;
    assert!(result.is_none());
    assert!(!coordinator.store.is_being_crawled("https://example.com/page"));
    assert!(coordinator.store.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_trigger_clears_crawling_flag() {
    let dir = TempDir::new().expect("tempdir should be created");
    // Nothing listens here, so the trigger fails immediately
    let config = crawl_config("http://127.0.0.1:9", Some("token"));
    let coordinator = coordinator_for(&dir, &config).await;

    let result = coordinator.crawl_and_wait("https://example.com/page").await;
    assert!(result.is_none());
    assert!(!coordinator.store.is_being_crawled("https://example.com/page"));
    assert!(!coordinator.has_in_flight("https://example.com/page"));
}

#[tokio::test]
async fn has_in_flight_is_false_when_idle() {
    let dir = TempDir::new().expect("tempdir should be created");
    let config = crawl_config("http://127.0.0.1:9", Some("token"));
    let coordinator = coordinator_for(&dir, &config).await;

    assert!(!coordinator.has_in_flight("https://example.com/page"));
}
