use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::config::{Config, get_config_dir};
use crate::context::ContextEnricher;
use crate::crawler::CrawlBackendClient;
use crate::crawler::coordinator::CrawlCoordinator;
use crate::database::sqlite::Database;
use crate::embeddings::EmbeddingClient;
use crate::ingestion;
use crate::matcher::ProductMatcher;
use crate::models::AdRequestContext;
use crate::storage::{PageContextStore, ProductCatalog};

/// Everything a command needs, wired from the config directory.
pub struct Services {
    pub config: Config,
    pub store: Arc<PageContextStore>,
    pub catalog: ProductCatalog,
    pub embedder: EmbeddingClient,
    pub enricher: ContextEnricher,
    pub matcher: ProductMatcher,
}

#[inline]
pub async fn load_services() -> Result<Services> {
    let config_dir = get_config_dir().context("Failed to resolve config directory")?;
    let config = Config::load(&config_dir).context("Failed to load configuration")?;

    let database = Database::initialize_from_config_dir(&config_dir)
        .await
        .context("Failed to initialize database")?;

    let store = Arc::new(
        PageContextStore::load(&database, &config.cache)
            .await
            .context("Failed to load page context store")?,
    );
    let catalog = ProductCatalog::load(&database)
        .await
        .context("Failed to load product catalog")?;

    let embedder =
        EmbeddingClient::new(&config.embedding).context("Failed to build embedding client")?;
    let crawl_client =
        CrawlBackendClient::new(&config.crawl).context("Failed to build crawl client")?;

    let coordinator = Arc::new(CrawlCoordinator::new(
        crawl_client,
        embedder.clone(),
        Arc::clone(&store),
        &config.crawl,
    ));
    let enricher = ContextEnricher::new(Arc::clone(&store), coordinator, embedder.clone());
    let matcher = ProductMatcher::new(config.matching.clone());

    Ok(Services {
        config,
        store,
        catalog,
        embedder,
        enricher,
        matcher,
    })
}

/// Load products from the flat-file layout and back-fill embeddings.
#[inline]
pub async fn ingest_products(dir: Option<PathBuf>) -> Result<()> {
    let services = load_services().await?;
    let products_dir = dir.unwrap_or_else(|| services.config.products_dir());

    info!("Ingesting products from {}", products_dir.display());

    let stats = ingestion::auto_load(&services.catalog, &services.embedder, &products_dir).await?;

    println!("Ingestion complete:");
    println!("  Loaded: {}", stats.loaded);
    println!("  Skipped: {}", stats.skipped);
    println!("  Embeddings generated: {}", stats.embedded);
    println!("  Catalog size: {}", services.catalog.len());

    Ok(())
}

/// Print the catalog.
#[inline]
pub async fn list_products() -> Result<()> {
    let services = load_services().await?;
    let products = services.catalog.get_all(false);

    if products.is_empty() {
        println!("No products in catalog. Run `admatch ingest` to load some.");
        return Ok(());
    }

    println!("{} products:", products.len());
    for product in products {
        let price = product
            .price
            .map_or_else(|| "-".to_string(), |p| format!("{p:.2} {}", product.currency));
        println!(
            "  [{}] {} ({price}, {}, {})",
            product.id,
            product.name,
            if product.active { "active" } else { "inactive" },
            if product.has_embedding() {
                "embedded"
            } else {
                "no embedding"
            }
        );
    }

    Ok(())
}

/// Enrich one URL, crawling on a cache miss, and show the merged context.
#[inline]
pub async fn enrich_url(url: &str) -> Result<()> {
    let services = load_services().await?;

    let request = AdRequestContext::for_url(url, "cli");
    let merged = services.enricher.get_or_enrich(&request).await;

    if merged.has_enriched {
        println!("Enriched context for {}", merged.url);
        println!("  Title: {}", merged.title.as_deref().unwrap_or("-"));
        println!("  Topics: {}", merged.topics.join(", "));
        println!(
            "  Keywords: {}",
            merged
                .keywords
                .iter()
                .take(10)
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!("  Headings: {}", merged.headings.len());
        println!(
            "  Embedding: {}",
            merged
                .embedding
                .as_ref()
                .map_or_else(|| "absent".to_string(), |e| format!("{} dims", e.len()))
        );
    } else {
        println!("No enrichment available for {}", merged.url);
        println!("The crawl may have failed or the backend is not configured.");
    }

    Ok(())
}

/// Enrich a URL and rank the catalog against it.
#[inline]
pub async fn match_products(url: &str, top_k: Option<usize>, min_score: Option<f32>) -> Result<()> {
    let services = load_services().await?;
    let top_k = top_k.unwrap_or(services.config.matching.top_k);
    let min_score = min_score.unwrap_or(services.config.matching.min_score);

    let request = AdRequestContext::for_url(url, "cli");
    let merged = services.enricher.get_or_enrich(&request).await;
    let products = services.catalog.get_all(true);

    let results = services.matcher.find_best_products(
        merged.embedding.as_deref(),
        &products,
        top_k,
        min_score,
        &merged.topics,
    );

    if results.is_empty() {
        // Fall back to keyword matching when no embedding is available
        let fallback = services
            .matcher
            .match_by_topics(&merged.topics, &products, None);
        if fallback.is_empty() {
            println!("No matching products for {url}");
            return Ok(());
        }

        println!("Topic-based matches for {url} (no embedding available):");
        for product in fallback.iter().take(top_k) {
            println!("  {} ({})", product.name, product.id);
        }
        return Ok(());
    }

    println!("Top {} products for {url}:", results.len());
    for (rank, result) in results.iter().enumerate() {
        println!(
            "  {}. {} (score {:.3}, cosine {:.3}, {})",
            rank + 1,
            result.product.name,
            result.score,
            result.raw_score,
            result.category
        );
    }

    Ok(())
}

/// Drop the cached context for one URL.
#[inline]
pub async fn invalidate_url(url: &str) -> Result<()> {
    let services = load_services().await?;
    services.store.invalidate(url).await?;
    println!("Invalidated cache for {url}");
    Ok(())
}

/// Drop every cached context.
#[inline]
pub async fn clear_cache() -> Result<()> {
    let services = load_services().await?;
    services.store.clear().await?;
    println!("Page context cache cleared");
    Ok(())
}

/// Show catalog/cache counts and external service health.
#[inline]
pub async fn show_status() -> Result<()> {
    let services = load_services().await?;

    println!("admatch status");
    println!(
        "  Products: {} ({} missing embeddings)",
        services.catalog.len(),
        services.catalog.missing_embeddings().len()
    );
    println!("  Cached page contexts: {}", services.store.len());

    match services.embedder.health_check() {
        Ok(()) => println!("  Embedding service: ok"),
        Err(e) => println!("  Embedding service: unavailable ({e:#})"),
    }

    if services.config.crawl.resolve_token().is_some() {
        println!("  Crawl backend: token configured");
    } else {
        println!("  Crawl backend: no token (enrichment disabled)");
    }

    Ok(())
}
