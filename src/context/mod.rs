
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::crawler::coordinator::CrawlCoordinator;
use crate::embeddings::{EmbeddingClient, page_text};
use crate::models::{AdRequestContext, EnrichedPageContext};
use crate::storage::PageContextStore;

/// What ad-serving logic sees: the request URL plus whatever enrichment
/// is available. Built for every request; never fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedContext {
    pub url: String,
    pub title: Option<String>,
    pub headings: Vec<String>,
    pub visible_text: Option<String>,
    pub keywords: Vec<String>,
    pub topics: Vec<String>,
    pub visual_styles: BTreeMap<String, serde_json::Value>,
    pub system_info: BTreeMap<String, serde_json::Value>,
    pub embedding: Option<Vec<f32>>,
    pub has_enriched: bool,
}

/// Front door for ad-serving: looks up cached enrichment, triggers and
/// waits for a crawl on a miss, and always produces a merged context.
pub struct ContextEnricher {
    store: Arc<PageContextStore>,
    coordinator: Arc<CrawlCoordinator>,
    embedder: EmbeddingClient,
}

impl ContextEnricher {
    #[inline]
    pub fn new(
        store: Arc<PageContextStore>,
        coordinator: Arc<CrawlCoordinator>,
        embedder: EmbeddingClient,
    ) -> Self {
        Self {
            store,
            coordinator,
            embedder,
        }
    }

    /// Cached enrichment for a URL, back-filling a missing embedding
    /// from the structured fields before returning.
    #[inline]
    pub async fn enriched_context(&self, url: &str) -> Option<EnrichedPageContext> {
        let mut enriched = self.store.get_enriched(url)?;

        if !enriched.has_embedding() {
            info!("Generating missing embedding for cached context: {}", url);
            match self.embedder.embed(&page_text(&enriched)) {
                Ok(embedding) => {
                    enriched.embedding = Some(embedding);
                    if let Err(e) = self.store.store_enriched_context(enriched.clone()).await {
                        warn!("Failed to persist back-filled embedding for {}: {e:#}", url);
                    }
                }
                Err(e) => {
                    // Serve the context without its embedding
                    warn!("Embedding back-fill failed for {}: {e:#}", url);
                }
            }
        }

        Some(enriched)
    }

    /// The main entry point for ad requests. Suspends the caller through
    /// a crawl on cache miss; degrades to a bare merge when enrichment
    /// is unavailable for any reason.
    #[inline]
    pub async fn get_or_enrich(&self, request: &AdRequestContext) -> MergedContext {
        let url = &request.url;

        let mut enriched = self.enriched_context(url).await;

        if enriched.is_none() {
            if self.coordinator.has_in_flight(url) || !self.store.is_being_crawled(url) {
                debug!("No cached context for {}; crawling now", url);
                enriched = self.coordinator.crawl_and_wait(url).await;
                if enriched.is_none() {
                    // A concurrent leader may have written the cache even
                    // though our wait came back empty
                    enriched = self.enriched_context(url).await;
                }
            } else {
                // Another process claims this URL; don't duplicate the
                // crawl, just take whatever the cache has
                debug!("Crawl already in progress elsewhere for {}", url);
                enriched = self.enriched_context(url).await;
            }
        }

        merge_contexts(request, enriched)
    }
}

/// Total merge: full field set when enrichment exists, bare URL
/// otherwise. Partial data beats no response.
#[inline]
pub fn merge_contexts(
    request: &AdRequestContext,
    enriched: Option<EnrichedPageContext>,
) -> MergedContext {
    match enriched {
        Some(context) => MergedContext {
            url: context.url,
            title: context.title,
            headings: context.headings,
            visible_text: context.main_content,
            keywords: context.keywords,
            topics: context.topics,
            visual_styles: context.visual_styles,
            system_info: context.system_info,
            embedding: context.embedding,
            has_enriched: true,
        },
        None => MergedContext {
            url: request.url.clone(),
            title: None,
            headings: Vec::new(),
            visible_text: None,
            keywords: Vec::new(),
            topics: Vec::new(),
            visual_styles: BTreeMap::new(),
            system_info: BTreeMap::new(),
            embedding: None,
            has_enriched: false,
        },
    }
}
